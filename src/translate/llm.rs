//! Chat-completion backend for translation.
//!
//! The translator talks to an LLM only through [`ChatBackend`], which makes
//! one request and returns the assistant text. [`ProviderBackend`] sends it
//! through an `edgequake_llm` OpenAI-compatible provider, which both
//! DashScope's compatible mode and OpenAI itself accept.
//!
//! Failures come back as the provider's [`LlmError`]; [`classify`] turns
//! them into the user-facing [`TranslateError`] categories.

use crate::error::TranslateError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, OpenAIProvider};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub use edgequake_llm::LlmError;

/// Where and how to send one chat request.
#[derive(Clone)]
pub struct LlmEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl fmt::Debug for LlmEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A single user-turn completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
}

/// One-shot chat completion.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, endpoint: &LlmEndpoint, request: &ChatRequest) -> Result<String, LlmError>;
}

/// [`ChatBackend`] over `edgequake_llm`'s OpenAI-compatible provider.
///
/// A provider is built per call because key, base URL and model all vary
/// with the endpoint the translator resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderBackend;

impl ProviderBackend {
    pub fn new() -> Self {
        Self
    }
}

fn build_options(request: &ChatRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        ..Default::default()
    }
}

#[async_trait]
impl ChatBackend for ProviderBackend {
    async fn chat(&self, endpoint: &LlmEndpoint, request: &ChatRequest) -> Result<String, LlmError> {
        debug!("chat {} model={}", endpoint.base_url, request.model);

        let provider = OpenAIProvider::compatible(endpoint.api_key.as_str(), endpoint.base_url.as_str())
            .with_model(request.model.as_str());
        let messages = vec![ChatMessage::user(request.prompt.as_str())];
        let options = build_options(request);

        let response = tokio::time::timeout(endpoint.timeout, provider.chat(&messages, Some(&options)))
            .await
            .map_err(|_| LlmError::Timeout)??;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Map a provider failure onto a user-facing category.
///
/// Typed variants decide first; otherwise the message text is searched for
/// the usual phrases (`unauthorized`, `rate limit`, `timeout`,
/// `model … not found`).
pub fn classify(err: &LlmError, model: &str) -> TranslateError {
    let detail = err.to_string();
    let lower = detail.to_lowercase();

    match err {
        LlmError::AuthError(_) => return TranslateError::Auth { detail },
        LlmError::RateLimited(_) => return TranslateError::RateLimited { detail },
        LlmError::Timeout => return TranslateError::Timeout { detail },
        LlmError::ModelNotFound(_) => {
            return TranslateError::ModelNotFound {
                model: model.to_string(),
                detail,
            }
        }
        _ => {}
    }

    if lower.contains("401") || lower.contains("unauthorized") || lower.contains("invalid api key") {
        TranslateError::Auth { detail }
    } else if lower.contains("429") || lower.contains("rate limit") {
        TranslateError::RateLimited { detail }
    } else if lower.contains("timeout") || lower.contains("timed out") {
        TranslateError::Timeout { detail }
    } else if lower.contains("model") && (lower.contains("not found") || lower.contains("does not exist")) {
        TranslateError::ModelNotFound {
            model: model.to_string(),
            detail,
        }
    } else if lower.contains("deserializ") || lower.contains("no choices") {
        TranslateError::EmptyResponse { detail }
    } else {
        TranslateError::Api { detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_typed_variants() {
        assert!(matches!(
            classify(&LlmError::AuthError("bad key".into()), "m"),
            TranslateError::Auth { .. }
        ));
        assert!(matches!(
            classify(&LlmError::RateLimited("slow down".into()), "m"),
            TranslateError::RateLimited { .. }
        ));
        assert!(matches!(classify(&LlmError::Timeout, "m"), TranslateError::Timeout { .. }));
    }

    #[test]
    fn classifies_by_message() {
        assert!(matches!(
            classify(&LlmError::ApiError("HTTP 401 Unauthorized".into()), "m"),
            TranslateError::Auth { .. }
        ));
        assert!(matches!(
            classify(&LlmError::ApiError("status 429".into()), "m"),
            TranslateError::RateLimited { .. }
        ));
        assert!(matches!(
            classify(&LlmError::ApiError("The model `qwen-x` does not exist".into()), "qwen-x"),
            TranslateError::ModelNotFound { .. }
        ));
        assert!(matches!(
            classify(&LlmError::ApiError("upstream timeout".into()), "m"),
            TranslateError::Timeout { .. }
        ));
        assert!(matches!(
            classify(&LlmError::ApiError("internal".into()), "m"),
            TranslateError::Api { .. }
        ));
    }

    #[test]
    fn model_not_found_names_model() {
        let err = classify(&LlmError::ModelNotFound("gone".into()), "qwen-max-x");
        assert!(err.to_string().contains("qwen-max-x"));
    }

    #[test]
    fn options_carry_temperature() {
        let request = ChatRequest {
            model: "m".into(),
            prompt: "p".into(),
            temperature: 0.2,
        };
        assert_eq!(build_options(&request).temperature, Some(0.2));
    }

    #[test]
    fn endpoint_debug_redacts_key() {
        let e = LlmEndpoint {
            base_url: "http://x".into(),
            api_key: "sk-abc".into(),
            model: "m".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(!format!("{e:?}").contains("sk-abc"));
    }
}
