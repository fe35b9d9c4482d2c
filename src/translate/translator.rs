//! Single-text translation with caching and provider selection.

use super::cache::{cache_key, MemoryCache, TranslationCache};
use super::llm::{classify, ChatBackend, ChatRequest, LlmEndpoint, ProviderBackend};
use crate::config::{LlmConfig, ServiceConfig};
use crate::error::TranslateError;
use crate::prompts::translation_prompt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Texts longer than this are likely to exceed the model's context budget.
const LONG_TEXT_CHARS: usize = 6000;

/// Translates text through an LLM, consulting a cache first.
///
/// Cheap to clone; clones share the cache and the chat backend.
#[derive(Clone)]
pub struct Translator {
    config: LlmConfig,
    cache: Arc<dyn TranslationCache>,
    backend: Arc<dyn ChatBackend>,
    ttl: Duration,
}

impl Translator {
    pub fn new(
        config: LlmConfig,
        cache: Arc<dyn TranslationCache>,
        backend: Arc<dyn ChatBackend>,
        ttl: Duration,
    ) -> Self {
        Self {
            config,
            cache,
            backend,
            ttl,
        }
    }

    /// Translator with an in-memory cache and the `edgequake_llm` backend,
    /// sized from `config`.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.llm.clone(),
            Arc::new(MemoryCache::new(config.cache_capacity)),
            Arc::new(ProviderBackend::new()),
            config.cache_ttl,
        )
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Translate `text` into `target_lang`.
    ///
    /// * blank text is returned unchanged without any remote call;
    /// * a cache hit is returned directly;
    /// * with no API key configured the text is returned unchanged (`Ok`);
    /// * an empty model answer yields the original text and is not cached.
    ///
    /// `model` overrides the provider's default model.
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        model: Option<&str>,
    ) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let key = cache_key(text, target_lang);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Translation cache hit: {}…", &key[..8]);
            return Ok(hit);
        }

        let Some(endpoint) = self.endpoint(model) else {
            warn!("No API key configured (QWEN_API_KEY or OPENAI_API_KEY); returning original text");
            return Ok(text.to_string());
        };

        let chars = text.chars().count();
        if chars > LONG_TEXT_CHARS {
            warn!("Text is long ({} chars) and may exceed the model's token limit", chars);
        }

        let request = ChatRequest {
            model: endpoint.model.clone(),
            prompt: translation_prompt(text, target_lang),
            temperature: self.config.temperature,
        };

        info!(
            "Translating {} chars into '{}' with {} at {}",
            chars, target_lang, endpoint.model, endpoint.base_url
        );
        let started = Instant::now();
        let answer = self
            .backend
            .chat(&endpoint, &request)
            .await
            .map_err(|e| {
                let classified = classify(&e, &endpoint.model);
                error!("LLM call failed: {}", classified);
                classified
            })?;
        debug!("LLM answered in {:?}", started.elapsed());

        let translated = answer.trim();
        if translated.is_empty() {
            warn!("LLM returned an empty translation; keeping original text");
            return Ok(text.to_string());
        }
        if translated == text {
            warn!("LLM returned the input unchanged; it may not have translated");
        }

        self.cache.set(&key, translated.to_string(), self.ttl);
        Ok(translated.to_string())
    }

    /// Resolve the endpoint: primary provider if it has a key, else fallback.
    fn endpoint(&self, model: Option<&str>) -> Option<LlmEndpoint> {
        let provider = if self.config.primary.key().is_some() {
            &self.config.primary
        } else {
            &self.config.fallback
        };
        let api_key = provider.key()?.to_string();
        Some(LlmEndpoint {
            base_url: provider.base_url.clone(),
            api_key,
            model: model
                .filter(|m| !m.is_empty())
                .unwrap_or(provider.model.as_str())
                .to_string(),
            timeout: Duration::from_secs(self.config.api_timeout_secs),
        })
    }
}
