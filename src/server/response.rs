//! Response envelope and error mapping.
//!
//! Every JSON endpoint answers `{success, message, data}`. Failures carry
//! the HTTP status of their error class and a message with a short hint when
//! the cause is recognisable (bad API key, rate limit, timeout, unknown
//! model).

use crate::config::LlmConfig;
use crate::error::PdfLayoutError;
use crate::translate::BatchSummary;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

/// The JSON envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    pub data: Value,
}

impl ApiResponse {
    /// A success envelope. `data` that serializes to `null` becomes `{}`.
    pub fn ok(message: impl Into<String>, data: impl Serialize) -> Json<Self> {
        let data = match serde_json::to_value(data) {
            Ok(Value::Null) | Err(_) => Value::Object(Map::new()),
            Ok(v) => v,
        };
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

/// A failure envelope with its status.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub data: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: Value::Object(Map::new()),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Map a library error, prefixing the message with what was attempted.
    pub fn during(action: &str, err: PdfLayoutError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            error!("{} failed: {}", action, err);
        }
        let detail = err.to_string();
        let message = match hint_for(&detail) {
            Some(hint) => format!("{action} failed: {detail} ({hint})"),
            None => format!("{action} failed: {detail}"),
        };
        Self::new(status, message)
    }
}

impl From<PdfLayoutError> for ApiError {
    fn from(err: PdfLayoutError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            error!("{}", err);
        }
        let detail = err.to_string();
        let message = match hint_for(&detail) {
            Some(hint) => format!("{detail} ({hint})"),
            None => detail,
        };
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse {
            success: false,
            message: self.message,
            data: self.data,
        });
        (self.status, body).into_response()
    }
}

impl IntoResponse for PdfLayoutError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// A short remedy for well-known failure texts.
pub fn hint_for(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if lower.contains("401")
        || lower.contains("unauthorized")
        || lower.contains("authentication failed")
        || lower.contains("api key")
    {
        Some("the API key is invalid; check the configuration")
    } else if lower.contains("429") || lower.contains("rate limit") {
        Some("rate limit exceeded; retry later")
    } else if lower.contains("timeout") || lower.contains("timed out") {
        Some("the call timed out; check the network")
    } else if lower.contains("model") && lower.contains("not found") {
        Some("the model does not exist; check the model configuration")
    } else {
        None
    }
}

/// Human-readable outcome of a batch translation.
///
/// `Translation complete: 3 translated, 1 skipped, 1 failed (hint)`; the
/// skipped and failed parts appear only when non-zero.
pub fn translation_summary(summary: &BatchSummary, llm: &LlmConfig) -> String {
    let mut message = format!("Translation complete: {} translated", summary.translated_count);
    if summary.skipped_count > 0 {
        message.push_str(&format!(", {} skipped", summary.skipped_count));
    }
    if summary.failed_count > 0 {
        let hint = if !llm.is_configured() {
            "no API key configured; set QWEN_API_KEY or OPENAI_API_KEY".to_string()
        } else {
            match summary.first_error.as_deref() {
                Some(err) => hint_for(err)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("error: {}", err.chars().take(100).collect::<String>())),
                None => "see server logs".to_string(),
            }
        };
        message.push_str(&format!(", {} failed ({hint})", summary.failed_count));
    }
    message
}
