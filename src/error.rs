//! Error types for the edgequake-pdflayout library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`PdfLayoutError`]: **Fatal** for the current operation: missing
//!   credentials, a remote call that failed, a parsing job that ended in
//!   `failed`, a poll loop that ran out of time, an archive without a result
//!   file. Returned as `Err(PdfLayoutError)` from the remote client, the
//!   workflow functions and the HTTP handlers.
//!
//! * [`TranslateError`]: a single LLM translation call failed. The variant
//!   carries the classified cause (authentication, rate limit, timeout, …) so
//!   callers can print an actionable hint.
//!
//! * [`BlockError`]: **Non-fatal**: one layout block could not be
//!   translated. Batch translation records it, counts it, and moves on.
//!
//! The layout normalizer has no error type at all: unrecognised input
//! degrades to an empty layout.

use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdflayout library.
#[derive(Debug, Error)]
pub enum PdfLayoutError {
    // ── Configuration ─────────────────────────────────────────────────────
    /// A credential or setting required for the call is missing.
    #[error("{what} is not configured.\n{hint}")]
    Configuration { what: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Remote parsing service ────────────────────────────────────────────
    /// Transport failure, non-2xx status, or non-zero business code.
    #[error("{service} API error: {message}")]
    RemoteApi { service: String, message: String },

    /// The parsing job itself reported `failed`.
    #[error("Parsing task '{task_id}' failed: {message}")]
    RemoteTaskFailed { task_id: String, message: String },

    /// Polling exceeded its budget. The job may still finish remotely.
    #[error("Task '{task_id}' did not finish within {secs}s; poll again later")]
    Timeout { task_id: String, secs: u64 },

    /// A success response did not have the shape we rely on.
    #[error("Unexpected response from {service}: {detail}")]
    Protocol { service: String, detail: String },

    /// The downloaded archive contains no JSON file.
    #[error("No result JSON found in archive extracted to '{dir}'")]
    NoResultFound { dir: PathBuf },

    /// The archive could not be opened or extracted.
    #[error("Failed to unpack archive into '{dir}': {detail}")]
    Archive { dir: PathBuf, detail: String },

    // ── Translation ───────────────────────────────────────────────────────
    /// A single translation call failed.
    #[error(transparent)]
    Translation(#[from] TranslateError),

    // ── Local files / input ───────────────────────────────────────────────
    /// Input file was not found.
    #[error("File not found: '{}'", path.display())]
    FileNotFound { path: PathBuf },

    /// Request or argument was malformed or incomplete.
    #[error("{0}")]
    InvalidInput(String),

    /// A requested path resolves outside its serving root.
    #[error("Path '{requested}' escapes the serving directory")]
    PathOutsideRoot { requested: String },

    /// Reading or writing a local file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local JSON file could not be parsed.
    #[error("Invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfLayoutError {
    /// HTTP status class for this failure: 404 for missing things, 400 for
    /// malformed input, 403 for path escapes, 500 for everything else.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PdfLayoutError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            PdfLayoutError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PdfLayoutError::PathOutsideRoot { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            PdfLayoutError::FileNotFound { path }
        } else {
            PdfLayoutError::Io { path, source }
        }
    }
}

/// Why a single LLM translation call failed.
///
/// Each variant renders a distinct, human-readable message naming the likely
/// fix. The `detail` field keeps the raw upstream error for logs.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TranslateError {
    /// 401/403 or an "unauthorized" message.
    #[error("Authentication failed: the API key is invalid or expired; check QWEN_API_KEY / OPENAI_API_KEY. Details: {detail}")]
    Auth { detail: String },

    /// 429 or a "rate limit" message.
    #[error("Rate limit exceeded: too many requests, retry later. Details: {detail}")]
    RateLimited { detail: String },

    /// The request timed out.
    #[error("Request timeout: check the network connection to the LLM endpoint. Details: {detail}")]
    Timeout { detail: String },

    /// The endpoint does not know the requested model.
    #[error("Model not found: '{model}'; check QWEN_MODEL / DEFAULT_MODEL. Details: {detail}")]
    ModelNotFound { model: String, detail: String },

    /// The endpoint answered 2xx but without any choice/message.
    #[error("LLM returned an empty response: {detail}")]
    EmptyResponse { detail: String },

    /// Anything else.
    #[error("LLM API call failed: {detail}")]
    Api { detail: String },
}

/// A non-fatal error for a single layout block.
///
/// Collected by [`crate::translate::Translator::translate_layout`]; only the
/// first one is surfaced in the batch summary.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// The translation call for this block failed.
    #[error("Block {index}: translation failed: {source}")]
    TranslationFailed {
        index: usize,
        #[source]
        source: TranslateError,
    },
}
