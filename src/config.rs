//! Configuration types for the layout service.
//!
//! All behaviour is controlled through [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`]. The configuration is grouped by collaborator:
//!
//! * [`ParserApiConfig`]: the remote document-parsing service (token, base
//!   URL, model version, polling budget);
//! * [`LlmConfig`]: the translation endpoint(s): a primary Qwen-compatible
//!   provider and a generic OpenAI-compatible fallback;
//! * storage and cache settings at the top level.
//!
//! Secrets are redacted from `Debug` output so the whole config can be logged
//! at startup.

use crate::error::PdfLayoutError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the service and the library workflows.
///
/// # Example
/// ```rust
/// use edgequake_pdflayout::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .parser_token("mineru-token")
///     .primary_api_key("sk-qwen")
///     .output_dir("data/mineru")
///     .build()
///     .unwrap();
/// assert_eq!(config.default_target_lang, "zh");
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory where uploaded PDF/JSON files are stored. Default: `data/files`.
    pub upload_dir: PathBuf,

    /// Root directory for extracted archives, one subdirectory per task or
    /// batch id. Also the root for normalize/translate file lookups.
    /// Default: `data/mineru`.
    pub output_dir: PathBuf,

    /// Maximum accepted upload size in bytes. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Lower-case file extensions accepted by the upload endpoints.
    /// Default: `pdf`, `json`.
    pub allowed_extensions: Vec<String>,

    /// Target language used when a request does not name one. Default: `zh`.
    pub default_target_lang: String,

    /// Lifetime of a cached translation. Default: 24 h.
    pub cache_ttl: Duration,

    /// Maximum number of cached translations kept in memory. Default: 10 000.
    pub cache_capacity: usize,

    /// Remote parsing service settings.
    pub parser: ParserApiConfig,

    /// LLM translation settings.
    pub llm: LlmConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("data/files"),
            output_dir: PathBuf::from("data/mineru"),
            max_upload_bytes: 100 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string(), "json".to_string()],
            default_target_lang: "zh".to_string(),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_capacity: 10_000,
            parser: ParserApiConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("allowed_extensions", &self.allowed_extensions)
            .field("default_target_lang", &self.default_target_lang)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_capacity", &self.cache_capacity)
            .field("parser", &self.parser)
            .field("llm", &self.llm)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether `filename` carries one of the allowed extensions.
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_lowercase();
                self.allowed_extensions.iter().any(|a| *a == ext)
            }
            None => false,
        }
    }
}

/// Settings for the remote document-parsing service.
#[derive(Clone)]
pub struct ParserApiConfig {
    /// Bearer token. `None` makes every call fail with a configuration error.
    pub token: Option<String>,

    /// API root, e.g. `https://mineru.net/api/v4`.
    pub base_url: String,

    /// Default model version (`pipeline` or `vlm`). Default: `vlm`.
    pub model_version: String,

    /// Timeout for JSON API calls in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for archive downloads and file uploads in seconds. Default: 300.
    pub transfer_timeout_secs: u64,

    /// Maximum time `await_completion` keeps polling. Default: 600 s.
    pub max_wait: Duration,

    /// Fixed delay between two polls. Default: 5 s.
    pub poll_interval: Duration,
}

impl Default for ParserApiConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: "https://mineru.net/api/v4".to_string(),
            model_version: "vlm".to_string(),
            request_timeout_secs: 30,
            transfer_timeout_secs: 300,
            max_wait: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl fmt::Debug for ParserApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserApiConfig")
            .field("token", &redact(&self.token))
            .field("base_url", &self.base_url)
            .field("model_version", &self.model_version)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("transfer_timeout_secs", &self.transfer_timeout_secs)
            .field("max_wait", &self.max_wait)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Credentials and defaults for one OpenAI-compatible chat endpoint.
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    /// API key. Empty or `None` means "not configured".
    pub api_key: Option<String>,
    /// Endpoint root; `/chat/completions` is appended.
    pub base_url: String,
    /// Model used when the caller does not name one.
    pub model: String,
}

impl ProviderCredentials {
    /// The API key if it is present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// LLM translation settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Preferred provider (Qwen / DashScope compatible mode).
    pub primary: ProviderCredentials,

    /// Generic OpenAI-compatible provider, used only when `primary` has no key.
    pub fallback: ProviderCredentials,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let qwen_base = "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string();
        Self {
            primary: ProviderCredentials {
                api_key: None,
                base_url: qwen_base.clone(),
                model: "qwen-turbo".to_string(),
            },
            fallback: ProviderCredentials {
                api_key: None,
                base_url: qwen_base,
                model: "qwen-turbo".to_string(),
            },
            temperature: 0.2,
            api_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Whether any provider has a key.
    pub fn is_configured(&self) -> bool {
        self.primary.key().is_some() || self.fallback.key().is_some()
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    match secret.as_deref() {
        Some(s) if !s.is_empty() => "<redacted>",
        _ => "<unset>",
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn default_target_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.default_target_lang = lang.into();
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.cache_capacity = n.max(1);
        self
    }

    pub fn parser_token(mut self, token: impl Into<String>) -> Self {
        self.config.parser.token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }

    pub fn parser_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.parser.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.config.parser.model_version = version.into();
        self
    }

    pub fn max_wait(mut self, d: Duration) -> Self {
        self.config.parser.max_wait = d;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.config.parser.poll_interval = d;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.parser.request_timeout_secs = secs;
        self
    }

    pub fn transfer_timeout_secs(mut self, secs: u64) -> Self {
        self.config.parser.transfer_timeout_secs = secs;
        self
    }

    pub fn primary_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm.primary.api_key = Some(key.into());
        self
    }

    pub fn primary_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm.primary.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn primary_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.primary.model = model.into();
        self
    }

    pub fn fallback_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm.fallback.api_key = Some(key.into());
        self
    }

    pub fn fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm.fallback.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.fallback.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.llm.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, PdfLayoutError> {
        let c = &self.config;
        if c.parser.poll_interval.is_zero() {
            return Err(PdfLayoutError::InvalidConfig(
                "Poll interval must be greater than zero".into(),
            ));
        }
        if c.parser.base_url.is_empty() {
            return Err(PdfLayoutError::InvalidConfig(
                "Parser base URL must not be empty".into(),
            ));
        }
        if c.default_target_lang.trim().is_empty() {
            return Err(PdfLayoutError::InvalidConfig(
                "Default target language must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(PdfLayoutError::InvalidConfig(
                "Maximum upload size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}
