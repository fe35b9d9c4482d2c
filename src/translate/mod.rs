//! LLM translation of layout blocks.
//!
//! * [`Translator::translate`]: one text, with a TTL cache in front of the
//!   LLM call;
//! * [`Translator::translate_layout`]: every block of a layout, sequential,
//!   tolerant of per-block failures.
//!
//! The cache ([`TranslationCache`]) and the LLM transport ([`ChatBackend`])
//! are injected, so tests and alternative deployments can swap either.

pub mod batch;
pub mod cache;
pub mod llm;
pub mod translator;

pub use batch::{BatchOptions, BatchSummary};
pub use cache::{cache_key, MemoryCache, TranslationCache};
pub use llm::{classify, ChatBackend, ChatRequest, LlmEndpoint, LlmError, ProviderBackend};
pub use translator::Translator;
