//! # edgequake-pdflayout
//!
//! Turn PDFs into positioned, optionally translated, layout blocks.
//!
//! A remote document-parsing service does the heavy lifting (OCR, layout
//! analysis). This crate drives its job API, unpacks the result archive and
//! reduces whatever JSON shape it produced to one canonical sequence of
//! `{page, bbox, text, type}` blocks. Blocks can then be translated through
//! any OpenAI-compatible chat endpoint, with a content-addressed cache in
//! front of it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (URL or upload)
//!  │
//!  ├─ 1. Submit     job to the parsing service (or PUT to a batch upload URL)
//!  ├─ 2. Poll       until done / failed / max_wait
//!  ├─ 3. Collect    download zip, unpack, locate the result JSON
//!  ├─ 4. Normalize  4 known shapes ─► Vec<LayoutBlock>
//!  └─ 5. Translate  per block, cached, partial failures tolerated
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use edgequake_pdflayout::{normalize, BlockKind};
//! use serde_json::json;
//!
//! let raw = json!({
//!     "pdf_info": [{
//!         "page_idx": 0,
//!         "para_blocks": [{
//!             "type": "title",
//!             "bbox": [10, 20, 300, 40],
//!             "lines": [{"spans": [{"content": "Hello"}, {"content": "world"}]}]
//!         }]
//!     }]
//! });
//! let layout = normalize(&raw);
//! assert_eq!(layout[0].text, "Hello world");
//! assert_eq!(layout[0].kind, BlockKind::Title);
//! assert_eq!(layout[0].page, 1);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdflayout` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdflayout = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod layout;
pub mod progress;
pub mod prompts;
pub mod remote;
pub mod server;
pub mod storage;
pub mod translate;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LlmConfig, ParserApiConfig, ProviderCredentials, ServiceConfig, ServiceConfigBuilder};
pub use error::{BlockError, PdfLayoutError, TranslateError};
pub use layout::{detect_shape, normalize, BlockKind, LayoutBlock, LayoutShape};
pub use progress::{NoopProgressCallback, ProgressCallback, TranslationProgressCallback};
pub use remote::{await_completion, ParserClient, SubmitOptions, TaskState, TaskStatus};
pub use server::{router, serve, AppState};
pub use translate::{BatchOptions, BatchSummary, MemoryCache, TranslationCache, Translator};
pub use workflow::{
    normalize_file, parse_remote, sibling_path, translate_document, write_layout, ParseOutcome,
};
