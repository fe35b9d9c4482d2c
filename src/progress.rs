//! Progress-callback trait for per-block translation events.
//!
//! Pass an [`Arc<dyn TranslationProgressCallback>`] in
//! [`crate::translate::BatchOptions::progress_callback`] to receive events as
//! [`crate::translate::Translator::translate_layout`] walks the layout. The
//! CLI uses it to drive a terminal progress bar; the HTTP server leaves it
//! unset.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdflayout::TranslationProgressCallback;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl TranslationProgressCallback for CountingCallback {
//!     fn on_block_complete(&self, index: usize, total: usize, _translated_len: usize) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("block {} of {} ({} so far)", index + 1, total, n);
//!     }
//! }
//!
//! let cb: Arc<dyn TranslationProgressCallback> =
//!     Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! # let _ = cb;
//! ```

use std::sync::Arc;

/// Called by batch translation as it processes each block.
///
/// All methods default to no-ops so callers only override what they care
/// about. Blocks are processed sequentially, so calls never overlap for one
/// batch; the `Send + Sync` bound allows sharing one callback across requests.
///
/// `index` is the 0-based position of the block in the layout; `total` is the
/// layout length, including blocks that end up skipped.
pub trait TranslationProgressCallback: Send + Sync {
    /// Called once before the first block.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the translation request for a block.
    fn on_block_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a block was translated.
    ///
    /// # Arguments
    /// * `translated_len`: character count of the translation
    fn on_block_complete(&self, index: usize, total: usize, translated_len: usize) {
        let _ = (index, total, translated_len);
    }

    /// Called when a block was skipped because it already had a translation.
    fn on_block_skipped(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when the translation call for a block failed.
    fn on_block_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every block has been visited.
    fn on_batch_complete(&self, total: usize, translated: usize, failed: usize) {
        let _ = (total, translated, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranslationProgressCallback for NoopProgressCallback {}

/// Shared handle stored in [`crate::translate::BatchOptions`].
pub type ProgressCallback = Arc<dyn TranslationProgressCallback>;
