//! Batch translation over a layout.
//!
//! Blocks are translated one after another. A failing block never aborts the
//! batch: it is counted, its error is recorded (only the first one is kept
//! in the summary), and the block falls back to its original text.

use super::translator::Translator;
use crate::error::BlockError;
use crate::layout::LayoutBlock;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Parameters of one [`Translator::translate_layout`] run.
#[derive(Clone, Default)]
pub struct BatchOptions {
    pub target_lang: String,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Retranslate blocks that already carry a translation.
    pub force_retranslate: bool,
    pub progress_callback: Option<ProgressCallback>,
}

impl BatchOptions {
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("target_lang", &self.target_lang)
            .field("model", &self.model)
            .field("force_retranslate", &self.force_retranslate)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

/// Counters of one batch run.
///
/// `translated + skipped + failed` can be lower than `total`: blocks with
/// blank text are passed over without being counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub translated_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

impl Translator {
    /// Translate every block of `blocks` in place.
    ///
    /// * blank-text blocks are left alone and not counted;
    /// * blocks with a non-empty `translated_text` are skipped (and counted)
    ///   unless `force_retranslate` is set;
    /// * on failure a block without a translation gets its original text as
    ///   `translated_text`; an existing translation is kept.
    pub async fn translate_layout(
        &self,
        blocks: &mut [LayoutBlock],
        options: &BatchOptions,
    ) -> BatchSummary {
        let total = blocks.len();
        let mut summary = BatchSummary {
            total_count: total,
            ..Default::default()
        };
        let progress = options.progress_callback.as_ref();

        info!(
            "Translating {} blocks into '{}' (force={})",
            total, options.target_lang, options.force_retranslate
        );
        if let Some(cb) = progress {
            cb.on_batch_start(total);
        }

        for (index, block) in blocks.iter_mut().enumerate() {
            let text = block.text.trim().to_string();
            if text.is_empty() {
                continue;
            }
            if !options.force_retranslate && block.has_translation() {
                summary.skipped_count += 1;
                if let Some(cb) = progress {
                    cb.on_block_skipped(index, total);
                }
                continue;
            }

            if let Some(cb) = progress {
                cb.on_block_start(index, total);
            }
            let started = Instant::now();
            debug!("Block {}/{}: {} chars", index + 1, total, text.chars().count());

            match self
                .translate(&text, &options.target_lang, options.model.as_deref())
                .await
            {
                Ok(translated) => {
                    if translated == text && text.chars().count() > 10 {
                        warn!("Block {}: translation identical to source", index + 1);
                    }
                    let len = translated.chars().count();
                    block.translated_text = Some(translated);
                    summary.translated_count += 1;
                    debug!(
                        "Block {}/{} translated in {:?} ({}/{} done)",
                        index + 1,
                        total,
                        started.elapsed(),
                        summary.translated_count,
                        total
                    );
                    if let Some(cb) = progress {
                        cb.on_block_complete(index, total, len);
                    }
                }
                Err(source) => {
                    let message = source.to_string();
                    error!("{}", BlockError::TranslationFailed { index, source });
                    summary.failed_count += 1;
                    if let Some(cb) = progress {
                        cb.on_block_error(index, total, &message);
                    }
                    if summary.first_error.is_none() {
                        summary.first_error = Some(message);
                    }
                    if !block.has_translation() {
                        block.translated_text = Some(text);
                    }
                }
            }
        }

        info!(
            "Translation finished: {} translated, {} skipped, {} failed, {} total",
            summary.translated_count, summary.skipped_count, summary.failed_count, total
        );
        if let Some(cb) = progress {
            cb.on_batch_complete(total, summary.translated_count, summary.failed_count);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, ProviderCredentials};
    use crate::layout::BlockKind;
    use crate::progress::TranslationProgressCallback;
    use crate::translate::cache::MemoryCache;
    use crate::translate::llm::{classify, ChatBackend, ChatRequest, LlmEndpoint, LlmError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// Upper-cases the text after the prompt's blank line; fails on texts
    /// containing "FAIL".
    struct Shouting {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ChatBackend for Shouting {
        async fn chat(&self, _e: &LlmEndpoint, request: &ChatRequest) -> Result<String, LlmError> {
            *self.calls.lock() += 1;
            let prompt = &request.prompt;
            let text = prompt.rsplit("\n\n").next().unwrap_or_default();
            if text.contains("FAIL") {
                return Err(LlmError::RateLimited("rate limit".into()));
            }
            Ok(text.to_uppercase())
        }
    }

    fn translator() -> (Translator, Arc<Shouting>) {
        let backend = Arc::new(Shouting {
            calls: Mutex::new(0),
        });
        let config = LlmConfig {
            primary: ProviderCredentials {
                api_key: Some("k".into()),
                base_url: "http://llm".into(),
                model: "m".into(),
            },
            ..Default::default()
        };
        let t = Translator::new(
            config,
            Arc::new(MemoryCache::new(64)),
            backend.clone(),
            Duration::from_secs(60),
        );
        (t, backend)
    }

    fn block(text: &str) -> LayoutBlock {
        LayoutBlock::new(1, crate::layout::types::zero_bbox(), text, BlockKind::Text)
    }

    #[tokio::test]
    async fn partial_failure_keeps_going() {
        let (t, _) = translator();
        let mut blocks = vec![
            block("one"),
            block("two"),
            block("FAIL three"),
            block("four"),
            block("five"),
        ];
        let summary = t.translate_layout(&mut blocks, &BatchOptions::new("zh")).await;

        assert_eq!(summary.translated_count, 4);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.skipped_count, 0);
        assert_eq!(summary.total_count, 5);
        let first = summary.first_error.unwrap();
        assert_eq!(
            first,
            classify(&LlmError::RateLimited("rate limit".into()), "m").to_string()
        );
        assert_eq!(blocks[2].translated_text.as_deref(), Some("FAIL three"));
        assert_eq!(blocks[4].translated_text.as_deref(), Some("FIVE"));
    }

    #[tokio::test]
    async fn existing_translations_skipped_unless_forced() {
        let (t, backend) = translator();
        let mut blocks = vec![block("alpha"), block("beta")];
        blocks[0].translated_text = Some("done already".into());

        let s = t.translate_layout(&mut blocks, &BatchOptions::new("zh")).await;
        assert_eq!((s.translated_count, s.skipped_count), (1, 1));
        assert_eq!(blocks[0].translated_text.as_deref(), Some("done already"));
        assert_eq!(*backend.calls.lock(), 1);

        let forced = BatchOptions {
            force_retranslate: true,
            ..BatchOptions::new("zh")
        };
        let s = t.translate_layout(&mut blocks, &forced).await;
        assert_eq!((s.translated_count, s.skipped_count), (2, 0));
        assert_eq!(blocks[0].translated_text.as_deref(), Some("ALPHA"));
    }

    #[tokio::test]
    async fn failure_keeps_existing_translation() {
        let (t, _) = translator();
        let mut blocks = vec![block("FAIL again")];
        blocks[0].translated_text = Some("older".into());
        let forced = BatchOptions {
            force_retranslate: true,
            ..BatchOptions::new("zh")
        };
        let s = t.translate_layout(&mut blocks, &forced).await;
        assert_eq!(s.failed_count, 1);
        assert_eq!(blocks[0].translated_text.as_deref(), Some("older"));
    }

    #[tokio::test]
    async fn blank_blocks_are_not_counted() {
        let (t, backend) = translator();
        let mut blocks = vec![block("  "), block("x")];
        let s = t.translate_layout(&mut blocks, &BatchOptions::new("zh")).await;
        assert_eq!(s.translated_count, 1);
        assert_eq!(s.skipped_count + s.failed_count, 0);
        assert_eq!(s.total_count, 2);
        assert_eq!(blocks[0].translated_text, None);
        assert_eq!(*backend.calls.lock(), 1);
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl TranslationProgressCallback for Events {
        fn on_batch_start(&self, total: usize) {
            self.0.lock().push(format!("start {total}"));
        }
        fn on_block_complete(&self, index: usize, _total: usize, _len: usize) {
            self.0.lock().push(format!("ok {index}"));
        }
        fn on_block_error(&self, index: usize, _total: usize, _error: &str) {
            self.0.lock().push(format!("err {index}"));
        }
        fn on_batch_complete(&self, _total: usize, translated: usize, failed: usize) {
            self.0.lock().push(format!("end {translated}/{failed}"));
        }
    }

    #[tokio::test]
    async fn emits_progress_events() {
        let (t, _) = translator();
        let events = Arc::new(Events::default());
        let opts = BatchOptions {
            progress_callback: Some(events.clone() as ProgressCallback),
            ..BatchOptions::new("zh")
        };
        let mut blocks = vec![block("a"), block("FAIL")];
        t.translate_layout(&mut blocks, &opts).await;
        assert_eq!(
            *events.0.lock(),
            vec!["start 2", "ok 0", "err 1", "end 1/1"]
        );
    }
}
