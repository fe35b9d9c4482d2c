//! Shared application state.

use crate::config::ServiceConfig;
use crate::error::PdfLayoutError;
use crate::remote::ParserClient;
use crate::translate::Translator;
use std::sync::Arc;

/// State handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServiceConfig,
    parser: ParserClient,
    translator: Translator,
}

impl AppState {
    /// Build the state with the default translator (in-memory cache,
    /// OpenAI-compatible backend).
    pub fn new(config: ServiceConfig) -> Result<Self, PdfLayoutError> {
        let translator = Translator::from_config(&config);
        Self::with_translator(config, translator)
    }

    /// Build the state around an existing translator.
    pub fn with_translator(
        config: ServiceConfig,
        translator: Translator,
    ) -> Result<Self, PdfLayoutError> {
        let parser = ParserClient::new(config.parser.clone())?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                parser,
                translator,
            }),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn parser(&self) -> &ParserClient {
        &self.inner.parser
    }

    pub fn translator(&self) -> &Translator {
        &self.inner.translator
    }
}
