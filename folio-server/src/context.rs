//! Application context shared by the HTTP API, the bot loop and the scheduler.

use std::sync::Arc;

use anyhow::{Context, Result};
use folio_core::embeddings::{EmbeddingBackend, EmbeddingClientConfig, GeminiEmbeddingClient};
use folio_core::generation::{
    GeminiGenerationClient, GenerationBackend, GenerationClientConfig,
};
use folio_core::github::{CodeHost, GithubClient, GithubClientConfig};
use folio_core::store::RecordStore;
use folio_core::telegram::{Messenger, TelegramClient, TelegramClientConfig};
use folio_core::FolioConfig;

/// Everything a request handler or background task needs, constructed once
/// at start-up and shared behind an `Arc`.
#[derive(Clone)]
pub struct AppContext {
    pub config: FolioConfig,
    pub store: Arc<dyn RecordStore>,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub generator: Arc<dyn GenerationBackend>,
    pub code_host: Arc<dyn CodeHost>,
    /// `None` when Telegram is disabled; scheduled posts are then skipped.
    pub messenger: Option<Arc<dyn Messenger>>,
}

impl AppContext {
    pub fn new(
        config: FolioConfig,
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        generator: Arc<dyn GenerationBackend>,
        code_host: Arc<dyn CodeHost>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            generator,
            code_host,
            messenger: None,
        }
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Build the production clients from config and environment secrets.
    ///
    /// Fails if `GEMINI_API_KEY` is missing, or if Telegram is enabled and
    /// `TELEGRAM_BOT_TOKEN` is missing.
    pub fn from_config(config: FolioConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let embedder = GeminiEmbeddingClient::new(EmbeddingClientConfig::from_config(
            &config.embedding,
            None,
        ))
        .context("failed to create Gemini embedding client")?;

        let generator = GeminiGenerationClient::new(GenerationClientConfig::from_config(
            &config.generation,
            None,
        ))
        .context("failed to create Gemini generation client")?;

        let code_host = GithubClient::new(GithubClientConfig::from_config(&config.github))
            .context("failed to create GitHub client")?;

        let telegram = if config.telegram.enabled {
            let client = TelegramClient::new(TelegramClientConfig::from_config(&config.telegram))
                .context("failed to create Telegram client")?;
            Some(Arc::new(client) as Arc<dyn Messenger>)
        } else {
            None
        };

        let ctx = Self::new(
            config,
            store,
            Arc::new(embedder),
            Arc::new(generator),
            Arc::new(code_host),
        );

        Ok(match telegram {
            Some(messenger) => ctx.with_messenger(messenger),
            None => ctx,
        })
    }
}
