pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod github;
pub mod models;
pub mod store;
pub mod telegram;

pub use config::FolioConfig;
pub use embeddings::{
    EmbeddingBackend, EmbeddingClientConfig, EmbeddingError, GeminiEmbeddingClient,
};
pub use error::{FolioError, FolioResult};
pub use generation::{
    GeminiGenerationClient, GenerationBackend, GenerationClientConfig, GenerationError,
};
pub use github::{CodeHost, Commit, GithubClient, GithubClientConfig, GithubError, Repository};
pub use store::{MemoryStore, PgStore, RecordStore};
pub use telegram::{Messenger, TelegramClient, TelegramClientConfig, TelegramError};
