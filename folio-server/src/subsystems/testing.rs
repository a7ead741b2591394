//! In-process test doubles for the external-service traits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::embeddings::{EmbeddingBackend, EmbeddingError};
use folio_core::generation::{GenerationBackend, GenerationError};
use folio_core::github::{CodeHost, Commit, GithubError, Repository};
use folio_core::store::MemoryStore;
use folio_core::telegram::{
    Chat, ChatId, Messenger, OutgoingMessage, SentMessage, TelegramError, Update,
};
use folio_core::FolioConfig;

use crate::context::AppContext;

pub const DIMS: usize = 32;

/// Bag-of-words hashing embedder: texts sharing words get similar vectors.
#[derive(Default)]
pub struct WordHashEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl WordHashEmbedder {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let hash = word
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            let bucket = hash % DIMS;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingBackend for WordHashEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::RetryExhausted { attempts: 3 });
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::RetryExhausted { attempts: 3 });
        }
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn name(&self) -> &str {
        "word-hash"
    }
}

/// Generator that replays a fixed outcome and records every prompt.
pub struct ScriptedGenerator {
    pub reply: Result<Option<String>, u16>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(Some(text.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            reply: Ok(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(code: u16) -> Self {
        Self {
            reply: Err(code),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(code) => Err(GenerationError::Api {
                code: *code,
                message: "scripted failure".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
pub struct StaticCodeHost {
    pub repos: Mutex<Vec<Repository>>,
    pub commits: Vec<Commit>,
    pub fail_listing: bool,
    pub list_calls: AtomicUsize,
}

impl StaticCodeHost {
    /// Replace what the next listing returns.
    pub fn set_repos(&self, repos: Vec<Repository>) {
        *self.repos.lock().unwrap() = repos;
    }
}

#[async_trait]
impl CodeHost for StaticCodeHost {
    async fn list_repositories(&self, _owner: &str) -> Result<Vec<Repository>, GithubError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(GithubError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(self.repos.lock().unwrap().clone())
    }

    async fn default_branch(&self, _owner: &str, _repo: &str) -> Result<String, GithubError> {
        Ok("main".to_string())
    }

    async fn recent_commits(
        &self,
        _owner: &str,
        _repo: &str,
        _branch: &str,
        count: usize,
    ) -> Result<Vec<Commit>, GithubError> {
        Ok(self.commits.iter().take(count).cloned().collect())
    }
}

/// Messenger that records outgoing messages and deletions.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub deleted: Mutex<Vec<(ChatId, i64)>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(ChatId, i64)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn get_updates(
        &self,
        _offset: Option<i64>,
        _timeout_seconds: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        // Stand-in for a long poll that times out with nothing new.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(Vec::new())
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, TelegramError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(SentMessage {
            message_id: sent.len() as i64,
            chat: Chat {
                id: 0,
                kind: "private".to_string(),
                title: None,
                username: None,
            },
        })
    }

    async fn delete_message(&self, chat_id: &ChatId, message_id: i64) -> Result<(), TelegramError> {
        self.deleted.lock().unwrap().push((chat_id.clone(), message_id));
        Ok(())
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat, TelegramError> {
        Ok(Chat {
            id: match chat_id {
                ChatId::Id(id) => *id,
                ChatId::Username(_) => -100,
            },
            kind: "channel".to_string(),
            title: None,
            username: None,
        })
    }
}

/// Handles on the doubles behind a test [`AppContext`].
pub struct Harness {
    pub ctx: AppContext,
    pub store: Arc<MemoryStore>,
    pub embedder: Arc<WordHashEmbedder>,
    pub generator: Arc<ScriptedGenerator>,
    pub code_host: Arc<StaticCodeHost>,
    pub messenger: Arc<RecordingMessenger>,
}

pub fn harness(generator: ScriptedGenerator) -> Harness {
    harness_with(generator, StaticCodeHost::default(), WordHashEmbedder::default())
}

pub fn harness_with(
    generator: ScriptedGenerator,
    code_host: StaticCodeHost,
    embedder: WordHashEmbedder,
) -> Harness {
    let mut config = FolioConfig::default();
    config.database.backend = "memory".to_string();
    config.telegram.admin_user_id = 1000;
    config.telegram.discussion_chat_id = Some(-500);

    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(embedder);
    let generator = Arc::new(generator);
    let code_host = Arc::new(code_host);
    let messenger = Arc::new(RecordingMessenger::default());

    let ctx = AppContext::new(
        config,
        store.clone(),
        embedder.clone(),
        generator.clone(),
        code_host.clone(),
    )
    .with_messenger(messenger.clone());

    Harness {
        ctx,
        store,
        embedder,
        generator,
        code_host,
        messenger,
    }
}
