//! Shared wiring for integration tests: the real HTTP clients pointed at one
//! wiremock server, over an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use folio_core::embeddings::{EmbeddingClientConfig, GeminiEmbeddingClient};
use folio_core::generation::{GeminiGenerationClient, GenerationClientConfig};
use folio_core::github::{GithubClient, GithubClientConfig};
use folio_core::store::MemoryStore;
use folio_core::telegram::{TelegramClient, TelegramClientConfig};
use folio_core::FolioConfig;
use folio_server::AppContext;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const DIMS: usize = 4;
pub const EMBED_BATCH_PATH: &str = "/models/text-embedding-004:batchEmbedContents";
pub const EMBED_QUERY_PATH: &str = "/models/text-embedding-004:embedContent";
pub const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";
pub const SEND_MESSAGE_PATH: &str = "/botTOKEN/sendMessage";
pub const ADMIN_ID: i64 = 1000;

pub struct TestServices {
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
    pub ctx: AppContext,
}

pub fn test_config(server: &MockServer) -> FolioConfig {
    let mut config = FolioConfig::default();
    config.database.backend = "memory".to_string();
    config.embedding.dimensions = DIMS as u32;
    config.rag.owner_name = "Ada".to_string();
    config.github.api_url = server.uri();
    config.github.owner = "ada".to_string();
    config.github.max_retries = 2;
    config.github.retry_delay_ms = 10;
    config.telegram.api_url = server.uri();
    config.telegram.admin_user_id = ADMIN_ID;
    config.telegram.discussion_chat_id = Some(-500);
    config
}

/// Build an [`AppContext`] whose every external service is the mock server.
pub async fn services() -> TestServices {
    let server = MockServer::start().await;
    let config = test_config(&server);

    let embedder = GeminiEmbeddingClient::with_base_url(
        EmbeddingClientConfig {
            api_key: "test-key".to_string(),
            model: config.embedding.model.clone(),
            dimensions: DIMS,
            batch_size: 100,
            max_retries: 2,
            retry_delay_ms: 10,
        },
        server.uri(),
    )
    .unwrap();

    let generator = GeminiGenerationClient::with_base_url(
        GenerationClientConfig {
            api_key: "test-key".to_string(),
            model: config.generation.model.clone(),
            max_output_tokens: 256,
            temperature: 0.5,
            max_retries: 2,
            retry_delay_ms: 10,
        },
        server.uri(),
    )
    .unwrap();

    let github = GithubClient::new(GithubClientConfig {
        api_url: server.uri(),
        token: None,
        max_retries: 2,
        retry_delay_ms: 10,
    })
    .unwrap();

    let telegram = TelegramClient::new(TelegramClientConfig {
        api_url: server.uri(),
        token: "TOKEN".to_string(),
        poll_timeout_seconds: 1,
        max_retries: 2,
        retry_delay_ms: 10,
    })
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    let ctx = AppContext::new(
        config,
        store.clone(),
        Arc::new(embedder),
        Arc::new(generator),
        Arc::new(github),
    )
    .with_messenger(Arc::new(telegram));

    TestServices { server, store, ctx }
}

/// Answers `batchEmbedContents` with one unit vector per request entry.
pub struct BatchEmbeddings;

impl Respond for BatchEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let count = body["requests"].as_array().map(|r| r.len()).unwrap_or(0);
        let embeddings: Vec<serde_json::Value> = (0..count)
            .map(|_| serde_json::json!({ "values": unit_vector() }))
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embeddings": embeddings }))
    }
}

pub fn unit_vector() -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    v[0] = 1.0;
    v
}

pub async fn mount_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(EMBED_BATCH_PATH))
        .respond_with(BatchEmbeddings)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMBED_QUERY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "embedding": { "values": unit_vector() } })),
        )
        .mount(server)
        .await;
}

pub fn generated(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

/// Telegram `sendMessage` success envelope echoing a private chat.
pub fn sent_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "ok": true,
        "result": { "message_id": 77, "chat": { "id": 42, "type": "private" } }
    }))
}

pub async fn requests_to(server: &MockServer, request_path: &str) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or_default())
        .collect()
}
