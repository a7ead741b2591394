//! Embeddings module for Folio: Gemini embedding client
//!
//! Provides an `EmbeddingBackend` trait used by the RAG index builder and
//! retriever, and a Gemini implementation that embeds documents in batches
//! (`batchEmbedContents`) and questions one at a time (`embedContent`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

/// Gemini caps `batchEmbedContents` at 100 requests per call.
pub const MAX_BATCH_SIZE: usize = 100;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed documents for indexing. The output has one vector per input, in
    /// input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a search query. Backends with task-type hints use the query
    /// variant here.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Returns the embedding dimension (e.g., 768).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Task type for embedding API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    RetrievalDocument,
    RetrievalQuery,
}

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Invalid response: expected {expected} embeddings, got {actual}")]
    BatchSizeMismatch { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

impl EmbeddingError {
    /// Transport failures, rate limits and server errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Http(_) => true,
            EmbeddingError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Config types
// ============================================================================

/// Gemini embedding client configuration
#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl EmbeddingClientConfig {
    /// Build from the `[embedding]` section; the key falls back to `GEMINI_API_KEY`.
    pub fn from_config(config: &crate::config::EmbeddingConfig, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions as usize,
            batch_size: (config.batch_size as usize).clamp(1, MAX_BATCH_SIZE),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    model: String,
    content: GeminiContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiRequest>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    embedding: Option<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorResponse {
    pub(crate) error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorDetail {
    pub(crate) code: u16,
    pub(crate) message: String,
}

/// Pull `(code, message)` out of a Gemini error body, falling back to the
/// HTTP status and raw body.
pub(crate) fn parse_gemini_error(status: reqwest::StatusCode, body: String) -> (u16, String) {
    serde_json::from_str::<GeminiErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| (e.code, e.message))
        .unwrap_or((status.as_u16(), body))
}

// ============================================================================
// GeminiEmbeddingClient
// ============================================================================

/// Gemini embedding client: calls the Gemini Embeddings API.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingClient {
    client: Client,
    config: EmbeddingClientConfig,
    base_url: String,
}

impl GeminiEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(
            config,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: EmbeddingClientConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, EmbeddingError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, EmbeddingError>>,
    {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        match RetryIf::spawn(retry_strategy, op, EmbeddingError::is_retryable).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All embedding retry attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn request_for(&self, text: &str, task_type: TaskType) -> GeminiRequest {
        GeminiRequest {
            model: format!("models/{}", self.config.model),
            content: GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            },
            task_type: Some(task_type),
            output_dimensionality: Some(self.config.dimensions),
        }
    }

    fn check_dimensions(&self, values: &[f32]) -> Result<(), EmbeddingError> {
        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }
        Ok(())
    }

    async fn post_json<B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<reqwest::Response, EmbeddingError> {
        let url = format!(
            "{}/models/{}:{}?key={}",
            self.base_url, self.config.model, method, self.config.api_key
        );

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let (code, message) = parse_gemini_error(status, error_body);
            tracing::error!(code = code, message = %message, "Gemini embedding API error");
            return Err(EmbeddingError::Api { code, message });
        }

        Ok(response)
    }

    async fn embed_once(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let request = self.request_for(text, task_type);
        let response = self.post_json("embedContent", &request).await?;
        let gemini_response: GeminiResponse = response.json().await?;

        let values = gemini_response
            .embedding
            .ok_or(EmbeddingError::MissingEmbedding)?
            .values;
        self.check_dimensions(&values)?;
        Ok(values)
    }

    async fn embed_batch_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = GeminiBatchRequest {
            requests: texts
                .iter()
                .map(|t| self.request_for(t, TaskType::RetrievalDocument))
                .collect(),
        };
        let response = self.post_json("batchEmbedContents", &request).await?;
        let batch: GeminiBatchResponse = response.json().await?;

        if batch.embeddings.len() != texts.len() {
            return Err(EmbeddingError::BatchSizeMismatch {
                expected: texts.len(),
                actual: batch.embeddings.len(),
            });
        }

        let vectors: Vec<Vec<f32>> = batch.embeddings.into_iter().map(|e| e.values).collect();
        for v in &vectors {
            self.check_dimensions(v)?;
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbeddingClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            let batch = self.with_retry(|| self.embed_batch_once(chunk)).await?;
            vectors.extend(batch);
        }
        tracing::debug!(documents = texts.len(), "Embedded document batch");
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.with_retry(|| self.embed_once(text, TaskType::RetrievalQuery))
            .await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DIMS: usize = 8;

    fn test_config(api_key: &str) -> EmbeddingClientConfig {
        EmbeddingClientConfig {
            api_key: api_key.to_string(),
            model: "text-embedding-004".to_string(),
            dimensions: DIMS,
            batch_size: 2,
            max_retries: 3,
            retry_delay_ms: 10,
        }
    }

    fn vector(seed: f32) -> Vec<f32> {
        (0..DIMS).map(|i| seed + i as f32 / DIMS as f32).collect()
    }

    fn mock_embedding_response() -> serde_json::Value {
        serde_json::json!({ "embedding": { "values": vector(0.0) } })
    }

    fn mock_batch_response(n: usize) -> serde_json::Value {
        let embeddings: Vec<serde_json::Value> = (0..n)
            .map(|i| serde_json::json!({ "values": vector(i as f32) }))
            .collect();
        serde_json::json!({ "embeddings": embeddings })
    }

    #[tokio::test]
    async fn test_embed_query_sends_retrieval_query_task() {
        let mock_server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
                .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:embedContent"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "model": "models/text-embedding-004",
                "content": { "parts": [{ "text": "What is Foo?" }] },
                "taskType": "RETRIEVAL_QUERY",
                "outputDimensionality": DIMS
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let embedding = client.embed_query("What is Foo?").await.unwrap();
        assert_eq!(embedding.len(), DIMS);
    }

    #[tokio::test]
    async fn test_embed_documents_splits_into_batches() {
        let mock_server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
                .unwrap();

        // batch_size = 2, so three documents become a batch of 2 and a batch of 1.
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_batch_response(2)))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_batch_response(1)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let docs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = client.embed_documents(&docs).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == DIMS));
    }

    #[tokio::test]
    async fn test_batch_with_missing_vectors_is_an_error() {
        let mock_server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_batch_response(1)))
            .mount(&mock_server)
            .await;

        let docs = vec!["a".to_string(), "b".to_string()];
        match client.embed_documents(&docs).await {
            Err(EmbeddingError::BatchSizeMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("Expected BatchSizeMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_returns_retry_exhausted_on_api_500() {
        let mock_server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        match client.embed_query("hello").await {
            Err(EmbeddingError::RetryExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let embedding = client.embed_query("hello").await.unwrap();
        assert_eq!(embedding.len(), DIMS);
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let mock_server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": 400, "message": "bad model" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.embed_query("hello").await {
            Err(EmbeddingError::Api { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "bad model");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_fails_with_missing_api_key() {
        match GeminiEmbeddingClient::new(test_config("")) {
            Err(EmbeddingError::MissingApiKey) => {}
            other => panic!("Expected MissingApiKey error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_embed_returns_error_on_wrong_dimensions() {
        let mock_server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": { "values": [0.1, 0.2, 0.3] }
            })))
            .mount(&mock_server)
            .await;

        match client.embed_query("hello").await {
            Err(EmbeddingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, DIMS);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected InvalidDimensions, got {:?}", other),
        }
    }
}
