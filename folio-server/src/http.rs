//! Folio HTTP REST API
//!
//! Axum-based HTTP server exposing the RAG endpoint and project CRUD.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /health - health check with store status
//! - GET    /version - server version info
//! - POST   /rag/ask - answer a question about the portfolio
//! - POST   /api/projects - create a project
//! - GET    /api/projects - list projects
//! - GET    /api/projects/:id - fetch one project
//! - PUT    /api/projects/:id - partial update
//! - DELETE /api/projects/:id - delete (204)
//! - GET    /api/users/:user_id/projects - projects of one user

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use folio_core::error::FolioError;
use folio_core::models::{NewProject, ProjectUpdate};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::context::AppContext;
use crate::subsystems::answer::AnswerKind;
use crate::subsystems::interaction::Sender;
use crate::subsystems::rag::{self, RagError};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub ctx: Arc<AppContext>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/rag/ask", post(ask_handler))
        .route(
            "/api/projects",
            post(create_project_handler).get(list_projects_handler),
        )
        .route(
            "/api/projects/:id",
            get(get_project_handler)
                .put(update_project_handler)
                .delete(delete_project_handler),
        )
        .route("/api/users/:user_id/projects", get(user_projects_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    ctx: Arc<AppContext>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.http.host, ctx.config.http.port);
    let state = Arc::new(HttpState { ctx });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Folio HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn json(msg: impl Into<String>) -> serde_json::Value {
        serde_json::to_value(Self::new(msg)).unwrap_or(serde_json::Value::Null)
    }
}

fn error_reply(e: &FolioError) -> (StatusCode, serde_json::Value) {
    let status = match e {
        FolioError::NotFound { .. } => StatusCode::NOT_FOUND,
        FolioError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!(error = %e, "Store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, ErrorResponse::json(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check: asks the store and returns (status_code, json_body).
pub async fn health_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    match ctx.store.health().await {
        Ok(store) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store,
                "embedding": ctx.embedder.name(),
                "generation": ctx.generator.name(),
                "telegram": ctx.messenger.is_some(),
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "folio",
    })
}

/// Inner ask: validates the question and runs the RAG pipeline.
///
/// The generation-error fallback is reported as 500 so API clients can tell
/// it apart from a real answer.
pub async fn ask_inner(ctx: &AppContext, req: AskRequest) -> (StatusCode, serde_json::Value) {
    let question = match req.question {
        Some(q) if !q.trim().is_empty() => q,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                ErrorResponse::json("question field is required"),
            );
        }
    };

    match rag::ask(ctx, &question, &Sender::http()).await {
        Ok(result) if result.answer.kind == AnswerKind::ErrorFallback => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::json(result.answer.text),
        ),
        Ok(result) => (
            StatusCode::OK,
            serde_json::json!({
                "answer": result.answer.text,
                "kind": result.answer.kind,
            }),
        ),
        Err(RagError::EmptyQuestion) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::json("question field is required"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "RAG pipeline failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::json(rag::UNAVAILABLE_MESSAGE),
            )
        }
    }
}

pub async fn create_project_inner(
    ctx: &AppContext,
    project: NewProject,
) -> (StatusCode, serde_json::Value) {
    if let Err(e) = project.validate() {
        return error_reply(&e);
    }
    match ctx.store.create_project(&project).await {
        Ok(created) => (StatusCode::CREATED, to_json(&created)),
        Err(e) => error_reply(&e),
    }
}

pub async fn list_projects_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    match ctx.store.list_projects().await {
        Ok(projects) => (StatusCode::OK, to_json(&projects)),
        Err(e) => error_reply(&e),
    }
}

pub async fn get_project_inner(ctx: &AppContext, id: i64) -> (StatusCode, serde_json::Value) {
    match ctx.store.get_project(id).await {
        Ok(project) => (StatusCode::OK, to_json(&project)),
        Err(e) => error_reply(&e),
    }
}

pub async fn user_projects_inner(
    ctx: &AppContext,
    user_id: i64,
) -> (StatusCode, serde_json::Value) {
    match ctx.store.list_projects_by_user(user_id).await {
        Ok(projects) => (StatusCode::OK, to_json(&projects)),
        Err(e) => error_reply(&e),
    }
}

pub async fn update_project_inner(
    ctx: &AppContext,
    id: i64,
    update: ProjectUpdate,
) -> (StatusCode, serde_json::Value) {
    if let Err(e) = update.validate() {
        return error_reply(&e);
    }
    match ctx.store.update_project(id, &update).await {
        Ok(project) => (StatusCode::OK, to_json(&project)),
        Err(e) => error_reply(&e),
    }
}

pub async fn delete_project_inner(ctx: &AppContext, id: i64) -> (StatusCode, serde_json::Value) {
    match ctx.store.delete_project(id).await {
        Ok(()) => (StatusCode::NO_CONTENT, serde_json::Value::Null),
        Err(e) => error_reply(&e),
    }
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn ask_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    let (status, body) = ask_inner(&state.ctx, req).await;
    (status, Json(body))
}

pub async fn create_project_handler(
    State(state): State<Arc<HttpState>>,
    Json(project): Json<NewProject>,
) -> impl IntoResponse {
    let (status, body) = create_project_inner(&state.ctx, project).await;
    (status, Json(body))
}

pub async fn list_projects_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_projects_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn get_project_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = get_project_inner(&state.ctx, id).await;
    (status, Json(body))
}

pub async fn user_projects_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    let (status, body) = user_projects_inner(&state.ctx, user_id).await;
    (status, Json(body))
}

pub async fn update_project_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
    Json(update): Json<ProjectUpdate>,
) -> impl IntoResponse {
    let (status, body) = update_project_inner(&state.ctx, id, update).await;
    (status, Json(body))
}

pub async fn delete_project_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i64>,
) -> Response {
    let (status, body) = delete_project_inner(&state.ctx, id).await;
    if status == StatusCode::NO_CONTENT {
        status.into_response()
    } else {
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::rag::UNAVAILABLE_MESSAGE;
    use crate::subsystems::testing::{
        harness, harness_with, ScriptedGenerator, StaticCodeHost, WordHashEmbedder,
    };
    use folio_core::store::RecordStore;

    fn new_project(title: &str) -> NewProject {
        NewProject {
            user_id: 1,
            title: title.to_string(),
            description: None,
            image_url: None,
            project_url: Some(format!("http://x/{}", title.to_lowercase())),
            date_completed: None,
        }
    }

    fn question(text: &str) -> AskRequest {
        AskRequest {
            question: Some(text.to_string()),
        }
    }

    #[test]
    fn test_version_inner() {
        let body = version_inner();
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["service"], "folio");
    }

    #[tokio::test]
    async fn test_health_inner_reports_store() {
        let h = harness(ScriptedGenerator::replying("unused"));
        let (status, body) = health_inner(&h.ctx).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"], "memory");
        assert_eq!(body["telegram"], true);
    }

    #[tokio::test]
    async fn test_ask_inner_rejects_missing_and_blank_question() {
        let h = harness(ScriptedGenerator::replying("unused"));

        let (status, body) = ask_inner(&h.ctx, AskRequest { question: None }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = ask_inner(&h.ctx, question("  ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_ask_inner_returns_answer() {
        let h = harness(ScriptedGenerator::replying("Foo is a parser."));

        let (status, body) = ask_inner(&h.ctx, question("What is Foo?")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Foo is a parser.");
        assert_eq!(body["kind"], "generated");
    }

    #[tokio::test]
    async fn test_ask_inner_maps_generation_error_to_500() {
        let h = harness(ScriptedGenerator::failing(500));

        let (status, body) = ask_inner(&h.ctx, question("What is Foo?")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_ask_inner_maps_pipeline_failure_to_500() {
        let h = harness_with(
            ScriptedGenerator::replying("unused"),
            StaticCodeHost::default(),
            WordHashEmbedder::failing(),
        );
        h.ctx.store.create_project(&new_project("Foo")).await.unwrap();

        let (status, body) = ask_inner(&h.ctx, question("What is Foo?")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_project_crud_inner() {
        let h = harness(ScriptedGenerator::replying("unused"));

        let (status, created) = create_project_inner(&h.ctx, new_project("Foo")).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, fetched) = get_project_inner(&h.ctx, id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Foo");

        let update = ProjectUpdate {
            description: Some("A parser".to_string()),
            ..Default::default()
        };
        let (status, updated) = update_project_inner(&h.ctx, id, update).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["description"], "A parser");
        assert_eq!(updated["title"], "Foo");

        let (status, list) = user_projects_inner(&h.ctx, 1).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, _) = delete_project_inner(&h.ctx, id).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = get_project_inner(&h.ctx, id).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_create_project_inner_validates_before_store() {
        let h = harness(ScriptedGenerator::replying("unused"));

        let (status, _) = create_project_inner(&h.ctx, new_project("   ")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.store.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_project_inner_rejects_taken_url() {
        let h = harness(ScriptedGenerator::replying("unused"));
        create_project_inner(&h.ctx, new_project("Foo")).await;
        let (_, bar) = create_project_inner(&h.ctx, new_project("Bar")).await;
        let bar_id = bar["id"].as_i64().unwrap();

        let update = ProjectUpdate {
            project_url: Some("http://x/foo".to_string()),
            ..Default::default()
        };
        let (status, body) = update_project_inner(&h.ctx, bar_id, update).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        let (_, bar) = get_project_inner(&h.ctx, bar_id).await;
        assert_eq!(bar["project_url"], "http://x/bar");
    }
}
