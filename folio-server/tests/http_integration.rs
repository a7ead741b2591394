//! HTTP integration tests: full axum dispatch via `oneshot`, real clients
//! against wiremock, in-memory store.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{generated, mount_embeddings, services, GENERATE_PATH};
use folio_server::http::{build_router, HttpState};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn app(ctx: folio_server::AppContext) -> axum::Router {
    build_router(Arc::new(HttpState { ctx: Arc::new(ctx) }))
}

fn json_request(http_method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(http_method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(http_method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(http_method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_and_version() {
    let t = services().await;
    let app = app(t.ctx);

    let resp = app.clone().oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");

    let resp = app.oneshot(empty_request("GET", "/version")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["version"].is_string());
}

#[tokio::test]
async fn test_rag_ask_round_trip() {
    let t = services().await;
    mount_embeddings(&t.server).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(generated("Foo is a parser."))
        .mount(&t.server)
        .await;
    let app = app(t.ctx);

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/projects",
            json!({ "user_id": 1, "title": "Foo", "project_url": "https://github.com/ada/foo" }),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let resp = app
        .oneshot(json_request("POST", "/rag/ask", json!({ "question": "What is Foo?" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["answer"], "Foo is a parser.");
    assert_eq!(body["kind"], "generated");
}

#[tokio::test]
async fn test_rag_ask_empty_question_is_400() {
    let t = services().await;
    let app = app(t.ctx);

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/rag/ask", json!({ "question": "" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["status"], "error");

    let resp = app
        .oneshot(json_request("POST", "/rag/ask", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Nothing reached the model services.
    assert!(t.server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_rag_ask_generation_failure_is_500() {
    let t = services().await;
    mount_embeddings(&t.server).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&t.server)
        .await;
    let app = app(t.ctx);

    let resp = app
        .oneshot(json_request("POST", "/rag/ask", json!({ "question": "Anything?" })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_project_crud_over_http() {
    let t = services().await;
    let app = app(t.ctx);

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/projects",
            json!({ "user_id": 7, "title": "Foo", "description": "A parser" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["id"].as_i64().unwrap();

    let resp = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/projects/{}", id),
            json!({ "title": "Foo 2" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Foo 2");
    assert_eq!(body["description"], "A parser");

    let resp = app
        .clone()
        .oneshot(empty_request("GET", "/api/users/7/projects"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/api/projects/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(empty_request("GET", &format!("/api/projects/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(empty_request("DELETE", &format!("/api/projects/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_with_blank_title_is_400() {
    let t = services().await;
    let app = app(t.ctx);

    let resp = app
        .oneshot(json_request("PUT", "/api/projects/999", json!({ "title": " " })))
        .await
        .unwrap();

    // Validation runs before the store lookup, so this is 400 rather than 404.
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_with_taken_project_url_is_400() {
    let t = services().await;
    let app = app(t.ctx);
    let project = json!({
        "user_id": 7,
        "title": "Foo",
        "project_url": "https://github.com/o/foo",
    });

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/projects", project.clone()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/projects", project))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    let resp = app
        .oneshot(empty_request("GET", "/api/projects"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_to_another_projects_url_is_400() {
    let t = services().await;
    let app = app(t.ctx);

    let mut ids = Vec::new();
    for name in ["foo", "bar"] {
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/projects",
                json!({
                    "user_id": 7,
                    "title": name,
                    "project_url": format!("https://github.com/o/{}", name),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        ids.push(body_json(resp).await["id"].as_i64().unwrap());
    }

    let resp = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/projects/{}", ids[1]),
            json!({ "project_url": "https://github.com/o/foo" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(empty_request("GET", &format!("/api/projects/{}", ids[1])))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["project_url"], "https://github.com/o/bar");
}
