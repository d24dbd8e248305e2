// HTTP surface tests using tower's oneshot
// Author: kelexine (https://github.com/kelexine)

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use explanium::cache::{CacheConfig, ExplanationCache};
use explanium::config::AppConfig;
use explanium::error::Result;
use explanium::explainer::{ExplanationProvider, Explainer};
use explanium::server::create_router;
use explanium::storage::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct EchoProvider;

#[async_trait]
impl ExplanationProvider for EchoProvider {
    fn is_configured(&self) -> bool {
        true
    }

    fn model(&self) -> &str {
        "echo"
    }

    async fn call_provider(&self, _prompt: &str) -> Result<String> {
        Ok("An explanation.".to_string())
    }
}

fn app() -> Router {
    let config = AppConfig::default();
    let cache = Arc::new(ExplanationCache::new(
        CacheConfig::from(&config.cache),
        Arc::new(MemoryStore::new()),
    ));
    let explainer = Arc::new(Explainer::new(cache, Arc::new(EchoProvider), &config.explain));
    create_router(config, explainer).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn explain_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/explain")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_explain_then_cached() {
    let app = app();

    let (status, first) = send(&app, explain_request(json!({"text": "nebula"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["fromCache"], false);

    let (_, second) = send(&app, explain_request(json!({"text": "  Nebula ", "timeoutMs": 5000}))).await;
    assert_eq!(second["fromCache"], true);
    assert_eq!(second["explanation"], "An explanation.");
    assert_eq!(second["model"], "echo");

    let stats_request = Request::builder()
        .uri("/v1/cache/stats")
        .body(Body::empty())
        .unwrap();
    let (status, stats) = send(&app, stats_request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["apiCalls"], 1);
    assert_eq!(stats["cacheSize"], 1);
    assert_eq!(stats["hitRate"], "50.0%");
}

#[tokio::test]
async fn test_invalid_body_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/explain")
        .body(Body::from("{\"txt\": 1}"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_empty_selection_reports_failure() {
    let app = app();
    let (status, body) = send(&app, explain_request(json!({"text": "   "}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("select"));
}

#[tokio::test]
async fn test_clear_cache_route() {
    let app = app();
    send(&app, explain_request(json!({"text": "quasar"}))).await;

    let clear = || {
        Request::builder()
            .method("DELETE")
            .uri("/v1/cache")
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, clear()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "clearedEntries": 1}));

    let (_, body) = send(&app, clear()).await;
    assert_eq!(body["clearedEntries"], 0);
}

#[tokio::test]
async fn test_health_reports_provider_and_cache() {
    let app = app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["provider_credentials"]["status"], "ok");
    assert!(body["checks"]["cache"]["message"]
        .as_str()
        .unwrap()
        .contains("hit rate 0%"));
}
