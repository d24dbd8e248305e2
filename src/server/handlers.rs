// HTTP request handlers
// Author: kelexine (https://github.com/kelexine)

use super::routes::AppState;
use crate::cache::StatisticsReport;
use crate::error::ExplainError;
use crate::explainer::{ClearCacheResponse, ExplainResponse};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, HealthCheck>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: String,
}

/// Body of `POST /v1/explain`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub text: String,
    /// Per-request deadline; falls back to the configured timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    let mut overall_status = HealthStatus::Healthy;

    let provider_check = if state.explainer.is_provider_configured() {
        HealthCheck {
            status: "ok".to_string(),
            message: format!("Model: {}", state.config.gemma.model),
        }
    } else {
        overall_status = HealthStatus::Degraded;
        HealthCheck {
            status: "warning".to_string(),
            message: "No API key configured; explanations fail until one is set".to_string(),
        }
    };
    checks.insert("provider_credentials".to_string(), provider_check);

    let stats = state.explainer.get_statistics().await;
    checks.insert(
        "cache".to_string(),
        HealthCheck {
            status: "ok".to_string(),
            message: format!(
                "{} / {} entries, hit rate {}",
                stats.stats.cache_size, state.config.cache.max_entries, stats.hit_rate
            ),
        },
    );

    Json(HealthResponse {
        status: overall_status,
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Handler for `POST /v1/explain`.
///
/// Always answers 200 with `{ success, ... }` once the body parsed; the
/// extension renders `error` itself.
pub async fn explain_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ExplainResponse>, ExplainError> {
    let req: ExplainRequest = serde_json::from_str(&body)
        .map_err(|e| ExplainError::InvalidRequest(format!("JSON deserialization error: {}", e)))?;

    debug!(
        "Received explain request: {} chars, timeout {:?}",
        req.text.len(),
        req.timeout_ms
    );

    let response = match req.timeout_ms {
        Some(ms) => {
            state
                .explainer
                .explain_with_deadline(&req.text, Duration::from_millis(ms))
                .await
        }
        None => state.explainer.explain(&req.text).await,
    };

    Ok(Json(response))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatisticsReport> {
    Json(state.explainer.get_statistics().await)
}

pub async fn clear_cache_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<ClearCacheResponse>) {
    let response = state.explainer.clear_cache().await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_metrics(),
    )
}
