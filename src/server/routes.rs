// HTTP routes configuration
// Author: kelexine (https://github.com/kelexine)

use super::handlers::{
    clear_cache_handler, explain_handler, health_handler, metrics_handler, stats_handler,
};
use super::middleware::{cors_layer, request_id_layers};
use crate::config::AppConfig;
use crate::error::Result;
use crate::explainer::Explainer;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Selections are capped at a few thousand characters; leave room for JSON.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub explainer: Arc<Explainer>,
}

pub fn create_router(config: AppConfig, explainer: Arc<Explainer>) -> Result<Router> {
    let cors = cors_layer(&config.server.allowed_origins)?;
    let state = AppState { config, explainer };

    let (set_request_id, propagate_request_id) = request_id_layers();

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/explain", post(explain_handler))
        .route("/v1/cache/stats", get(stats_handler))
        .route("/v1/cache", delete(clear_cache_handler))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id)
        .layer(set_request_id)
        .with_state(state);

    Ok(app)
}
