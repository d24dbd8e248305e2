//! Axum-based HTTP surface for the explanium service.
//!
//! The browser extension's background worker talks to these routes instead of
//! calling the model provider directly, so every client shares one cache.
//!
//! # Components
//!
//! - `handlers`: explain, cache statistics, cache clearing, health, metrics.
//! - `middleware`: request ID tracking and CORS for extension origins.
//! - `routes`: the router that ties everything together.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod handlers;
mod middleware;
mod routes;

pub use handlers::{ExplainRequest, HealthResponse, HealthStatus};
pub use routes::{create_router, AppState};
