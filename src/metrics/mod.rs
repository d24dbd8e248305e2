// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics, CACHE_ENTRIES, CACHE_OPERATIONS, EXPLAIN_REQUESTS, PROVIDER_CALLS,
    PROVIDER_DURATION,
};

/// Helper to record the outcome of an explanation request
pub fn record_explain(outcome: &str) {
    EXPLAIN_REQUESTS.with_label_values(&[outcome]).inc();
}

/// Helper to record hosted model call metrics
pub fn record_provider_call(model: &str, status: &str, duration_secs: f64) {
    PROVIDER_CALLS.with_label_values(&[model, status]).inc();
    PROVIDER_DURATION
        .with_label_values(&[model])
        .observe(duration_secs);
}

/// Helpers to record explanation cache operations
pub fn record_cache_hit() {
    CACHE_OPERATIONS.with_label_values(&["hit"]).inc();
}

pub fn record_cache_miss() {
    CACHE_OPERATIONS.with_label_values(&["miss"]).inc();
}

pub fn record_cache_store() {
    CACHE_OPERATIONS.with_label_values(&["store"]).inc();
}

pub fn record_cache_expired(count: usize) {
    CACHE_OPERATIONS
        .with_label_values(&["expired"])
        .inc_by(count as f64);
}

pub fn record_cache_evicted(count: usize) {
    CACHE_OPERATIONS
        .with_label_values(&["evicted"])
        .inc_by(count as f64);
}

pub fn record_cache_store_error() {
    CACHE_OPERATIONS.with_label_values(&["store_error"]).inc();
}

pub fn update_cache_entries(count: u64) {
    CACHE_ENTRIES.set(count as f64);
}
