// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_with_registry,
    register_histogram_vec_with_registry, CounterVec, Encoder, Gauge, HistogramVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // EXPLAIN METRICS
    // ============================================================================

    /// Explanation requests by outcome
    pub static ref EXPLAIN_REQUESTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("explain_requests_total", "Total explanation requests"),
        &["outcome"], // outcome: cache_hit, provider, rejected, failed, timeout
        REGISTRY
    ).unwrap();

    // ============================================================================
    // PROVIDER METRICS
    // ============================================================================

    /// Hosted model calls by result class
    pub static ref PROVIDER_CALLS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("provider_calls_total", "Total hosted model API calls"),
        &["model", "status"],
        REGISTRY
    ).unwrap();

    /// Hosted model call latency
    pub static ref PROVIDER_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("provider_call_duration_seconds", "Hosted model call duration")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["model"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total explanation cache operations"),
        &["operation"], // operation: hit, miss, store, expired, evicted, store_error
        REGISTRY
    ).unwrap();

    /// Live cache entries as tracked by the statistics
    pub static ref CACHE_ENTRIES: Gauge = register_gauge_with_registry!(
        Opts::new("cache_entries_current", "Current number of explanation cache entries"),
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        EXPLAIN_REQUESTS.with_label_values(&["cache_hit"]).inc();
        CACHE_OPERATIONS.with_label_values(&["hit"]).inc();
        PROVIDER_CALLS.with_label_values(&["gemma-3-27b-it", "200"]).inc();
        CACHE_ENTRIES.set(1.0);

        let metrics = gather_metrics();
        assert!(metrics.contains("explain_requests_total"));
        assert!(metrics.contains("provider_calls_total"));
        assert!(metrics.contains("cache_operations_total"));
        assert!(metrics.contains("cache_entries_current"));
    }
}
