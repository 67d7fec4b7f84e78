//! Observability utilities for the cost comparison service.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Cost engine metrics (comparisons, snapshot ingestion, catalog cache)
//! - Axum middleware for automatic request metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, PricingMetrics};
//!
//! init_metrics();
//!
//! PricingMetrics::record_snapshot_ingested(120, 0);
//!
//! let app = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

pub mod middleware;
pub mod pricing;

pub use middleware::metrics_middleware;
pub use pricing::{PricingMetrics, PricingTimer};

pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at application startup. If another recorder is already
/// installed the handle still renders, but only its own (empty) registry.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => info!("Prometheus metrics recorder initialized"),
            Err(e) => warn!(error = %e, "Metrics recorder already installed"),
        }

        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // HTTP metrics
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );
    describe_gauge!("http_requests_in_flight", "HTTP requests being served");

    // Comparison metrics
    describe_counter!(
        "pricing_comparisons_total",
        "Cost comparisons by template and outcome"
    );
    describe_histogram!(
        "pricing_operation_duration_seconds",
        "Cost engine operation duration in seconds"
    );
    describe_counter!(
        "pricing_provider_unavailable_total",
        "Providers left out of a comparison, by reason"
    );
    describe_counter!(
        "pricing_cheapest_provider_total",
        "How often each provider came out cheapest"
    );
    describe_histogram!(
        "pricing_max_savings_cents",
        "Spread between most and least expensive provider, in cents"
    );

    // Catalog metrics
    describe_counter!(
        "pricing_snapshot_entries_total",
        "Snapshot entries offered for ingestion, by status"
    );
    describe_gauge!("pricing_cache_hits", "Catalog cache hits since start");
    describe_gauge!("pricing_cache_misses", "Catalog cache misses since start");
    describe_gauge!("pricing_cache_entries", "Live catalog cache entries");
    describe_counter!(
        "pricing_cache_evictions_total",
        "Catalog cache entries removed by eviction passes"
    );
}
