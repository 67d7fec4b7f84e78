//! Metrics for the cost comparison engine: comparisons, catalog ingestion
//! and the catalog cache.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Cost engine metrics recorder
pub struct PricingMetrics;

impl PricingMetrics {
    // =========================================================================
    // Comparisons
    // =========================================================================

    /// Record a finished comparison.
    ///
    /// `available` is the number of providers that produced an estimate. The
    /// duration itself is recorded by [`PricingTimer`].
    pub fn record_comparison(template_id: i64, region: &str, available: usize, duration_ms: u64) {
        let outcome = if available >= 2 { "complete" } else { "incomplete" };

        counter!(
            "pricing_comparisons_total",
            "template" => template_id.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        tracing::debug!(
            template_id,
            region,
            available,
            duration_ms,
            "Recorded comparison"
        );
    }

    /// Record a comparison rejected before estimation (bad input, unknown template)
    pub fn record_comparison_rejected(reason: &str) {
        counter!(
            "pricing_comparisons_total",
            "outcome" => "rejected",
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    /// Record a provider that could not be estimated in a comparison
    pub fn record_provider_unavailable(provider: &str, reason: &str) {
        counter!(
            "pricing_provider_unavailable_total",
            "provider" => provider.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    /// Record the cheapest provider and the spread of a comparison
    pub fn record_cheapest(provider: &str, savings_cents: i64) {
        counter!("pricing_cheapest_provider_total", "provider" => provider.to_string())
            .increment(1);
        histogram!("pricing_max_savings_cents").record(savings_cents as f64);
    }

    // =========================================================================
    // Catalog ingestion
    // =========================================================================

    /// Record a snapshot batch ingestion
    pub fn record_snapshot_ingested(accepted: usize, rejected: usize) {
        counter!("pricing_snapshot_entries_total", "status" => "accepted")
            .increment(accepted as u64);
        counter!("pricing_snapshot_entries_total", "status" => "rejected")
            .increment(rejected as u64);

        if rejected > 0 {
            tracing::warn!(accepted, rejected, "Snapshot batch had rejected entries");
        } else {
            tracing::info!(accepted, "Snapshot batch ingested");
        }
    }

    // =========================================================================
    // Catalog cache (gauges, sampled by the eviction job)
    // =========================================================================

    /// Publish cache counters and the live entry count
    pub fn set_cache_stats(hits: u64, misses: u64, entries: usize) {
        gauge!("pricing_cache_hits").set(hits as f64);
        gauge!("pricing_cache_misses").set(misses as f64);
        gauge!("pricing_cache_entries").set(entries as f64);
    }

    /// Record entries removed by an eviction pass
    pub fn record_cache_evicted(evicted: usize) {
        counter!("pricing_cache_evictions_total").increment(evicted as u64);
    }
}

/// Timer guard for automatic duration recording.
///
/// Records the duration when `stop()` is called or when dropped.
pub struct PricingTimer {
    start: Instant,
    operation: &'static str,
    stopped: bool,
}

impl PricingTimer {
    /// Start a new timer for an operation
    pub fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
            stopped: false,
        }
    }

    /// Milliseconds since the timer started
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop the timer and record the duration. Returns duration in milliseconds.
    pub fn stop(&mut self) -> u64 {
        if self.stopped {
            return 0;
        }
        self.stopped = true;

        let duration = self.start.elapsed();
        histogram!("pricing_operation_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());

        duration.as_millis() as u64
    }
}

impl Drop for PricingTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_stops_once() {
        let mut timer = PricingTimer::new("ingest");
        let _ = timer.stop();
        assert_eq!(timer.stop(), 0);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        PricingMetrics::record_comparison(1, "us-east-1", 3, 12);
        PricingMetrics::record_provider_unavailable("gcp", "timeout");
        PricingMetrics::record_snapshot_ingested(10, 1);
        PricingMetrics::set_cache_stats(5, 2, 7);
    }
}
