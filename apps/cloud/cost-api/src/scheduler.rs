//! Cache maintenance job
//!
//! Expired cache slots are only dropped lazily on read, so a cron job sweeps
//! them and publishes the cache gauges.

use domain_pricing::CatalogCache;
use eyre::Result;
use observability::PricingMetrics;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

/// Drop expired entries and refresh the cache metrics.
pub fn sweep(cache: &CatalogCache) -> usize {
    let evicted = cache.evict_expired();
    let stats = cache.stats();

    PricingMetrics::record_cache_evicted(evicted);
    PricingMetrics::set_cache_stats(stats.hits, stats.misses, stats.entries);

    debug!(
        evicted,
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "Cache sweep complete"
    );
    evicted
}

/// Start the eviction job on `cron_expr`. The returned scheduler must be
/// shut down on exit.
pub async fn start_cache_eviction(
    cache: Arc<CatalogCache>,
    cron_expr: &str,
) -> Result<JobScheduler> {
    info!(cron = cron_expr, "Starting cache eviction job");

    let sched = JobScheduler::new().await?;

    let job = Job::new_async(cron_expr, move |_uuid, _l| {
        let cache = cache.clone();

        Box::pin(async move {
            sweep(&cache);
        })
    })?;

    sched.add(job).await?;
    sched.start().await?;

    Ok(sched)
}
