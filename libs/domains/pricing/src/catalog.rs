use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{PricingError, PricingResult};
use crate::models::{IngestReport, PricingEntry, PricingKey, ServiceScope};

/// Append-only store of price snapshots.
///
/// Every read takes a reference date and sees the latest snapshot effective
/// on or before it. Implementations can use different storage backends
/// (in-memory, PostgreSQL).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingCatalog: Send + Sync {
    /// Latest entry for `key` with `effective_date <= as_of`.
    ///
    /// Returns `PricingError::NotFound` when there is none. A missing price
    /// is never a zero price.
    async fn lookup(&self, key: &PricingKey, as_of: NaiveDate) -> PricingResult<PricingEntry>;

    /// Latest entry `<= as_of` of every instance type in the scope, ordered
    /// by instance type
    async fn candidates(
        &self,
        scope: &ServiceScope,
        as_of: NaiveDate,
    ) -> PricingResult<Vec<PricingEntry>>;

    /// Append a batch. Entries whose `(key, effective_date)` already exists,
    /// in history or earlier in the batch, are rejected; the rest commit
    /// together.
    async fn ingest(&self, entries: Vec<PricingEntry>) -> PricingResult<IngestReport>;

    /// Backend reachability, used by readiness checks
    async fn ping(&self) -> PricingResult<()>;
}

/// Reject a batch holding malformed entries before it reaches any catalog.
pub fn validate_entries(entries: &[PricingEntry]) -> PricingResult<()> {
    let problems: Vec<String> = entries
        .iter()
        .enumerate()
        .flat_map(|(i, entry)| {
            entry
                .problems()
                .into_iter()
                .map(move |p| format!("entries[{}] ({}): {}", i, entry.key, p))
        })
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(PricingError::InvalidInput(problems.join("; ")))
    }
}
