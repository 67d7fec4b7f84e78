//! In-memory pricing catalog, used for fixtures, tests and the CLI.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use crate::catalog::PricingCatalog;
use crate::error::{PricingError, PricingResult};
use crate::models::{IngestReport, PricingEntry, PricingKey, RejectedEntry, ServiceScope};

type History = BTreeMap<NaiveDate, PricingEntry>;

#[derive(Default)]
pub struct InMemoryPricingCatalog {
    entries: RwLock<HashMap<PricingKey, History>>,
}

impl InMemoryPricingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots across all keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn latest(history: &History, as_of: NaiveDate) -> Option<&PricingEntry> {
    history.range(..=as_of).next_back().map(|(_, entry)| entry)
}

#[async_trait]
impl PricingCatalog for InMemoryPricingCatalog {
    async fn lookup(&self, key: &PricingKey, as_of: NaiveDate) -> PricingResult<PricingEntry> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .and_then(|history| latest(history, as_of))
            .cloned()
            .ok_or_else(|| PricingError::price_not_found(key, as_of))
    }

    async fn candidates(
        &self,
        scope: &ServiceScope,
        as_of: NaiveDate,
    ) -> PricingResult<Vec<PricingEntry>> {
        let entries = self.entries.read().await;
        let mut found: Vec<PricingEntry> = entries
            .iter()
            .filter(|(key, _)| scope.contains(key))
            .filter_map(|(_, history)| latest(history, as_of).cloned())
            .collect();
        found.sort_by(|a, b| a.key.instance_type.cmp(&b.key.instance_type));
        Ok(found)
    }

    async fn ingest(&self, batch: Vec<PricingEntry>) -> PricingResult<IngestReport> {
        let mut report = IngestReport::default();
        // One guard for the whole batch: readers see all of it or none of it
        let mut entries = self.entries.write().await;
        let mut seen = HashSet::new();

        for entry in batch {
            let id = (entry.key.clone(), entry.effective_date);
            let stored = entries
                .get(&entry.key)
                .is_some_and(|h| h.contains_key(&entry.effective_date));

            if stored || !seen.insert(id) {
                report.rejected.push(RejectedEntry::duplicate(&entry));
                continue;
            }

            entries
                .entry(entry.key.clone())
                .or_default()
                .insert(entry.effective_date, entry);
            report.accepted += 1;
        }

        Ok(report)
    }

    async fn ping(&self) -> PricingResult<()> {
        Ok(())
    }
}
