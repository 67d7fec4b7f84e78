//! Read-through cache in front of a [`PricingCatalog`].
//!
//! Entries are keyed by `(key, as_of)` and live until the next local
//! midnight. `NotFound` is cached too, but only for `negative_ttl` (still
//! capped at midnight). Ingesting through the cache invalidates every key in
//! the batch together with the candidate lists of its scope.

use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, FixedOffset, Local, NaiveDate, TimeZone};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::catalog::PricingCatalog;
use crate::error::{PricingError, PricingResult};
use crate::models::{IngestReport, PricingEntry, PricingKey, ServiceScope};

pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(300);

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start of the next day in `now`'s offset
fn next_midnight(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.offset().from_local_datetime(&midnight).single())
        .unwrap_or(now + TimeDelta::days(1))
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: T,
    expires_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct CatalogCache {
    inner: Arc<dyn PricingCatalog>,
    clock: Arc<dyn Clock>,
    negative_ttl: TimeDelta,
    entries: DashMap<(PricingKey, NaiveDate), Slot<Option<PricingEntry>>>,
    candidates: DashMap<(ServiceScope, NaiveDate), Slot<Vec<PricingEntry>>>,
    /// Bumped by every invalidation; fills started under an older value are dropped
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CatalogCache {
    pub fn new(inner: Arc<dyn PricingCatalog>) -> Self {
        Self::with_clock(inner, Arc::new(SystemClock), DEFAULT_NEGATIVE_TTL)
    }

    pub fn with_clock(
        inner: Arc<dyn PricingCatalog>,
        clock: Arc<dyn Clock>,
        negative_ttl: Duration,
    ) -> Self {
        Self {
            inner,
            clock,
            negative_ttl: TimeDelta::from_std(negative_ttl)
                .unwrap_or_else(|_| TimeDelta::minutes(5)),
            entries: DashMap::new(),
            candidates: DashMap::new(),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drop cached lookups of `key` and candidate lists of its scope.
    pub fn invalidate(&self, key: &PricingKey) {
        // Bump first: a fill holding a shard lock either lands before the
        // retain below reaches it, or sees the new generation and backs off
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.retain(|(cached, _), _| cached != key);

        let scope = key.scope();
        self.candidates.retain(|(cached, _), _| *cached != scope);
    }

    /// Remove expired entries, returning how many went
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut evicted = 0;

        self.entries.retain(|_, slot| {
            let live = slot.expires_at > now;
            evicted += usize::from(!live);
            live
        });
        self.candidates.retain(|_, slot| {
            let live = slot.expires_at > now;
            evicted += usize::from(!live);
            live
        });

        if evicted > 0 {
            debug!(evicted, "Evicted expired catalog cache entries");
        }
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len() + self.candidates.len(),
        }
    }

    fn expiry(&self, now: DateTime<FixedOffset>, found: bool) -> DateTime<FixedOffset> {
        let midnight = next_midnight(now);
        if found {
            midnight
        } else {
            (now + self.negative_ttl).min(midnight)
        }
    }

    fn fresh<K, T>(
        &self,
        map: &DashMap<K, Slot<T>>,
        key: &K,
        now: DateTime<FixedOffset>,
    ) -> Option<T>
    where
        K: Eq + Hash,
        T: Clone,
    {
        // The map guard is released before this returns
        let value = map
            .get(key)
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.value.clone());

        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn fill<K, T>(&self, map: &DashMap<K, Slot<T>>, key: K, slot: Slot<T>, generation: u64)
    where
        K: Eq + Hash,
    {
        // Checked under the shard lock so it orders against `invalidate`
        let entry = map.entry(key);
        if self.generation.load(Ordering::Acquire) == generation {
            entry.insert(slot);
        }
    }
}

#[async_trait]
impl PricingCatalog for CatalogCache {
    async fn lookup(&self, key: &PricingKey, as_of: NaiveDate) -> PricingResult<PricingEntry> {
        let now = self.clock.now();
        let cache_key = (key.clone(), as_of);

        if let Some(cached) = self.fresh(&self.entries, &cache_key, now) {
            return cached.ok_or_else(|| PricingError::price_not_found(key, as_of));
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = match self.inner.lookup(key, as_of).await {
            Ok(entry) => Some(entry),
            Err(PricingError::NotFound(_)) => None,
            // Backend failures are never cached
            Err(e) => return Err(e),
        };

        let slot = Slot {
            expires_at: self.expiry(now, value.is_some()),
            value: value.clone(),
        };
        self.fill(&self.entries, cache_key, slot, generation);

        value.ok_or_else(|| PricingError::price_not_found(key, as_of))
    }

    async fn candidates(
        &self,
        scope: &ServiceScope,
        as_of: NaiveDate,
    ) -> PricingResult<Vec<PricingEntry>> {
        let now = self.clock.now();
        let cache_key = (scope.clone(), as_of);

        if let Some(cached) = self.fresh(&self.candidates, &cache_key, now) {
            return Ok(cached);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let found = self.inner.candidates(scope, as_of).await?;

        let slot = Slot {
            expires_at: self.expiry(now, !found.is_empty()),
            value: found.clone(),
        };
        self.fill(&self.candidates, cache_key, slot, generation);

        Ok(found)
    }

    async fn ingest(&self, entries: Vec<PricingEntry>) -> PricingResult<IngestReport> {
        let keys: Vec<PricingKey> = entries.iter().map(|e| e.key.clone()).collect();
        let report = self.inner.ingest(entries).await?;

        for key in &keys {
            self.invalidate(key);
        }

        Ok(report)
    }

    async fn ping(&self) -> PricingResult<()> {
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockPricingCatalog;
    use crate::models::{CloudProvider, Currency, Money, PricingUnit, ServiceType};
    use std::sync::{OnceLock, Weak};

    fn clock_at(rfc3339: &str) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::parse_from_rfc3339(rfc3339).unwrap(),
        ))
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn key() -> PricingKey {
        ServiceScope::new(CloudProvider::Aws, ServiceType::Compute, "us-east-1")
            .key("t3.medium")
    }

    fn entry() -> PricingEntry {
        PricingEntry {
            key: key(),
            unit: PricingUnit::Hour,
            price_per_hour: Some(Money::from_decimal(0.0416, Currency::Usd)),
            price_per_month: None,
            currency: Currency::Usd,
            capacity: None,
            effective_date: as_of(),
        }
    }

    fn cache(mock: MockPricingCatalog, clock: Arc<ManualClock>) -> CatalogCache {
        CatalogCache::with_clock(Arc::new(mock), clock, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_hit_does_not_call_catalog() {
        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup().times(1).returning(|_, _| Ok(entry()));
        let cache = cache(mock, clock_at("2025-06-01T10:00:00+02:00"));

        cache.lookup(&key(), as_of()).await.unwrap();
        cache.lookup(&key(), as_of()).await.unwrap();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_entries_expire_at_local_midnight() {
        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup().times(2).returning(|_, _| Ok(entry()));
        let clock = clock_at("2025-06-01T23:58:00+02:00");
        let cache = cache(mock, clock.clone());

        cache.lookup(&key(), as_of()).await.unwrap();
        clock.advance(TimeDelta::minutes(1));
        cache.lookup(&key(), as_of()).await.unwrap();
        clock.advance(TimeDelta::minutes(2));
        cache.lookup(&key(), as_of()).await.unwrap();

        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_not_found_expires_after_negative_ttl() {
        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup()
            .times(2)
            .returning(|k, d| Err(PricingError::price_not_found(k, d)));
        let clock = clock_at("2025-06-01T10:00:00+00:00");
        let cache = cache(mock, clock.clone());

        assert!(cache.lookup(&key(), as_of()).await.is_err());
        clock.advance(TimeDelta::minutes(4));
        assert!(matches!(
            cache.lookup(&key(), as_of()).await,
            Err(PricingError::NotFound(_))
        ));
        clock.advance(TimeDelta::minutes(2));
        assert!(cache.lookup(&key(), as_of()).await.is_err());
    }

    #[tokio::test]
    async fn test_backend_errors_are_not_cached() {
        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup()
            .times(2)
            .returning(|_, _| Err(PricingError::Internal("down".into())));
        let cache = cache(mock, clock_at("2025-06-01T10:00:00+00:00"));

        assert!(cache.lookup(&key(), as_of()).await.is_err());
        assert!(cache.lookup(&key(), as_of()).await.is_err());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup().times(2).returning(|_, _| Ok(entry()));
        mock.expect_candidates()
            .times(2)
            .returning(|_, _| Ok(vec![entry()]));
        let cache = cache(mock, clock_at("2025-06-01T10:00:00+00:00"));

        cache.lookup(&key(), as_of()).await.unwrap();
        cache.candidates(&key().scope(), as_of()).await.unwrap();
        cache.invalidate(&key());
        assert_eq!(cache.stats().entries, 0);

        cache.lookup(&key(), as_of()).await.unwrap();
        cache.candidates(&key().scope(), as_of()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fill_racing_invalidation_is_not_stored() {
        // The catalog answer is produced while an ingest invalidates the key
        let cache_slot: Arc<OnceLock<Weak<CatalogCache>>> = Arc::new(OnceLock::new());
        let racing = cache_slot.clone();
        let mut calls = 0;

        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup().times(2).returning(move |key, _| {
            calls += 1;
            let first_call = calls == 1;
            if let Some(cache) = racing.get().and_then(Weak::upgrade).filter(|_| first_call) {
                cache.invalidate(key);
            }
            Ok(entry())
        });
        let cache = Arc::new(cache(mock, clock_at("2025-06-01T10:00:00+00:00")));
        assert!(cache_slot.set(Arc::downgrade(&cache)).is_ok());

        // The stale answer is still returned, just not kept
        cache.lookup(&key(), as_of()).await.unwrap();
        assert_eq!(cache.stats().entries, 0);

        // So the next read goes back to the catalog, and that fill sticks
        cache.lookup(&key(), as_of()).await.unwrap();
        assert_eq!(cache.stats().entries, 1);
        cache.lookup(&key(), as_of()).await.unwrap();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 2));
    }

    #[tokio::test]
    async fn test_ingest_invalidates_batch_keys() {
        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup()
            .times(2)
            .returning(|k, d| Err(PricingError::price_not_found(k, d)));
        mock.expect_ingest().times(1).returning(|entries| {
            Ok(IngestReport {
                accepted: entries.len(),
                rejected: vec![],
            })
        });
        let cache = cache(mock, clock_at("2025-06-01T10:00:00+00:00"));

        assert!(cache.lookup(&key(), as_of()).await.is_err());
        cache.ingest(vec![entry()]).await.unwrap();
        // Negative entry is gone, so the catalog is asked again
        assert!(cache.lookup(&key(), as_of()).await.is_err());
    }

    #[tokio::test]
    async fn test_evict_expired_counts_removed() {
        let mut mock = MockPricingCatalog::new();
        mock.expect_lookup().returning(|_, _| Ok(entry()));
        mock.expect_candidates().returning(|_, _| Ok(vec![]));
        let clock = clock_at("2025-06-01T10:00:00+00:00");
        let cache = cache(mock, clock.clone());

        cache.lookup(&key(), as_of()).await.unwrap();
        cache.candidates(&key().scope(), as_of()).await.unwrap();
        assert_eq!(cache.evict_expired(), 0);

        // Empty candidate list only lives for the negative TTL
        clock.advance(TimeDelta::minutes(10));
        assert_eq!(cache.evict_expired(), 1);

        clock.advance(TimeDelta::hours(14));
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_next_midnight_keeps_offset() {
        let now = DateTime::parse_from_rfc3339("2025-12-31T18:30:00-05:00").unwrap();
        let midnight = next_midnight(now);
        assert_eq!(midnight.to_rfc3339(), "2026-01-01T00:00:00-05:00");
    }
}
