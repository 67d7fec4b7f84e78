use chrono::{NaiveDate, TimeDelta};
use observability::{PricingMetrics, PricingTimer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::cache::{CatalogCache, Clock, DEFAULT_NEGATIVE_TTL, SystemClock};
use crate::catalog::{PricingCatalog, validate_entries};
use crate::cost_model::CostModel;
use crate::engine::{ComparisonEngine, DEFAULT_PROVIDER_TIMEOUT};
use crate::error::{PricingError, PricingResult};
use crate::history::ComparisonHistory;
use crate::models::{
    ClientInfo, CompareRequest, ComparisonRecord, ComparisonResponse, ComparisonResult,
    DEFAULT_HISTORY_LIMIT, DEFAULT_POPULARITY_WINDOW_DAYS, HistoryCount, HistoryCountQuery,
    IngestReport, LookupQuery, PopularTemplatesQuery, PricingEntry, ProviderEstimate,
    RecentHistoryQuery, ResourceRequirement, Template, TemplateCategory, TemplatePopularity,
};
use crate::resolver::resolve;
use crate::templates::TemplateStore;

/// Tuning knobs of the pricing service
#[derive(Debug, Clone, Copy)]
pub struct PricingServiceConfig {
    /// Per-provider budget of one comparison
    pub provider_timeout: Duration,
    /// How long a catalog miss stays cached
    pub negative_cache_ttl: Duration,
}

impl Default for PricingServiceConfig {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            negative_cache_ttl: DEFAULT_NEGATIVE_TTL,
        }
    }
}

/// Application boundary of the cost engine
#[derive(Clone)]
pub struct PricingService {
    cache: Arc<CatalogCache>,
    templates: Arc<dyn TemplateStore>,
    history: Arc<dyn ComparisonHistory>,
    engine: ComparisonEngine,
    clock: Arc<dyn Clock>,
}

impl PricingService {
    /// Wrap `catalog` in a cache and wire the engine on top of it
    pub fn new(
        catalog: Arc<dyn PricingCatalog>,
        templates: Arc<dyn TemplateStore>,
        history: Arc<dyn ComparisonHistory>,
        config: PricingServiceConfig,
    ) -> Self {
        Self::with_clock(catalog, templates, history, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        catalog: Arc<dyn PricingCatalog>,
        templates: Arc<dyn TemplateStore>,
        history: Arc<dyn ComparisonHistory>,
        config: PricingServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(CatalogCache::with_clock(
            catalog,
            clock.clone(),
            config.negative_cache_ttl,
        ));
        let engine = ComparisonEngine::new(CostModel::new(cache.clone()), config.provider_timeout);

        Self {
            cache,
            templates,
            history,
            engine,
            clock,
        }
    }

    /// The read-through cache every catalog read goes through
    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Resolve a template with overrides and compare all providers.
    ///
    /// A partial comparison is not an error here: it comes back with
    /// `complete: false` and a warning. The result is recorded in history on a
    /// best-effort basis.
    #[instrument(
        skip(self, request, client),
        fields(template_id = request.template_id, region = %request.region)
    )]
    pub async fn compare(
        &self,
        request: CompareRequest,
        client: ClientInfo,
    ) -> PricingResult<ComparisonResponse> {
        let mut timer = PricingTimer::new("compare");

        let requirement = match self.prepare(&request).await {
            Ok(requirement) => requirement,
            Err(e) => {
                PricingMetrics::record_comparison_rejected(e.kind());
                return Err(e);
            }
        };

        let as_of = request.as_of.unwrap_or_else(|| self.today());
        let compared = self
            .engine
            .compare(&requirement, &request.region, as_of)
            .await;
        let (result, complete) = match compared {
            Ok(result) => (result, true),
            Err(PricingError::ComparisonIncomplete(partial)) => (*partial, false),
            Err(e) => return Err(e),
        };

        let duration_ms = timer.stop();
        record_metrics(request.template_id, &result, duration_ms);

        let record = ComparisonRecord {
            created_at: self.clock.now().to_utc(),
            ..ComparisonRecord::new(
                request.template_id,
                &request.configuration,
                &result,
                complete,
                &client,
            )
        };
        let calculation_id = match self.history.record(record).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to record comparison history");
                None
            }
        };

        if complete {
            Ok(ComparisonResponse::complete(calculation_id, result))
        } else {
            let response = ComparisonResponse::incomplete(calculation_id, result);
            warn!(warning = ?response.warning, "Returning partial comparison");
            Ok(response)
        }
    }

    async fn prepare(&self, request: &CompareRequest) -> PricingResult<ResourceRequirement> {
        request
            .validate()
            .map_err(|e| PricingError::InvalidInput(e.to_string()))?;
        let template = self.templates.get(request.template_id).await?;
        resolve(&template.config, &request.configuration)
    }

    /// Validate and append a snapshot batch.
    ///
    /// Accepted entries stay committed even when others are rejected as
    /// duplicates; the rejection is reported as `DuplicateSnapshot`.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn ingest(&self, entries: Vec<PricingEntry>) -> PricingResult<IngestReport> {
        let _timer = PricingTimer::new("ingest");
        validate_entries(&entries)?;

        let report = self.cache.ingest(entries).await?;
        PricingMetrics::record_snapshot_ingested(report.accepted, report.rejected.len());

        if report.rejected.is_empty() {
            info!(accepted = report.accepted, "Snapshot batch ingested");
            Ok(report)
        } else {
            for rejected in &report.rejected {
                warn!(
                    key = %rejected.key,
                    effective_date = %rejected.effective_date,
                    "Duplicate snapshot rejected"
                );
            }
            Err(PricingError::DuplicateSnapshot(report))
        }
    }

    /// Catalog entry effective on `as_of` (default today), through the cache
    pub async fn lookup(&self, query: LookupQuery) -> PricingResult<PricingEntry> {
        let as_of = query.as_of.unwrap_or_else(|| self.today());
        self.cache.lookup(&query.key(), as_of).await
    }

    pub async fn list_templates(
        &self,
        category: Option<TemplateCategory>,
    ) -> PricingResult<Vec<Template>> {
        self.templates.list(category).await
    }

    pub async fn get_template(&self, id: i64) -> PricingResult<Template> {
        self.templates.get(id).await
    }

    /// Newest recorded comparisons
    pub async fn recent_comparisons(
        &self,
        query: RecentHistoryQuery,
    ) -> PricingResult<Vec<ComparisonRecord>> {
        query
            .validate()
            .map_err(|e| PricingError::InvalidInput(e.to_string()))?;
        self.history
            .recent(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await
    }

    pub async fn count_comparisons(&self, query: HistoryCountQuery) -> PricingResult<HistoryCount> {
        if query.from > query.to {
            return Err(PricingError::InvalidInput(format!(
                "from ({}) is after to ({})",
                query.from, query.to
            )));
        }

        let comparisons = self.history.count_between(query.from, query.to).await?;
        Ok(HistoryCount {
            from: query.from,
            to: query.to,
            comparisons,
        })
    }

    /// Templates ranked by comparisons since `since` (default: the last 30 days)
    pub async fn popular_templates(
        &self,
        query: PopularTemplatesQuery,
    ) -> PricingResult<Vec<TemplatePopularity>> {
        let since = query.since.unwrap_or_else(|| {
            self.clock.now().to_utc() - TimeDelta::days(DEFAULT_POPULARITY_WINDOW_DAYS)
        });
        self.history.popular_templates(since).await
    }

    /// Catalog backend reachability
    pub async fn ready(&self) -> PricingResult<()> {
        self.cache.ping().await
    }
}

fn record_metrics(template_id: i64, result: &ComparisonResult, duration_ms: u64) {
    let available = result.available().count();
    PricingMetrics::record_comparison(template_id, &result.region, available, duration_ms);

    for estimate in &result.estimates {
        if let ProviderEstimate::Unavailable { provider, kind, .. } = estimate {
            PricingMetrics::record_provider_unavailable(&provider.to_string(), kind);
        }
    }
    if let (Some(provider), Some(savings)) = (result.cheapest_provider, result.max_savings) {
        PricingMetrics::record_cheapest(&provider.to_string(), savings.amount);
    }
}
