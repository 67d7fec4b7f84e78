use chrono::NaiveDate;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cost_model::CostModel;
use crate::error::{PricingError, PricingResult};
use crate::models::{
    CloudProvider, ComparisonResult, CostEstimate, Currency, Money, ProviderEstimate,
    ResourceRequirement,
};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(2);

/// Fewest estimated providers for a comparison to count as complete
pub const MIN_PROVIDERS: usize = 2;

/// Runs the cost model for every provider and ranks the results.
#[derive(Clone)]
pub struct ComparisonEngine {
    model: CostModel,
    provider_timeout: Duration,
    currency: Currency,
}

impl ComparisonEngine {
    pub fn new(model: CostModel, provider_timeout: Duration) -> Self {
        Self {
            model,
            provider_timeout,
            currency: Currency::Usd,
        }
    }

    /// Estimate all providers concurrently.
    ///
    /// A provider that fails or times out is reported unavailable; if fewer
    /// than two remain the partial result comes back inside
    /// `ComparisonIncomplete`.
    pub async fn compare(
        &self,
        requirement: &ResourceRequirement,
        region: &str,
        as_of: NaiveDate,
    ) -> PricingResult<ComparisonResult> {
        let runs = CloudProvider::ALL
            .map(|provider| self.estimate(provider, requirement, region, as_of));
        let estimates = join_all(runs).await;

        let (cheapest_provider, max_savings) = rank(&estimates);
        let result = ComparisonResult {
            region: region.to_string(),
            as_of,
            currency: self.currency,
            estimates,
            cheapest_provider,
            max_savings,
        };

        let available = result.available().count();
        debug!(region, %as_of, available, ?cheapest_provider, "Comparison finished");

        if available < MIN_PROVIDERS {
            return Err(PricingError::ComparisonIncomplete(Box::new(result)));
        }
        Ok(result)
    }

    async fn estimate(
        &self,
        provider: CloudProvider,
        requirement: &ResourceRequirement,
        region: &str,
        as_of: NaiveDate,
    ) -> ProviderEstimate {
        let priced = self.model.estimate_provider(provider, requirement, region, as_of);
        let items = tokio::time::timeout(self.provider_timeout, priced)
            .await
            .unwrap_or_else(|_| {
                Err(PricingError::ProviderTimeout {
                    provider,
                    timeout_ms: self.provider_timeout.as_millis() as u64,
                })
            });

        let outcome =
            items.map(|items| CostEstimate::from_line_items(provider, self.currency, items));

        match outcome {
            Ok(Some(estimate)) => ProviderEstimate::Available { estimate },
            Ok(None) => {
                warn!(%provider, "Catalog prices are not in {}", self.currency);
                ProviderEstimate::Unavailable {
                    provider,
                    kind: "currency_mismatch".to_string(),
                    reason: format!("prices are not in {}", self.currency),
                }
            }
            Err(e) => {
                warn!(%provider, kind = e.kind(), error = %e, "Provider estimate unavailable");
                ProviderEstimate::Unavailable {
                    provider,
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Cheapest provider and the spread between highest and lowest total.
///
/// Ties go to the provider listed first (AWS, Azure, GCP).
fn rank(estimates: &[ProviderEstimate]) -> (Option<CloudProvider>, Option<Money>) {
    let mut cheapest: Option<(CloudProvider, Money)> = None;
    let mut highest: Option<Money> = None;

    for estimate in estimates.iter().filter_map(ProviderEstimate::estimate) {
        let total = estimate.total_monthly_cost;
        if cheapest.is_none_or(|(_, best)| total.amount < best.amount) {
            cheapest = Some((estimate.provider, total));
        }
        if highest.is_none_or(|top| total.amount > top.amount) {
            highest = Some(total);
        }
    }

    let savings = cheapest
        .zip(highest)
        .and_then(|((_, low), high)| high.checked_sub(&low));

    (cheapest.map(|(provider, _)| provider), savings)
}
