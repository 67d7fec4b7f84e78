//! Per-provider pricing rules: requirement dimensions to catalog keys and
//! quantities.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::catalog::PricingCatalog;
use crate::error::{PricingError, PricingResult};
use crate::models::{
    CloudProvider, Dimension, HOURS_PER_MONTH, LineItem, Money, PricingEntry, PricingUnit,
    ResourceRequirement, ServiceRequirement, ServiceScope, ServiceType,
};
use crate::region::provider_region;

const DEFAULT_AVG_DURATION_MS: f64 = 100.0;
const REQUESTS_PER_UNIT: f64 = 1_000_000.0;

// Metered tier names, stored as instance types in the catalog
const TIER_STORAGE: &str = "storage";
const TIER_REQUESTS: &str = "requests";
const TIER_STANDARD: &str = "standard";
const TIER_COMPUTE: &str = "compute";
const TIER_WORKER: &str = "worker";

/// Capacity asked of an instance; missing dimensions are zero
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Demand {
    vcpus: f64,
    memory_gb: f64,
    gpus: f64,
}

impl Demand {
    fn from_requirement(requirement: &ServiceRequirement) -> Self {
        Self {
            vcpus: requirement.get(Dimension::Vcpus).unwrap_or(0.0),
            memory_gb: requirement.get(Dimension::MemoryGb).unwrap_or(0.0),
            gpus: requirement.get(Dimension::Gpus).unwrap_or(0.0),
        }
    }

    fn is_met_by(&self, entry: &PricingEntry) -> bool {
        entry.capacity.is_some_and(|c| {
            f64::from(c.vcpus) >= self.vcpus
                && c.memory_gb >= self.memory_gb
                && f64::from(c.gpus) >= self.gpus
        })
    }

    fn describe(&self) -> String {
        format!(
            "{} vCPU, {} GB memory, {} GPU",
            self.vcpus, self.memory_gb, self.gpus
        )
    }
}

/// Cheapest first, then smaller, then by name
fn compare_candidates(a: &PricingEntry, b: &PricingEntry) -> Ordering {
    let capacity = |e: &PricingEntry| e.capacity.unwrap_or_default();
    a.monthly_price()
        .cmp(&b.monthly_price())
        .then_with(|| capacity(a).vcpus.cmp(&capacity(b).vcpus))
        .then_with(|| capacity(a).memory_gb.total_cmp(&capacity(b).memory_gb))
        .then_with(|| a.key.instance_type.cmp(&b.key.instance_type))
}

fn required(
    requirement: &ServiceRequirement,
    service_type: ServiceType,
    dimension: Dimension,
) -> PricingResult<f64> {
    requirement.get(dimension).ok_or_else(|| {
        PricingError::InvalidInput(format!("{} requires {}", service_type, dimension))
    })
}

/// Turns resource requirements into priced line items for one provider.
#[derive(Clone)]
pub struct CostModel {
    catalog: Arc<dyn PricingCatalog>,
}

impl CostModel {
    pub fn new(catalog: Arc<dyn PricingCatalog>) -> Self {
        Self { catalog }
    }

    /// Line items of every service in the requirement, in service-type order
    pub async fn estimate_provider(
        &self,
        provider: CloudProvider,
        requirement: &ResourceRequirement,
        region: &str,
        as_of: NaiveDate,
    ) -> PricingResult<Vec<LineItem>> {
        let mut items = Vec::new();
        for (service_type, service) in &requirement.services {
            let priced = self
                .estimate(provider, *service_type, service, region, as_of)
                .await?;
            items.extend(priced);
        }
        Ok(items)
    }

    /// Line items of one service at one provider.
    ///
    /// `region` may be canonical or any provider's code.
    pub async fn estimate(
        &self,
        provider: CloudProvider,
        service_type: ServiceType,
        requirement: &ServiceRequirement,
        region: &str,
        as_of: NaiveDate,
    ) -> PricingResult<Vec<LineItem>> {
        let scope = ServiceScope::new(provider, service_type, provider_region(provider, region));
        let pricer = Pricer {
            catalog: self.catalog.as_ref(),
            scope: &scope,
            as_of,
        };
        let get = |dimension| required(requirement, service_type, dimension);

        let items = match service_type {
            ServiceType::Compute => {
                let instance = pricer
                    .select_instance(Demand::from_requirement(requirement))
                    .await?;
                let count = requirement.get(Dimension::Instances).unwrap_or(1.0);
                vec![always_on(service_type, &instance, count)?]
            }
            ServiceType::Database => {
                let storage_gb = get(Dimension::StorageGb)?;
                let instance = pricer
                    .select_instance(Demand::from_requirement(requirement))
                    .await?;
                vec![
                    always_on(service_type, &instance, 1.0)?,
                    pricer.metered(TIER_STORAGE, storage_gb).await?,
                ]
            }
            ServiceType::NosqlDatabase => {
                let storage_gb = get(Dimension::StorageGb)?;
                let mut items = vec![pricer.metered(TIER_STORAGE, storage_gb).await?];
                if let Some(requests) = requirement.get(Dimension::RequestsPerMonth) {
                    let units = requests / REQUESTS_PER_UNIT;
                    items.push(pricer.metered(TIER_REQUESTS, units).await?);
                }
                items
            }
            ServiceType::Storage => {
                vec![pricer.metered(TIER_STANDARD, get(Dimension::SizeGb)?).await?]
            }
            ServiceType::ServerlessFunction => {
                let requests = get(Dimension::RequestsPerMonth)?;
                let memory_mb = get(Dimension::MemoryMb)?;
                let duration_ms = requirement
                    .get(Dimension::AvgDurationMs)
                    .unwrap_or(DEFAULT_AVG_DURATION_MS);
                let gb_hours = requests * (duration_ms / 1000.0) * (memory_mb / 1024.0) / 3600.0;
                let units = requests / REQUESTS_PER_UNIT;
                vec![
                    pricer.metered(TIER_REQUESTS, units).await?,
                    pricer.metered(TIER_COMPUTE, gb_hours).await?,
                ]
            }
            ServiceType::ApiGateway => {
                let units = get(Dimension::RequestsPerMonth)? / REQUESTS_PER_UNIT;
                vec![pricer.metered(TIER_REQUESTS, units).await?]
            }
            ServiceType::Etl => {
                let worker_hours = get(Dimension::Workers)? * HOURS_PER_MONTH as f64;
                vec![pricer.metered(TIER_WORKER, worker_hours).await?]
            }
            ServiceType::DataWarehouse => {
                let storage_gb = get(Dimension::StorageGb)?;
                vec![pricer.metered(TIER_STORAGE, storage_gb).await?]
            }
        };

        Ok(items)
    }
}

/// Catalog reads for one service scope
struct Pricer<'a> {
    catalog: &'a dyn PricingCatalog,
    scope: &'a ServiceScope,
    as_of: NaiveDate,
}

impl Pricer<'_> {
    async fn select_instance(&self, demand: Demand) -> PricingResult<PricingEntry> {
        let candidates = self.catalog.candidates(self.scope, self.as_of).await?;
        let sized: Vec<PricingEntry> = candidates
            .into_iter()
            .filter(|e| e.capacity.is_some() && e.monthly_price().is_some())
            .collect();

        if sized.is_empty() {
            return Err(PricingError::NotFound(format!(
                "no {} instance types priced at {}/{} as of {}",
                self.scope.service_type, self.scope.provider, self.scope.region, self.as_of
            )));
        }

        sized
            .into_iter()
            .filter(|e| demand.is_met_by(e))
            .min_by(compare_candidates)
            .ok_or_else(|| PricingError::NoMatchingInstance {
                provider: self.scope.provider,
                service_type: self.scope.service_type,
                requested: demand.describe(),
            })
    }

    async fn metered(&self, tier: &str, quantity: f64) -> PricingResult<LineItem> {
        let entry = self.catalog.lookup(&self.scope.key(tier), self.as_of).await?;
        let unit_price = *entry.unit_price().ok_or_else(|| {
            PricingError::NotFound(format!("{} has no price per {}", entry.key, entry.unit))
        })?;

        Ok(LineItem {
            service_type: self.scope.service_type,
            instance_type: entry.key.instance_type,
            unit: entry.unit,
            quantity,
            unit_price,
            subtotal: subtotal(&unit_price, quantity)?,
        })
    }
}

/// `units` of an instance running all month: monthly price when the catalog
/// has one, otherwise 730 hours each
fn always_on(
    service_type: ServiceType,
    entry: &PricingEntry,
    units: f64,
) -> PricingResult<LineItem> {
    let (unit, unit_price, quantity) = match (entry.price_per_month, entry.price_per_hour) {
        (Some(month), _) => (PricingUnit::Month, month, units),
        (None, Some(hour)) => (PricingUnit::Hour, hour, units * HOURS_PER_MONTH as f64),
        (None, None) => {
            return Err(PricingError::NotFound(format!("{} has no price", entry.key)));
        }
    };

    Ok(LineItem {
        service_type,
        instance_type: entry.key.instance_type.clone(),
        unit,
        quantity,
        unit_price,
        subtotal: subtotal(&unit_price, quantity)?,
    })
}

fn subtotal(unit_price: &Money, quantity: f64) -> PricingResult<Money> {
    unit_price.times(quantity).ok_or_else(|| {
        PricingError::InvalidInput(format!(
            "quantity {} at {} is out of range",
            quantity, unit_price
        ))
    })
}
