//! Sample catalog for `us-east-1` and its Azure/GCP equivalents.
//!
//! Prices are list prices in USD, rounded to catalog precision. Used to seed
//! the in-memory catalog and by tests.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::catalog::PricingCatalog;
use crate::memory::InMemoryPricingCatalog;
use crate::models::{
    CloudProvider, Currency, InstanceCapacity, Money, PricingEntry, PricingUnit, ServiceScope,
    ServiceType,
};
use crate::region::provider_region;

pub const FIXTURE_REGION: &str = "us-east-1";

/// (instance type, vCPUs, memory GB, GPUs, USD per hour)
type Shape = (&'static str, u32, f64, u32, f64);

const AWS_COMPUTE: &[Shape] = &[
    ("t3.small", 2, 2.0, 0, 0.0208),
    ("t3.medium", 2, 4.0, 0, 0.0416),
    ("t3.large", 2, 8.0, 0, 0.0832),
    ("m5.large", 2, 8.0, 0, 0.096),
    ("m5.xlarge", 4, 16.0, 0, 0.192),
    ("c5.xlarge", 4, 8.0, 0, 0.17),
    ("m5.2xlarge", 8, 32.0, 0, 0.384),
    ("m5.4xlarge", 16, 64.0, 0, 0.768),
    ("g4dn.xlarge", 4, 16.0, 1, 0.526),
    ("g4dn.12xlarge", 48, 192.0, 4, 3.912),
    ("p3.16xlarge", 64, 488.0, 8, 24.48),
];

const AZURE_COMPUTE: &[Shape] = &[
    ("Standard_B2s", 2, 4.0, 0, 0.0416),
    ("Standard_B2ms", 2, 8.0, 0, 0.0832),
    ("Standard_D2s_v5", 2, 8.0, 0, 0.096),
    ("Standard_D4s_v5", 4, 16.0, 0, 0.192),
    ("Standard_D8s_v5", 8, 32.0, 0, 0.384),
    ("Standard_D16s_v5", 16, 64.0, 0, 0.768),
    ("Standard_NC4as_T4_v3", 4, 28.0, 1, 0.526),
    ("Standard_NC64as_T4_v3", 64, 440.0, 4, 4.352),
    ("Standard_ND96asr_v4", 96, 900.0, 8, 27.197),
];

const GCP_COMPUTE: &[Shape] = &[
    ("e2-small", 2, 2.0, 0, 0.0168),
    ("e2-medium", 2, 4.0, 0, 0.0335),
    ("e2-standard-2", 2, 8.0, 0, 0.067),
    ("e2-standard-4", 4, 16.0, 0, 0.134),
    ("e2-standard-8", 8, 32.0, 0, 0.268),
    ("e2-standard-16", 16, 64.0, 0, 0.536),
    ("g2-standard-4", 4, 16.0, 1, 0.7068),
    ("a2-highgpu-1g", 12, 85.0, 1, 3.67),
    ("a2-highgpu-4g", 48, 340.0, 4, 14.69),
    ("a2-highgpu-8g", 96, 680.0, 8, 29.39),
];

const AWS_DATABASE: &[Shape] = &[
    ("db.t3.micro", 2, 1.0, 0, 0.018),
    ("db.t3.small", 2, 2.0, 0, 0.036),
    ("db.t3.medium", 2, 4.0, 0, 0.072),
    ("db.m5.large", 2, 8.0, 0, 0.178),
    ("db.m5.xlarge", 4, 16.0, 0, 0.356),
];

const AZURE_DATABASE: &[Shape] = &[
    ("B_Standard_B1ms", 1, 2.0, 0, 0.0207),
    ("B_Standard_B2s", 2, 4.0, 0, 0.0828),
    ("GP_Standard_D2s_v3", 2, 8.0, 0, 0.178),
    ("GP_Standard_D4s_v3", 4, 16.0, 0, 0.356),
];

const GCP_DATABASE: &[Shape] = &[
    ("db-f1-micro", 1, 0.6, 0, 0.015),
    ("db-g1-small", 1, 1.7, 0, 0.05),
    ("db-custom-2-7680", 2, 7.5, 0, 0.1341),
    ("db-custom-4-15360", 4, 15.0, 0, 0.2682),
];

/// (service type, tier, unit, AWS, Azure, GCP)
type Tier = (ServiceType, &'static str, PricingUnit, [f64; 3]);

#[rustfmt::skip]
const TIERS: &[Tier] = &[
    (ServiceType::Database, "storage", PricingUnit::GbMonth, [0.115, 0.115, 0.17]),
    (ServiceType::Storage, "standard", PricingUnit::GbMonth, [0.023, 0.0184, 0.020]),
    (ServiceType::NosqlDatabase, "storage", PricingUnit::GbMonth, [0.25, 0.25, 0.18]),
    (ServiceType::NosqlDatabase, "requests", PricingUnit::MillionRequests, [1.25, 0.25, 0.18]),
    (ServiceType::ServerlessFunction, "requests", PricingUnit::MillionRequests, [0.20, 0.20, 0.40]),
    (ServiceType::ServerlessFunction, "compute", PricingUnit::GbHour, [0.06, 0.0576, 0.009]),
    (ServiceType::ApiGateway, "requests", PricingUnit::MillionRequests, [3.50, 3.50, 3.00]),
    (ServiceType::Etl, "worker", PricingUnit::Hour, [0.44, 0.274, 0.2]),
    (ServiceType::DataWarehouse, "storage", PricingUnit::GbMonth, [0.024, 0.023, 0.02]),
];

/// Default effective date of the fixture snapshot
pub fn fixture_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

fn instance(scope: &ServiceScope, shape: &Shape, effective_date: NaiveDate) -> PricingEntry {
    let (name, vcpus, memory_gb, gpus, hourly) = *shape;
    PricingEntry {
        key: scope.key(name),
        unit: PricingUnit::Hour,
        price_per_hour: Some(Money::from_decimal(hourly, Currency::Usd)),
        price_per_month: None,
        currency: Currency::Usd,
        capacity: Some(InstanceCapacity {
            vcpus,
            memory_gb,
            gpus,
        }),
        effective_date,
    }
}

fn tier(
    scope: &ServiceScope,
    name: &str,
    unit: PricingUnit,
    price: f64,
    effective_date: NaiveDate,
) -> PricingEntry {
    let price = Some(Money::from_decimal(price, Currency::Usd));
    let (price_per_hour, price_per_month) = if unit.is_hourly() {
        (price, None)
    } else {
        (None, price)
    };

    PricingEntry {
        key: scope.key(name),
        unit,
        price_per_hour,
        price_per_month,
        currency: Currency::Usd,
        capacity: None,
        effective_date,
    }
}

/// Every fixture entry, effective on `effective_date`
pub fn sample_catalog_entries(effective_date: NaiveDate) -> Vec<PricingEntry> {
    let mut entries = Vec::new();

    for (i, provider) in CloudProvider::ALL.into_iter().enumerate() {
        let region = provider_region(provider, FIXTURE_REGION);
        let scope = |service_type| ServiceScope::new(provider, service_type, region.as_str());

        let (compute, database) = match provider {
            CloudProvider::Aws => (AWS_COMPUTE, AWS_DATABASE),
            CloudProvider::Azure => (AZURE_COMPUTE, AZURE_DATABASE),
            CloudProvider::Gcp => (GCP_COMPUTE, GCP_DATABASE),
        };

        let compute_scope = scope(ServiceType::Compute);
        entries.extend(
            compute
                .iter()
                .map(|s| instance(&compute_scope, s, effective_date)),
        );

        let database_scope = scope(ServiceType::Database);
        entries.extend(
            database
                .iter()
                .map(|s| instance(&database_scope, s, effective_date)),
        );

        for (service_type, name, unit, prices) in TIERS {
            let scope = scope(*service_type);
            entries.push(tier(&scope, name, *unit, prices[i], effective_date));
        }
    }

    entries
}

/// In-memory catalog loaded with the fixture entries
pub async fn sample_catalog(effective_date: NaiveDate) -> Arc<dyn PricingCatalog> {
    let catalog = InMemoryPricingCatalog::new();
    // A fresh catalog cannot hold duplicates, so the report is always clean
    let _ = catalog.ingest(sample_catalog_entries(effective_date)).await;
    Arc::new(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::validate_entries;

    #[test]
    fn test_fixture_entries_are_well_formed() {
        let entries = sample_catalog_entries(fixture_date());
        assert!(validate_entries(&entries).is_ok());
        assert_eq!(
            entries.len(),
            AWS_COMPUTE.len()
                + AZURE_COMPUTE.len()
                + GCP_COMPUTE.len()
                + AWS_DATABASE.len()
                + AZURE_DATABASE.len()
                + GCP_DATABASE.len()
                + TIERS.len() * 3
        );
    }

    #[tokio::test]
    async fn test_fixture_regions_follow_region_map() {
        let catalog = sample_catalog(fixture_date()).await;
        let scope = ServiceScope::new(CloudProvider::Azure, ServiceType::Storage, "eastus");
        let entry = catalog
            .lookup(&scope.key("standard"), fixture_date())
            .await
            .unwrap();
        assert_eq!(
            entry.price_per_month,
            Some(Money::from_decimal(0.0184, Currency::Usd))
        );
    }
}
