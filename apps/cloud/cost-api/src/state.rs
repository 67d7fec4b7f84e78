//! Application state management.
//!
//! The state holds the configuration, the pricing service and, for the
//! `postgres` backend, the connection pool that has to be closed on shutdown.

use database::postgres::{DatabaseConnection, connect_from_config, run_migrations};
use domain_pricing::fixtures::{fixture_date, sample_catalog_entries};
use domain_pricing::{
    ComparisonHistory, InMemoryComparisonHistory, InMemoryPricingCatalog, InMemoryTemplateStore,
    PgComparisonHistory, PgPricingCatalog, PricingCatalog, PricingService,
};
use migration::Migrator;
use std::sync::Arc;
use tracing::info;

use crate::config::{CatalogConfig, Config};

/// Shared application state.
///
/// Cloning is cheap: the service shares its cache and stores through `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: Config,
    pub service: PricingService,
    /// PostgreSQL pool, present for the `postgres` backend only
    pub db: Option<DatabaseConnection>,
}

impl AppState {
    /// Connect the configured catalog backend and wire the pricing service.
    pub async fn build(config: Config) -> eyre::Result<Self> {
        let (catalog, history, db): (
            Arc<dyn PricingCatalog>,
            Arc<dyn ComparisonHistory>,
            Option<DatabaseConnection>,
        ) = match &config.catalog {
            CatalogConfig::Memory { seed_fixtures } => {
                let catalog = InMemoryPricingCatalog::new();
                if *seed_fixtures {
                    let report = catalog.ingest(sample_catalog_entries(fixture_date())).await?;
                    info!(
                        accepted = report.accepted,
                        "Seeded in-memory catalog with fixtures"
                    );
                }
                (
                    Arc::new(catalog),
                    Arc::new(InMemoryComparisonHistory::new()),
                    None,
                )
            }
            CatalogConfig::Postgres(pg) => {
                info!("Connecting to database...");
                let db = connect_from_config(pg.clone())
                    .await
                    .map_err(|e| eyre::eyre!("Database connection failed: {}", e))?;
                run_migrations::<Migrator>(&db, config.app.name).await?;
                (
                    Arc::new(PgPricingCatalog::new(db.clone())),
                    Arc::new(PgComparisonHistory::new(db.clone())),
                    Some(db),
                )
            }
        };

        info!(backend = %config.catalog.backend(), "Pricing catalog ready");

        let service = PricingService::new(
            catalog,
            Arc::new(InMemoryTemplateStore::builtin()),
            history,
            config.pricing,
        );

        Ok(Self {
            config,
            service,
            db,
        })
    }
}
