//! Configuration for the cost API

use core_config::{AppInfo, FromEnv, app_info, env_or_default, env_parse, server::ServerConfig};
use database::postgres::PostgresConfig;
use domain_pricing::PricingServiceConfig;
use std::time::Duration;
use strum::{Display, EnumString};

pub use core_config::Environment;

/// Which store backs the pricing catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CatalogBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub enum CatalogConfig {
    Memory {
        /// Load the bundled sample snapshot at startup
        seed_fixtures: bool,
    },
    Postgres(PostgresConfig),
}

impl CatalogConfig {
    pub fn backend(&self) -> CatalogBackend {
        match self {
            Self::Memory { .. } => CatalogBackend::Memory,
            Self::Postgres(_) => CatalogBackend::Postgres,
        }
    }
}

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub pricing: PricingServiceConfig,
    /// Cron expression of the cache eviction job
    pub cache_eviction_cron: String,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080

        let catalog = match env_parse::<CatalogBackend>("CATALOG_BACKEND", "memory")? {
            CatalogBackend::Memory => CatalogConfig::Memory {
                seed_fixtures: env_parse("SEED_FIXTURES", "true")?,
            },
            // Required - will fail if DATABASE_URL is not set
            CatalogBackend::Postgres => CatalogConfig::Postgres(PostgresConfig::from_env()?),
        };

        let provider_timeout_ms: u64 = env_parse("PROVIDER_TIMEOUT_MS", "2000")?;
        let negative_ttl_secs: u64 = env_parse("NEGATIVE_CACHE_TTL_SECS", "300")?;

        Ok(Self {
            app: app_info!(),
            environment,
            server,
            catalog,
            pricing: PricingServiceConfig {
                provider_timeout: Duration::from_millis(provider_timeout_ms),
                negative_cache_ttl: Duration::from_secs(negative_ttl_secs),
            },
            cache_eviction_cron: env_or_default("CACHE_EVICTION_CRON", "0 0 * * * *"),
        })
    }
}
