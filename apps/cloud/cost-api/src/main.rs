//! Cloud Cost API
//!
//! Compares the monthly cost of infrastructure templates across AWS, Azure
//! and GCP. Runs as an HTTP server or as one-shot CLI commands against the
//! configured catalog.

use axum::middleware;
use axum_helpers::server::{create_production_app, health_router};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_pricing::{
    ClientInfo, CompareRequest, PricingEntry, PricingError, TemplateCategory,
};
use eyre::{Result, WrapErr};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

mod api;
mod config;
mod openapi;
mod scheduler;
mod state;

use config::{CatalogBackend, Config};
use state::AppState;

#[derive(Parser)]
#[command(name = "cloud-cost-api")]
#[command(about = "Compare cloud infrastructure costs across AWS, Azure, and GCP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,

    /// Load a pricing snapshot batch into the catalog
    Ingest {
        /// JSON file holding an array of entries or `{"entries": [...]}`
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Compare a template across providers and print the result
    Compare {
        /// Template id
        #[arg(short, long)]
        template: i64,

        /// Region in any provider's naming (us-east-1, eastus, us-east1)
        #[arg(short, long, default_value = "us-east-1")]
        region: String,

        /// Overrides as a JSON object, e.g. '{"vcpus": 4}'
        #[arg(short, long)]
        config: Option<String>,

        /// Price date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// List active templates
    Templates {
        /// WEB_APP, DATA_PIPELINE, SERVERLESS or ML_INFERENCE
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    // --help and usage errors must not depend on the environment
    let cli = Cli::parse();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);

    // Initialize metrics
    observability::init_metrics();

    if matches!(cli.command, Commands::Ingest { .. }) {
        ensure_persistent(config.catalog.backend())?;
    }

    let state = AppState::build(config).await?;

    match cli.command {
        Commands::Serve => serve(state).await?,

        Commands::Ingest { file } => {
            let entries = read_entries(&file)?;
            info!(
                entries = entries.len(),
                file = %file.display(),
                "Ingesting snapshot batch"
            );

            match state.service.ingest(entries).await {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(PricingError::DuplicateSnapshot(report)) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    eyre::bail!("{} entries rejected as duplicates", report.rejected.len());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Compare {
            template,
            region,
            config,
            as_of,
        } => {
            let request = CompareRequest {
                template_id: template,
                region,
                configuration: parse_overrides(config.as_deref())?,
                as_of,
            };
            let response = state
                .service
                .compare(request, ClientInfo::default())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Templates { category } => {
            let category = category
                .map(|c| {
                    serde_json::from_value::<TemplateCategory>(Value::String(c.to_uppercase()))
                })
                .transpose()
                .wrap_err("unknown template category")?;
            let templates = state.service.list_templates(category).await?;
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
    }

    Ok(())
}

async fn serve(state: AppState) -> Result<()> {
    let mut eviction = scheduler::start_cache_eviction(
        state.service.cache().clone(),
        &state.config.cache_eviction_cron,
    )
    .await?;

    // Build router with API routes
    let api_routes = api::routes(&state);

    // create_router adds docs/middleware to our composed routes
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    // - /health: liveness check with app name/version
    // - /ready: catalog backend ping
    // - /metrics: Prometheus exposition
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::ops_router(state.clone()))
        .layer(middleware::from_fn(observability::metrics_middleware));

    info!(backend = %state.config.catalog.backend(), "Starting cloud cost API");

    let db = state.db.clone();
    create_production_app(app, &state.config.server, async move {
        if let Err(e) = eviction.shutdown().await {
            tracing::error!("Error stopping cache eviction job: {}", e);
        }
        if let Some(db) = db {
            axum_helpers::close_postgres(db, "catalog").await;
        }
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Cloud cost API shutdown complete");
    Ok(())
}

/// A one-shot ingest into the memory catalog would vanish with the process
fn ensure_persistent(backend: CatalogBackend) -> Result<()> {
    match backend {
        CatalogBackend::Postgres => Ok(()),
        CatalogBackend::Memory => eyre::bail!(
            "ingest needs a persistent catalog; set CATALOG_BACKEND=postgres \
             (the memory catalog is discarded when this command exits)"
        ),
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Batch { entries: Vec<PricingEntry> },
    Entries(Vec<PricingEntry>),
}

fn read_entries(path: &Path) -> Result<Vec<PricingEntry>> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let file: SnapshotFile = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("{} is not a snapshot batch", path.display()))?;

    Ok(match file {
        SnapshotFile::Batch { entries } | SnapshotFile::Entries(entries) => entries,
    })
}

fn parse_overrides(raw: Option<&str>) -> Result<Map<String, Value>> {
    match raw {
        None => Ok(Map::new()),
        Some(raw) => {
            let value: Value =
                serde_json::from_str(raw).wrap_err("--config is not valid JSON")?;
            match value {
                Value::Object(map) => Ok(map),
                other => eyre::bail!("--config must be a JSON object, got {}", other),
            }
        }
    }
}
