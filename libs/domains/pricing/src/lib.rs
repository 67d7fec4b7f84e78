//! Pricing Domain
//!
//! Multi-provider cloud cost estimation: a dated price catalog, per-provider
//! cost models, template resolution and side-by-side comparison.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │     Service      │  ← templates, history analytics, metrics
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ Resolver/Engine  │  ← template → requirement → 3 concurrent estimates
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │    Cost Model    │  ← instance selection, metered tiers
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │  Catalog Cache   │  ← read-through, expires at local midnight
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │     Catalog      │  ← append-only snapshots (memory / Postgres)
//! └──────────────────┘
//! ```

pub mod cache;
pub mod catalog;
pub mod cost_model;
pub mod engine;
pub mod entity;
pub mod error;
pub mod fixtures;
pub mod handlers;
pub mod history;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod region;
pub mod resolver;
pub mod service;
pub mod templates;

// Re-export commonly used types
pub use cache::{CacheStats, CatalogCache, Clock, ManualClock, SystemClock};
pub use catalog::PricingCatalog;
pub use cost_model::CostModel;
pub use engine::ComparisonEngine;
pub use error::{PricingError, PricingResult};
pub use history::{ComparisonHistory, InMemoryComparisonHistory, PgComparisonHistory};
pub use memory::InMemoryPricingCatalog;
pub use models::{
    ClientInfo, CloudProvider, CompareRequest, ComparisonRecord, ComparisonResponse,
    ComparisonResult, Currency, HistoryCount, IngestReport, Money, PricingEntry, PricingKey,
    ResourceRequirement, Template, TemplateCategory, TemplatePopularity,
};
pub use postgres::PgPricingCatalog;
pub use service::{PricingService, PricingServiceConfig};
pub use templates::{InMemoryTemplateStore, TemplateStore};
