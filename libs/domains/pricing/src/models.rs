use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Hours in a billing month, as every provider prices always-on resources
pub const HOURS_PER_MONTH: i64 = 730;

/// Scale of costed amounts (subtotals, totals, savings)
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Finest scale accepted for catalog prices and quantities
pub const MAX_PRICE_SCALE: u32 = 6;

// Largest quantity, at MAX_PRICE_SCALE, that `Money::times` accepts
const MAX_SCALED_QUANTITY: f64 = i64::MAX as f64;

/// Cloud provider. Declaration order is the tie-break precedence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CloudProvider {
    #[sea_orm(string_value = "aws")]
    Aws,
    #[sea_orm(string_value = "azure")]
    Azure,
    #[sea_orm(string_value = "gcp")]
    Gcp,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 3] = [Self::Aws, Self::Azure, Self::Gcp];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Azure => "Azure",
            Self::Gcp => "GCP",
        }
    }
}

/// Kind of managed service a template section prices
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceType {
    #[sea_orm(string_value = "compute")]
    Compute,
    #[sea_orm(string_value = "database")]
    Database,
    #[sea_orm(string_value = "nosql_database")]
    NosqlDatabase,
    #[sea_orm(string_value = "storage")]
    Storage,
    #[sea_orm(string_value = "serverless_function")]
    ServerlessFunction,
    #[sea_orm(string_value = "api_gateway")]
    ApiGateway,
    #[sea_orm(string_value = "etl")]
    Etl,
    #[sea_orm(string_value = "data_warehouse")]
    DataWarehouse,
}

impl ServiceType {
    pub const ALL: [ServiceType; 8] = [
        Self::Compute,
        Self::Database,
        Self::NosqlDatabase,
        Self::Storage,
        Self::ServerlessFunction,
        Self::ApiGateway,
        Self::Etl,
        Self::DataWarehouse,
    ];

    /// Catalog service name of this service type at `provider`
    pub fn service_name(&self, provider: CloudProvider) -> &'static str {
        use CloudProvider::*;
        match (self, provider) {
            (Self::Compute, Aws) => "EC2",
            (Self::Compute, Azure) => "Virtual Machines",
            (Self::Compute, Gcp) => "Compute Engine",
            (Self::Database, Aws) => "RDS PostgreSQL",
            (Self::Database, Azure) => "Database for PostgreSQL",
            (Self::Database, Gcp) => "Cloud SQL PostgreSQL",
            (Self::NosqlDatabase, Aws) => "DynamoDB",
            (Self::NosqlDatabase, Azure) => "Cosmos DB",
            (Self::NosqlDatabase, Gcp) => "Firestore",
            (Self::Storage, Aws) => "S3",
            (Self::Storage, Azure) => "Blob Storage",
            (Self::Storage, Gcp) => "Cloud Storage",
            (Self::ServerlessFunction, Aws) => "Lambda",
            (Self::ServerlessFunction, Azure) => "Functions",
            (Self::ServerlessFunction, Gcp) => "Cloud Functions",
            (Self::ApiGateway, Aws) => "API Gateway",
            (Self::ApiGateway, Azure) => "API Management",
            (Self::ApiGateway, Gcp) => "API Gateway",
            (Self::Etl, Aws) => "Glue",
            (Self::Etl, Azure) => "Data Factory",
            (Self::Etl, Gcp) => "Dataflow",
            (Self::DataWarehouse, Aws) => "Redshift",
            (Self::DataWarehouse, Azure) => "Synapse Analytics",
            (Self::DataWarehouse, Gcp) => "BigQuery",
        }
    }
}

/// A sizing dimension of a resource requirement
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Dimension {
    Vcpus,
    MemoryGb,
    Gpus,
    Instances,
    StorageGb,
    SizeGb,
    Workers,
    MemoryMb,
    RequestsPerMonth,
    AvgDurationMs,
}

impl Dimension {
    pub const ALL: [Dimension; 10] = [
        Self::Vcpus,
        Self::MemoryGb,
        Self::Gpus,
        Self::Instances,
        Self::StorageGb,
        Self::SizeGb,
        Self::Workers,
        Self::MemoryMb,
        Self::RequestsPerMonth,
        Self::AvgDurationMs,
    ];

    /// Suffix used in template keys, e.g. `Vcpus` in `defaultVcpus`
    pub fn key_suffix(&self) -> &'static str {
        match self {
            Self::Vcpus => "Vcpus",
            Self::MemoryGb => "MemoryGb",
            Self::Gpus => "Gpus",
            Self::Instances => "Instances",
            Self::StorageGb => "StorageGb",
            Self::SizeGb => "SizeGb",
            Self::Workers => "Workers",
            Self::MemoryMb => "MemoryMb",
            Self::RequestsPerMonth => "RequestsPerMonth",
            Self::AvgDurationMs => "AvgDurationMs",
        }
    }

    pub fn from_key_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key_suffix() == suffix)
    }
}

/// What one priced unit of a catalog entry is
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PricingUnit {
    #[sea_orm(string_value = "hour")]
    Hour,
    #[sea_orm(string_value = "month")]
    Month,
    #[sea_orm(string_value = "gb_month")]
    GbMonth,
    #[sea_orm(string_value = "gb_hour")]
    GbHour,
    #[sea_orm(string_value = "million_requests")]
    MillionRequests,
}

impl PricingUnit {
    /// Hourly units read `pricePerHour`; the others read `pricePerMonth`
    pub fn is_hourly(&self) -> bool {
        matches!(self, Self::Hour | Self::GbHour)
    }
}

/// Currency enumeration
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    #[sea_orm(string_value = "USD")]
    Usd,
    #[sea_orm(string_value = "EUR")]
    Eur,
    #[sea_orm(string_value = "GBP")]
    Gbp,
}

/// Money as a scaled integer: `amount / 10^decimal_places`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub amount: i64,
    pub currency: Currency,
    pub decimal_places: u32,
}

impl Money {
    /// Amount in minor units (cents for USD)
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self::with_scale(amount, MINOR_UNIT_SCALE, currency)
    }

    pub fn with_scale(amount: i64, decimal_places: u32, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            decimal_places,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Money from a decimal value such as `0.0416`, kept at catalog precision
    pub fn from_decimal(value: f64, currency: Currency) -> Self {
        let scaled = round_half_away(value * 10f64.powi(MAX_PRICE_SCALE as i32));
        Self::with_scale(scaled as i64, MAX_PRICE_SCALE, currency).normalized()
    }

    pub fn to_decimal(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimal_places as i32)
    }

    /// Strip trailing zero digits down to the minor-unit scale
    pub fn normalized(mut self) -> Self {
        while self.decimal_places > MINOR_UNIT_SCALE && self.amount % 10 == 0 {
            self.amount /= 10;
            self.decimal_places -= 1;
        }
        self
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// `self × quantity`, rounded half away from zero to minor units.
    ///
    /// The quantity is first fixed to six decimal places; everything after
    /// that is integer arithmetic. `None` when the quantity is not finite or
    /// the product does not fit in an `i64` of minor units.
    pub fn times(&self, quantity: f64) -> Option<Money> {
        let quantity_scaled = round_half_away(quantity * 10f64.powi(MAX_PRICE_SCALE as i32));
        if !quantity_scaled.is_finite() || quantity_scaled.abs() > MAX_SCALED_QUANTITY {
            return None;
        }

        let product = (self.amount as i128).checked_mul(quantity_scaled as i128)?;
        let cents = rescale(product, self.decimal_places + MAX_PRICE_SCALE, MINOR_UNIT_SCALE);
        i64::try_from(cents)
            .ok()
            .map(|cents| Money::new(cents, self.currency))
    }

    /// Comparable value at catalog precision
    pub fn scaled_to(&self, decimal_places: u32) -> i128 {
        rescale(self.amount as i128, self.decimal_places, decimal_places)
    }

    /// Sum at the finer of both scales; `None` on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Option<Money> {
        self.combine(other, |a, b| a + b)
    }

    pub fn checked_sub(&self, other: &Money) -> Option<Money> {
        self.combine(other, |a, b| a - b)
    }

    fn combine(&self, other: &Money, op: impl Fn(i128, i128) -> i128) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        let scale = self.decimal_places.max(other.decimal_places);
        let value = op(self.scaled_to(scale), other.scaled_to(scale));
        Some(Money::with_scale(saturate(value), scale, self.currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let divisor = 10i64.pow(self.decimal_places);
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        if self.decimal_places == 0 {
            return write!(f, "{}{} {}", sign, abs, self.currency);
        }
        write!(
            f,
            "{}{}.{:0width$} {}",
            sign,
            abs / divisor as u64,
            abs % divisor as u64,
            self.currency,
            width = self.decimal_places as usize
        )
    }
}

fn round_half_away(value: f64) -> f64 {
    // f64::round already rounds half away from zero
    value.round()
}

/// Change scale of a fixed-point value, rounding half away from zero when
/// digits are dropped.
fn rescale(value: i128, from: u32, to: u32) -> i128 {
    if to >= from {
        return value * 10i128.pow(to - from);
    }
    let divisor = 10i128.pow(from - to);
    let quotient = value / divisor;
    let remainder = value % divisor;
    if remainder.abs() * 2 >= divisor {
        quotient + value.signum()
    } else {
        quotient
    }
}

fn saturate(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Identity of a priced item in the catalog and the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingKey {
    pub provider: CloudProvider,
    pub service_type: ServiceType,
    pub service_name: String,
    pub region: String,
    /// Instance type (`t3.medium`) or metered tier (`storage`, `requests`)
    pub instance_type: String,
}

impl PricingKey {
    pub fn scope(&self) -> ServiceScope {
        ServiceScope {
            provider: self.provider,
            service_type: self.service_type,
            service_name: self.service_name.clone(),
            region: self.region.clone(),
        }
    }
}

impl fmt::Display for PricingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.provider, self.service_name, self.region, self.instance_type
        )
    }
}

/// All instance types of one service in one region
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceScope {
    pub provider: CloudProvider,
    pub service_type: ServiceType,
    pub service_name: String,
    pub region: String,
}

impl ServiceScope {
    pub fn new(
        provider: CloudProvider,
        service_type: ServiceType,
        region: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            service_type,
            service_name: service_type.service_name(provider).to_string(),
            region: region.into(),
        }
    }

    pub fn key(&self, instance_type: impl Into<String>) -> PricingKey {
        PricingKey {
            provider: self.provider,
            service_type: self.service_type,
            service_name: self.service_name.clone(),
            region: self.region.clone(),
            instance_type: instance_type.into(),
        }
    }

    pub fn contains(&self, key: &PricingKey) -> bool {
        self.provider == key.provider
            && self.service_type == key.service_type
            && self.service_name == key.service_name
            && self.region == key.region
    }
}

/// Hardware shape of an instance-type entry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceCapacity {
    pub vcpus: u32,
    pub memory_gb: f64,
    #[serde(default)]
    pub gpus: u32,
}

/// One price snapshot. Never mutated once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingEntry {
    #[serde(flatten)]
    pub key: PricingKey,
    pub unit: PricingUnit,
    pub price_per_hour: Option<Money>,
    pub price_per_month: Option<Money>,
    #[serde(default)]
    pub currency: Currency,
    pub capacity: Option<InstanceCapacity>,
    pub effective_date: NaiveDate,
}

impl PricingEntry {
    /// Price of one `unit`.
    pub fn unit_price(&self) -> Option<&Money> {
        if self.unit.is_hourly() {
            self.price_per_hour.as_ref()
        } else {
            self.price_per_month.as_ref()
        }
    }

    /// Monthly cost of one always-on unit at catalog precision.
    pub fn monthly_price(&self) -> Option<i128> {
        match (&self.price_per_month, &self.price_per_hour) {
            (Some(month), _) => Some(month.scaled_to(MAX_PRICE_SCALE)),
            (None, Some(hour)) => Some(hour.scaled_to(MAX_PRICE_SCALE) * HOURS_PER_MONTH as i128),
            (None, None) => None,
        }
    }

    /// Reasons this entry cannot be ingested, if any.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (field, value) in [
            ("serviceName", &self.key.service_name),
            ("region", &self.key.region),
            ("instanceType", &self.key.instance_type),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{} must not be empty", field));
            }
        }

        if self.price_per_hour.is_none() && self.price_per_month.is_none() {
            problems.push("one of pricePerHour or pricePerMonth is required".to_string());
        }

        for (field, price) in [
            ("pricePerHour", &self.price_per_hour),
            ("pricePerMonth", &self.price_per_month),
        ] {
            let Some(price) = price else { continue };
            if price.is_negative() {
                problems.push(format!("{} must not be negative", field));
            }
            if price.decimal_places > MAX_PRICE_SCALE {
                problems.push(format!(
                    "{} has more than {} decimal places",
                    field, MAX_PRICE_SCALE
                ));
            }
            if price.currency != self.currency {
                problems.push(format!(
                    "{} is in {} but the entry is in {}",
                    field, price.currency, self.currency
                ));
            }
        }

        problems
    }
}

/// One priced dimension of one provider's estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub service_type: ServiceType,
    pub instance_type: String,
    pub unit: PricingUnit,
    pub quantity: f64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Monthly estimate of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub provider: CloudProvider,
    pub line_items: Vec<LineItem>,
    pub total_monthly_cost: Money,
    /// Subtotal per service type
    pub breakdown: BTreeMap<ServiceType, Money>,
    pub currency: Currency,
}

impl CostEstimate {
    /// Sum line items into a total. `None` if an item is in another currency.
    pub fn from_line_items(
        provider: CloudProvider,
        currency: Currency,
        line_items: Vec<LineItem>,
    ) -> Option<Self> {
        let mut total = Money::zero(currency);
        let mut breakdown: BTreeMap<ServiceType, Money> = BTreeMap::new();

        for item in &line_items {
            total = total.checked_add(&item.subtotal)?;
            let slot = breakdown
                .entry(item.service_type)
                .or_insert_with(|| Money::zero(currency));
            *slot = slot.checked_add(&item.subtotal)?;
        }

        Some(Self {
            provider,
            line_items,
            total_monthly_cost: total,
            breakdown,
            currency,
        })
    }
}

/// Outcome of estimating one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderEstimate {
    Available {
        estimate: CostEstimate,
    },
    Unavailable {
        provider: CloudProvider,
        /// Machine-readable cause, e.g. `no_matching_instance`
        kind: String,
        reason: String,
    },
}

impl ProviderEstimate {
    pub fn provider(&self) -> CloudProvider {
        match self {
            Self::Available { estimate } => estimate.provider,
            Self::Unavailable { provider, .. } => *provider,
        }
    }

    pub fn estimate(&self) -> Option<&CostEstimate> {
        match self {
            Self::Available { estimate } => Some(estimate),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn total(&self) -> Option<Money> {
        self.estimate().map(|e| e.total_monthly_cost)
    }
}

/// Side-by-side monthly estimates for one requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub region: String,
    pub as_of: NaiveDate,
    pub currency: Currency,
    /// One per provider, in AWS, Azure, GCP order
    pub estimates: Vec<ProviderEstimate>,
    pub cheapest_provider: Option<CloudProvider>,
    pub max_savings: Option<Money>,
}

impl ComparisonResult {
    pub fn available(&self) -> impl Iterator<Item = &CostEstimate> {
        self.estimates.iter().filter_map(ProviderEstimate::estimate)
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &ProviderEstimate> {
        self.estimates.iter().filter(|e| e.estimate().is_none())
    }

    pub fn estimate_for(&self, provider: CloudProvider) -> Option<&ProviderEstimate> {
        self.estimates.iter().find(|e| e.provider() == provider)
    }
}

/// Outcome of a snapshot batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEntry {
    pub key: PricingKey,
    pub effective_date: NaiveDate,
    pub reason: String,
}

impl RejectedEntry {
    pub fn duplicate(entry: &PricingEntry) -> Self {
        Self {
            key: entry.key.clone(),
            effective_date: entry.effective_date,
            reason: "snapshot already exists for this key and date".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    BelowMin,
    AboveMax,
    Negative,
    NotNumeric,
}

/// One override that breaks a template bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub service_type: ServiceType,
    pub dimension: Dimension,
    pub kind: ViolationKind,
    #[schema(value_type = Object)]
    pub value: Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub message: String,
}

/// Dimension values of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceRequirement {
    pub dimensions: BTreeMap<Dimension, f64>,
}

impl ServiceRequirement {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.dimensions.get(&dimension).copied()
    }

    pub fn with(mut self, dimension: Dimension, value: f64) -> Self {
        self.dimensions.insert(dimension, value);
        self
    }
}

/// Validated, provider-agnostic sizing of every service in a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRequirement {
    pub services: BTreeMap<ServiceType, ServiceRequirement>,
}

impl ResourceRequirement {
    pub fn service(&self, service_type: ServiceType) -> Option<&ServiceRequirement> {
        self.services.get(&service_type)
    }

    pub fn with_service(
        mut self,
        service_type: ServiceType,
        requirement: ServiceRequirement,
    ) -> Self {
        self.services.insert(service_type, requirement);
        self
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateCategory {
    WebApp,
    DataPipeline,
    Serverless,
    MlInference,
}

/// Infrastructure template with its schema-less sizing config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    #[schema(value_type = Object)]
    pub config: Value,
    pub active: bool,
}

/// Request metadata kept for audit and history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Persisted summary of one comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRecord {
    pub id: Uuid,
    pub template_id: i64,
    pub region: String,
    #[schema(value_type = Object)]
    pub overrides: Value,
    pub as_of: NaiveDate,
    /// Totals of the providers that produced an estimate
    pub totals: BTreeMap<CloudProvider, Money>,
    pub cheapest_provider: Option<CloudProvider>,
    pub max_savings: Option<Money>,
    pub complete: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ComparisonRecord {
    pub fn new(
        template_id: i64,
        overrides: &Map<String, Value>,
        result: &ComparisonResult,
        complete: bool,
        client: &ClientInfo,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            template_id,
            region: result.region.clone(),
            overrides: Value::Object(overrides.clone()),
            as_of: result.as_of,
            totals: result
                .available()
                .map(|e| (e.provider, e.total_monthly_cost))
                .collect(),
            cheapest_provider: result.cheapest_provider,
            max_savings: result.max_savings,
            complete,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Request / response DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    #[validate(range(min = 1))]
    pub template_id: i64,
    /// Canonical (`us-east-1`) or provider-native region code
    #[validate(length(min = 1, max = 50))]
    pub region: String,
    /// Overrides, nested per section or flat
    #[serde(default)]
    #[schema(value_type = Object)]
    pub configuration: Map<String, Value>,
    /// Price date; defaults to today
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    /// History id; absent when the comparison could not be recorded
    pub calculation_id: Option<Uuid>,
    /// False when fewer than two providers could be estimated
    pub complete: bool,
    pub warning: Option<String>,
    pub comparison: ComparisonResult,
}

impl ComparisonResponse {
    pub fn complete(calculation_id: Option<Uuid>, comparison: ComparisonResult) -> Self {
        Self {
            calculation_id,
            complete: true,
            warning: None,
            comparison,
        }
    }

    /// Partial response naming every provider that could not be estimated
    pub fn incomplete(calculation_id: Option<Uuid>, comparison: ComparisonResult) -> Self {
        let missing: Vec<String> = comparison
            .estimates
            .iter()
            .filter_map(|e| match e {
                ProviderEstimate::Unavailable {
                    provider, reason, ..
                } => Some(format!("{} ({})", provider.label(), reason)),
                ProviderEstimate::Available { .. } => None,
            })
            .collect();

        Self {
            calculation_id,
            complete: false,
            warning: Some(format!(
                "Comparison incomplete; unavailable: {}",
                missing.join(", ")
            )),
            comparison,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[validate(length(min = 1, max = 10000))]
    pub entries: Vec<PricingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LookupQuery {
    pub provider: CloudProvider,
    pub service_type: ServiceType,
    /// Defaults to the provider's name for the service type
    pub service_name: Option<String>,
    pub region: String,
    pub instance_type: String,
    pub as_of: Option<NaiveDate>,
}

impl LookupQuery {
    pub fn key(&self) -> PricingKey {
        PricingKey {
            provider: self.provider,
            service_type: self.service_type,
            service_name: self
                .service_name
                .clone()
                .unwrap_or_else(|| self.service_type.service_name(self.provider).to_string()),
            region: self.region.clone(),
            instance_type: self.instance_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TemplateQuery {
    pub category: Option<TemplateCategory>,
}

// ============================================================================
// Comparison analytics
// ============================================================================

/// Rows returned by a history listing when no limit is given
pub const DEFAULT_HISTORY_LIMIT: u64 = 100;

/// Window of the popular-templates ranking when no start is given
pub const DEFAULT_POPULARITY_WINDOW_DAYS: i64 = 30;

/// Comparisons served for one template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePopularity {
    pub template_id: i64,
    pub comparisons: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RecentHistoryQuery {
    /// Newest records to return (default 100)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryCountQuery {
    /// Inclusive start (RFC 3339)
    pub from: DateTime<Utc>,
    /// Inclusive end (RFC 3339)
    pub to: DateTime<Utc>,
}

/// Comparisons recorded in `[from, to]`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCount {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub comparisons: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PopularTemplatesQuery {
    /// Start of the window (RFC 3339); defaults to 30 days ago
    pub since: Option<DateTime<Utc>>,
}
