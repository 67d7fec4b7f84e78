//! HTTP handlers for the pricing domain

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{
    AuditEvent, AuditOutcome, ClientContext, ValidatedJson,
    errors::responses::{
        BadRequestValidationResponse, ConflictResponse, InternalServerErrorResponse,
        NotFoundResponse, UnprocessableEntityResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::PricingResult;
use crate::models::{
    ClientInfo, CloudProvider, CompareRequest, ComparisonRecord, ComparisonResponse,
    ComparisonResult, CostEstimate, Currency, Dimension, HistoryCount, HistoryCountQuery,
    IngestReport, IngestRequest, InstanceCapacity, LineItem, LookupQuery, Money,
    PopularTemplatesQuery, PricingEntry, PricingKey, PricingUnit, ProviderEstimate,
    RecentHistoryQuery, RejectedEntry, ServiceType, Template, TemplateCategory, TemplatePopularity,
    TemplateQuery, Violation, ViolationKind,
};
use crate::service::PricingService;

const PRICING_TAG: &str = "pricing";
const TEMPLATES_TAG: &str = "templates";

/// OpenAPI documentation for the cost comparison API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_templates,
        get_template,
        compare,
        ingest_snapshot,
        lookup_entry,
        recent_history,
        count_history,
        popular_templates,
    ),
    components(
        schemas(
            Template,
            TemplateCategory,
            CompareRequest,
            ComparisonResponse,
            ComparisonResult,
            ProviderEstimate,
            CostEstimate,
            LineItem,
            Money,
            Currency,
            CloudProvider,
            ServiceType,
            PricingUnit,
            Dimension,
            Violation,
            ViolationKind,
            IngestRequest,
            IngestReport,
            RejectedEntry,
            PricingEntry,
            PricingKey,
            InstanceCapacity,
            ComparisonRecord,
            HistoryCount,
            TemplatePopularity,
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            UnprocessableEntityResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = PRICING_TAG, description = "Multi-provider cost comparison and price catalog"),
        (name = TEMPLATES_TAG, description = "Infrastructure templates")
    )
)]
pub struct ApiDoc;

/// Create the pricing router with all HTTP endpoints
pub fn router(service: PricingService) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/templates", get(list_templates))
        .route("/templates/{id}", get(get_template))
        .route("/pricing/compare", post(compare))
        .route("/pricing/snapshots", post(ingest_snapshot))
        .route("/pricing/entries", get(lookup_entry))
        .route("/pricing/history", get(recent_history))
        .route("/pricing/history/count", get(count_history))
        .route("/pricing/history/popular", get(popular_templates))
        .with_state(shared_service)
}

/// List active templates
#[utoipa::path(
    get,
    path = "/templates",
    tag = TEMPLATES_TAG,
    params(TemplateQuery),
    responses(
        (status = 200, description = "Active templates", body = Vec<Template>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_templates(
    State(service): State<Arc<PricingService>>,
    Query(query): Query<TemplateQuery>,
) -> PricingResult<Json<Vec<Template>>> {
    let templates = service.list_templates(query.category).await?;
    Ok(Json(templates))
}

/// Get a template by id
#[utoipa::path(
    get,
    path = "/templates/{id}",
    tag = TEMPLATES_TAG,
    params(
        ("id" = i64, Path, description = "Template id")
    ),
    responses(
        (status = 200, description = "Template found", body = Template),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_template(
    State(service): State<Arc<PricingService>>,
    Path(id): Path<i64>,
) -> PricingResult<Json<Template>> {
    let template = service.get_template(id).await?;
    Ok(Json(template))
}

/// Compare the monthly cost of a template across AWS, Azure and GCP
///
/// Partial comparisons (fewer than two providers priced) still return 200,
/// with `complete: false` and a warning.
#[utoipa::path(
    post,
    path = "/pricing/compare",
    tag = PRICING_TAG,
    request_body = CompareRequest,
    responses(
        (status = 200, description = "Comparison result", body = ComparisonResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 422, response = UnprocessableEntityResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn compare(
    State(service): State<Arc<PricingService>>,
    caller: ClientContext,
    ValidatedJson(request): ValidatedJson<CompareRequest>,
) -> PricingResult<Json<ComparisonResponse>> {
    let client = ClientInfo {
        ip_address: caller.ip_address,
        user_agent: caller.user_agent,
    };
    let resource = format!("template:{}", request.template_id);

    let result = service.compare(request, client.clone()).await;

    let outcome = match &result {
        Ok(response) if response.complete => AuditOutcome::Success,
        Ok(_) => AuditOutcome::Partial,
        Err(_) => AuditOutcome::Failure,
    };
    let mut event = AuditEvent::new("pricing.compare", Some(resource), outcome)
        .with_ip(client.ip_address)
        .with_user_agent(client.user_agent);
    if let Err(e) = &result {
        event = event.with_details(serde_json::json!({ "error": e.kind() }));
    }
    event.log();

    Ok(Json(result?))
}

/// Append a pricing snapshot batch to the catalog
#[utoipa::path(
    post,
    path = "/pricing/snapshots",
    tag = PRICING_TAG,
    request_body = IngestRequest,
    responses(
        (status = 201, description = "Batch ingested", body = IngestReport),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn ingest_snapshot(
    State(service): State<Arc<PricingService>>,
    caller: ClientContext,
    ValidatedJson(request): ValidatedJson<IngestRequest>,
) -> PricingResult<impl IntoResponse> {
    let offered = request.entries.len();
    let result = service.ingest(request.entries).await;

    let outcome = match &result {
        Ok(_) => AuditOutcome::Success,
        Err(crate::error::PricingError::DuplicateSnapshot(report)) if report.accepted > 0 => {
            AuditOutcome::Partial
        }
        Err(_) => AuditOutcome::Failure,
    };
    AuditEvent::new("pricing.ingest", None, outcome)
        .with_ip(caller.ip_address)
        .with_user_agent(caller.user_agent)
        .with_details(serde_json::json!({ "entries": offered }))
        .log();

    Ok((StatusCode::CREATED, Json(result?)))
}

/// Look up the catalog entry effective on a date
#[utoipa::path(
    get,
    path = "/pricing/entries",
    tag = PRICING_TAG,
    params(LookupQuery),
    responses(
        (status = 200, description = "Latest entry on or before asOf", body = PricingEntry),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn lookup_entry(
    State(service): State<Arc<PricingService>>,
    Query(query): Query<LookupQuery>,
) -> PricingResult<Json<PricingEntry>> {
    let entry = service.lookup(query).await?;
    Ok(Json(entry))
}

/// Most recent comparisons, newest first
#[utoipa::path(
    get,
    path = "/pricing/history",
    tag = PRICING_TAG,
    params(RecentHistoryQuery),
    responses(
        (status = 200, description = "Recorded comparisons", body = Vec<ComparisonRecord>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn recent_history(
    State(service): State<Arc<PricingService>>,
    Query(query): Query<RecentHistoryQuery>,
) -> PricingResult<Json<Vec<ComparisonRecord>>> {
    let records = service.recent_comparisons(query).await?;
    Ok(Json(records))
}

/// Number of comparisons recorded in a time window
#[utoipa::path(
    get,
    path = "/pricing/history/count",
    tag = PRICING_TAG,
    params(HistoryCountQuery),
    responses(
        (status = 200, description = "Comparisons in [from, to]", body = HistoryCount),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn count_history(
    State(service): State<Arc<PricingService>>,
    Query(query): Query<HistoryCountQuery>,
) -> PricingResult<Json<HistoryCount>> {
    let count = service.count_comparisons(query).await?;
    Ok(Json(count))
}

/// Templates ranked by number of comparisons
#[utoipa::path(
    get,
    path = "/pricing/history/popular",
    tag = PRICING_TAG,
    params(PopularTemplatesQuery),
    responses(
        (status = 200, description = "Most compared first", body = Vec<TemplatePopularity>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn popular_templates(
    State(service): State<Arc<PricingService>>,
    Query(query): Query<PopularTemplatesQuery>,
) -> PricingResult<Json<Vec<TemplatePopularity>>> {
    let ranked = service.popular_templates(query).await?;
    Ok(Json(ranked))
}
