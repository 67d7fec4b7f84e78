//! Handler tests for the pricing domain
//!
//! These drive `handlers::router` with `oneshot()` over the in-memory
//! catalog loaded with the fixture prices:
//! - Request deserialization and validation
//! - Response bodies and HTTP status codes
//! - Error mapping (404, 409, 422)
//! - History analytics reads

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use domain_pricing::fixtures::{fixture_date, sample_catalog, sample_catalog_entries};
use domain_pricing::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt; // For oneshot()

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn app_with_history() -> (Router, Arc<InMemoryComparisonHistory>) {
    let history = Arc::new(InMemoryComparisonHistory::new());
    let service = PricingService::new(
        sample_catalog(fixture_date()).await,
        Arc::new(InMemoryTemplateStore::builtin()),
        history.clone(),
        PricingServiceConfig::default(),
    );
    (handlers::router(service), history)
}

async fn app() -> Router {
    app_with_history().await.0
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_compare_returns_all_providers() {
    let (app, history) = app_with_history().await;

    let request = post_json(
        "/pricing/compare",
        json!({ "templateId": 1, "region": "us-east-1", "asOf": "2025-06-01" }),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: ComparisonResponse = json_body(response.into_body()).await;
    assert!(body.complete);
    assert!(body.warning.is_none());
    assert_eq!(body.comparison.estimates.len(), 3);
    assert_eq!(body.comparison.cheapest_provider, Some(CloudProvider::Gcp));
    assert_eq!(
        body.comparison.max_savings,
        Some(Money::new(410, Currency::Usd))
    );

    let records = history.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(body.calculation_id, Some(records[0].id));
    assert_eq!(records[0].ip_address.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn test_compare_out_of_bounds_override_returns_422() {
    let request = post_json(
        "/pricing/compare",
        json!({
            "templateId": 1,
            "region": "us-east-1",
            "configuration": { "vcpus": 999 }
        }),
    );
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = json_body(response.into_body()).await;
    let violations = body["details"]["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["kind"], "above_max");
    assert_eq!(violations[0]["dimension"], "vcpus");
}

#[tokio::test]
async fn test_compare_unknown_template_returns_404() {
    let request = post_json(
        "/pricing/compare",
        json!({ "templateId": 999, "region": "us-east-1" }),
    );
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_compare_rejects_empty_region() {
    let request = post_json(
        "/pricing/compare",
        json!({ "templateId": 1, "region": "" }),
    );
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_duplicate_snapshot_returns_409() {
    let entry = sample_catalog_entries(fixture_date()).remove(0);
    let request = post_json("/pricing/snapshots", json!({ "entries": [entry] }));
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["details"]["accepted"], 0);
    assert_eq!(body["details"]["rejected"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ingest_new_snapshot_returns_201() {
    let mut entry = sample_catalog_entries(fixture_date()).remove(0);
    entry.effective_date = fixture_date().succ_opt().unwrap();
    let request = post_json("/pricing/snapshots", json!({ "entries": [entry] }));
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let report: IngestReport = json_body(response.into_body()).await;
    assert_eq!(report.accepted, 1);
    assert!(report.rejected.is_empty());
}

fn t3_medium_lookup(as_of: &str) -> String {
    format!(
        "/pricing/entries?provider=aws&serviceType=compute&region=us-east-1\
         &instanceType=t3.medium&asOf={as_of}"
    )
}

#[tokio::test]
async fn test_lookup_entry_returns_fixture_price() {
    let response = app()
        .await
        .oneshot(get(&t3_medium_lookup("2025-06-01")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let entry: PricingEntry = json_body(response.into_body()).await;
    assert_eq!(entry.key.instance_type, "t3.medium");
    assert_eq!(entry.effective_date, fixture_date());
}

#[tokio::test]
async fn test_lookup_before_first_snapshot_returns_404() {
    let response = app()
        .await
        .oneshot(get(&t3_medium_lookup("2024-12-31")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_templates_filters_by_category() {
    let response = app()
        .await
        .oneshot(get("/templates?category=SERVERLESS"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let templates: Vec<Template> = json_body(response.into_body()).await;
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].category, TemplateCategory::Serverless);
}

#[tokio::test]
async fn test_get_template_not_found() {
    let response = app().await.oneshot(get("/templates/42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_compare_records_peer_address_without_proxy_headers() {
    let (app, history) = app_with_history().await;

    let mut request = Request::builder()
        .method("POST")
        .uri("/pricing/compare")
        .header("content-type", "application/json")
        .header("user-agent", "cost-cli/1.0")
        .body(Body::from(
            json!({ "templateId": 1, "region": "us-east-1", "asOf": "2025-06-01" }).to_string(),
        ))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo("198.51.100.4:51234".parse::<SocketAddr>().unwrap()));

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records = history.records().await;
    assert_eq!(records[0].ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(records[0].user_agent.as_deref(), Some("cost-cli/1.0"));
}

#[tokio::test]
async fn test_history_endpoints_read_recorded_comparisons() {
    let (app, _history) = app_with_history().await;

    for template_id in [1, 3, 3] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/pricing/compare",
                json!({ "templateId": template_id, "region": "us-east-1", "asOf": "2025-06-01" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/pricing/history?limit=2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let recent: Vec<ComparisonRecord> = json_body(response.into_body()).await;
    assert_eq!(recent.len(), 2);

    let response = app
        .clone()
        .oneshot(get(
            "/pricing/history/count?from=2000-01-01T00:00:00Z&to=2100-01-01T00:00:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let count: HistoryCount = json_body(response.into_body()).await;
    assert_eq!(count.comparisons, 3);

    let response = app
        .clone()
        .oneshot(get("/pricing/history/popular"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let popular: Vec<TemplatePopularity> = json_body(response.into_body()).await;
    assert_eq!(
        popular[0],
        TemplatePopularity {
            template_id: 3,
            comparisons: 2
        }
    );
}

#[tokio::test]
async fn test_history_rejects_oversized_limit() {
    let response = app()
        .await
        .oneshot(get("/pricing/history?limit=5000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "BAD_REQUEST");
}
