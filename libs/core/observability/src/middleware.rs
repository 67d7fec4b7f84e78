//! Axum middleware for automatic HTTP request metrics.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Response, StatusCode},
    middleware::Next,
};
use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Route template when matched, so `/api/templates/{id}` is one series
/// instead of one per id.
struct RequestLabels {
    method: String,
    path: String,
}

impl RequestLabels {
    fn new(matched_path: Option<&MatchedPath>, request: &Request<Body>) -> Self {
        let path = match matched_path {
            Some(p) => p.as_str().to_string(),
            None => request.uri().path().to_string(),
        };

        Self {
            method: request.method().to_string(),
            path,
        }
    }
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Records per request:
/// - `http_requests_total` (method, path, status, status_class)
/// - `http_request_duration_seconds` (method, path)
/// - `http_requests_errors_total` for 4xx and 5xx (method, path, status)
/// - `http_requests_in_flight` gauge
///
/// ```rust,ignore
/// use axum::{Router, middleware};
/// use observability::metrics_middleware;
///
/// let app = Router::new()
///     .route("/api/pricing/compare", post(compare))
///     .layer(middleware::from_fn(metrics_middleware));
/// ```
pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let labels = RequestLabels::new(matched_path.as_ref(), &request);
    let in_flight = gauge!("http_requests_in_flight");

    in_flight.increment(1.0);
    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();
    in_flight.decrement(1.0);

    let status = response.status();
    let code = status.as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => labels.method.clone(),
        "path" => labels.path.clone(),
        "status" => code.clone(),
        "status_class" => status_class(status)
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => labels.method.clone(),
        "path" => labels.path.clone()
    )
    .record(elapsed.as_secs_f64());

    if status.is_client_error() || status.is_server_error() {
        counter!(
            "http_requests_errors_total",
            "method" => labels.method,
            "path" => labels.path,
            "status" => code
        )
        .increment(1);
    }

    response
}
