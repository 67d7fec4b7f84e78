//! Readiness check backed by the catalog store.

use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};

/// Readiness check endpoint that pings the catalog backend.
///
/// Uses the generic `run_health_checks` utility from axum-helpers; the
/// in-memory backend is always ready.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![(
        "catalog",
        Box::pin(async {
            state
                .service
                .ready()
                .await
                .map_err(|e| format!("Catalog ping failed: {}", e))
        }),
    )];

    match run_health_checks(checks).await {
        Ok((status, json)) => (status, json).into_response(),
        Err((status, json)) => (status, json).into_response(),
    }
}
