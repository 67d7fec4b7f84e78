use axum::Router;
use axum::routing::get;

pub mod health;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix will be added by the `create_router` helper.
pub fn routes(state: &crate::state::AppState) -> Router {
    domain_pricing::handlers::router(state.service.clone())
}

/// Router with `/ready` (catalog ping) and `/metrics` (Prometheus exposition).
///
/// Merged with the stateless app router from `create_router`.
pub fn ops_router(state: crate::state::AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
        .route("/metrics", get(observability::metrics_handler))
}
