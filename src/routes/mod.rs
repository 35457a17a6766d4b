//! HTTP route definitions and handlers.
//!
//! This module organizes the frontend endpoints into logical groups:
//! storefront pages, health checks and the metrics exposition.

mod health_routes;
pub mod metrics;
mod storefront;

use crate::state::AppState;
use crate::web::{instrument_router, HttpMetricsState};
use axum::Router;

/// Whether `path` is already served by the frontend router.
pub fn is_frontend_route(path: &str) -> bool {
    matches!(path, "/" | "/health") || path.starts_with("/product/")
}

/// Creates the frontend router with all configured routes.
///
/// Every route, the `/metrics` endpoint and the not-found fallback are
/// wrapped with the HTTP request metrics.
pub fn create_router(state: AppState) -> Router {
    let instrumentation = HttpMetricsState::new(
        state.config.service.name.as_str(),
        state.metrics.clone(),
    );

    let router = Router::new()
        .merge(storefront::routes())
        .merge(health_routes::routes())
        .merge(metrics::routes(&state.config.metrics.path))
        .fallback(storefront::not_found);

    instrument_router(router, instrumentation).with_state(state)
}
