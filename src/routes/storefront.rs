//! Minimal storefront pages served by the HTTP frontend.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Router};

use crate::state::AppState;

/// Registers the storefront routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/product/:id", get(product))
}

async fn home(State(state): State<AppState>) -> impl IntoResponse {
    format!("Welcome to {}", state.config.service.name)
}

async fn product(Path(id): Path<String>) -> impl IntoResponse {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return (StatusCode::BAD_REQUEST, "invalid product id".to_string());
    }
    (StatusCode::OK, format!("Product {id}"))
}

/// Fallback for requests that match no route.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
