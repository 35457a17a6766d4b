//! Metrics exposition endpoint.

use axum::extract::{FromRef, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::Metrics;
use crate::utils::http_helpers::HTTPError;

/// Creates the metrics route at `path`, for any state the metrics can be taken from.
pub fn routes<S>(path: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Metrics: FromRef<S>,
{
    Router::new().route(path, get(metrics_handler))
}

/// Handler for the metrics endpoint.
///
/// Returns all collected metrics in Prometheus text format.
async fn metrics_handler(State(metrics): State<Metrics>) -> Result<impl IntoResponse, HTTPError> {
    let metrics_text = metrics.render().map_err(HTTPError::internal)?;

    Ok((
        [(CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
        metrics_text,
    ))
}
