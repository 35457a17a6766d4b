//! HTTP request metrics for axum routers.

mod body;
mod middleware;

pub use body::MeteredBody;
pub use middleware::{handler_label, instrument_router, track_metrics, HttpMetricsState};
