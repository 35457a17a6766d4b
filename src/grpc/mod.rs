//! gRPC request metrics.
//!
//! [`UnaryInterceptor`] wraps a single unary handler, while [`GrpcMetricsLayer`]
//! applies the same recording to every call a tonic server routes.

mod body;
mod interceptor;
mod layer;
pub mod status;

pub use body::GrpcMetricsBody;
pub use interceptor::{UnaryCallInfo, UnaryInterceptor};
pub use layer::{GrpcMetrics, GrpcMetricsLayer};
