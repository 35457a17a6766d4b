//! Metrics collection and exposition for Prometheus.
//!
//! This module owns the process-wide registry and the request metrics that the
//! gRPC and HTTP instrumentation record into.

mod recorder;
mod registry;

pub use recorder::{Metrics, MetricsRecorder, DURATION_BUCKETS};
pub use registry::MetricsRegistry;
