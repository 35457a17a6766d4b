//! Request metrics backed by the shared prometheus registry.

use prometheus::proto::MetricFamily;
use prometheus::{HistogramVec, IntCounterVec};
use std::sync::{Arc, OnceLock};

use super::registry::MetricsRegistry;
use crate::error::MetricsError;

/// Latency buckets for the duration histograms, in seconds.
pub const DURATION_BUCKETS: &[f64] = prometheus::DEFAULT_BUCKETS;

/// Trait for recording request metrics.
///
/// Every method takes the full label set for the series it touches, in the
/// order the family was declared with.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Counts a finished gRPC call under its outcome code.
    fn record_grpc_request(&self, service: &str, method: &str, status_code: &str);

    /// Records the wall-clock time of a gRPC call.
    fn record_grpc_duration(&self, service: &str, method: &str, duration_secs: f64);

    /// Counts a gRPC call that returned an error.
    fn record_grpc_error(&self, service: &str, method: &str, error_code: &str);

    /// Counts a finished HTTP request under its response status.
    fn record_http_request(&self, service: &str, method: &str, handler: &str, status_code: &str);

    /// Records the wall-clock time of an HTTP request.
    fn record_http_duration(&self, service: &str, method: &str, handler: &str, duration_secs: f64);

    /// Records the declared size of an HTTP request body.
    fn record_http_request_size(&self, service: &str, method: &str, handler: &str, bytes: f64);

    /// Records the number of bytes written in an HTTP response body.
    fn record_http_response_size(&self, service: &str, method: &str, handler: &str, bytes: f64);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<MetricsRegistry>,

    // gRPC metrics
    grpc_requests_total: IntCounterVec,
    grpc_request_duration_seconds: HistogramVec,
    grpc_errors_total: IntCounterVec,

    // HTTP metrics
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_request_size_bytes: HistogramVec,
    http_response_size_bytes: HistogramVec,
}

static GLOBAL: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    /// Returns the process-wide metrics, creating the registry on first use.
    pub fn global() -> &'static Metrics {
        GLOBAL.get_or_init(|| {
            Metrics::with_registry(Arc::new(MetricsRegistry::new()))
                .expect("Failed to register built-in request metrics")
        })
    }

    /// Creates request metrics on a private registry.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Arc::new(MetricsRegistry::new()))
    }

    /// Creates request metrics on `registry`, reusing families that already exist there.
    pub fn with_registry(registry: Arc<MetricsRegistry>) -> Result<Self, MetricsError> {
        // 100 B up to 100 MB
        let size_buckets = prometheus::exponential_buckets(100.0, 10.0, 7)?;

        let grpc_requests_total = registry.int_counter_vec(
            "grpc_requests_total",
            "Total number of gRPC requests",
            &["service", "method", "status_code"],
        )?;

        let grpc_request_duration_seconds = registry.histogram_vec(
            "grpc_request_duration_seconds",
            "gRPC request duration in seconds",
            &["service", "method"],
            DURATION_BUCKETS.to_vec(),
        )?;

        let grpc_errors_total = registry.int_counter_vec(
            "grpc_errors_total",
            "Total number of gRPC errors",
            &["service", "method", "error_code"],
        )?;

        let http_requests_total = registry.int_counter_vec(
            "http_requests_total",
            "Total number of HTTP requests",
            &["service", "method", "handler", "status_code"],
        )?;

        let http_request_duration_seconds = registry.histogram_vec(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            &["service", "method", "handler"],
            DURATION_BUCKETS.to_vec(),
        )?;

        let http_request_size_bytes = registry.histogram_vec(
            "http_request_size_bytes",
            "HTTP request size in bytes",
            &["service", "method", "handler"],
            size_buckets.clone(),
        )?;

        let http_response_size_bytes = registry.histogram_vec(
            "http_response_size_bytes",
            "HTTP response size in bytes",
            &["service", "method", "handler"],
            size_buckets,
        )?;

        Ok(Metrics {
            registry,
            grpc_requests_total,
            grpc_request_duration_seconds,
            grpc_errors_total,
            http_requests_total,
            http_request_duration_seconds,
            http_request_size_bytes,
            http_response_size_bytes,
        })
    }

    /// The registry these metrics live in.
    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Snapshot of every family in the underlying registry.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        self.registry.render()
    }
}

impl MetricsRecorder for Metrics {
    fn record_grpc_request(&self, service: &str, method: &str, status_code: &str) {
        self.grpc_requests_total
            .with_label_values(&[service, method, status_code])
            .inc();
    }

    fn record_grpc_duration(&self, service: &str, method: &str, duration_secs: f64) {
        self.grpc_request_duration_seconds
            .with_label_values(&[service, method])
            .observe(duration_secs);
    }

    fn record_grpc_error(&self, service: &str, method: &str, error_code: &str) {
        self.grpc_errors_total
            .with_label_values(&[service, method, error_code])
            .inc();
    }

    fn record_http_request(&self, service: &str, method: &str, handler: &str, status_code: &str) {
        self.http_requests_total
            .with_label_values(&[service, method, handler, status_code])
            .inc();
    }

    fn record_http_duration(&self, service: &str, method: &str, handler: &str, duration_secs: f64) {
        self.http_request_duration_seconds
            .with_label_values(&[service, method, handler])
            .observe(duration_secs);
    }

    fn record_http_request_size(&self, service: &str, method: &str, handler: &str, bytes: f64) {
        self.http_request_size_bytes
            .with_label_values(&[service, method, handler])
            .observe(bytes);
    }

    fn record_http_response_size(&self, service: &str, method: &str, handler: &str, bytes: f64) {
        self.http_response_size_bytes
            .with_label_values(&[service, method, handler])
            .observe(bytes);
    }
}
