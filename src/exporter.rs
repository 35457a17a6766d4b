//! Dedicated HTTP listener exposing the metrics registry.
//!
//! Services whose main port does not speak HTTP/1 (the gRPC backend) publish
//! their metrics here instead of on their own router.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::validate_metrics_path;
use crate::error::ServeError;
use crate::metrics::Metrics;
use crate::routes;

/// Router serving only the metrics endpoint at `path`.
pub fn metrics_router(path: &str, metrics: Metrics) -> Router {
    routes::metrics::routes(path).with_state(metrics)
}

/// Serves the metrics endpoint on `addr` in a background task.
///
/// An invalid path, bind or serve failure is logged and ends the task; it
/// never reaches the caller.
pub fn spawn_metrics_server(addr: SocketAddr, path: String, metrics: Metrics) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = validate_metrics_path(&path) {
            error!("Failed to start metrics server: {}", e);
            return;
        }
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!("Failed to start metrics server: {}", ServeError::Bind { addr, source });
                return;
            }
        };
        if let Err(e) = serve_metrics(listener, &path, metrics).await {
            error!("Metrics server stopped: {}", e);
        }
    })
}

/// Serves the metrics endpoint on an already bound listener until it fails.
pub async fn serve_metrics(
    listener: TcpListener,
    path: &str,
    metrics: Metrics,
) -> Result<(), ServeError> {
    validate_metrics_path(path)?;
    info!("Starting metrics server on {}{}", listener.local_addr()?, path);
    axum::serve(listener, metrics_router(path, metrics)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::metrics::MetricsRecorder;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_serves_text_exposition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_grpc_request("checkoutservice", "/shop.Checkout/PlaceOrder", "OK");

        let response = metrics_router("/metrics", metrics)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain; version=0.0.4"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(
            "grpc_requests_total{method=\"/shop.Checkout/PlaceOrder\",service=\"checkoutservice\",status_code=\"OK\"} 1"
        ));
    }

    #[tokio::test]
    async fn bind_failure_is_not_fatal() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let handle = spawn_metrics_server(addr, "/metrics".to_string(), Metrics::new().unwrap());

        // The task logs the bind error and finishes instead of panicking.
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_path_is_reported_instead_of_panicking() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handle = spawn_metrics_server(addr, "metrics".to_string(), Metrics::new().unwrap());
        handle.await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let err = serve_metrics(listener, "metrics", Metrics::new().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServeError::Config(ConfigError::MetricsPath { .. })
        ));
    }

    #[tokio::test]
    async fn scrape_over_tcp() {
        let metrics = Metrics::new().unwrap();
        metrics.record_grpc_duration("checkoutservice", "/shop.Checkout/PlaceOrder", 0.03);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_metrics(listener, "/metrics", metrics));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.contains("grpc_request_duration_seconds_count{method=\"/shop.Checkout/PlaceOrder\",service=\"checkoutservice\"} 1"));
    }
}
