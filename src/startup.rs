//! Application startup and server initialization.
//!
//! Runs either the HTTP frontend, with `/metrics` folded into its router, or
//! the gRPC backend, with a dedicated metrics listener on `metrics.port`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic_health::ServingStatus;
use tracing::info;

use crate::config::{ConfigV1, ServiceKind};
use crate::error::ServeError;
use crate::exporter::spawn_metrics_server;
use crate::grpc::GrpcMetricsLayer;
use crate::metrics::Metrics;
use crate::routes;
use crate::state::AppState;

/// Initializes and runs the configured service until shutdown is requested.
///
/// # Errors
///
/// Returns an error if the bind address is invalid, the server fails to bind
/// to it, or the server encounters a runtime error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), ServeError> {
    let metrics = Metrics::global().clone();

    match config.service.kind {
        ServiceKind::Http => run_http(config, metrics).await,
        ServiceKind::Grpc => run_grpc(config, metrics).await,
    }
}

async fn run_http(config: Arc<ConfigV1>, metrics: Metrics) -> Result<(), ServeError> {
    let addr = parse_addr(&config.bind_address)?;
    let state = AppState {
        config: config.clone(),
        metrics,
    };
    let app = routes::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(
        "Starting HTTP service {} on {}",
        config.service.name, config.bind_address
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn run_grpc(config: Arc<ConfigV1>, metrics: Metrics) -> Result<(), ServeError> {
    let addr = parse_addr(&config.bind_address)?;

    let metrics_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.metrics.port));
    spawn_metrics_server(metrics_addr, config.metrics.path.clone(), metrics.clone());

    let (mut reporter, health_service) = tonic_health::server::health_reporter();
    reporter
        .set_service_status("", ServingStatus::Serving)
        .await;

    info!(
        "Starting gRPC service {} on {}",
        config.service.name, config.bind_address
    );

    Server::builder()
        .layer(GrpcMetricsLayer::new(config.service.name.as_str(), metrics))
        .add_service(health_service)
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;
    Ok(())
}

fn parse_addr(address: &str) -> Result<SocketAddr, ServeError> {
    address.parse().map_err(|source| ServeError::Address {
        address: address.to_string(),
        source,
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler, run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_must_be_a_socket_address() {
        assert_eq!(
            parse_addr("0.0.0.0:8080").unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 8080))
        );
        assert!(matches!(
            parse_addr("localhost"),
            Err(ServeError::Address { .. })
        ));
    }
}
