//! Error types shared across the crate.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while defining, registering or rendering metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metric definition: {0}")]
    Definition(#[from] prometheus::Error),

    #[error("metric {name} already registered with a different schema")]
    SchemaConflict { name: String },

    #[error("failed to encode metrics: {0}")]
    Encode(prometheus::Error),

    #[error("metrics encoding produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error loading configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid logging.level '{0}'. Valid values: trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("invalid metrics.path '{path}': {reason}")]
    MetricsPath { path: String, reason: &'static str },
}

/// Errors raised while starting or running a service.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("invalid bind address '{address}': {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("could not bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
