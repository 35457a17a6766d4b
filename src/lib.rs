//! Library exports for reqmetrics, shared between the binary and tests.
//!
//! Request metrics for a gRPC backend and an HTTP frontend, recorded into a
//! process-wide prometheus registry and exposed for scraping.

pub mod config;
pub mod error;
pub mod exporter;
pub mod grpc;
pub mod metrics;
pub mod routes;
pub mod startup;
pub mod state;
pub mod utils;
pub mod web;
