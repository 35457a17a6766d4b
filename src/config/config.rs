use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::error::ConfigError;
use crate::routes;

/// Prefix of environment variables overriding the YAML file.
///
/// Nested keys are separated by `__`, e.g. `REQMETRICS_METRICS__PORT=9464`.
pub const ENV_PREFIX: &str = "REQMETRICS_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub service: ServiceConfig,
    pub bind_address: String,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// The service being instrumented.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ServiceConfig {
    /// Value of the `service` label on every metric.
    pub name: String,
    pub kind: ServiceKind,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// HTTP frontend; `/metrics` is served by the main router.
    Http,
    /// gRPC backend; `/metrics` is served on `metrics.port`.
    Grpc,
}

/// Where the metrics are exposed.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct MetricsConfig {
    /// Port of the dedicated exporter. Only used by gRPC services.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// Load config from a YAML file, with `REQMETRICS_*` environment overrides.
pub fn load_config(path: &str) -> Result<ConfigV1, ConfigError> {
    extract(
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__")),
    )
}

/// Parse config from a YAML string, without environment overrides.
pub fn parse_config(yaml: &str) -> Result<ConfigV1, ConfigError> {
    extract(Figment::new().merge(Yaml::string(yaml)))
}

fn extract(figment: Figment) -> Result<ConfigV1, ConfigError> {
    let config = figment.extract::<Config>().map_err(Box::new)?;
    // handle configuration migration between versions here when necessary
    let config = match config {
        Config::ConfigV1(c) => c,
    };

    validate_metrics_path(&config.metrics.path)?;
    if config.service.kind == ServiceKind::Http && routes::is_frontend_route(&config.metrics.path) {
        return Err(ConfigError::MetricsPath {
            path: config.metrics.path.clone(),
            reason: "already served by the frontend router",
        });
    }
    Ok(config)
}

/// Checks that `path` can be mounted as a static route.
pub fn validate_metrics_path(path: &str) -> Result<(), ConfigError> {
    let reason = if !path.starts_with('/') {
        "must start with '/'"
    } else if path.contains(|c: char| c == ':' || c == '*') {
        "must not contain route parameters"
    } else {
        return Ok(());
    };
    Err(ConfigError::MetricsPath {
        path: path.to_string(),
        reason,
    })
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
