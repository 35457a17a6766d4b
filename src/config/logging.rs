use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// LoggingConfig controls how we initialize tracing/logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LoggingConfig {
    pub level: String, // e.g. "info", "debug", "warn"
    #[serde(default)]
    pub format: LogFormat,
    /// Reported as `service.name` in JSON logs. Defaults to the service name.
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default = "default_service_version")]
    pub service_version: String,
}

/// Output format of log events.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// OTel-aligned structured JSON, one object per line.
    Json,
    /// Human-readable console output with ANSI colors.
    #[default]
    Console,
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
