use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

#[derive(Default)]
struct JsonFieldVisitor {
    fields: Map<String, Value>,
}

impl JsonFieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonFieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

/// Formats events as OTel log records: body, severity, resource and attributes.
#[derive(Clone)]
struct OtelJsonFormatter {
    resource: Map<String, Value>,
}

impl OtelJsonFormatter {
    fn new(service_name: &str, service_version: &str) -> Self {
        let mut resource = Map::new();
        resource.insert("service.name".to_string(), Value::from(service_name));
        resource.insert("service.version".to_string(), Value::from(service_version));
        OtelJsonFormatter { resource }
    }

    fn severity_number(level: &Level) -> u64 {
        match *level {
            Level::TRACE => 1,
            Level::DEBUG => 5,
            Level::INFO => 9,
            Level::WARN => 13,
            Level::ERROR => 17,
        }
    }

    fn record(&self, event: &Event<'_>) -> Value {
        let metadata = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut attributes = visitor.fields;
        if let Some(file) = metadata.file() {
            attributes.insert("code.filepath".to_string(), Value::from(file));
        }
        if let Some(line) = metadata.line() {
            attributes.insert("code.lineno".to_string(), Value::from(line));
        }
        attributes.insert("code.target".to_string(), Value::from(metadata.target()));

        let body = attributes
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| metadata.name().to_string());

        let mut root = Map::new();
        root.insert(
            "timestamp".to_string(),
            Value::from(timestamp()),
        );
        root.insert(
            "severity_text".to_string(),
            Value::from(metadata.level().as_str()),
        );
        root.insert(
            "severity_number".to_string(),
            Value::from(Self::severity_number(metadata.level())),
        );
        root.insert("body".to_string(), Value::from(body));
        root.insert("resource".to_string(), Value::Object(self.resource.clone()));
        root.insert("attributes".to_string(), Value::Object(attributes));
        Value::Object(root)
    }
}

impl<S, N> FormatEvent<S, N> for OtelJsonFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let serialized = serde_json::to_string(&self.record(event)).map_err(|_| std::fmt::Error)?;
        writer.write_str(&serialized)?;
        writer.write_char('\n')
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses `logging.level`; only the five tracing levels are accepted.
pub fn parse_level(level: &str) -> Result<LevelFilter, ConfigError> {
    let normalized = level.trim().to_lowercase();
    match normalized.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => LevelFilter::from_str(&normalized)
            .map_err(|_| ConfigError::LogLevel(level.to_string())),
        _ => Err(ConfigError::LogLevel(level.to_string())),
    }
}

/// Installs the global tracing subscriber.
///
/// `service_name` is used for the JSON resource when the logging section does
/// not name one. `RUST_LOG` directives are layered on top of the configured level.
pub fn init_logging(logging_config: &LoggingConfig, service_name: &str) -> Result<(), ConfigError> {
    let level_filter = parse_level(&logging_config.level)?;

    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    match logging_config.format {
        LogFormat::Json => {
            let formatter = OtelJsonFormatter::new(
                logging_config.service_name.as_deref().unwrap_or(service_name),
                &logging_config.service_version,
            );
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().event_format(formatter))
                .init();
        }
        LogFormat::Console => {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_case_insensitive() {
        assert_eq!(parse_level(" INFO ").unwrap(), LevelFilter::INFO);
        assert_eq!(parse_level("trace").unwrap(), LevelFilter::TRACE);
    }

    #[test]
    fn timestamps_are_whole_seconds_in_utc() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(!ts.contains('.'), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn unknown_level_is_a_config_error() {
        assert!(matches!(
            parse_level("verbose"),
            Err(ConfigError::LogLevel(level)) if level == "verbose"
        ));
        // LevelFilter would accept "off" and numeric levels; the config does not.
        assert!(parse_level("off").is_err());
    }
}
