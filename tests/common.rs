#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use prometheus::proto::Metric;
use reqmetrics::config::{parse_config, ConfigV1};
use reqmetrics::metrics::Metrics;
use reqmetrics::routes::create_router;
use reqmetrics::state::AppState;

pub const FRONTEND_CONFIG: &str = r#"
version: "1.0.0"
service:
  name: frontend
  kind: http
bind_address: 127.0.0.1:8080
logging:
  level: debug
  format: json
"#;

pub fn load_test_config() -> ConfigV1 {
    parse_config(FRONTEND_CONFIG).expect("Failed to parse test config YAML")
}

/// Frontend router recording into a private registry.
pub fn build_app(config: ConfigV1) -> (Router, Metrics) {
    let metrics = Metrics::new().expect("metrics should register");
    let state = AppState {
        config: Arc::new(config),
        metrics: metrics.clone(),
    };
    (create_router(state), metrics)
}

/// Every series of family `name` whose labels include all of `labels`.
pub fn series(metrics: &Metrics, name: &str, labels: &[(&str, &str)]) -> Vec<Metric> {
    metrics
        .gather()
        .into_iter()
        .filter(|f| f.get_name() == name)
        .flat_map(|f| f.get_metric().to_vec())
        .filter(|m| {
            labels.iter().all(|(k, v)| {
                m.get_label()
                    .iter()
                    .any(|l| l.get_name() == *k && l.get_value() == *v)
            })
        })
        .collect()
}

pub fn counter_value(metrics: &Metrics, name: &str, labels: &[(&str, &str)]) -> u64 {
    series(metrics, name, labels)
        .iter()
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

pub fn histogram_count(metrics: &Metrics, name: &str, labels: &[(&str, &str)]) -> u64 {
    series(metrics, name, labels)
        .iter()
        .map(|m| m.get_histogram().get_sample_count())
        .sum()
}

pub fn histogram_sum(metrics: &Metrics, name: &str, labels: &[(&str, &str)]) -> f64 {
    series(metrics, name, labels)
        .iter()
        .map(|m| m.get_histogram().get_sample_sum())
        .sum()
}
