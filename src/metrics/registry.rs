//! Process-wide metric registry with idempotent registration.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::MetricsError;

enum Family {
    Counter {
        labels: Vec<String>,
        vec: IntCounterVec,
    },
    Histogram {
        labels: Vec<String>,
        vec: HistogramVec,
    },
}

/// A prometheus [`Registry`] plus a catalog of the families registered in it.
///
/// Asking for a family that already exists with the same kind and label schema
/// hands back the existing collector, so two components describing the same
/// metric share one set of series.
#[derive(Default)]
pub struct MetricsRegistry {
    registry: Registry,
    families: Mutex<HashMap<String, Family>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter family `name`, registering it on first use.
    pub fn int_counter_vec(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> Result<IntCounterVec, MetricsError> {
        let mut families = self.families();
        if let Some(existing) = families.get(name) {
            return match existing {
                Family::Counter { labels: known, vec } if same_schema(known, labels) => {
                    Ok(vec.clone())
                }
                _ => Err(MetricsError::SchemaConflict {
                    name: name.to_string(),
                }),
            };
        }

        let vec = IntCounterVec::new(Opts::new(name, help), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        families.insert(
            name.to_string(),
            Family::Counter {
                labels: owned(labels),
                vec: vec.clone(),
            },
        );
        Ok(vec)
    }

    /// Returns the histogram family `name`, registering it on first use.
    ///
    /// Buckets only apply when the family is first created.
    pub fn histogram_vec(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: Vec<f64>,
    ) -> Result<HistogramVec, MetricsError> {
        let mut families = self.families();
        if let Some(existing) = families.get(name) {
            return match existing {
                Family::Histogram { labels: known, vec } if same_schema(known, labels) => {
                    Ok(vec.clone())
                }
                _ => Err(MetricsError::SchemaConflict {
                    name: name.to_string(),
                }),
            };
        }

        let vec = HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        families.insert(
            name.to_string(),
            Family::Histogram {
                labels: owned(labels),
                vec: vec.clone(),
            },
        );
        Ok(vec)
    }

    /// Snapshot of every registered family.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Renders all families in the prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.gather(), &mut buffer)
            .map_err(MetricsError::Encode)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn families(&self) -> MutexGuard<'_, HashMap<String, Family>> {
        // The catalog is only ever inserted into, so a poisoned guard is still consistent.
        self.families.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn same_schema(known: &[String], labels: &[&str]) -> bool {
    known.len() == labels.len() && known.iter().zip(labels).all(|(a, b)| a == b)
}

fn owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}
