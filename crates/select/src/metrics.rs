//! Metric aggregation stage: runs after pagination, one lookup per returned record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dash_core::DataCell;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::query::{MetricQuery, QueryError};

/// Supported series. CPU is in millicores, memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricName {
    Cpu,
    Memory,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self { MetricName::Cpu => "cpu", MetricName::Memory => "memory" }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for MetricName {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(MetricName::Cpu),
            "memory" | "mem" => Ok(MetricName::Memory),
            other => Err(QueryError::UnknownMetric(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Latest,
    Average,
    Min,
    Max,
    Sum,
}

impl FromStr for Aggregation {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Aggregation::Latest),
            "average" | "avg" => Ok(Aggregation::Average),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "sum" => Ok(Aggregation::Sum),
            other => Err(QueryError::UnknownAggregation(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: u64,
}

impl Aggregation {
    /// `None` for an empty series.
    pub fn apply(&self, points: &[MetricPoint]) -> Option<u64> {
        if points.is_empty() { return None; }
        match self {
            // last point wins on equal timestamps
            Aggregation::Latest => points.iter().max_by_key(|p| p.timestamp).map(|p| p.value),
            Aggregation::Average => {
                let sum: u128 = points.iter().map(|p| u128::from(p.value)).sum();
                u64::try_from(sum / points.len() as u128).ok()
            }
            Aggregation::Min => points.iter().map(|p| p.value).min(),
            Aggregation::Max => points.iter().map(|p| p.value).max(),
            Aggregation::Sum => Some(points.iter().fold(0u64, |acc, p| acc.saturating_add(p.value))),
        }
    }
}

/// Identity a metrics source is queried with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricTarget {
    pub namespace: Option<String>,
    pub name: String,
}

impl MetricTarget {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self { namespace: namespace.map(|s| s.to_string()), name: name.to_string() }
    }
}

impl fmt::Display for MetricTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error("no {metric} metrics for {target}")]
    NotFound { target: String, metric: MetricName },
    #[error("metrics source unavailable: {0}")]
    Unavailable(String),
}

/// External series provider. Failures are per call and never abort the stage.
pub trait MetricsSource: Send + Sync {
    fn series(&self, target: &MetricTarget, metric: MetricName) -> Result<Vec<MetricPoint>, MetricsError>;
}

/// Records that can be looked up in a [`MetricsSource`].
pub trait MetricCell: DataCell {
    fn metric_target(&self) -> Option<MetricTarget>;
}

impl<T: MetricCell + ?Sized> MetricCell for &T {
    fn metric_target(&self) -> Option<MetricTarget> { (**self).metric_target() }
}

/// One requested metric for one record; `value` is absent when the lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetric {
    pub metric: MetricName,
    pub aggregation: Aggregation,
    pub value: Option<u64>,
    pub points: usize,
}

/// Aggregate each requested metric for each record, aligned with `items`.
pub fn aggregate<T: MetricCell>(items: &[T], query: &MetricQuery, source: &dyn MetricsSource) -> Vec<Vec<AggregatedMetric>> {
    let mut failures = 0u64;
    let out = items
        .iter()
        .map(|item| {
            let target = item.metric_target();
            query
                .metrics
                .iter()
                .map(|&metric| {
                    let series = match &target {
                        Some(t) => match source.series(t, metric) {
                            Ok(points) => points,
                            Err(e) => {
                                warn!(target = %t, metric = %metric, error = %e, "dataselect: metric lookup failed");
                                failures += 1;
                                Vec::new()
                            }
                        },
                        None => Vec::new(),
                    };
                    AggregatedMetric {
                        metric,
                        aggregation: query.aggregation,
                        value: query.aggregation.apply(&series),
                        points: series.len(),
                    }
                })
                .collect()
        })
        .collect();
    if failures > 0 {
        ::metrics::counter!("dataselect_metric_failures_total", failures);
    }
    out
}
