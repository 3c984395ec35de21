//! Coverage metric and threshold tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical name for line coverage.
pub const LINE_COVERAGE: &str = "line_coverage";
/// Canonical name for function coverage.
pub const FUNCTION_COVERAGE: &str = "function_coverage";
/// Canonical name for branch coverage.
pub const BRANCH_COVERAGE: &str = "branch_coverage";

/// Measured coverage percentages keyed by canonical metric name.
///
/// A missing key means the metric was not measured, which is not the same as
/// a measured `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, f64>);

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value, replacing any earlier value for the same metric.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Required minimum percentage per metric. Static for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable(BTreeMap<String, f64>);

impl ThresholdTable {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add or replace a threshold.
    pub fn with(mut self, name: impl Into<String>, minimum: f64) -> Self {
        self.0.insert(name.into(), minimum);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::new()
            .with(LINE_COVERAGE, 85.0)
            .with(FUNCTION_COVERAGE, 95.0)
            .with(BRANCH_COVERAGE, 80.0)
    }
}
