//! Coverage threshold gate.
//!
//! Evaluates a [`MetricSet`] against a [`ThresholdTable`] and produces a
//! [`ThresholdVerdict`]. Every metric named in the table is checked; a metric
//! that was never measured counts as `0.0` and therefore fails any positive
//! threshold. Missing coverage data must not pass the gate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::metrics::{MetricSet, ThresholdTable};

/// Outcome for a single thresholded metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricVerdict {
    /// Measured value, or `0.0` when unmeasured.
    pub actual: f64,
    pub threshold: f64,
    pub passed: bool,
    /// Whether the metric appeared in the measured set at all.
    pub measured: bool,
}

/// The outcome of evaluating a threshold table against measured metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdVerdict {
    /// Logical AND over all per-metric results.
    pub passed: bool,
    pub metrics: BTreeMap<String, MetricVerdict>,
}

impl ThresholdVerdict {
    /// Names of metrics that failed their threshold, in sorted order.
    pub fn failures(&self) -> Vec<&str> {
        self.metrics
            .iter()
            .filter(|(_, v)| !v.passed)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Validate `metrics` against `thresholds`.
///
/// A metric passes iff `actual >= threshold`. Pure: identical inputs always
/// yield identical output and neither input is modified.
pub fn validate(metrics: &MetricSet, thresholds: &ThresholdTable) -> ThresholdVerdict {
    let mut results = BTreeMap::new();

    for (name, threshold) in thresholds.iter() {
        let measured = metrics.get(name);
        let actual = measured.unwrap_or(0.0);
        results.insert(
            name.to_string(),
            MetricVerdict {
                actual,
                threshold,
                passed: actual >= threshold,
                measured: measured.is_some(),
            },
        );
    }

    ThresholdVerdict {
        passed: results.values().all(|v| v.passed),
        metrics: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{BRANCH_COVERAGE, FUNCTION_COVERAGE, LINE_COVERAGE};

    fn measured(line: f64, function: f64, branch: f64) -> MetricSet {
        [
            (LINE_COVERAGE, line),
            (FUNCTION_COVERAGE, function),
            (BRANCH_COVERAGE, branch),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_function_below_threshold_fails_overall() {
        let verdict = validate(&measured(90.0, 93.0, 85.0), &ThresholdTable::default());
        assert!(!verdict.passed);
        assert!(verdict.metrics[LINE_COVERAGE].passed);
        assert!(verdict.metrics[BRANCH_COVERAGE].passed);
        assert!(!verdict.metrics[FUNCTION_COVERAGE].passed);
        assert_eq!(verdict.failures(), vec![FUNCTION_COVERAGE]);
    }

    #[test]
    fn test_all_above_thresholds_passes() {
        let verdict = validate(&measured(85.0, 95.0, 80.0), &ThresholdTable::default());
        assert!(verdict.passed, "equal to threshold must pass");
        assert!(verdict.failures().is_empty());
    }

    #[test]
    fn test_unmeasured_counts_as_zero() {
        let metrics: MetricSet = [(LINE_COVERAGE, 99.0), (FUNCTION_COVERAGE, 99.0)]
            .into_iter()
            .collect();
        let verdict = validate(&metrics, &ThresholdTable::default());

        let branch = verdict.metrics[BRANCH_COVERAGE];
        assert!(!branch.measured);
        assert_eq!(branch.actual, 0.0);
        assert!(!branch.passed);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_unmeasured_matches_measured_zero() {
        let table = ThresholdTable::new().with(LINE_COVERAGE, 0.0);
        let missing = validate(&MetricSet::new(), &table);
        let zero = validate(&[(LINE_COVERAGE, 0.0)].into_iter().collect(), &table);
        assert_eq!(missing.passed, zero.passed);
        assert_eq!(
            missing.metrics[LINE_COVERAGE].actual,
            zero.metrics[LINE_COVERAGE].actual
        );
        assert!(missing.passed, "0.0 >= 0.0");
    }

    #[test]
    fn test_metrics_outside_table_are_ignored() {
        let metrics: MetricSet = [("mutation_score", 1.0)].into_iter().collect();
        let verdict = validate(&metrics, &ThresholdTable::new().with(LINE_COVERAGE, 10.0));
        assert_eq!(verdict.metrics.len(), 1);
        assert!(!verdict.metrics.contains_key("mutation_score"));
    }

    #[test]
    fn test_empty_table_passes() {
        let verdict = validate(&MetricSet::new(), &ThresholdTable::new());
        assert!(verdict.passed);
        assert!(verdict.metrics.is_empty());
    }

    #[test]
    fn test_validate_is_deterministic() {
        let metrics = measured(86.2, 94.9, 79.99);
        let table = ThresholdTable::default();
        let snapshot = metrics.clone();

        let first = validate(&metrics, &table);
        let second = validate(&metrics, &table);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
        assert_eq!(metrics, snapshot);
    }
}
