use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::domain::{MetricSet, TestCategory};
use crate::gate::{MetricVerdict, ThresholdVerdict};
use crate::phases::PhaseSet;

/// PASS/FAIL marker used throughout the persisted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StageStatus {
    Pass,
    Fail,
}

impl StageStatus {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            StageStatus::Pass
        } else {
            StageStatus::Fail
        }
    }

    pub fn passed(self) -> bool {
        self == StageStatus::Pass
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageStatus::Pass => "PASS",
            StageStatus::Fail => "FAIL",
        })
    }
}

/// Per-category results section of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    pub unit_tests: StageStatus,
    pub integration_tests: StageStatus,
    pub performance_tests: StageStatus,
    pub memory_tests: StageStatus,
}

impl TestResults {
    pub fn get(&self, category: TestCategory) -> StageStatus {
        match category {
            TestCategory::Unit => self.unit_tests,
            TestCategory::Integration => self.integration_tests,
            TestCategory::Performance => self.performance_tests,
            TestCategory::Memory => self.memory_tests,
        }
    }

    pub fn all_passed(&self) -> bool {
        TestCategory::ALL.iter().all(|c| self.get(*c).passed())
    }
}

/// Machine-readable record of one full pipeline run, written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub test_results: TestResults,
    /// Measured metrics; empty when coverage could not be generated.
    pub coverage: MetricSet,
    /// ISO-8601 local time with offset, second precision.
    pub timestamp: String,
    pub run_id: Uuid,
    pub overall_passed: bool,
    pub coverage_generated: bool,
    /// Threshold gate result; `false` when validation was skipped.
    pub coverage_passed: bool,
    /// Per-metric verdicts; empty when validation was skipped.
    pub coverage_thresholds: BTreeMap<String, MetricVerdict>,
    pub config_digest: String,
}

impl PipelineReport {
    /// Assemble a report. `verdict` is `None` when coverage generation failed
    /// and validation never ran.
    pub fn new(
        run_id: Uuid,
        test_results: TestResults,
        coverage: MetricSet,
        coverage_generated: bool,
        verdict: Option<&ThresholdVerdict>,
        config_digest: String,
    ) -> Self {
        Self::at(
            Local::now(),
            run_id,
            test_results,
            coverage,
            coverage_generated,
            verdict,
            config_digest,
        )
    }

    pub fn at<Tz: TimeZone>(
        when: DateTime<Tz>,
        run_id: Uuid,
        test_results: TestResults,
        coverage: MetricSet,
        coverage_generated: bool,
        verdict: Option<&ThresholdVerdict>,
        config_digest: String,
    ) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        let thresholds_passed = coverage_generated && verdict.is_some_and(|v| v.passed);
        let overall_passed = test_results.all_passed() && coverage_generated && thresholds_passed;
        Self {
            test_results,
            coverage,
            timestamp: when.to_rfc3339_opts(SecondsFormat::Secs, false),
            run_id,
            overall_passed,
            coverage_generated,
            coverage_passed: thresholds_passed,
            coverage_thresholds: verdict.map(|v| v.metrics.clone()).unwrap_or_default(),
            config_digest,
        }
    }

    /// Status of the coverage gate as shown in the summary.
    pub fn coverage_status(&self) -> StageStatus {
        StageStatus::from_passed(self.coverage_generated && self.coverage_passed)
    }
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, report: &PipelineReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize pipeline report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Load a previously written report.
pub fn read_report_json(path: &Path) -> Result<PipelineReport> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse {:?}", path))
}

const RULE: &str = "============================================================";

/// Render the coverage table printed after validation.
pub fn render_coverage_table(verdict: &ThresholdVerdict) -> String {
    let mut out = String::new();
    out.push_str("Coverage Results:\n");
    out.push_str("----------------------------------------\n");
    for (name, v) in &verdict.metrics {
        out.push_str(&format!(
            "{}: {:.1}% (threshold: {:.1}%) - {}{}\n",
            name,
            v.actual,
            v.threshold,
            StageStatus::from_passed(v.passed),
            if v.measured { "" } else { " (not measured)" }
        ));
    }
    out
}

/// Render the human-readable end-of-run summary.
pub fn render_summary(report: &PipelineReport) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push_str("\nTEST SUMMARY\n");
    out.push_str(RULE);
    out.push('\n');
    for category in TestCategory::ALL {
        out.push_str(&format!(
            "{}: {}\n",
            category.title(),
            report.test_results.get(category)
        ));
    }
    out.push_str(&format!(
        "Coverage Generated: {}\n",
        StageStatus::from_passed(report.coverage_generated)
    ));
    out.push_str(&format!("Coverage Thresholds: {}\n", report.coverage_status()));
    out.push_str(&format!(
        "\nOVERALL RESULT: {}\n",
        StageStatus::from_passed(report.overall_passed)
    ));
    out
}

/// Render the phase checklist printed after a simulator session.
pub fn render_phase_summary(phases: &PhaseSet) -> String {
    let mut out = String::new();
    out.push_str("Test Phase Summary:\n");
    for phase in phases.phases() {
        let mark = if phase.completed { "x" } else { " " };
        out.push_str(&format!("  [{}] {}\n", mark, phase.title()));
    }
    out.push_str(&format!(
        "\nOverall Progress: {}/{} phases completed\n",
        phases.completed_count(),
        phases.total()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ThresholdTable, FUNCTION_COVERAGE, LINE_COVERAGE};
    use crate::gate::validate;
    use chrono::FixedOffset;

    fn all_pass() -> TestResults {
        TestResults {
            unit_tests: StageStatus::Pass,
            integration_tests: StageStatus::Pass,
            performance_tests: StageStatus::Pass,
            memory_tests: StageStatus::Pass,
        }
    }

    fn fixed_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-03-01T09:30:00+01:00").expect("valid timestamp")
    }

    #[test]
    fn test_report_field_names() {
        let metrics: MetricSet = [(LINE_COVERAGE, 92.3)].into_iter().collect();
        let table = ThresholdTable::new().with(LINE_COVERAGE, 85.0);
        let verdict = validate(&metrics, &table);
        let report = PipelineReport::at(
            fixed_time(),
            Uuid::new_v4(),
            all_pass(),
            metrics,
            true,
            Some(&verdict),
            "digest".to_string(),
        );

        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["test_results"]["unit_tests"], "PASS");
        assert_eq!(value["test_results"]["memory_tests"], "PASS");
        assert_eq!(value["coverage"]["line_coverage"], 92.3);
        assert_eq!(value["timestamp"], "2026-03-01T09:30:00+01:00");
        assert_eq!(value["overall_passed"], true);
        assert_eq!(value["coverage_thresholds"]["line_coverage"]["passed"], true);
    }

    #[test]
    fn test_failed_stage_fails_overall() {
        let mut results = all_pass();
        results.unit_tests = StageStatus::Fail;
        let verdict = validate(&MetricSet::new(), &ThresholdTable::new());
        let report = PipelineReport::new(
            Uuid::new_v4(),
            results,
            MetricSet::new(),
            true,
            Some(&verdict),
            String::new(),
        );
        assert!(!report.overall_passed);
        assert_eq!(
            serde_json::to_value(&report).expect("serialize")["test_results"]["unit_tests"],
            "FAIL"
        );
    }

    #[test]
    fn test_skipped_validation_fails_overall() {
        let report = PipelineReport::new(
            Uuid::new_v4(),
            all_pass(),
            MetricSet::new(),
            false,
            None,
            String::new(),
        );
        assert!(!report.overall_passed);
        assert!(report.coverage_thresholds.is_empty());
        assert_eq!(report.coverage_status(), StageStatus::Fail);
    }

    #[test]
    fn test_write_and_read_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test_report.json");
        let report = PipelineReport::new(
            Uuid::new_v4(),
            all_pass(),
            MetricSet::new(),
            false,
            None,
            "d".into(),
        );

        write_report_json(&path, &report).expect("write");
        let loaded = read_report_json(&path).expect("read");
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_render_summary() {
        let mut results = all_pass();
        results.integration_tests = StageStatus::Fail;
        let report = PipelineReport::new(
            Uuid::new_v4(),
            results,
            MetricSet::new(),
            false,
            None,
            String::new(),
        );
        let text = render_summary(&report);
        assert!(text.contains("Unit Tests: PASS"));
        assert!(text.contains("Integration Tests: FAIL"));
        assert!(text.contains("Coverage Generated: FAIL"));
        assert!(text.contains("OVERALL RESULT: FAIL"));
    }

    #[test]
    fn test_render_coverage_table_marks_unmeasured() {
        let metrics: MetricSet = [(LINE_COVERAGE, 90.0)].into_iter().collect();
        let verdict = validate(&metrics, &ThresholdTable::default());
        let table = render_coverage_table(&verdict);
        assert!(table.contains("line_coverage: 90.0% (threshold: 85.0%) - PASS"));
        assert!(table.contains(&format!(
            "{FUNCTION_COVERAGE}: 0.0% (threshold: 95.0%) - FAIL (not measured)"
        )));
    }

    #[test]
    fn test_render_phase_summary() {
        let phases = PhaseSet::default().apply("SplashPanel loaded successfully");
        let text = render_phase_summary(&phases);
        assert!(text.contains("[x] Startup"));
        assert!(text.contains("[ ] Configuration"));
        assert!(text.contains("1/5 phases completed"));
    }
}
