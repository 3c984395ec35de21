//! fwcheck core library
//!
//! Domain logic for the firmware test pipeline:
//! - coverage summary parsing and threshold gating
//! - phase tracking over simulator serial output
//! - configuration, reporting and observability

pub mod config;
pub mod coverage;
pub mod domain;
pub mod gate;
pub mod metrics;
pub mod obs;
pub mod phases;
pub mod reporting;
pub mod telemetry;

pub use config::{
    BuildConfig, CoverageConfig, PathsConfig, PipelineConfig, SimulatorConfig, StageEnvironments,
    CONFIG_FILE_NAME,
};
pub use coverage::{load_metrics, parse_summary};
pub use domain::{
    FwcheckError, InfrastructureFault, MetricSet, Result, RunState, TestCategory, ThresholdTable,
    BRANCH_COVERAGE, FUNCTION_COVERAGE, LINE_COVERAGE,
};
pub use gate::{validate, MetricVerdict, ThresholdVerdict};
pub use metrics::METRICS;
pub use obs::{
    emit_coverage_generated, emit_coverage_validated, emit_infrastructure_fault,
    emit_phase_completed, emit_run_finished, emit_stage_finished, emit_stage_skipped,
    emit_stage_started, emit_state_changed, run_span,
};
pub use phases::{Phase, PhaseSet, PhaseTracker};
pub use reporting::{
    read_report_json, render_coverage_table, render_phase_summary, render_summary,
    write_report_json, PipelineReport, StageStatus, TestResults,
};
pub use telemetry::init_tracing;

/// fwcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
