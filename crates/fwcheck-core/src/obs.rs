//! Structured observability hooks for pipeline and simulator runs.
//!
//! Provides a run-scoped span and one emitter per lifecycle event. Events are logged at `info!` unless noted.

use tracing::{info, warn, Span};

use crate::domain::RunState;

/// Span tagging every event of one run with its id.
///
/// Attach it to the run future with `tracing::Instrument` rather than
/// entering it, since the run awaits external processes.
///
/// ```ignore
/// async { /* ... */ }.instrument(run_span(&run_id.to_string())).await
/// ```
pub fn run_span(run_id: &str) -> Span {
    tracing::info_span!("fwcheck.run", run_id = %run_id)
}

pub fn emit_state_changed(from: RunState, to: RunState) {
    tracing::debug!(event = "run.state", from = %from, to = %to);
}

pub fn emit_stage_started(stage: &str, program: &str) {
    info!(event = "stage.started", stage = %stage, program = %program);
}

pub fn emit_stage_finished(stage: &str, passed: bool, duration_ms: u64, timed_out: bool) {
    info!(
        event = "stage.finished",
        stage = %stage,
        passed = passed,
        duration_ms = duration_ms,
        timed_out = timed_out,
    );
}

pub fn emit_stage_skipped(stage: &str) {
    info!(event = "stage.skipped", stage = %stage, "recorded as vacuous pass");
}

/// Warning: the stage could not be executed at all.
pub fn emit_infrastructure_fault(step: &str, fault: &dyn std::fmt::Display) {
    warn!(event = "infrastructure.fault", step = %step, error = %fault);
}

pub fn emit_coverage_generated(artifact_count: usize, success: bool) {
    info!(
        event = "coverage.generated",
        artifacts = artifact_count,
        success = success,
    );
}

pub fn emit_coverage_validated(metrics_measured: usize, passed: bool) {
    info!(
        event = "coverage.validated",
        metrics_measured = metrics_measured,
        passed = passed,
    );
}

pub fn emit_phase_completed(phase: &str, completed: usize, total: usize) {
    info!(
        event = "phase.completed",
        phase = %phase,
        completed = completed,
        total = total,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, overall_passed: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        overall_passed = overall_passed,
    );
}
