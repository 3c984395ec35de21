//! Pipeline orchestration and report persistence.

use anyhow::Context;
use fwcheck_core::{
    emit_coverage_validated, emit_infrastructure_fault, emit_run_finished, emit_stage_skipped,
    emit_state_changed, load_metrics, render_coverage_table, render_summary, run_span, validate,
    write_report_json, MetricSet, PipelineConfig, PipelineReport, RunState, TestCategory,
    TestResults, ThresholdVerdict, METRICS,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::coverage_gen::CoverageGenerator;
use crate::invoker::{ProcessInvoker, TokioInvoker};
use crate::runner::{StageResult, StageRunner};
use crate::spec::RunSpec;

/// Result of a complete pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub report: PipelineReport,

    /// One result per category, in execution order.
    pub stages: Vec<StageResult>,

    /// `None` when coverage generation failed and validation was skipped.
    pub verdict: Option<ThresholdVerdict>,

    /// Where the report was written.
    pub report_path: PathBuf,
}

impl PipelineRun {
    pub fn passed(&self) -> bool {
        self.report.overall_passed
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn stage(&self, category: TestCategory) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.category == category)
    }
}

/// Sequences test stages, coverage generation, threshold validation and
/// reporting. Every step is attempted; failures are recorded, not fatal.
pub struct Orchestrator {
    config: PipelineConfig,
    invoker: Arc<dyn ProcessInvoker>,
    echo: bool,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self {
            config,
            invoker,
            echo: true,
        }
    }

    pub fn with_default_invoker(config: PipelineConfig) -> Self {
        Self::new(config, Arc::new(TokioInvoker))
    }

    /// Suppress stage output and summaries on stdout.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn runner(&self) -> StageRunner {
        StageRunner::new(
            self.invoker.clone(),
            self.config.build.clone(),
            &self.config.project_root,
        )
    }

    /// Run the full pipeline and return its exit code.
    pub async fn run_all(&self, skip_performance: bool, skip_memory: bool) -> anyhow::Result<i32> {
        let run = self.execute(skip_performance, skip_memory).await?;
        Ok(run.exit_code())
    }

    /// Run a single category. No coverage, no report.
    pub async fn run_single(&self, category: TestCategory) -> anyhow::Result<i32> {
        let run_id = Uuid::new_v4();
        async {
            self.banner(category);
            let result = match self.runner().run(category).await {
                Ok(result) => result,
                Err(fault) => {
                    emit_infrastructure_fault(category.name(), &fault);
                    METRICS.inc_infrastructure_faults();
                    StageResult::from_fault(category, &fault)
                }
            };
            self.show_stage(&result);
            METRICS.flush();
            Ok::<_, anyhow::Error>(if result.passed { 0 } else { 1 })
        }
        .instrument(run_span(&run_id.to_string()))
        .await
    }

    /// Run the full pipeline, persist the report and return everything it
    /// produced.
    ///
    /// Only failing to create the coverage directory or to write the report
    /// is an error; stage and coverage problems end up in the report.
    pub async fn execute(
        &self,
        skip_performance: bool,
        skip_memory: bool,
    ) -> anyhow::Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        self.execute_inner(run_id, skip_performance, skip_memory)
            .instrument(run_span(&run_id.to_string()))
            .await
    }

    async fn execute_inner(
        &self,
        run_id: Uuid,
        skip_performance: bool,
        skip_memory: bool,
    ) -> anyhow::Result<PipelineRun> {
        let start = Instant::now();
        let mut state = RunState::Init;

        let coverage_dir = self.config.coverage_dir();
        std::fs::create_dir_all(&coverage_dir)
            .with_context(|| format!("create coverage directory {:?}", coverage_dir))?;
        info!(root = %self.config.project_root.display(), "starting pipeline");

        advance(&mut state, RunState::StagesRunning)?;
        let runner = self.runner();
        let mut stages = Vec::with_capacity(TestCategory::ALL.len());
        for category in TestCategory::ALL {
            let skipped = match category {
                TestCategory::Performance => skip_performance,
                TestCategory::Memory => skip_memory,
                _ => false,
            };
            if skipped {
                emit_stage_skipped(category.name());
                stages.push(StageResult::skipped(category));
                continue;
            }

            self.banner(category);
            let result = match runner.run(category).await {
                Ok(result) => result,
                Err(fault) => {
                    emit_infrastructure_fault(category.name(), &fault);
                    METRICS.inc_infrastructure_faults();
                    StageResult::from_fault(category, &fault)
                }
            };
            self.show_stage(&result);
            stages.push(result);
        }

        advance(&mut state, RunState::CoverageGenerating)?;
        let generator = CoverageGenerator::new(self.invoker.clone(), self.config.clone());
        let coverage_generated = match generator.generate().await {
            Ok(_) => true,
            Err(e) => {
                emit_infrastructure_fault("coverage", &e);
                METRICS.inc_infrastructure_faults();
                false
            }
        };

        advance(&mut state, RunState::CoverageValidating)?;
        let (metrics, verdict) = if coverage_generated {
            match load_metrics(&self.config.summary_path()) {
                Ok(metrics) => {
                    let verdict = validate(&metrics, &self.config.coverage.thresholds);
                    emit_coverage_validated(metrics.len(), verdict.passed);
                    if self.echo {
                        println!("\n{}", render_coverage_table(&verdict));
                    }
                    (metrics, Some(verdict))
                }
                Err(e) => {
                    emit_infrastructure_fault("coverage", &e);
                    METRICS.inc_infrastructure_faults();
                    (MetricSet::new(), None)
                }
            }
        } else {
            info!("coverage generation failed, skipping threshold validation");
            (MetricSet::new(), None)
        };

        advance(&mut state, RunState::Reporting)?;
        let spec = RunSpec::from_config(&self.config);
        let report = PipelineReport::new(
            run_id,
            collect_results(&stages),
            metrics,
            coverage_generated,
            verdict.as_ref(),
            spec.config_digest,
        );
        let report_path = self.config.report_path();
        write_report_json(&report_path, &report)?;
        info!(path = %report_path.display(), "report written");
        if self.echo {
            println!("\n{}", render_summary(&report));
        }

        advance(&mut state, RunState::Done)?;
        emit_run_finished(
            &run_id.to_string(),
            start.elapsed().as_millis() as u64,
            report.overall_passed,
        );
        METRICS.flush();

        Ok(PipelineRun {
            report,
            stages,
            verdict,
            report_path,
        })
    }

    fn banner(&self, category: TestCategory) {
        if self.echo {
            println!("\n==> Running {}", category.title());
        }
    }

    fn show_stage(&self, result: &StageResult) {
        if !self.echo {
            return;
        }
        if !result.raw_output.is_empty() {
            println!("{}", result.raw_output.trim_end());
        }
        let note = if result.timed_out { " (timed out)" } else { "" };
        println!("{}: {}{}", result.category.title(), result.status(), note);
    }
}

fn advance(state: &mut RunState, next: RunState) -> fwcheck_core::Result<()> {
    let from = *state;
    state.transition(next)?;
    emit_state_changed(from, next);
    Ok(())
}

fn collect_results(stages: &[StageResult]) -> TestResults {
    let status = |category: TestCategory| {
        stages
            .iter()
            .find(|s| s.category == category)
            .map(StageResult::status)
            .unwrap_or(fwcheck_core::StageStatus::Fail)
    };
    TestResults {
        unit_tests: status(TestCategory::Unit),
        integration_tests: status(TestCategory::Integration),
        performance_tests: status(TestCategory::Performance),
        memory_tests: status(TestCategory::Memory),
    }
}
