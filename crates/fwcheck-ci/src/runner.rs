//! Test stage execution.

use fwcheck_core::{emit_stage_finished, emit_stage_started, InfrastructureFault, TestCategory, METRICS};
use fwcheck_core::{BuildConfig, StageStatus};
use std::path::PathBuf;
use std::sync::Arc;

use crate::invoker::ProcessInvoker;
use crate::stage::StageConfig;

/// Result of one stage invocation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub category: TestCategory,

    /// Whether the stage passed (exit code 0, no timeout).
    pub passed: bool,

    /// Captured stdout followed by stderr.
    pub raw_output: String,

    /// `None` when the process was killed or never ran.
    pub exit_code: Option<i32>,

    pub timed_out: bool,

    pub duration_ms: u64,

    /// Set when the stage was not executed and recorded as a vacuous pass.
    pub skipped: bool,
}

impl StageResult {
    /// A stage the caller chose not to run.
    pub fn skipped(category: TestCategory) -> Self {
        Self {
            category,
            passed: true,
            raw_output: String::new(),
            exit_code: None,
            timed_out: false,
            duration_ms: 0,
            skipped: true,
        }
    }

    /// A stage that could not be executed at all.
    pub fn from_fault(category: TestCategory, fault: &InfrastructureFault) -> Self {
        Self {
            category,
            passed: false,
            raw_output: fault.to_string(),
            exit_code: None,
            timed_out: false,
            duration_ms: 0,
            skipped: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.category.name()
    }

    pub fn status(&self) -> StageStatus {
        StageStatus::from_passed(self.passed)
    }
}

/// Runs one test category through the build tool.
pub struct StageRunner {
    invoker: Arc<dyn ProcessInvoker>,
    build: BuildConfig,
    workdir: PathBuf,
}

impl StageRunner {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, build: BuildConfig, workdir: impl Into<PathBuf>) -> Self {
        Self {
            invoker,
            build,
            workdir: workdir.into(),
        }
    }

    /// Run `category` and capture its outcome.
    ///
    /// A nonzero exit or a timeout yields a failed [`StageResult`]; only a
    /// missing or unlaunchable tool is an error.
    pub async fn run(&self, category: TestCategory) -> Result<StageResult, InfrastructureFault> {
        let config = StageConfig::for_category(category, &self.build, &self.workdir);
        self.execute(&config).await
    }

    pub async fn execute(&self, config: &StageConfig) -> Result<StageResult, InfrastructureFault> {
        let invocation = config
            .invocation()
            .ok_or_else(|| InfrastructureFault::ToolNotFound {
                program: format!("<empty command for stage {}>", config.name()),
            })?;

        emit_stage_started(config.name(), &invocation.program);
        let output = self.invoker.invoke(&invocation).await?;
        METRICS.inc_stages_executed();

        let result = StageResult {
            category: config.category,
            passed: output.success(),
            raw_output: output.combined(),
            exit_code: output.exit_code,
            timed_out: output.timed_out,
            duration_ms: output.duration_ms,
            skipped: false,
        };
        emit_stage_finished(
            config.name(),
            result.passed,
            result.duration_ms,
            result.timed_out,
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedInvoker;

    fn runner(invoker: ScriptedInvoker) -> (StageRunner, Arc<ScriptedInvoker>) {
        let invoker = Arc::new(invoker);
        let runner = StageRunner::new(invoker.clone(), BuildConfig::default(), "/fw");
        (runner, invoker)
    }

    #[test]
    fn test_skipped_is_vacuous_pass() {
        let result = StageResult::skipped(TestCategory::Performance);
        assert!(result.passed);
        assert!(result.skipped);
        assert_eq!(result.status(), StageStatus::Pass);
    }

    #[test]
    fn test_fault_result_fails() {
        let fault = InfrastructureFault::ToolNotFound {
            program: "pio".to_string(),
        };
        let result = StageResult::from_fault(TestCategory::Unit, &fault);
        assert!(!result.passed);
        assert!(result.raw_output.contains("pio"));
    }

    #[tokio::test]
    async fn test_zero_exit_passes() {
        let (runner, invoker) =
            runner(ScriptedInvoker::new().respond("pio", "test-coverage", 0, "4 Tests 0 Failures"));
        let result = runner.run(TestCategory::Unit).await.expect("runs");
        assert!(result.passed);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.raw_output.contains("0 Failures"));

        let calls = invoker.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].cwd, Some(PathBuf::from("/fw")));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failed_result() {
        let (runner, _) =
            runner(ScriptedInvoker::new().respond("pio", "test-integration", 1, "1 Failures"));
        let result = runner.run(TestCategory::Integration).await.expect("runs");
        assert!(!result.passed);
        assert_eq!(result.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_timeout_is_failed_result() {
        let (runner, _) = runner(ScriptedInvoker::new().time_out("pio", "test-performance"));
        let result = runner.run(TestCategory::Performance).await.expect("runs");
        assert!(!result.passed);
        assert!(result.timed_out);
    }

    #[tokio::test]
    async fn test_missing_tool_is_fault() {
        let (runner, _) = runner(ScriptedInvoker::new().missing_tool("pio"));
        let err = runner.run(TestCategory::Memory).await.expect_err("fault");
        assert_eq!(
            err,
            InfrastructureFault::ToolNotFound {
                program: "pio".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_real_command() {
        let runner = StageRunner::new(
            Arc::new(crate::invoker::TokioInvoker),
            BuildConfig::default(),
            ".",
        );
        let config = StageConfig {
            category: TestCategory::Unit,
            command: vec!["echo".to_string(), "hello".to_string()],
            timeout_secs: 60,
            workdir: PathBuf::from("."),
        };
        let result = runner.execute(&config).await.expect("echo runs");
        assert!(result.passed);
        assert!(result.raw_output.contains("hello"));
    }
}
