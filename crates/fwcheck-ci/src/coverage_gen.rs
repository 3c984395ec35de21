//! Coverage generation.
//!
//! Finds instrumentation artifacts under the build directory, captures a
//! tracefile with the coverage tool and writes its textual summary where
//! [`fwcheck_core::load_metrics`] expects it.

use fwcheck_core::{emit_coverage_generated, InfrastructureFault, PipelineConfig, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

use crate::invoker::{Invocation, ProcessInvoker, ProcessOutput};

/// Files produced by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageArtifacts {
    /// Number of instrumentation files found.
    pub artifact_count: usize,
    pub tracefile: PathBuf,
    pub summary_path: PathBuf,
}

pub struct CoverageGenerator {
    invoker: Arc<dyn ProcessInvoker>,
    config: PipelineConfig,
}

impl CoverageGenerator {
    pub fn new(invoker: Arc<dyn ProcessInvoker>, config: PipelineConfig) -> Self {
        Self { invoker, config }
    }

    /// Capture coverage and write the summary file.
    ///
    /// Fails with [`InfrastructureFault::NoInstrumentationArtifacts`] when the
    /// build directory holds no instrumentation, and with
    /// [`InfrastructureFault::ToolFailed`] when either tool step exits nonzero.
    pub async fn generate(&self) -> Result<CoverageArtifacts> {
        let build_dir = self.config.build_dir();
        let artifact_count =
            count_artifacts(&build_dir, &self.config.coverage.artifact_extension);
        if artifact_count == 0 {
            emit_coverage_generated(0, false);
            return Err(InfrastructureFault::NoInstrumentationArtifacts { dir: build_dir }.into());
        }
        debug!(artifacts = artifact_count, dir = %build_dir.display(), "instrumentation found");

        let tracefile = self.config.tracefile_path();
        let summary_path = self.config.summary_path();

        let capture = self.tool(vec![
            "--capture".to_string(),
            "--directory".to_string(),
            build_dir.display().to_string(),
            "--output-file".to_string(),
            tracefile.display().to_string(),
        ]);
        self.checked(&capture).await?;

        let summary = self.tool(vec![
            "--summary".to_string(),
            tracefile.display().to_string(),
        ]);
        let output = self.checked(&summary).await?;

        // lcov prints its summary on stderr.
        std::fs::write(&summary_path, output.combined())?;

        emit_coverage_generated(artifact_count, true);
        Ok(CoverageArtifacts {
            artifact_count,
            tracefile,
            summary_path,
        })
    }

    fn tool(&self, args: Vec<String>) -> Invocation {
        Invocation::new(self.config.coverage.tool.clone(), args)
            .in_dir(&self.config.project_root)
            .with_timeout(self.config.coverage.timeout_secs)
    }

    async fn checked(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let output = self.invoker.invoke(invocation).await?;
        if !output.success() {
            emit_coverage_generated(0, false);
            return Err(InfrastructureFault::ToolFailed {
                tool: invocation.command_line(),
                detail: output.failure_detail(),
            }
            .into());
        }
        Ok(output)
    }
}

/// Count files under `dir` with the given extension. A missing directory
/// counts as zero.
pub fn count_artifacts(dir: &Path, extension: &str) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == extension))
        .count()
}
