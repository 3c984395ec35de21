//! Pipeline configuration.
//!
//! Loaded once from `fwcheck.toml` (or defaults) and passed by value into the
//! orchestrator. Nothing reads process-wide state once a run has started.
//!
//! ```toml
//! [build]
//! tool = "pio"
//! stage_timeout_secs = 900
//!
//! [coverage.thresholds]
//! line_coverage = 85.0
//! function_coverage = 95.0
//! branch_coverage = 80.0
//!
//! [[phases]]
//! name = "startup"
//! triggers = ["SplashPanel loaded successfully"]
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::error::{FwcheckError, Result};
use crate::domain::{TestCategory, ThresholdTable};
use crate::phases::{Phase, PhaseSet};

/// File name looked up in the project root by [`PipelineConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "fwcheck.toml";

/// Filesystem layout, relative to the project root unless absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory the instrumented test build writes `.gcno`/`.gcda` files to.
    pub build_dir: PathBuf,
    /// Output directory for tracefile, summary and report.
    pub coverage_dir: PathBuf,
    pub tracefile: String,
    pub summary_file: String,
    pub report_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from(".pio/build/test-coverage"),
            coverage_dir: PathBuf::from("coverage"),
            tracefile: "coverage.info".to_string(),
            summary_file: "coverage_summary.txt".to_string(),
            report_file: "test_report.json".to_string(),
        }
    }
}

/// Build-tool environment per test category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageEnvironments {
    pub unit: String,
    pub integration: String,
    pub performance: String,
    pub memory: String,
}

impl Default for StageEnvironments {
    fn default() -> Self {
        Self {
            unit: "test-coverage".to_string(),
            integration: "test-integration".to_string(),
            performance: "test-performance".to_string(),
            memory: "test-memory".to_string(),
        }
    }
}

impl StageEnvironments {
    pub fn for_category(&self, category: TestCategory) -> &str {
        match category {
            TestCategory::Unit => &self.unit,
            TestCategory::Integration => &self.integration,
            TestCategory::Performance => &self.performance,
            TestCategory::Memory => &self.memory,
        }
    }
}

/// How test stages are invoked: `<tool> test -e <env> <extra_args...>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub tool: String,
    pub environments: StageEnvironments,
    pub extra_args: Vec<String>,
    /// Per-stage timeout in seconds; `0` disables it.
    pub stage_timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tool: "pio".to_string(),
            environments: StageEnvironments::default(),
            extra_args: vec!["--verbose".to_string()],
            stage_timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Coverage extraction tool (lcov-compatible CLI).
    pub tool: String,
    pub timeout_secs: u64,
    /// Instrumentation artifact extension searched under `build_dir`.
    pub artifact_extension: String,
    /// Entries given in the file override the defaults one by one; metrics
    /// not named keep their default minimum.
    #[serde(deserialize_with = "overlay_default_thresholds")]
    pub thresholds: ThresholdTable,
}

fn overlay_default_thresholds<'de, D>(deserializer: D) -> std::result::Result<ThresholdTable, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = BTreeMap::<String, f64>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .fold(ThresholdTable::default(), |table, (name, minimum)| {
            table.with(name, minimum)
        }))
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            tool: "lcov".to_string(),
            timeout_secs: 600,
            artifact_extension: "gcno".to_string(),
            thresholds: ThresholdTable::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Executable name looked up on `PATH` first.
    pub cli: String,
    /// Fallback locations; a leading `~` expands to the home directory.
    pub search_paths: Vec<String>,
    /// Simulated session length passed to the CLI.
    pub timeout_ms: u64,
    /// Extra wall-clock allowance before a hung simulator is killed.
    pub grace_secs: u64,
    pub firmware: PathBuf,
    /// Directory holding the simulator project (diagram, `wokwi.toml`).
    pub work_dir: PathBuf,
    pub build_command: Vec<String>,
    pub build_timeout_secs: u64,
    /// Arguments passed to the CLI. `{timeout_ms}` and `{firmware}` are
    /// substituted before launch.
    pub launch_args: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            cli: "wokwi-cli".to_string(),
            search_paths: vec![
                "~/bin/wokwi-cli".to_string(),
                "~/.wokwi/bin/wokwi-cli".to_string(),
            ],
            timeout_ms: 300_000,
            grace_secs: 30,
            firmware: PathBuf::from(".pio/build/debug-local/firmware.bin"),
            work_dir: PathBuf::from("test/wokwi"),
            build_command: vec![
                "pio".to_string(),
                "run".to_string(),
                "-e".to_string(),
                "debug-local".to_string(),
            ],
            build_timeout_secs: 600,
            launch_args: vec!["--timeout".to_string(), "{timeout_ms}".to_string()],
        }
    }
}

impl SimulatorConfig {
    /// Fallback paths with `~` expanded.
    pub fn expanded_search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(|p| expand_tilde(p)).collect()
    }

    /// `launch_args` with placeholders filled in.
    pub fn render_launch_args(&self, timeout_ms: u64, firmware: &Path) -> Vec<String> {
        let timeout = timeout_ms.to_string();
        let firmware = firmware.display().to_string();
        self.launch_args
            .iter()
            .map(|arg| {
                arg.replace("{timeout_ms}", &timeout)
                    .replace("{firmware}", &firmware)
            })
            .collect()
    }
}

/// Complete configuration for one fwcheck invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Set by the loader, never read from the file.
    #[serde(skip)]
    pub project_root: PathBuf,
    pub paths: PathsConfig,
    pub build: BuildConfig,
    pub coverage: CoverageConfig,
    pub simulator: SimulatorConfig,
    pub phases: Vec<Phase>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            paths: PathsConfig::default(),
            build: BuildConfig::default(),
            coverage: CoverageConfig::default(),
            simulator: SimulatorConfig::default(),
            phases: PhaseSet::default().phases().to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file; the project root is left untouched.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FwcheckError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&content)
    }

    /// Read `<root>/fwcheck.toml` when present, defaults otherwise.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidate = root.join(CONFIG_FILE_NAME);
        let config = if candidate.is_file() {
            Self::load(&candidate)?
        } else {
            debug!(root = %root.display(), "no config file, using defaults");
            Self::default()
        };
        Ok(config.with_project_root(root))
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn build_dir(&self) -> PathBuf {
        self.resolve(&self.paths.build_dir)
    }

    pub fn coverage_dir(&self) -> PathBuf {
        self.resolve(&self.paths.coverage_dir)
    }

    pub fn tracefile_path(&self) -> PathBuf {
        self.coverage_dir().join(&self.paths.tracefile)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.coverage_dir().join(&self.paths.summary_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.coverage_dir().join(&self.paths.report_file)
    }

    pub fn phase_set(&self) -> PhaseSet {
        PhaseSet::new(self.phases.clone())
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.build.tool.trim().is_empty() {
            return Err(FwcheckError::Config("build.tool must not be empty".into()));
        }
        for category in TestCategory::ALL {
            if self.build.environments.for_category(category).trim().is_empty() {
                return Err(FwcheckError::Config(format!(
                    "build.environments.{} must not be empty",
                    category.name()
                )));
            }
        }
        if self.coverage.tool.trim().is_empty() {
            return Err(FwcheckError::Config("coverage.tool must not be empty".into()));
        }
        if self.coverage.thresholds.is_empty() {
            return Err(FwcheckError::Config(
                "coverage.thresholds must name at least one metric".into(),
            ));
        }
        for (name, minimum) in self.coverage.thresholds.iter() {
            if !minimum.is_finite() || !(0.0..=100.0).contains(&minimum) {
                return Err(FwcheckError::Config(format!(
                    "threshold {name} must be within 0..=100, got {minimum}"
                )));
            }
        }
        if self.simulator.build_command.is_empty() {
            return Err(FwcheckError::Config(
                "simulator.build_command must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for phase in &self.phases {
            if phase.name.trim().is_empty() {
                return Err(FwcheckError::Config("phase name must not be empty".into()));
            }
            if !seen.insert(phase.name.as_str()) {
                return Err(FwcheckError::Config(format!(
                    "duplicate phase name: {}",
                    phase.name
                )));
            }
            if phase.triggers.is_empty() || phase.triggers.iter().any(|t| t.is_empty()) {
                return Err(FwcheckError::Config(format!(
                    "phase {} needs at least one non-empty trigger",
                    phase.name
                )));
            }
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
