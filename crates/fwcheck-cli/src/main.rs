//! fwcheck - firmware test orchestration CLI
//!
//! Without a subcommand, runs the full pipeline: unit, integration,
//! performance and memory stages, then coverage generation, threshold
//! validation and the JSON report. The `--*-only` flags run one stage.
//!
//! ## Commands
//!
//! - `simulate`: run a simulator session and report reached test phases
//!
//! Exit status is 0 when everything passed, 1 otherwise, 130 on Ctrl+C.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

use fwcheck_ci::{Orchestrator, SimulatorSession};
use fwcheck_core::{render_phase_summary, PipelineConfig, TestCategory, VERSION};

const INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "fwcheck")]
#[command(version = VERSION)]
#[command(about = "Firmware test orchestration pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Firmware project root
    #[arg(long, global = true, env = "FWCHECK_PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Configuration file (default: <project-root>/fwcheck.toml if present)
    #[arg(long, global = true, env = "FWCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    mode: ModeArgs,

    /// Skip performance tests (recorded as PASS)
    #[arg(long, conflicts_with = "mode")]
    skip_performance: bool,

    /// Skip memory tests (recorded as PASS)
    #[arg(long, conflicts_with = "mode")]
    skip_memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
#[group(id = "mode", multiple = false)]
struct ModeArgs {
    /// Run only unit tests
    #[arg(long)]
    unit_only: bool,

    /// Run only integration tests
    #[arg(long)]
    integration_only: bool,

    /// Run only performance tests
    #[arg(long)]
    performance_only: bool,

    /// Run only memory tests
    #[arg(long)]
    memory_only: bool,
}

impl ModeArgs {
    fn selected(&self) -> Option<TestCategory> {
        [
            (self.unit_only, TestCategory::Unit),
            (self.integration_only, TestCategory::Integration),
            (self.performance_only, TestCategory::Performance),
            (self.memory_only, TestCategory::Memory),
        ]
        .into_iter()
        .find_map(|(set, category)| set.then_some(category))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a simulator session and track test phases from its serial output
    Simulate {
        /// Simulated session length in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Firmware artifact to load
        #[arg(long)]
        firmware: Option<PathBuf>,

        /// Fail instead of building a missing firmware artifact
        #[arg(long)]
        no_build: bool,
    },
}

impl Cli {
    /// Stage selection flags only apply to the pipeline itself.
    fn check_mode_with_command(&self) -> std::result::Result<(), clap::Error> {
        let pipeline_flags =
            self.mode.selected().is_some() || self.skip_performance || self.skip_memory;
        if self.command.is_some() && pipeline_flags {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "stage selection flags cannot be combined with a subcommand",
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if let Err(e) = cli.check_mode_with_command() {
        e.exit();
    }

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    fwcheck_core::init_tracing(cli.json, level);

    let config = load_config(&cli)?;
    info!(version = VERSION, root = %config.project_root.display(), "fwcheck starting");

    // Dropping the run future kills any in-flight child process.
    tokio::select! {
        code = run(cli, config) => Ok(exit_code(code?)),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            eprintln!("\nInterrupted");
            Ok(ExitCode::from(INTERRUPTED))
        }
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?
            .with_project_root(&cli.project_root),
        None => PipelineConfig::discover(&cli.project_root)
            .with_context(|| format!("Failed to load configuration in {:?}", cli.project_root))?,
    };
    Ok(config)
}

async fn run(cli: Cli, config: PipelineConfig) -> Result<i32> {
    match cli.command {
        Some(Commands::Simulate {
            timeout_ms,
            firmware,
            no_build,
        }) => cmd_simulate(&config, timeout_ms, firmware, no_build).await,
        None => {
            let orchestrator = Orchestrator::with_default_invoker(config);
            match cli.mode.selected() {
                Some(category) => orchestrator.run_single(category).await,
                None => {
                    orchestrator
                        .run_all(cli.skip_performance, cli.skip_memory)
                        .await
                }
            }
        }
    }
}

/// Run a simulator session and print the phase checklist
async fn cmd_simulate(
    config: &PipelineConfig,
    timeout_ms: Option<u64>,
    firmware: Option<PathBuf>,
    no_build: bool,
) -> Result<i32> {
    let mut session = SimulatorSession::from_config(config);
    if let Some(ms) = timeout_ms {
        session = session.with_timeout_ms(ms);
    }
    if let Some(path) = firmware {
        session = session.with_firmware(path);
    }
    if no_build {
        session = session.without_build();
    }

    println!("Firmware: {}", session.firmware().display());
    println!("Serial output:");
    println!("==================================================");

    let outcome = session.run().await.context("Simulator session failed")?;

    println!("==================================================");
    println!("{}", render_phase_summary(&outcome.phases));

    if outcome.passed {
        println!("Simulation PASSED");
        Ok(0)
    } else if outcome.timed_out {
        println!("Simulation FAILED (timed out)");
        Ok(1)
    } else {
        println!("Simulation FAILED");
        Ok(1)
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(status_byte(code))
}

fn status_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("fwcheck").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_is_full_run() {
        let cli = parse(&[]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.mode.selected(), None);
        assert!(!cli.skip_performance);
    }

    #[test]
    fn test_single_mode_selection() {
        let cli = parse(&["--memory-only"]).expect("parse");
        assert_eq!(cli.mode.selected(), Some(TestCategory::Memory));
    }

    #[test]
    fn test_modes_are_exclusive() {
        let err = parse(&["--unit-only", "--integration-only"]).expect_err("conflict");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_skip_conflicts_with_single_mode() {
        let err = parse(&["--unit-only", "--skip-memory"]).expect_err("conflict");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_skip_flags_for_full_run() {
        let cli = parse(&["--skip-performance", "--skip-memory"]).expect("parse");
        assert!(cli.skip_performance && cli.skip_memory);
        assert!(cli.check_mode_with_command().is_ok());
    }

    #[test]
    fn test_simulate_subcommand() {
        let cli = parse(&["simulate", "--timeout-ms", "5000", "--no-build"]).expect("parse");
        match cli.command {
            Some(Commands::Simulate {
                timeout_ms,
                firmware,
                no_build,
            }) => {
                assert_eq!(timeout_ms, Some(5000));
                assert!(firmware.is_none());
                assert!(no_build);
            }
            None => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_stage_flags_rejected_with_subcommand() {
        let cli = parse(&["--unit-only", "simulate"]).expect("parse");
        let err = cli.check_mode_with_command().expect_err("conflict");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_load_config_with_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[build]\ntool = \"platformio\"\n").expect("write");

        let root = dir.path().display().to_string();
        let file = path.display().to_string();
        let cli = parse(&["--project-root", &root, "--config", &file]).expect("parse");
        let config = load_config(&cli).expect("load");
        assert_eq!(config.build.tool, "platformio");
        assert_eq!(config.project_root, dir.path());
    }

    #[test]
    fn test_status_byte() {
        assert_eq!(status_byte(0), 0);
        assert_eq!(status_byte(1), 1);
        assert_eq!(status_byte(-1), 1);
        assert_eq!(status_byte(300), 1);
    }
}
