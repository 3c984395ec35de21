//! fwcheck CI - firmware test stage execution
//!
//! Provides the pipeline orchestrator that:
//! - Runs the unit, integration, performance and memory stages
//! - Generates and gates coverage
//! - Writes the machine-readable run report
//! - Drives simulator sessions and tracks test phases

pub mod coverage_gen;
pub mod fakes;
pub mod invoker;
pub mod pipeline;
pub mod runner;
pub mod simulator;
pub mod spec;
pub mod stage;

// Re-export key types
pub use coverage_gen::{count_artifacts, CoverageArtifacts, CoverageGenerator};
pub use invoker::{Invocation, ProcessInvoker, ProcessOutput, TokioInvoker};
pub use pipeline::{Orchestrator, PipelineRun};
pub use runner::{StageResult, StageRunner};
pub use simulator::{consume_lines, SimulationOutcome, SimulatorSession};
pub use spec::RunSpec;
pub use stage::StageConfig;
