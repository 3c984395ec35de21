//! Error taxonomy for fwcheck.
//!
//! Stage failures and malformed coverage lines are data, not errors. Only a
//! step that could not be executed at all surfaces here.

use std::path::PathBuf;

/// A required external tool or artifact is missing or unlaunchable.
///
/// Distinct from a tool that ran and reported failure: the affected step is
/// treated as failed, never silently skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InfrastructureFault {
    #[error("tool not found: {program}")]
    ToolNotFound { program: String },

    #[error("failed to launch {program}: {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("required artifact missing: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("no instrumentation artifacts found under {}", dir.display())]
    NoInstrumentationArtifacts { dir: PathBuf },

    #[error("{tool} exited with {detail}")]
    ToolFailed { tool: String, detail: String },
}

/// fwcheck errors.
#[derive(Debug, thiserror::Error)]
pub enum FwcheckError {
    #[error("infrastructure fault: {0}")]
    Infrastructure(#[from] InfrastructureFault),

    #[error("invalid run state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fwcheck operations.
pub type Result<T> = std::result::Result<T, FwcheckError>;
