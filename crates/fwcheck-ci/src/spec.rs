//! Run specification and identity.

use fwcheck_core::{PipelineConfig, TestCategory, ThresholdTable};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::stage::StageConfig;

/// What a pipeline run will execute, reduced to a stable digest.
///
/// Two runs with the same stage commands, coverage tool and thresholds
/// share a `config_digest`, independent of the project location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSpec {
    /// Stage names in execution order.
    pub stages: Vec<String>,

    /// SHA-256 digest of the ordered stage commands.
    pub stages_digest: String,

    /// SHA-256 digest over stages, coverage tool and thresholds.
    pub config_digest: String,
}

impl RunSpec {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let stages: Vec<StageConfig> = TestCategory::ALL
            .iter()
            .map(|c| StageConfig::for_category(*c, &config.build, &config.project_root))
            .collect();

        let stages_digest = compute_stages_digest(&stages);
        let config_digest = compute_config_digest(
            &stages_digest,
            &config.coverage.tool,
            &config.coverage.thresholds,
        );

        Self {
            stages: stages.iter().map(|s| s.name().to_string()).collect(),
            stages_digest,
            config_digest,
        }
    }
}

fn compute_stages_digest(stages: &[StageConfig]) -> String {
    let mut hasher = Sha256::new();
    for stage in stages {
        hasher.update(stage.name().as_bytes());
        hasher.update(b"\0");
        for arg in &stage.command {
            hasher.update(arg.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

fn compute_config_digest(stages_digest: &str, coverage_tool: &str, thresholds: &ThresholdTable) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stages_digest.as_bytes());
    hasher.update(b"\0");
    hasher.update(coverage_tool.as_bytes());
    hasher.update(b"\0");
    // ThresholdTable iterates in key order.
    for (name, minimum) in thresholds.iter() {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(minimum.to_bits().to_le_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
