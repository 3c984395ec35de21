//! Stage definitions and configuration.

use fwcheck_core::{BuildConfig, TestCategory};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::invoker::Invocation;

/// Configuration for one test stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub category: TestCategory,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Timeout in seconds; `0` disables it.
    pub timeout_secs: u64,

    /// Working directory for the build tool.
    pub workdir: PathBuf,
}

impl StageConfig {
    /// `<tool> test -e <env> <extra_args...>` for the given category.
    pub fn for_category(category: TestCategory, build: &BuildConfig, workdir: impl Into<PathBuf>) -> Self {
        let mut command = vec![
            build.tool.clone(),
            "test".to_string(),
            "-e".to_string(),
            build.environments.for_category(category).to_string(),
        ];
        command.extend(build.extra_args.iter().cloned());

        Self {
            category,
            command,
            timeout_secs: build.stage_timeout_secs,
            workdir: workdir.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.category.name()
    }

    pub fn invocation(&self) -> Option<Invocation> {
        Invocation::from_command(&self.command)
            .map(|inv| inv.in_dir(&self.workdir).with_timeout(self.timeout_secs))
    }
}
