//! Lifecycle of a single pipeline run.
//!
//! A run is strictly linear: no state is ever re-entered.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{FwcheckError, Result};

/// Pipeline run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    StagesRunning,
    CoverageGenerating,
    CoverageValidating,
    Reporting,
    Done,
}

impl RunState {
    /// The only state this one may move to, or `None` when terminal.
    pub fn successor(self) -> Option<RunState> {
        match self {
            RunState::Init => Some(RunState::StagesRunning),
            RunState::StagesRunning => Some(RunState::CoverageGenerating),
            RunState::CoverageGenerating => Some(RunState::CoverageValidating),
            RunState::CoverageValidating => Some(RunState::Reporting),
            RunState::Reporting => Some(RunState::Done),
            RunState::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::StagesRunning => "stages_running",
            RunState::CoverageGenerating => "coverage_generating",
            RunState::CoverageValidating => "coverage_validating",
            RunState::Reporting => "reporting",
            RunState::Done => "done",
        }
    }

    /// Move to `next`, rejecting anything but the immediate successor.
    pub fn transition(&mut self, next: RunState) -> Result<()> {
        if self.successor() != Some(next) {
            return Err(FwcheckError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_walk_reaches_done() {
        let mut state = RunState::Init;
        while let Some(next) = state.successor() {
            state.transition(next).expect("linear transition");
        }
        assert_eq!(state, RunState::Done);
    }

    #[test]
    fn test_skipping_a_state_is_rejected() {
        let mut state = RunState::Init;
        let err = state
            .transition(RunState::Reporting)
            .expect_err("skip must fail");
        assert!(err.to_string().contains("init -> reporting"));
        assert_eq!(state, RunState::Init);
    }

    #[test]
    fn test_no_reentry() {
        let mut state = RunState::CoverageValidating;
        assert!(state.transition(RunState::StagesRunning).is_err());
        assert!(state.transition(RunState::CoverageValidating).is_err());

        let mut done = RunState::Done;
        assert!(done.transition(RunState::Init).is_err());
    }
}
