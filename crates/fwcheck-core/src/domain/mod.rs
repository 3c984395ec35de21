//! Domain model for fwcheck runs.

pub mod category;
pub mod error;
pub mod metrics;
pub mod run_state;

pub use category::TestCategory;
pub use error::{FwcheckError, InfrastructureFault, Result};
pub use metrics::{MetricSet, ThresholdTable, BRANCH_COVERAGE, FUNCTION_COVERAGE, LINE_COVERAGE};
pub use run_state::RunState;
