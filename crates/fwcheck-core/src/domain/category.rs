//! Test categories run by the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One layer of the firmware test suite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Unit,
    Integration,
    Performance,
    Memory,
}

impl TestCategory {
    /// Every category, in pipeline order.
    pub const ALL: [TestCategory; 4] = [
        TestCategory::Unit,
        TestCategory::Integration,
        TestCategory::Performance,
        TestCategory::Memory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TestCategory::Unit => "unit",
            TestCategory::Integration => "integration",
            TestCategory::Performance => "performance",
            TestCategory::Memory => "memory",
        }
    }

    /// Key used in the persisted report's `test_results` object.
    pub fn report_key(&self) -> &'static str {
        match self {
            TestCategory::Unit => "unit_tests",
            TestCategory::Integration => "integration_tests",
            TestCategory::Performance => "performance_tests",
            TestCategory::Memory => "memory_tests",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TestCategory::Unit => "Unit Tests",
            TestCategory::Integration => "Integration Tests",
            TestCategory::Performance => "Performance Tests",
            TestCategory::Memory => "Memory Tests",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
