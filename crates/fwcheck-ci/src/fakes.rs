//! Scripted process invoker (testing only)
//!
//! `ScriptedInvoker` answers invocations from a table of canned responses
//! and records every call, so pipeline logic can be exercised without the
//! build tool or coverage extractor installed.

use std::sync::Mutex;

use async_trait::async_trait;
use fwcheck_core::InfrastructureFault;

use crate::invoker::{Invocation, ProcessInvoker, ProcessOutput};

#[derive(Debug, Clone)]
enum Response {
    Exit { code: i32, stdout: String },
    TimeOut,
    Missing,
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    /// Matches when any argument equals this value; `None` matches all.
    arg: Option<String>,
    response: Response,
}

impl Rule {
    fn matches(&self, invocation: &Invocation) -> bool {
        self.program == invocation.program
            && self
                .arg
                .as_ref()
                .map_or(true, |arg| invocation.args.iter().any(|a| a == arg))
    }
}

/// In-memory invoker driven by rules. The first matching rule wins;
/// unmatched invocations exit 0 with empty output.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `code` and `stdout` when `program` runs with `arg`.
    pub fn respond(mut self, program: &str, arg: &str, code: i32, stdout: &str) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            arg: Some(arg.to_string()),
            response: Response::Exit {
                code,
                stdout: stdout.to_string(),
            },
        });
        self
    }

    /// Report a timeout when `program` runs with `arg`.
    pub fn time_out(mut self, program: &str, arg: &str) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            arg: Some(arg.to_string()),
            response: Response::TimeOut,
        });
        self
    }

    /// Treat `program` as not installed.
    pub fn missing_tool(mut self, program: &str) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            arg: None,
            response: Response::Missing,
        });
        self
    }

    /// Every invocation seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any recorded invocation passed `arg`.
    pub fn was_called_with(&self, arg: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|inv| inv.args.iter().any(|a| a == arg))
    }
}

#[async_trait]
impl ProcessInvoker for ScriptedInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<ProcessOutput, InfrastructureFault> {
        self.calls.lock().unwrap().push(invocation.clone());

        let response = self
            .rules
            .iter()
            .find(|rule| rule.matches(invocation))
            .map(|rule| rule.response.clone())
            .unwrap_or(Response::Exit {
                code: 0,
                stdout: String::new(),
            });

        match response {
            Response::Exit { code, stdout } => Ok(ProcessOutput {
                exit_code: Some(code),
                stdout,
                ..Default::default()
            }),
            Response::TimeOut => Ok(ProcessOutput {
                exit_code: None,
                stderr: format!("{} timed out", invocation.command_line()),
                duration_ms: invocation.timeout_secs * 1000,
                timed_out: true,
                ..Default::default()
            }),
            Response::Missing => Err(InfrastructureFault::ToolNotFound {
                program: invocation.program.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let invoker = ScriptedInvoker::new()
            .respond("pio", "test-coverage", 1, "unit failed")
            .respond("pio", "test-coverage", 0, "shadowed");
        let out = invoker
            .invoke(&Invocation::new("pio", ["test", "-e", "test-coverage"]))
            .await
            .expect("scripted");
        assert_eq!(out.exit_code, Some(1));
        assert_eq!(out.stdout, "unit failed");
    }

    #[tokio::test]
    async fn test_unmatched_invocation_succeeds() {
        let invoker = ScriptedInvoker::new();
        let out = invoker
            .invoke(&Invocation::new("lcov", ["--summary", "coverage.info"]))
            .await
            .expect("scripted");
        assert!(out.success());
        assert_eq!(invoker.calls().len(), 1);
        assert!(invoker.was_called_with("--summary"));
    }

    #[tokio::test]
    async fn test_missing_tool_faults() {
        let invoker = ScriptedInvoker::new().missing_tool("lcov");
        let err = invoker
            .invoke(&Invocation::new("lcov", ["--capture"]))
            .await
            .expect_err("missing");
        assert!(matches!(err, InfrastructureFault::ToolNotFound { .. }));
    }
}
