//! External process invocation.
//!
//! Every external tool (build tool, coverage extractor, simulator build) is
//! reached through [`ProcessInvoker`] so orchestration logic can run against
//! a fake in tests.

use async_trait::async_trait;
use fwcheck_core::InfrastructureFault;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub cwd: Option<PathBuf>,
    /// Timeout in seconds; `0` waits indefinitely.
    pub timeout_secs: u64,
}

impl Invocation {
    pub fn new<S: Into<String>>(program: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout_secs: 0,
        }
    }

    /// Build from a full command line (first element is the executable).
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What an invocation produced. A nonzero exit or a timeout is data here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed (timeout or signal).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end_matches('\n'), self.stderr),
        }
    }

    /// Short description of a failure, for logs and fault messages.
    pub fn failure_detail(&self) -> String {
        if self.timed_out {
            return format!("timeout after {}ms", self.duration_ms);
        }
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// Capability to run an external command and capture its output.
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Run `invocation` to completion.
    ///
    /// Returns `Err` only when the program cannot be found or started.
    async fn invoke(&self, invocation: &Invocation) -> Result<ProcessOutput, InfrastructureFault>;
}

/// Invoker backed by `tokio::process`.
///
/// Children are spawned with `kill_on_drop`, so a timed-out or cancelled
/// invocation never leaves the process running.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioInvoker;

#[async_trait]
impl ProcessInvoker for TokioInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<ProcessOutput, InfrastructureFault> {
        let start = Instant::now();

        let program = which::which(&invocation.program).map_err(|_| {
            InfrastructureFault::ToolNotFound {
                program: invocation.program.clone(),
            }
        })?;

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        debug!(command = %invocation.command_line(), "spawning");
        let mut child = command.spawn().map_err(|e| InfrastructureFault::LaunchFailed {
            program: invocation.program.clone(),
            reason: e.to_string(),
        })?;

        // Buffers live outside the timeout so a killed stage keeps what it
        // printed before hanging.
        let (stdout, stderr) = (child.stdout.take(), child.stderr.take());
        let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
        let collect = async {
            let (out_read, err_read, status) = tokio::join!(
                drain(stdout, &mut out_buf),
                drain(stderr, &mut err_buf),
                child.wait()
            );
            for read in [out_read, err_read] {
                if let Err(e) = read {
                    debug!(error = %e, "output stream closed early");
                }
            }
            status
        };

        let waited = if invocation.timeout_secs > 0 {
            tokio::time::timeout(Duration::from_secs(invocation.timeout_secs), collect)
                .await
                .ok()
        } else {
            Some(collect.await)
        };

        let timed_out = waited.is_none();
        let exit_code = match waited {
            Some(Ok(status)) => status.code(),
            Some(Err(e)) => {
                return Err(InfrastructureFault::LaunchFailed {
                    program: invocation.program.clone(),
                    reason: e.to_string(),
                })
            }
            None => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out process");
                }
                None
            }
        };

        let mut stderr = String::from_utf8_lossy(&err_buf).to_string();
        if timed_out {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "{} timed out after {} seconds\n",
                invocation.command_line(),
                invocation.timeout_secs
            ));
        }

        Ok(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&out_buf).to_string(),
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
            timed_out,
        })
    }
}

/// Append everything `reader` yields to `buf`, chunk by chunk.
async fn drain<R: AsyncRead + Unpin>(reader: Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let inv = Invocation::new("pio", ["test", "-e", "test-memory"]);
        assert_eq!(inv.command_line(), "pio test -e test-memory");
        assert!(inv.cwd.is_none());
        assert_eq!(inv.timeout_secs, 0);
    }

    #[test]
    fn test_from_command() {
        let cmd = vec!["pio".to_string(), "run".to_string()];
        let inv = Invocation::from_command(&cmd).expect("non-empty");
        assert_eq!(inv.program, "pio");
        assert_eq!(inv.args, vec!["run".to_string()]);
        assert!(Invocation::from_command(&[]).is_none());
    }

    #[test]
    fn test_output_success_requires_zero_and_no_timeout() {
        let ok = ProcessOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(ok.success());

        let timed_out = ProcessOutput {
            exit_code: Some(0),
            timed_out: true,
            ..Default::default()
        };
        assert!(!timed_out.success());

        let killed = ProcessOutput::default();
        assert!(!killed.success());
        assert_eq!(killed.failure_detail(), "termination by signal");
    }

    #[test]
    fn test_combined_output() {
        let out = ProcessOutput {
            exit_code: Some(1),
            stdout: "ran 3 tests\n".to_string(),
            stderr: "1 failed\n".to_string(),
            ..Default::default()
        };
        assert_eq!(out.combined(), "ran 3 tests\n1 failed\n");
        assert_eq!(out.failure_detail(), "exit code 1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_captures_stdout() {
        let out = TokioInvoker
            .invoke(&Invocation::new("echo", ["hello"]).with_timeout(30))
            .await
            .expect("echo runs");
        assert!(out.success());
        assert!(out.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_nonzero_is_data() {
        let out = TokioInvoker
            .invoke(&Invocation::new("false", Vec::<String>::new()))
            .await
            .expect("false runs");
        assert!(!out.success());
        assert_ne!(out.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_captures_stderr_and_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = TokioInvoker
            .invoke(&Invocation::new("sh", ["-c", "pwd; echo oops >&2; exit 3"]).in_dir(dir.path()))
            .await
            .expect("sh runs");
        assert_eq!(out.exit_code, Some(3));
        assert!(out.stderr.contains("oops"));
        let name = dir.path().file_name().and_then(|n| n.to_str()).expect("utf8 name");
        assert!(out.stdout.contains(name));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_timeout_is_failed_output() {
        let out = TokioInvoker
            .invoke(&Invocation::new("sleep", ["10"]).with_timeout(1))
            .await
            .expect("sleep starts");
        assert!(out.timed_out);
        assert!(!out.success());
        assert!(out.duration_ms < 10_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let out = TokioInvoker
            .invoke(
                &Invocation::new("sh", ["-c", "echo 'test_gauge_init PASSED'; echo warming >&2; exec sleep 10"])
                    .with_timeout(1),
            )
            .await
            .expect("sh starts");
        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert!(out.stdout.contains("test_gauge_init PASSED"));
        assert!(out.stderr.contains("warming"));
        assert!(out.stderr.contains("timed out after 1 seconds"));
    }

    #[tokio::test]
    async fn test_missing_program_is_fault() {
        let err = TokioInvoker
            .invoke(&Invocation::new("/nonexistent-binary-that-does-not-exist", ["x"]))
            .await
            .expect_err("missing binary");
        assert!(matches!(err, InfrastructureFault::ToolNotFound { .. }));
    }
}
