//! Simulator session driver.
//!
//! Launches the hardware simulator CLI, streams its serial output line by
//! line into a [`PhaseTracker`], and reports which test phases were reached.

use fwcheck_core::{
    emit_phase_completed, InfrastructureFault, PhaseSet, PhaseTracker, PipelineConfig,
    SimulatorConfig, METRICS,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::invoker::{Invocation, ProcessInvoker, TokioInvoker};

/// Result of one simulated session.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    /// The simulator exited zero before the deadline.
    pub passed: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Final phase state.
    pub phases: PhaseSet,
    pub lines_seen: u64,
}

impl SimulationOutcome {
    fn not_started(phases: PhaseSet) -> Self {
        Self {
            passed: false,
            exit_code: None,
            timed_out: false,
            phases,
            lines_seen: 0,
        }
    }
}

pub struct SimulatorSession {
    config: SimulatorConfig,
    invoker: Arc<dyn ProcessInvoker>,
    project_root: PathBuf,
    phases: PhaseSet,
    timeout_ms: u64,
    firmware: PathBuf,
    work_dir: PathBuf,
    allow_build: bool,
    echo: bool,
}

impl SimulatorSession {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_invoker(config, Arc::new(TokioInvoker))
    }

    /// `invoker` runs the firmware build; the simulator itself is always a
    /// real streamed process.
    pub fn with_invoker(config: &PipelineConfig, invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self {
            config: config.simulator.clone(),
            invoker,
            project_root: config.project_root.clone(),
            phases: config.phase_set(),
            timeout_ms: config.simulator.timeout_ms,
            firmware: config.resolve(&config.simulator.firmware),
            work_dir: config.resolve(&config.simulator.work_dir),
            allow_build: true,
            echo: true,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_firmware(mut self, firmware: impl Into<PathBuf>) -> Self {
        let firmware = firmware.into();
        self.firmware = if firmware.is_absolute() {
            firmware
        } else {
            self.project_root.join(firmware)
        };
        self
    }

    /// Fail instead of building when the firmware artifact is missing.
    pub fn without_build(mut self) -> Self {
        self.allow_build = false;
        self
    }

    /// Do not echo simulator output to stdout.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn firmware(&self) -> &Path {
        &self.firmware
    }

    /// Find the simulator CLI on `PATH`, then in the configured fallbacks.
    pub fn locate_cli(&self) -> Result<PathBuf, InfrastructureFault> {
        if let Ok(path) = which::which(&self.config.cli) {
            return Ok(path);
        }
        self.config
            .expanded_search_paths()
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| InfrastructureFault::ToolNotFound {
                program: self.config.cli.clone(),
            })
    }

    /// Make sure the firmware artifact exists, building it if allowed.
    ///
    /// Returns `Ok(false)` when the build ran but did not produce the
    /// artifact.
    pub async fn ensure_firmware(&self) -> Result<bool, InfrastructureFault> {
        if self.firmware.is_file() {
            debug!(firmware = %self.firmware.display(), "firmware present");
            return Ok(true);
        }
        if !self.allow_build {
            return Err(InfrastructureFault::MissingArtifact {
                path: self.firmware.clone(),
            });
        }

        let invocation = Invocation::from_command(&self.config.build_command)
            .ok_or_else(|| InfrastructureFault::ToolNotFound {
                program: "<empty build command>".to_string(),
            })?
            .in_dir(&self.project_root)
            .with_timeout(self.config.build_timeout_secs);
        info!(command = %invocation.command_line(), "building firmware");

        let output = self.invoker.invoke(&invocation).await?;
        if !output.success() {
            warn!(detail = %output.failure_detail(), "firmware build failed");
            if self.echo {
                println!("{}", output.combined().trim_end());
            }
            return Ok(false);
        }
        Ok(self.firmware.is_file())
    }

    /// Run the whole session: locate, build if needed, simulate.
    pub async fn run(&self) -> Result<SimulationOutcome, InfrastructureFault> {
        let cli = self.locate_cli()?;
        let mut tracker = PhaseTracker::new(self.phases.clone());

        if !self.ensure_firmware().await? {
            return Ok(SimulationOutcome::not_started(tracker.into_summary()));
        }

        let args = self
            .config
            .render_launch_args(self.timeout_ms, &self.firmware);
        info!(
            cli = %cli.display(),
            args = ?args,
            timeout_ms = self.timeout_ms,
            "starting simulation"
        );

        let mut child = Command::new(&cli)
            .args(&args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InfrastructureFault::LaunchFailed {
                program: cli.display().to_string(),
                reason: e.to_string(),
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(InfrastructureFault::LaunchFailed {
                program: cli.display().to_string(),
                reason: "output pipes unavailable".to_string(),
            });
        };

        let deadline = Instant::now()
            + Duration::from_millis(self.timeout_ms)
            + Duration::from_secs(self.config.grace_secs);
        let mut lines_seen = 0u64;

        let finished = tokio::time::timeout_at(deadline, async {
            drive(stdout, stderr, &mut tracker, self.echo, &mut lines_seen).await?;
            child.wait().await
        })
        .await;

        let (exit_code, timed_out) = match finished {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => {
                return Err(InfrastructureFault::ToolFailed {
                    tool: cli.display().to_string(),
                    detail: e.to_string(),
                })
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout_ms, "simulator exceeded deadline, killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill simulator");
                }
                (None, true)
            }
        };

        let phases = tracker.into_summary();
        info!(
            exit_code = ?exit_code,
            timed_out = timed_out,
            lines = lines_seen,
            completed = phases.completed_count(),
            total = phases.total(),
            "simulation finished"
        );
        METRICS.flush();

        Ok(SimulationOutcome {
            passed: !timed_out && exit_code == Some(0),
            exit_code,
            timed_out,
            phases,
            lines_seen,
        })
    }
}

/// Feed every line of `reader` to `tracker` as it arrives.
///
/// Invalid UTF-8 is replaced rather than rejected. A final line without a
/// trailing newline still counts. Returns the number of lines read.
pub async fn consume_lines<R>(reader: R, tracker: &mut PhaseTracker, echo: bool) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    let mut seen = 0u64;
    while let Some(segment) = segments.next_segment().await? {
        observe_line(tracker, &segment, echo);
        seen += 1;
    }
    Ok(seen)
}

/// Interleave two streams line by line until both close.
///
/// `next_segment` is cancel safe, so a partial line on one stream survives
/// the other stream winning the select.
async fn drive<A, B>(
    out: A,
    err: B,
    tracker: &mut PhaseTracker,
    echo: bool,
    seen: &mut u64,
) -> io::Result<()>
where
    A: AsyncRead + Unpin,
    B: AsyncRead + Unpin,
{
    let mut out = BufReader::new(out).split(b'\n');
    let mut err = BufReader::new(err).split(b'\n');
    let (mut out_open, mut err_open) = (true, true);

    while out_open || err_open {
        let segment = tokio::select! {
            segment = out.next_segment(), if out_open => {
                let segment = segment?;
                out_open = segment.is_some();
                segment
            }
            segment = err.next_segment(), if err_open => {
                let segment = segment?;
                err_open = segment.is_some();
                segment
            }
        };
        if let Some(segment) = segment {
            observe_line(tracker, &segment, echo);
            *seen += 1;
        }
    }
    Ok(())
}

fn observe_line(tracker: &mut PhaseTracker, raw: &[u8], echo: bool) {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches(['\r', '\n']);
    if echo {
        println!("{line}");
    }
    METRICS.inc_log_lines();

    for name in tracker.update(line) {
        let summary = tracker.summary();
        emit_phase_completed(&name, summary.completed_count(), summary.total());
        METRICS.add_phases_completed(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_line_strips_line_endings() {
        let mut tracker = PhaseTracker::default();
        observe_line(&mut tracker, b"[I] SplashPanel loaded successfully\r\n", false);
        assert!(tracker.summary().is_completed("startup"));
    }

    #[test]
    fn test_observe_line_tolerates_invalid_utf8() {
        let mut tracker = PhaseTracker::default();
        let mut raw = vec![0xff, 0xfe];
        raw.extend_from_slice(b" Gauge animation tick\n");
        observe_line(&mut tracker, &raw, false);
        assert!(tracker.summary().is_completed("sensor_interaction"));
    }

    #[tokio::test]
    async fn test_consume_lines_counts_and_tracks() {
        let log: &[u8] = b"boot\nTheme changed to Night\nError navigation\n";
        let mut tracker = PhaseTracker::default();
        let seen = consume_lines(log, &mut tracker, false).await.expect("read");
        assert_eq!(seen, 3);
        assert_eq!(
            tracker.summary().completed_names(),
            vec!["theme_trigger", "error_system"]
        );
    }

    #[tokio::test]
    async fn test_consume_lines_final_line_without_newline() {
        let log: &[u8] = b"noise\nConfig exit";
        let mut tracker = PhaseTracker::default();
        let seen = consume_lines(log, &mut tracker, false).await.expect("read");
        assert_eq!(seen, 2);
        assert!(tracker.summary().is_completed("configuration"));
    }

    #[tokio::test]
    async fn test_drive_keeps_unterminated_line_across_streams() {
        use tokio::io::AsyncWriteExt;

        let (mut out_tx, out_rx) = tokio::io::duplex(64);
        let (mut err_tx, err_rx) = tokio::io::duplex(64);
        let writer = async move {
            out_tx.write_all(b"Config exit").await.expect("write stdout");
            tokio::task::yield_now().await;
            err_tx.write_all(b"noise\n").await.expect("write stderr");
            tokio::task::yield_now().await;
            drop(err_tx);
            drop(out_tx);
        };

        let mut tracker = PhaseTracker::default();
        let mut seen = 0;
        let (read, ()) = tokio::join!(
            drive(out_rx, err_rx, &mut tracker, false, &mut seen),
            writer
        );
        read.expect("read");

        assert_eq!(seen, 2);
        assert!(tracker.summary().is_completed("configuration"));
    }

    #[tokio::test]
    async fn test_drive_reads_both_streams() {
        let out: &[u8] = b"SplashPanel loaded successfully\n";
        let err: &[u8] = b"Config panel opened\nextra\n";
        let mut tracker = PhaseTracker::default();
        let mut seen = 0;
        drive(out, err, &mut tracker, false, &mut seen)
            .await
            .expect("read");
        assert_eq!(seen, 3);
        assert!(tracker.summary().is_completed("startup"));
        assert!(tracker.summary().is_completed("configuration"));
    }
}
