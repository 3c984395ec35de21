//! Global atomic counters for fwcheck runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single `tracing::info!`
//! event at the end of a run or simulator session.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    stages_executed: AtomicU64,
    infrastructure_faults: AtomicU64,
    log_lines_scanned: AtomicU64,
    phases_completed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            stages_executed: AtomicU64::new(0),
            infrastructure_faults: AtomicU64::new(0),
            log_lines_scanned: AtomicU64::new(0),
            phases_completed: AtomicU64::new(0),
        }
    }

    pub fn inc_stages_executed(&self) {
        self.stages_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stages_executed", "counter incremented");
    }

    pub fn inc_infrastructure_faults(&self) {
        self.infrastructure_faults.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "infrastructure_faults", "counter incremented");
    }

    /// Called once per streamed log line.
    pub fn inc_log_lines(&self) {
        self.log_lines_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_phases_completed(&self, n: u64) {
        self.phases_completed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            stages_executed = self.stages_executed(),
            infrastructure_faults = self.infrastructure_faults(),
            log_lines_scanned = self.log_lines_scanned(),
            phases_completed = self.phases_completed(),
        );
    }

    pub fn stages_executed(&self) -> u64 {
        self.stages_executed.load(Ordering::Relaxed)
    }

    pub fn infrastructure_faults(&self) -> u64 {
        self.infrastructure_faults.load(Ordering::Relaxed)
    }

    pub fn log_lines_scanned(&self) -> u64 {
        self.log_lines_scanned.load(Ordering::Relaxed)
    }

    pub fn phases_completed(&self) -> u64 {
        self.phases_completed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let m = Metrics::new();
        m.inc_stages_executed();
        m.inc_stages_executed();
        m.inc_infrastructure_faults();
        m.inc_log_lines();
        m.add_phases_completed(3);

        assert_eq!(m.stages_executed(), 2);
        assert_eq!(m.infrastructure_faults(), 1);
        assert_eq!(m.log_lines_scanned(), 1);
        assert_eq!(m.phases_completed(), 3);
    }

    #[test]
    fn test_flush_does_not_reset() {
        let m = Metrics::new();
        m.inc_log_lines();
        m.flush();
        assert_eq!(m.log_lines_scanned(), 1);
    }
}
