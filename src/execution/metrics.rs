use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for [`super::BatchRunner`] runs.
///
/// Updated while records are transformed; callers can snapshot them at any time.
#[derive(Debug, Default)]
pub struct BatchMetrics {
    runs: AtomicU64,
    records_processed: AtomicU64,
    failures: AtomicU64,
    elapsed_ns: AtomicU64,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_run(&self) {
        let _ = self.runs.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self, elapsed: Duration) {
        let add = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.elapsed_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub(crate) fn on_record(&self, ok: bool) {
        let _ = self.records_processed.fetch_add(1, Ordering::SeqCst);
        if !ok {
            let _ = self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn snapshot(&self) -> BatchMetricsSnapshot {
        BatchMetricsSnapshot {
            runs: self.runs.load(Ordering::SeqCst),
            records_processed: self.records_processed.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            elapsed: Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst)),
        }
    }
}

/// Immutable snapshot of [`BatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMetricsSnapshot {
    pub runs: u64,
    pub records_processed: u64,
    pub failures: u64,
    /// Total wall time across runs.
    pub elapsed: Duration,
}

impl fmt::Display for BatchMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs={}, records_processed={}, failures={}, elapsed={:?}",
            self.runs, self.records_processed, self.failures, self.elapsed
        )
    }
}
