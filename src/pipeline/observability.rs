use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::TransformError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-fatal problem, e.g. an empty input file.
    Warning,
    /// The job failed on its input or configuration.
    Error,
    /// I/O or sink failure.
    Critical,
}

impl Severity {
    /// Classify a job failure.
    pub fn of(error: &TransformError) -> Self {
        match error {
            TransformError::Io(_) => Severity::Critical,
            TransformError::Csv(e) => match e.kind() {
                csv::ErrorKind::Io(_) => Severity::Critical,
                _ => Severity::Error,
            },
            _ => Severity::Error,
        }
    }
}

/// Which job processed a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Contacts,
    Transcript,
    DistressScore,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobKind::Contacts => "contacts",
            JobKind::Transcript => "transcript",
            JobKind::DistressScore => "distress_score",
        })
    }
}

/// The file a job ran on.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub path: PathBuf,
    pub kind: JobKind,
}

/// Rows handed to the loader by one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    pub rows: usize,
}

/// Observer interface for per-file job outcomes.
pub trait PipelineObserver: Send + Sync {
    /// Called when a job finishes and its rows are loaded.
    fn on_success(&self, _ctx: &JobContext, _stats: JobStats) {}

    /// Called when a job completes with nothing to load.
    fn on_warning(&self, _ctx: &JobContext, _message: &str) {}

    /// Called when a job fails.
    fn on_failure(&self, _ctx: &JobContext, _severity: Severity, _error: &TransformError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &JobContext, severity: Severity, error: &TransformError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans callbacks out to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_success(&self, ctx: &JobContext, stats: JobStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_warning(&self, ctx: &JobContext, message: &str) {
        for o in &self.observers {
            o.on_warning(ctx, message);
        }
    }

    fn on_failure(&self, ctx: &JobContext, severity: Severity, error: &TransformError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &JobContext, severity: Severity, error: &TransformError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Reports job events through the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_success(&self, ctx: &JobContext, stats: JobStats) {
        log::info!("[{}] loaded {} rows from {}", ctx.kind, stats.rows, ctx.path.display());
    }

    fn on_warning(&self, ctx: &JobContext, message: &str) {
        log::warn!("[{}] {}: {}", ctx.kind, ctx.path.display(), message);
    }

    fn on_failure(&self, ctx: &JobContext, severity: Severity, error: &TransformError) {
        log::error!("[{}][{:?}] {}: {}", ctx.kind, severity, ctx.path.display(), error);
    }

    fn on_alert(&self, ctx: &JobContext, severity: Severity, error: &TransformError) {
        log::error!("[ALERT][{}][{:?}] {}: {}", ctx.kind, severity, ctx.path.display(), error);
    }
}
