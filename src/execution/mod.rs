//! Parallel record transformation.
//!
//! [`BatchRunner`] applies one compiled [`RecordTransformer`] to many records on a dedicated
//! rayon pool. Output order matches input order. The first failing record fails the batch;
//! records already in flight may still run, but nothing is returned for them.

mod metrics;

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::engine::record::{Record, RecordTransformer};
use crate::error::{TransformError, TransformResult};

pub use metrics::{BatchMetrics, BatchMetricsSnapshot};

/// Configuration for the [`BatchRunner`].
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Number of worker threads.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
}

pub struct BatchRunner {
    pool: ThreadPool,
    metrics: Arc<BatchMetrics>,
}

impl BatchRunner {
    /// Build the worker pool. `num_threads == Some(0)` is a configuration error.
    pub fn new(opts: BatchOptions) -> TransformResult<Self> {
        if opts.num_threads == Some(0) {
            return Err(TransformError::config("num_threads must be > 0 when set"));
        }
        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| TransformError::config(format!("failed to build thread pool: {e}")))?;

        Ok(Self {
            pool,
            metrics: Arc::new(BatchMetrics::new()),
        })
    }

    /// Handle to the runner's cumulative metrics.
    pub fn metrics(&self) -> Arc<BatchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Transform every record, preserving order.
    pub fn run(&self, transformer: &RecordTransformer, records: &[serde_json::Value]) -> TransformResult<Vec<Record>> {
        let start = Instant::now();
        self.metrics.begin_run();

        let out = self.pool.install(|| {
            records
                .par_iter()
                .map(|record| {
                    let result = transformer.run(record);
                    self.metrics.on_record(result.is_ok());
                    result
                })
                .collect::<TransformResult<Vec<_>>>()
        });

        self.metrics.end_run(start.elapsed());
        log::debug!("batch of {} records: {}", records.len(), self.metrics.snapshot());
        out
    }
}
