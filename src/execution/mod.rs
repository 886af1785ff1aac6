//! Execution engine for running record batches with configurable parallelism.
//!
//! This module sits "above" [`crate::transformer`] and [`crate::compliance`] and provides:
//!
//! - Parallel (chunked) transformation and compliance scanning
//! - Resource limits / throttling (e.g., in-flight chunks)
//! - Real-time metrics + observer hooks for monitoring
//!
//! Each chunk owns its own [`ComplianceStatsProcessor`]; partial stats are merged after the
//! parallel section so no counter is shared between workers.

mod observer;
mod semaphore;

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use tracing::info;

use crate::compliance::{AcceptAll, ComplianceStats, ComplianceStatsProcessor, FormatMatcher};
use crate::error::{MapError, MapResult};
use crate::transformer::RecordTransformer;
use crate::types::{FieldDecl, Record};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, TracingExecutionObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Number of records per chunk.
    pub chunk_size: usize,
    /// Upper bound on concurrently executing chunks.
    ///
    /// This is an additional throttle on top of `num_threads`.
    pub max_in_flight_chunks: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads: Some(n),
            chunk_size: 4_096,
            max_in_flight_chunks: n.max(1),
        }
    }
}

/// A configurable execution engine for in-memory record batches.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails with [`MapError::InvalidExecutionOptions`] if `chunk_size == 0`, `max_in_flight_chunks == 0`,
    /// or `num_threads == Some(0)`.
    pub fn new(opts: ExecutionOptions) -> MapResult<Self> {
        if opts.chunk_size == 0 {
            return Err(invalid_option("chunk_size must be > 0"));
        }
        if opts.max_in_flight_chunks == 0 {
            return Err(invalid_option("max_in_flight_chunks must be > 0"));
        }
        if opts.num_threads == Some(0) {
            return Err(invalid_option("num_threads must be > 0 when set"));
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);

        let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Transform every record in parallel, preserving input order.
    ///
    /// Fails with the error of the earliest failing chunk; its partial output is discarded.
    pub fn transform_parallel(&self, transformer: &RecordTransformer, records: &[Record]) -> MapResult<Vec<Record>> {
        self.pool.install(|| {
            self.run_chunks(records.len(), |range| {
                let mut out = Vec::with_capacity(range.len());
                for record in &records[range] {
                    self.metrics.on_record_processed();
                    match transformer.transform(record) {
                        Ok(rec) => out.push(rec),
                        Err(e) => {
                            self.metrics.on_record_failed();
                            return Err(e);
                        }
                    }
                }
                Ok(out)
            })
        })
    }

    /// Scan every record for compliance with `required_fields`, accepting any present value.
    ///
    /// The result is identical to feeding the records one by one through a single
    /// [`ComplianceStatsProcessor`].
    pub fn scan_compliance_parallel(&self, required_fields: &[FieldDecl], records: &[Record]) -> ComplianceStats {
        self.scan_compliance_parallel_with(required_fields, records, || AcceptAll)
    }

    /// Like [`ExecutionEngine::scan_compliance_parallel`], with a matcher built per chunk.
    pub fn scan_compliance_parallel_with<M, F>(
        &self,
        required_fields: &[FieldDecl],
        records: &[Record],
        make_matcher: F,
    ) -> ComplianceStats
    where
        M: FormatMatcher + 'static,
        F: Fn() -> M + Send + Sync,
    {
        let partials = self.pool.install(|| {
            self.run_chunks(records.len(), |range| {
                let mut stats = ComplianceStatsProcessor::starting_at(required_fields.to_vec(), range.start + 1)
                    .with_matcher(make_matcher());
                for record in &records[range] {
                    self.metrics.on_record_processed();
                    if !stats.record(record).is_valid() {
                        self.metrics.on_record_invalid();
                    }
                }
                Ok::<_, MapError>(vec![stats.stats()])
            })
        });

        let mut total = ComplianceStats::default();
        // Chunk work above never fails.
        for partial in partials.into_iter().flatten() {
            total.merge(partial);
        }
        info!(
            total = total.total_records,
            valid = total.valid_records,
            invalid = total.invalid_records,
            "compliance scan finished"
        );
        total
    }

    fn run_chunks<T, F>(&self, record_count: usize, work: F) -> MapResult<Vec<T>>
    where
        T: Send,
        F: Fn(Range<usize>) -> MapResult<Vec<T>> + Send + Sync,
    {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted);

        let sem = Semaphore::new(self.opts.max_in_flight_chunks);
        let ranges = chunk_ranges(record_count, self.opts.chunk_size);

        let per_chunk: Vec<MapResult<Vec<T>>> = ranges
            .into_par_iter()
            .map(|range| {
                let (_permit, waited) = sem.acquire();
                if waited > Duration::ZERO {
                    self.metrics.on_throttle_wait(waited);
                    self.emit(ExecutionEvent::ThrottleWaited { duration: waited });
                }

                self.metrics.on_chunk_start();
                self.emit(ExecutionEvent::ChunkStarted {
                    start_record: range.start,
                    record_count: range.len(),
                });

                let result = work(range);

                match &result {
                    Ok(out) => self.emit(ExecutionEvent::ChunkFinished {
                        output_records: out.len(),
                    }),
                    Err(e) => self.emit(ExecutionEvent::ChunkFailed { error: e.to_string() }),
                }
                self.metrics.on_chunk_end();
                result
            })
            .collect();

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });

        let mut out = Vec::with_capacity(record_count);
        for chunk in per_chunk {
            out.extend(chunk?);
        }
        Ok(out)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn invalid_option(message: &str) -> MapError {
    MapError::InvalidExecutionOptions {
        message: message.to_string(),
    }
}

fn chunk_ranges(record_count: usize, chunk_size: usize) -> Vec<Range<usize>> {
    if record_count == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(record_count.div_ceil(chunk_size));
    let mut start = 0usize;
    while start < record_count {
        let end = (start + chunk_size).min(record_count);
        out.push(start..end);
        start = end;
    }
    out
}
