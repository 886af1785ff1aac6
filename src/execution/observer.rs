use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted,
    ThrottleWaited { duration: Duration },
    ChunkStarted { start_record: usize, record_count: usize },
    ChunkFinished { output_records: usize },
    ChunkFailed { error: String },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Reports execution events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunFinished { metrics, .. } => info!(%metrics, "execution run finished"),
            ExecutionEvent::ChunkFailed { error } => warn!(%error, "execution chunk failed"),
            other => debug!(event = ?other, "execution event"),
        }
    }
}

/// Real-time metrics for an execution run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
/// `records_failed` counts records whose transformation returned an error, `records_invalid`
/// counts records a compliance scan flagged.
pub struct ExecutionMetrics {
    elapsed_ns: AtomicU64,

    records_processed: AtomicU64,
    records_failed: AtomicU64,
    records_invalid: AtomicU64,
    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            elapsed_ns: AtomicU64::new(0),
            records_processed: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            records_invalid: AtomicU64::new(0),
            chunks_started: AtomicU64::new(0),
            chunks_finished: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        for counter in [
            &self.elapsed_ns,
            &self.records_processed,
            &self.records_failed,
            &self.records_invalid,
            &self.chunks_started,
            &self.chunks_finished,
            &self.throttle_wait_ns,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        self.active_chunks.store(0, Ordering::SeqCst);
        self.max_active_chunks.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        // Zero means "not finished", so an instantaneous run still records one nanosecond.
        let ns = duration_ns(elapsed).max(1);
        self.elapsed_ns.store(ns, Ordering::SeqCst);
    }

    pub fn on_record_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_record_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_record_invalid(&self) {
        self.records_invalid.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_chunk_start(&self) {
        self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_chunk_end(&self) {
        self.chunks_finished.fetch_add(1, Ordering::SeqCst);
        self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        self.throttle_wait_ns.fetch_add(duration_ns(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns));

        ExecutionMetricsSnapshot {
            elapsed,
            records_processed: self.records_processed.load(Ordering::SeqCst),
            records_failed: self.records_failed.load(Ordering::SeqCst),
            records_invalid: self.records_invalid.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub elapsed: Option<Duration>,
    pub records_processed: u64,
    pub records_failed: u64,
    pub records_invalid: u64,
    pub chunks_started: u64,
    pub chunks_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_chunks: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} (failed={}, invalid={}), chunks={}/{}, max_active_chunks={}, throttle_wait={:?}, elapsed={:?}",
            self.records_processed,
            self.records_failed,
            self.records_invalid,
            self.chunks_finished,
            self.chunks_started,
            self.max_active_chunks,
            self.throttle_wait,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ExecutionMetrics;

    #[test]
    fn begin_run_resets_counters() {
        let m = ExecutionMetrics::new();
        m.begin_run();
        m.on_chunk_start();
        m.on_record_processed();
        m.on_record_invalid();
        m.on_chunk_end();
        m.end_run(Duration::from_millis(3));
        let snap = m.snapshot();
        assert_eq!(snap.records_processed, 1);
        assert_eq!(snap.records_invalid, 1);
        assert!(snap.to_string().contains("invalid=1"));

        m.begin_run();
        let snap = m.snapshot();
        assert_eq!(snap.records_processed, 0);
        assert_eq!(snap.records_invalid, 0);
        assert_eq!(snap.elapsed, None);
    }
}
