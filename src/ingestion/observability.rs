use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{ErrorCategory, MapError};

use super::unified::SourceFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

impl IngestionSeverity {
    /// Severity of a failed extraction.
    pub fn for_error(e: &MapError) -> Self {
        match e {
            MapError::Io(_) => Self::Critical,
            MapError::Csv(err) if matches!(err.kind(), ::csv::ErrorKind::Io(_)) => Self::Critical,
            other => match other.category() {
                ErrorCategory::Configuration => Self::Critical,
                ErrorCategory::Input | ErrorCategory::Resolution | ErrorCategory::MalformedValue => Self::Error,
            },
        }
    }
}

/// Context about an extraction attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// The input path.
    pub path: PathBuf,
    /// Format used to read it.
    pub format: SourceFormat,
}

/// Stats reported on successful extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Number of records read.
    pub records: usize,
}

/// Observer interface for extraction outcomes.
pub trait IngestionObserver: Send + Sync {
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &MapError) {}

    /// Called when a failure meets the alert threshold. Defaults to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &MapError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans callbacks out to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
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

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &MapError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &MapError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Reports extraction events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        info!(format = ?ctx.format, path = %ctx.path.display(), records = stats.records, "extracted records");
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &MapError) {
        warn!(?severity, format = ?ctx.format, path = %ctx.path.display(), %error, "extraction failed");
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &MapError) {
        error!(?severity, format = ?ctx.format, path = %ctx.path.display(), %error, "extraction alert");
    }
}

#[cfg(test)]
mod tests {
    use super::IngestionSeverity;
    use crate::error::MapError;

    #[test]
    fn severity_follows_error_category() {
        let io = MapError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(IngestionSeverity::for_error(&io), IngestionSeverity::Critical);

        let mismatch = MapError::SchemaMismatch {
            message: "bad".to_string(),
        };
        assert_eq!(IngestionSeverity::for_error(&mismatch), IngestionSeverity::Error);
    }
}
