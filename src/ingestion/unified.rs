//! Unified extraction entrypoint.
//!
//! Most callers should use [`extract_from_path`], which reads a file into in-memory
//! [`Record`]s.
//!
//! - If [`ExtractOptions::format`] is `None`, the format is inferred from the file extension.
//! - If an [`IngestionObserver`] is provided, success/failure/alerts are reported to it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{MapError, MapResult};
use crate::types::Record;

use super::csv::{read_records_from_path, DelimitedFormat};
use super::json::read_json_records_from_path;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text (CSV, TSV, pipe-separated).
    Delimited,
    /// JSON array-of-objects or NDJSON.
    Json,
}

impl SourceFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "psv" | "txt" => Some(Self::Delimited),
            "json" | "ndjson" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Options controlling [`extract_from_path`].
#[derive(Clone)]
pub struct ExtractOptions {
    /// If `None`, auto-detect format from file extension.
    pub format: Option<SourceFormat>,
    /// Delimiter/quote override. If `None`, derived from the extension (`tsv` tab, `psv`/`txt`
    /// pipe, otherwise comma).
    pub delimited: Option<DelimitedFormat>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("format", &self.format)
            .field("delimited", &self.delimited)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            format: None,
            delimited: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Read every record from a file.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` with the record count
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the severity is >= `options.alert_at_or_above`
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use record_transform::ingestion::{extract_from_path, ExtractOptions, TracingObserver};
///
/// # fn main() -> Result<(), record_transform::MapError> {
/// let opts = ExtractOptions {
///     observer: Some(Arc::new(TracingObserver)),
///     ..Default::default()
/// };
/// let records = extract_from_path("people.psv", &opts)?;
/// println!("records={}", records.len());
/// # Ok(())
/// # }
/// ```
pub fn extract_from_path(path: impl AsRef<Path>, options: &ExtractOptions) -> MapResult<Vec<Record>> {
    let path = path.as_ref();
    let format = match options.format {
        Some(f) => f,
        None => infer_format_from_path(path)?,
    };

    let ctx = IngestionContext {
        path: path.to_path_buf(),
        format,
    };

    let result = match format {
        SourceFormat::Delimited => {
            let delimited = options.delimited.unwrap_or_else(|| delimited_for_path(path));
            read_records_from_path(path, delimited)
        }
        SourceFormat::Json => read_json_records_from_path(path),
    };

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(records) => obs.on_success(&ctx, IngestionStats { records: records.len() }),
            Err(e) => {
                let sev = IngestionSeverity::for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

/// Expand a glob pattern into a sorted list of matching files.
///
/// A pattern that matches nothing yields an empty list.
pub fn expand_inputs(pattern: &str) -> MapResult<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|e| MapError::SchemaMismatch {
        message: format!("invalid input pattern '{pattern}': {e}"),
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MapError::Io(e.into_error()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn delimited_for_path(path: &Path) -> DelimitedFormat {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("tsv") => DelimitedFormat::tab(),
        Some("psv") | Some("txt") => DelimitedFormat::pipe(),
        _ => DelimitedFormat::default(),
    }
}

fn infer_format_from_path(path: &Path) -> MapResult<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MapError::SchemaMismatch {
            message: format!("cannot infer format: path has no extension ({})", path.display()),
        })?;

    SourceFormat::from_extension(ext).ok_or_else(|| MapError::SchemaMismatch {
        message: format!("cannot infer format from extension '{ext}' for path ({})", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{delimited_for_path, SourceFormat};
    use crate::ingestion::csv::DelimitedFormat;

    #[test]
    fn extension_selects_format_and_delimiter() {
        assert_eq!(SourceFormat::from_extension("PSV"), Some(SourceFormat::Delimited));
        assert_eq!(SourceFormat::from_extension("ndjson"), Some(SourceFormat::Json));
        assert_eq!(SourceFormat::from_extension("parquet"), None);
        assert_eq!(delimited_for_path(Path::new("a.tsv")), DelimitedFormat::tab());
        assert_eq!(delimited_for_path(Path::new("a.txt")), DelimitedFormat::pipe());
        assert_eq!(delimited_for_path(Path::new("a.csv")), DelimitedFormat::default());
    }
}
