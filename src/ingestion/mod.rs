//! Record extraction entrypoints and implementations.
//!
//! Most callers should use [`extract_from_path`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`ExtractOptions`])
//! - reads every row into an in-memory [`crate::types::Record`]
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Streaming a file through a processing chain goes through [`CsvRecordExtractor`].
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`json`]

pub mod csv;
pub mod json;
pub mod observability;
pub mod unified;

pub use self::csv::{CsvRecordExtractor, DelimitedFormat};
pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, TracingObserver,
};
pub use unified::{expand_inputs, extract_from_path, ExtractOptions, SourceFormat};
