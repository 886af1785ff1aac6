//! `record-transform` is a configuration-driven record transformation engine.
//!
//! A source record (a field-name → value map read from a delimited file or JSON) is turned into a
//! target record whose fields are declared up front. Each target field is resolved by one of:
//!
//! - a constant value,
//! - a fallback chain of source field names (`"full_name|name"`: first non-empty value wins),
//! - a lookup against a pluggable [`datasource::Datasource`].
//!
//! The transformer can be wired by hand ([`transformer::RecordTransformer`]) or built from a YAML
//! mapping document ([`builder::RecordTransformerBuilder`]). Records flow through linear
//! processing chains ([`processing::RecordProcessor`]) that clean whitespace, transform, check
//! schema compliance ([`compliance::ComplianceStatsProcessor`]) and write output.
//!
//! ## Quick example: transform one record
//!
//! ```rust
//! use record_transform::transformer::RecordTransformer;
//! use record_transform::types::{record_from_pairs, Value};
//!
//! # fn main() -> Result<(), record_transform::MapError> {
//! let mut t = RecordTransformer::new();
//! t.add_target_field("fullname");
//! t.add_target_field("status");
//! t.map_source_to_target_field("full_name|name", "fullname")?;
//! t.map_const_to_target_field("status", "active")?;
//!
//! let out = t.transform(&record_from_pairs([("full_name", ""), ("name", "Jane Doe")]))?;
//! assert_eq!(out.get("fullname"), Some(&Value::from("Jane Doe")));
//! assert_eq!(out.get("status"), Some(&Value::from("active")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Compliance scan
//!
//! ```rust
//! use record_transform::compliance::ComplianceStatsProcessor;
//! use record_transform::processing::{process_all, WhitespaceCleanupProcessor};
//! use record_transform::types::{record_from_pairs, DataType, FieldDecl};
//!
//! # fn main() -> Result<(), record_transform::MapError> {
//! let mut stats = ComplianceStatsProcessor::new(vec![FieldDecl::required("email", DataType::Utf8)])
//!     .with_upstream(WhitespaceCleanupProcessor::new());
//! process_all(
//!     vec![
//!         record_from_pairs([("email", "a@x.com")]),
//!         record_from_pairs([("email", "   ")]),
//!     ],
//!     &mut stats,
//! )?;
//! assert_eq!(stats.valid_records(), 1);
//! assert_eq!(stats.invalid_records(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: values, records and record schemas
//! - [`resolver`]: constant, fallback-chain and lookup resolvers
//! - [`datasource`]: the lookup interface, built-in datasources and the factory registry
//! - [`transformer`]: target field declaration and per-record transformation
//! - [`config`]: mapping and schema YAML documents
//! - [`builder`]: builds a transformer from a named map
//! - [`processing`]: record processing chains
//! - [`compliance`]: required-field compliance statistics
//! - [`ingestion`]: delimited and JSON record extraction
//! - [`execution`]: parallel batch transformation and compliance scans
//! - [`logging`]: `tracing-subscriber` setup
//! - [`error`]: the crate error type

pub mod builder;
pub mod compliance;
pub mod config;
pub mod datasource;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod logging;
pub mod processing;
pub mod resolver;
pub mod transformer;
pub mod types;

pub use error::{ErrorCategory, MapError, MapResult};
