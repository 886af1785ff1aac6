//! Record processing chains.
//!
//! Every stage implements [`RecordProcessor`]. A stage may wrap an upstream stage: it first runs
//! the record through the upstream stage, then applies its own step to the result. Chains are
//! strictly linear.
//!
//! Stages:
//!
//! - [`WhitespaceCleanupProcessor`]: trims string values
//! - [`TransformProcessor`]: runs a [`crate::transformer::RecordTransformer`]
//! - [`crate::compliance::ComplianceStatsProcessor`]: tallies schema compliance
//! - [`ConsoleProcessor`]: echoes pretty-printed records
//! - [`DelimitedOutputProcessor`]: writes records as delimited rows under a fixed header
//!
//! ## Example: cleanup → transform → console
//!
//! ```rust
//! use record_transform::processing::{
//!     process_all, ConsoleProcessor, RecordProcessor, TransformProcessor, WhitespaceCleanupProcessor,
//! };
//! use record_transform::transformer::RecordTransformer;
//! use record_transform::types::{record_from_pairs, Value};
//!
//! # fn main() -> Result<(), record_transform::MapError> {
//! let mut t = RecordTransformer::new();
//! t.add_target_field("name");
//! t.map_source_to_target_field("full_name|name", "name")?;
//!
//! let transform = TransformProcessor::new(t).with_upstream(WhitespaceCleanupProcessor::new());
//! let mut chain = ConsoleProcessor::with_writer(Vec::new()).with_upstream(transform);
//!
//! let out = process_all(vec![record_from_pairs([("name", "  Ada  ")])], &mut chain)?;
//! assert_eq!(out[0].get("name"), Some(&Value::from("Ada")));
//! # Ok(())
//! # }
//! ```

pub mod console;
pub mod delimited;
pub mod transform;
pub mod whitespace;

use crate::error::MapResult;
use crate::types::Record;

pub use console::ConsoleProcessor;
pub use delimited::DelimitedOutputProcessor;
pub use transform::TransformProcessor;
pub use whitespace::{NonStringPolicy, WhitespaceCleanupProcessor};

/// A single step in a record processing chain.
pub trait RecordProcessor: Send {
    /// Process one record, returning the (possibly new) record for the next stage.
    fn process(&mut self, record: Record) -> MapResult<Record>;
}

impl<P: RecordProcessor + ?Sized> RecordProcessor for Box<P> {
    fn process(&mut self, record: Record) -> MapResult<Record> {
        (**self).process(record)
    }
}

/// Run `record` through `upstream` if one is set, otherwise return it as is.
pub fn run_upstream(upstream: &mut Option<Box<dyn RecordProcessor>>, record: Record) -> MapResult<Record> {
    match upstream {
        Some(stage) => stage.process(record),
        None => Ok(record),
    }
}

/// Drive a batch of records through `processor`, stopping at the first error.
pub fn process_all<I, P>(records: I, processor: &mut P) -> MapResult<Vec<Record>>
where
    I: IntoIterator<Item = Record>,
    P: RecordProcessor + ?Sized,
{
    records.into_iter().map(|r| processor.process(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::{process_all, RecordProcessor};
    use crate::error::{MapError, MapResult};
    use crate::types::{record_from_pairs, Record, Value};

    struct Tag(&'static str);

    impl RecordProcessor for Tag {
        fn process(&mut self, mut record: Record) -> MapResult<Record> {
            record.insert("tag".to_string(), Value::from(self.0));
            Ok(record)
        }
    }

    struct FailOnSecond(usize);

    impl RecordProcessor for FailOnSecond {
        fn process(&mut self, record: Record) -> MapResult<Record> {
            self.0 += 1;
            if self.0 == 2 {
                return Err(MapError::SchemaMismatch {
                    message: "second record".to_string(),
                });
            }
            Ok(record)
        }
    }

    #[test]
    fn process_all_applies_stage_to_each_record() {
        let out = process_all(vec![Record::new(), record_from_pairs([("a", "1")])], &mut Tag("x")).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.get("tag") == Some(&Value::from("x"))));
    }

    #[test]
    fn process_all_fails_fast() {
        let mut stage = FailOnSecond(0);
        let err = process_all(vec![Record::new(), Record::new(), Record::new()], &mut stage).unwrap_err();
        assert!(err.to_string().contains("second record"));
        assert_eq!(stage.0, 2);
    }

    #[test]
    fn boxed_stages_are_processors() {
        let mut boxed: Box<dyn RecordProcessor> = Box::new(Tag("boxed"));
        let out = boxed.process(Record::new()).unwrap();
        assert_eq!(out.get("tag"), Some(&Value::from("boxed")));
    }
}
