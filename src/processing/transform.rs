//! Transform stage.

use std::fmt;
use std::sync::Arc;

use crate::error::MapResult;
use crate::transformer::RecordTransformer;
use crate::types::Record;

use super::{run_upstream, RecordProcessor};

/// Replaces each record with the output of a [`RecordTransformer`].
pub struct TransformProcessor {
    transformer: Arc<RecordTransformer>,
    extra: Record,
    upstream: Option<Box<dyn RecordProcessor>>,
}

impl TransformProcessor {
    pub fn new(transformer: impl Into<Arc<RecordTransformer>>) -> Self {
        Self {
            transformer: transformer.into(),
            extra: Record::new(),
            upstream: None,
        }
    }

    /// Fields seeded into every output record (see [`RecordTransformer::transform_with`]).
    pub fn with_extra_fields(mut self, extra: Record) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_upstream(mut self, upstream: impl RecordProcessor + 'static) -> Self {
        self.upstream = Some(Box::new(upstream));
        self
    }

    pub fn transformer(&self) -> &RecordTransformer {
        &self.transformer
    }
}

impl fmt::Debug for TransformProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformProcessor")
            .field("transformer", &self.transformer)
            .field("extra", &self.extra)
            .field("upstream_set", &self.upstream.is_some())
            .finish()
    }
}

impl RecordProcessor for TransformProcessor {
    fn process(&mut self, record: Record) -> MapResult<Record> {
        let record = run_upstream(&mut self.upstream, record)?;
        self.transformer.transform_with(&record, &self.extra)
    }
}

#[cfg(test)]
mod tests {
    use super::TransformProcessor;
    use crate::processing::{RecordProcessor, WhitespaceCleanupProcessor};
    use crate::transformer::RecordTransformer;
    use crate::types::{record_from_pairs, Value};

    #[test]
    fn transforms_cleaned_upstream_output() {
        let mut t = RecordTransformer::new();
        t.add_target_field("email");
        t.map_source_to_target_field("email|email_address", "email").unwrap();

        let mut p = TransformProcessor::new(t)
            .with_extra_fields(record_from_pairs([("source_file", "people.psv")]))
            .with_upstream(WhitespaceCleanupProcessor::new());

        let out = p
            .process(record_from_pairs([("email", "  "), ("email_address", " a@x.com ")]))
            .unwrap();
        assert_eq!(out.get("email"), Some(&Value::from("a@x.com")));
        assert_eq!(out.get("source_file"), Some(&Value::from("people.psv")));
        assert_eq!(out.len(), 2);
    }
}
