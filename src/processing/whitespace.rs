//! Whitespace normalization stage.

use tracing::warn;

use crate::error::{MapError, MapResult};
use crate::types::{Record, Value};

use super::{run_upstream, RecordProcessor};

/// What [`WhitespaceCleanupProcessor`] does with values that are not strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonStringPolicy {
    /// Leave the value untouched (logged at `warn`). Nulls are always left alone silently.
    #[default]
    Skip,
    /// Fail with [`MapError::NonStringValue`].
    Reject,
}

/// Returns a new record with leading/trailing whitespace trimmed from every string value.
#[derive(Default)]
pub struct WhitespaceCleanupProcessor {
    policy: NonStringPolicy,
    upstream: Option<Box<dyn RecordProcessor>>,
}

impl WhitespaceCleanupProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: NonStringPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_upstream(mut self, upstream: impl RecordProcessor + 'static) -> Self {
        self.upstream = Some(Box::new(upstream));
        self
    }

    fn clean(&self, record: Record) -> MapResult<Record> {
        record
            .into_iter()
            .map(|(field, value)| match value {
                Value::Utf8(s) => {
                    let trimmed = s.trim();
                    let value = if trimmed.len() == s.len() { s } else { trimmed.to_string() };
                    Ok((field, Value::Utf8(value)))
                }
                Value::Null => Ok((field, Value::Null)),
                other => match self.policy {
                    NonStringPolicy::Skip => {
                        warn!(field = %field, "skipping whitespace cleanup of non-string value");
                        Ok((field, other))
                    }
                    NonStringPolicy::Reject => Err(MapError::NonStringValue { field }),
                },
            })
            .collect()
    }
}

impl std::fmt::Debug for WhitespaceCleanupProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhitespaceCleanupProcessor")
            .field("policy", &self.policy)
            .field("upstream_set", &self.upstream.is_some())
            .finish()
    }
}

impl RecordProcessor for WhitespaceCleanupProcessor {
    fn process(&mut self, record: Record) -> MapResult<Record> {
        let record = run_upstream(&mut self.upstream, record)?;
        self.clean(record)
    }
}
