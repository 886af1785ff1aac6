//! Schema compliance statistics.
//!
//! [`ComplianceStatsProcessor`] checks each record against a list of required fields and tallies
//! the outcome. Failing records are data, not errors: they are counted and logged in the error
//! ledger, and processing continues.
//!
//! Checking stops at the first failing field of a record, so the ledger holds at most one
//! finding per record.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::error::MapResult;
use crate::processing::{run_upstream, RecordProcessor};
use crate::types::{DataType, FieldDecl, Record, Value};

/// Why a record failed its compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// The field is missing, null or empty.
    Null,
    /// The value was rejected by the [`FormatMatcher`].
    InvalidType,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::InvalidType => f.write_str("invalid_type"),
        }
    }
}

/// The offending field and failure kind for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceFinding {
    pub field: String,
    pub kind: FindingKind,
}

impl ComplianceFinding {
    pub fn new(field: impl Into<String>, kind: FindingKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

/// Result of checking one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(ComplianceFinding),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Decides whether a present value has the format its declared type expects.
pub trait FormatMatcher: Send + Sync {
    fn matches(&self, value: &Value, data_type: DataType) -> bool;
}

/// Accepts every present value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FormatMatcher for AcceptAll {
    fn matches(&self, _value: &Value, _data_type: DataType) -> bool {
        true
    }
}

/// Requires string values to parse as the declared [`DataType`] and typed values to match it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataTypeMatcher;

impl FormatMatcher for DataTypeMatcher {
    fn matches(&self, value: &Value, data_type: DataType) -> bool {
        match (value, data_type) {
            (Value::Utf8(s), dt) => dt.accepts(s),
            (Value::Int64(_), DataType::Int64 | DataType::Float64 | DataType::Utf8) => true,
            (Value::Float64(_), DataType::Float64 | DataType::Utf8) => true,
            (Value::Bool(_), DataType::Bool | DataType::Utf8) => true,
            _ => false,
        }
    }
}

/// Aggregate compliance counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceStats {
    pub invalid_records: usize,
    pub valid_records: usize,
    pub total_records: usize,
    /// 1-based record index to the first finding for that record.
    pub errors_by_record: BTreeMap<usize, ComplianceFinding>,
}

impl ComplianceStats {
    /// Fold another partition's stats into this one.
    ///
    /// Record indexes must already be global (see [`ComplianceStatsProcessor::starting_at`]).
    pub fn merge(&mut self, other: ComplianceStats) {
        self.invalid_records += other.invalid_records;
        self.valid_records += other.valid_records;
        self.total_records += other.total_records;
        self.errors_by_record.extend(other.errors_by_record);
    }
}

/// Pipeline stage tallying schema compliance; passes records through unchanged.
pub struct ComplianceStatsProcessor {
    required_fields: Vec<FieldDecl>,
    matcher: Box<dyn FormatMatcher>,
    upstream: Option<Box<dyn RecordProcessor>>,
    valid: usize,
    invalid: usize,
    errors: BTreeMap<usize, ComplianceFinding>,
    record_index: usize,
}

impl ComplianceStatsProcessor {
    /// Check `required_fields` in the given order, accepting any present value.
    pub fn new(required_fields: Vec<FieldDecl>) -> Self {
        Self::starting_at(required_fields, 1)
    }

    /// Like [`ComplianceStatsProcessor::new`], but numbering the first record `first_index`.
    ///
    /// Used to give each partition of a parallel scan globally unique record indexes.
    pub fn starting_at(required_fields: Vec<FieldDecl>, first_index: usize) -> Self {
        Self {
            required_fields,
            matcher: Box::new(AcceptAll),
            upstream: None,
            valid: 0,
            invalid: 0,
            errors: BTreeMap::new(),
            record_index: first_index.saturating_sub(1),
        }
    }

    /// Replace the format matcher consulted for present values.
    pub fn with_matcher(mut self, matcher: impl FormatMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Consume the output of `upstream` before checking.
    pub fn with_upstream(mut self, upstream: impl RecordProcessor + 'static) -> Self {
        self.upstream = Some(Box::new(upstream));
        self
    }

    pub fn required_fields(&self) -> &[FieldDecl] {
        &self.required_fields
    }

    /// Check one record without touching the counters.
    pub fn check(&self, record: &Record) -> ValidationOutcome {
        for field in &self.required_fields {
            match record.get(&field.name) {
                None => return ValidationOutcome::Invalid(ComplianceFinding::new(&field.name, FindingKind::Null)),
                Some(v) if v.is_empty() => {
                    return ValidationOutcome::Invalid(ComplianceFinding::new(&field.name, FindingKind::Null));
                }
                Some(v) if !self.matcher.matches(v, field.data_type) => {
                    return ValidationOutcome::Invalid(ComplianceFinding::new(
                        &field.name,
                        FindingKind::InvalidType,
                    ));
                }
                Some(_) => {}
            }
        }
        ValidationOutcome::Valid
    }

    /// Check `record` and record the outcome under the next record index.
    pub fn record(&mut self, record: &Record) -> ValidationOutcome {
        self.record_index += 1;
        let outcome = self.check(record);
        match &outcome {
            ValidationOutcome::Valid => self.valid += 1,
            ValidationOutcome::Invalid(finding) => {
                trace!(record = self.record_index, field = %finding.field, kind = %finding.kind, "record failed compliance");
                self.invalid += 1;
                self.errors.insert(self.record_index, finding.clone());
            }
        }
        outcome
    }

    pub fn total_records(&self) -> usize {
        self.valid + self.invalid
    }

    pub fn valid_records(&self) -> usize {
        self.valid
    }

    pub fn invalid_records(&self) -> usize {
        self.invalid
    }

    pub fn errors_by_record(&self) -> &BTreeMap<usize, ComplianceFinding> {
        &self.errors
    }

    /// Snapshot of the counters and error ledger.
    pub fn stats(&self) -> ComplianceStats {
        ComplianceStats {
            invalid_records: self.invalid,
            valid_records: self.valid,
            total_records: self.total_records(),
            errors_by_record: self.errors.clone(),
        }
    }
}

impl fmt::Debug for ComplianceStatsProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplianceStatsProcessor")
            .field("required_fields", &self.required_fields)
            .field("upstream_set", &self.upstream.is_some())
            .field("valid", &self.valid)
            .field("invalid", &self.invalid)
            .finish()
    }
}

impl RecordProcessor for ComplianceStatsProcessor {
    fn process(&mut self, record: Record) -> MapResult<Record> {
        let record = run_upstream(&mut self.upstream, record)?;
        self.record(&record);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::{ComplianceFinding, ComplianceStatsProcessor, DataTypeMatcher, FindingKind, ValidationOutcome};
    use crate::processing::{RecordProcessor, WhitespaceCleanupProcessor};
    use crate::types::{record_from_pairs, DataType, FieldDecl, Record, Value};

    fn name_email() -> Vec<FieldDecl> {
        vec![
            FieldDecl::required("name", DataType::Utf8),
            FieldDecl::required("email", DataType::Utf8),
        ]
    }

    #[test]
    fn counts_valid_and_invalid_records_with_ledger() {
        let mut p = ComplianceStatsProcessor::new(name_email());
        let records = vec![
            record_from_pairs([("name", "A"), ("email", "a@x.com")]),
            record_from_pairs([("name", "B")]),
            record_from_pairs([("name", "C"), ("email", "")]),
        ];
        for r in records {
            p.process(r).unwrap();
        }

        let stats = p.stats();
        assert_eq!(stats.valid_records, 1);
        assert_eq!(stats.invalid_records, 2);
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.errors_by_record.len(), 2);
        assert_eq!(stats.errors_by_record[&2], ComplianceFinding::new("email", FindingKind::Null));
        assert_eq!(stats.errors_by_record[&3], ComplianceFinding::new("email", FindingKind::Null));
    }

    #[test]
    fn only_first_failing_field_is_recorded() {
        let mut p = ComplianceStatsProcessor::new(name_email());
        p.process(Record::new()).unwrap();
        assert_eq!(p.errors_by_record()[&1], ComplianceFinding::new("name", FindingKind::Null));
    }

    #[test]
    fn process_passes_record_through_unchanged() {
        let mut p = ComplianceStatsProcessor::new(name_email());
        let input = record_from_pairs([("name", "B"), ("other", "z")]);
        assert_eq!(p.process(input.clone()).unwrap(), input);
    }

    #[test]
    fn check_does_not_touch_counters() {
        let p = ComplianceStatsProcessor::new(name_email());
        assert!(!p.check(&Record::new()).is_valid());
        assert_eq!(p.total_records(), 0);
    }

    #[test]
    fn data_type_matcher_flags_invalid_types() {
        let mut p = ComplianceStatsProcessor::new(vec![FieldDecl::required("age", DataType::Int64)])
            .with_matcher(DataTypeMatcher);
        assert_eq!(p.record(&record_from_pairs([("age", "41")])), ValidationOutcome::Valid);
        let mut rec = Record::new();
        rec.insert("age".to_string(), Value::Bool(true));
        assert_eq!(
            p.record(&rec),
            ValidationOutcome::Invalid(ComplianceFinding::new("age", FindingKind::InvalidType))
        );
        assert_eq!(
            p.record(&record_from_pairs([("age", "forty")])),
            ValidationOutcome::Invalid(ComplianceFinding::new("age", FindingKind::InvalidType))
        );
        assert_eq!(p.invalid_records(), 2);
    }

    #[test]
    fn whitespace_only_values_are_empty_after_cleanup() {
        let mut p = ComplianceStatsProcessor::new(name_email()).with_upstream(WhitespaceCleanupProcessor::new());
        p.process(record_from_pairs([("name", "A"), ("email", "   ")])).unwrap();
        assert_eq!(p.invalid_records(), 1);
    }

    #[test]
    fn starting_index_offsets_ledger() {
        let mut p = ComplianceStatsProcessor::starting_at(name_email(), 11);
        p.record(&Record::new());
        assert!(p.errors_by_record().contains_key(&11));
    }

    #[test]
    fn stats_serialize_with_snake_case_kinds() {
        let mut p = ComplianceStatsProcessor::new(name_email());
        p.record(&record_from_pairs([("name", "B")]));
        let json = serde_json::to_value(p.stats()).unwrap();
        assert_eq!(json["errors_by_record"]["1"]["kind"], "null");
        assert_eq!(json["total_records"], 1);
    }
}
