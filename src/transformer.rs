//! The record transformer: declared target fields plus per-field resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::datasource::Datasource;
use crate::error::{MapError, MapResult};
use crate::logging::redact_value;
use crate::resolver::{ChainResolver, ConstResolver, LookupResolver, ValueMap};
use crate::types::{Record, Value};

/// The declared output schema: unique field names, remembered in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFieldSet {
    order: Vec<String>,
    names: BTreeSet<String>,
}

impl TargetFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name`; returns `false` if it was already declared.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.names.contains(&name) {
            return false;
        }
        self.names.insert(name.clone());
        self.order.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Field names in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Maps source records onto a declared set of target fields.
///
/// Each target field is resolved by, in order of precedence:
///
/// 1. the datasource registered for it (lookup)
/// 2. its constant or fallback-chain resolver
/// 3. nothing: the field is left out of the output
///
/// The transformer holds no per-record state, so one instance can serve any number of
/// [`RecordTransformer::transform`] calls, including concurrent ones once configuration is done.
///
/// ```
/// use record_transform::transformer::RecordTransformer;
/// use record_transform::types::{record_from_pairs, Value};
///
/// # fn main() -> Result<(), record_transform::MapError> {
/// let mut t = RecordTransformer::new();
/// t.add_target_field("fullname");
/// t.add_target_field("status");
/// t.map_source_to_target_field("full_name|name", "fullname")?;
/// t.map_const_to_target_field("status", "active")?;
///
/// let out = t.transform(&record_from_pairs([("name", "Jane Doe")]))?;
/// assert_eq!(out.get("fullname"), Some(&Value::from("Jane Doe")));
/// assert_eq!(out.get("status"), Some(&Value::from("active")));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct RecordTransformer {
    target_fields: TargetFieldSet,
    field_map: ValueMap,
    datasources: BTreeMap<String, Arc<dyn Datasource>>,
}

impl RecordTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a target field. Declaring the same name twice is a no-op.
    pub fn add_target_field(&mut self, name: impl Into<String>) {
        self.target_fields.insert(name);
    }

    pub fn target_fields(&self) -> &TargetFieldSet {
        &self.target_fields
    }

    /// Resolvers registered through the constant/chain path, as seen by lookups.
    pub fn value_map(&self) -> &ValueMap {
        &self.field_map
    }

    /// Map a pipe-delimited fallback chain of source fields (e.g. `"email|email_address"`) onto
    /// `target`.
    pub fn map_source_to_target_field(&mut self, source_designator: &str, target: &str) -> MapResult<()> {
        self.ensure_declared(target)?;
        self.field_map
            .insert_chain(target, ChainResolver::parse(source_designator));
        Ok(())
    }

    /// Map a constant value onto `target`.
    pub fn map_const_to_target_field(&mut self, target: &str, value: impl Into<Value>) -> MapResult<()> {
        self.ensure_declared(target)?;
        self.field_map.insert_const(target, ConstResolver::new(value));
        Ok(())
    }

    /// Serve `target` through `datasource`'s lookup operation for that field.
    pub fn register_datasource(&mut self, target: &str, datasource: Arc<dyn Datasource>) -> MapResult<()> {
        self.ensure_declared(target)?;
        self.datasources.insert(target.to_string(), datasource);
        Ok(())
    }

    /// Run the lookup for `target` against `source`.
    ///
    /// Fails with [`MapError::NoDatasourceForField`] if no datasource is registered for `target`,
    /// or [`MapError::NoSuchLookupMethod`] if the datasource has no operation for it.
    pub fn lookup(&self, target: &str, source: &Record) -> MapResult<Option<Value>> {
        let datasource = self
            .datasources
            .get(target)
            .ok_or_else(|| MapError::NoDatasourceForField {
                field: target.to_string(),
            })?;
        LookupResolver::new(Arc::clone(datasource), target).resolve(source, &self.field_map)
    }

    /// Transform one source record.
    ///
    /// See [`RecordTransformer::transform_with`] for the handling of caller-supplied fields.
    pub fn transform(&self, source: &Record) -> MapResult<Record> {
        self.transform_with(source, &Record::new())
    }

    /// Transform one source record, seeding the output with `extra` fields.
    ///
    /// `extra` entries are copied into the output first; a resolved target field of the same name
    /// overwrites them. Fields resolving to no value are emitted as [`Value::Null`]. Fields are
    /// visited in declaration order and the first resolution error aborts the call.
    pub fn transform_with(&self, source: &Record, extra: &Record) -> MapResult<Record> {
        let mut target = extra.clone();

        for name in self.target_fields.iter() {
            let resolved = if self.datasources.contains_key(name) {
                self.lookup(name, source)?
            } else if let Some(resolver) = self.field_map.get(name) {
                resolver.resolve(source, &self.field_map)?
            } else {
                continue;
            };
            let value = resolved.unwrap_or(Value::Null);
            trace!(field = name, value = %redact_value(&value), "resolved target field");
            target.insert(name.to_string(), value);
        }

        Ok(target)
    }

    fn ensure_declared(&self, target: &str) -> MapResult<()> {
        if self.target_fields.contains(target) {
            Ok(())
        } else {
            Err(MapError::no_such_target_field(target))
        }
    }
}

impl fmt::Debug for RecordTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTransformer")
            .field("target_fields", &self.target_fields.order)
            .field("field_map", &self.field_map)
            .field(
                "datasources",
                &self
                    .datasources
                    .iter()
                    .map(|(field, ds)| (field.as_str(), ds.type_name()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{RecordTransformer, TargetFieldSet};
    use crate::datasource::FnDatasource;
    use crate::error::MapError;
    use crate::types::{record_from_pairs, Record, Value};

    fn region_stub() -> Arc<FnDatasource> {
        Arc::new(FnDatasource::new("RegionStub").with_lookup("region", |_, _, _| Ok(Value::from("EAST"))))
    }

    #[test]
    fn target_field_set_is_idempotent_and_ordered() {
        let mut set = TargetFieldSet::new();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn mapping_undeclared_field_fails() {
        let mut t = RecordTransformer::new();
        let err = t.map_source_to_target_field("email", "email").unwrap_err();
        assert!(matches!(err, MapError::NoSuchTargetField { field } if field == "email"));
        assert!(matches!(
            t.map_const_to_target_field("status", "active"),
            Err(MapError::NoSuchTargetField { .. })
        ));
        assert!(matches!(
            t.register_datasource("region", region_stub()),
            Err(MapError::NoSuchTargetField { .. })
        ));
    }

    #[test]
    fn const_field_is_stable_across_calls() {
        let mut t = RecordTransformer::new();
        t.add_target_field("status");
        t.map_const_to_target_field("status", "active").unwrap();

        for source in [Record::new(), record_from_pairs([("status", "closed")])] {
            let out = t.transform(&source).unwrap();
            assert_eq!(out.get("status"), Some(&Value::from("active")));
        }
    }

    #[test]
    fn end_to_end_chain_const_and_lookup() {
        let mut t = RecordTransformer::new();
        for name in ["fullname", "status", "region"] {
            t.add_target_field(name);
        }
        t.map_source_to_target_field("full_name|name", "fullname").unwrap();
        t.map_const_to_target_field("status", "active").unwrap();
        t.register_datasource("region", region_stub()).unwrap();

        let out = t.transform(&record_from_pairs([("name", "Jane Doe")])).unwrap();
        let expected = record_from_pairs([("fullname", "Jane Doe"), ("status", "active"), ("region", "EAST")]);
        assert_eq!(out, expected);
    }

    #[test]
    fn lookup_takes_precedence_over_field_map() {
        let mut t = RecordTransformer::new();
        t.add_target_field("region");
        t.map_const_to_target_field("region", "WEST").unwrap();
        t.register_datasource("region", region_stub()).unwrap();

        let out = t.transform(&Record::new()).unwrap();
        assert_eq!(out.get("region"), Some(&Value::from("EAST")));
    }

    #[test]
    fn unmapped_fields_are_omitted_and_unresolved_are_null() {
        let mut t = RecordTransformer::new();
        t.add_target_field("email");
        t.add_target_field("phone");
        t.map_source_to_target_field("email|email_address", "email").unwrap();

        let out = t.transform(&record_from_pairs([("email", "")])).unwrap();
        assert_eq!(out.get("email"), Some(&Value::Null));
        assert!(!out.contains_key("phone"));
    }

    #[test]
    fn transform_does_not_mutate_input() {
        let mut t = RecordTransformer::new();
        t.add_target_field("name");
        t.map_source_to_target_field("name", "name").unwrap();

        let source = record_from_pairs([("name", "  Ada "), ("extra", "x")]);
        let saved = source.clone();
        let _ = t.transform(&source).unwrap();
        assert_eq!(source, saved);
    }

    #[test]
    fn empty_transformer_returns_only_extra_fields() {
        let t = RecordTransformer::new();
        assert!(t.transform(&record_from_pairs([("a", "1")])).unwrap().is_empty());

        let extra = record_from_pairs([("batch", "7")]);
        assert_eq!(t.transform_with(&record_from_pairs([("a", "1")]), &extra).unwrap(), extra);
    }

    #[test]
    fn resolved_fields_overwrite_extra_fields() {
        let mut t = RecordTransformer::new();
        t.add_target_field("status");
        t.map_const_to_target_field("status", "active").unwrap();

        let extra = record_from_pairs([("status", "pending"), ("batch", "7")]);
        let out = t.transform_with(&Record::new(), &extra).unwrap();
        assert_eq!(out.get("status"), Some(&Value::from("active")));
        assert_eq!(out.get("batch"), Some(&Value::from("7")));
    }

    #[test]
    fn lookup_errors_propagate_from_transform() {
        let mut t = RecordTransformer::new();
        t.add_target_field("zone");
        t.register_datasource("zone", region_stub()).unwrap();

        let err = t.transform(&Record::new()).unwrap_err();
        assert!(matches!(
            err,
            MapError::NoSuchLookupMethod { datasource_type, operation }
                if datasource_type == "RegionStub" && operation == "lookup_zone"
        ));
    }

    #[test]
    fn direct_lookup_without_datasource_fails() {
        let mut t = RecordTransformer::new();
        t.add_target_field("region");
        let err = t.lookup("region", &Record::new()).unwrap_err();
        assert!(matches!(err, MapError::NoDatasourceForField { field } if field == "region"));
    }
}
