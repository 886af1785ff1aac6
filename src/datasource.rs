//! Datasources backing lookup-resolved fields.
//!
//! A [`Datasource`] exposes one lookup operation per supported target field. Operations are
//! registered explicitly when the datasource is built; asking for an unsupported field is a
//! typed error ([`MapError::NoSuchLookupMethod`]) rather than a failed name lookup.
//!
//! Datasource classes named in mapping configuration are resolved through a
//! [`DatasourceRegistry`], a table of constructor functions populated at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::config::{DatabaseConfig, SourceConfig};
use crate::error::{MapError, MapResult};
use crate::resolver::{lookup_operation_name, ChainResolver, ValueMap};
use crate::types::{Record, Value};

/// Signature of a single lookup operation: `(field_name, source_record, value_map) -> value`.
pub type LookupFn = dyn Fn(&str, &Record, &ValueMap) -> MapResult<Value> + Send + Sync;

/// A capability providing named lookup operations keyed by target field name.
pub trait Datasource: Send + Sync {
    /// Type name reported in errors.
    fn type_name(&self) -> &str;

    /// Returns `true` if a lookup operation is registered for `field`.
    fn supports(&self, field: &str) -> bool;

    /// Run the lookup operation for `field`.
    ///
    /// Implementations return [`MapError::NoSuchLookupMethod`] for unsupported fields.
    fn lookup(&self, field: &str, source: &Record, values: &ValueMap) -> MapResult<Value>;
}

fn no_such_lookup(ds: &dyn Datasource, field: &str) -> MapError {
    MapError::NoSuchLookupMethod {
        datasource_type: ds.type_name().to_string(),
        operation: lookup_operation_name(field),
    }
}

/// A datasource assembled from closures, one per field.
///
/// ```
/// use record_transform::datasource::{Datasource, FnDatasource};
/// use record_transform::resolver::ValueMap;
/// use record_transform::types::{Record, Value};
///
/// let ds = FnDatasource::new("RegionDatasource")
///     .with_lookup("region", |_field, _source, _values| Ok(Value::from("EAST")));
/// assert!(ds.supports("region"));
/// assert_eq!(
///     ds.lookup("region", &Record::new(), &ValueMap::new()).unwrap(),
///     Value::from("EAST")
/// );
/// ```
pub struct FnDatasource {
    type_name: String,
    operations: BTreeMap<String, Box<LookupFn>>,
}

impl FnDatasource {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            operations: BTreeMap::new(),
        }
    }

    /// Register the lookup operation for `field`, replacing any previous one.
    pub fn with_lookup<F>(mut self, field: impl Into<String>, op: F) -> Self
    where
        F: Fn(&str, &Record, &ValueMap) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.operations.insert(field.into(), Box::new(op));
        self
    }
}

impl fmt::Debug for FnDatasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDatasource")
            .field("type_name", &self.type_name)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Datasource for FnDatasource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn supports(&self, field: &str) -> bool {
        self.operations.contains_key(field)
    }

    fn lookup(&self, field: &str, source: &Record, values: &ValueMap) -> MapResult<Value> {
        match self.operations.get(field) {
            Some(op) => op(field, source, values),
            None => Err(no_such_lookup(self, field)),
        }
    }
}

/// One keyed table served by a [`TableDatasource`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableLookup {
    /// Where the key comes from: a sibling target field registered in the value map, otherwise a
    /// pipe-delimited chain of source field names.
    pub key: String,
    /// Key to value table.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// Returned when the key is absent or not in the table. Null when unset.
    #[serde(default)]
    pub default: Option<Value>,
}

impl TableLookup {
    fn key_value(&self, source: &Record, values: &ValueMap) -> MapResult<Option<Value>> {
        if values.contains(&self.key) {
            values.value(&self.key, source)
        } else {
            Ok(ChainResolver::parse(&self.key).resolve(source))
        }
    }

    fn lookup(&self, source: &Record, values: &ValueMap) -> MapResult<Value> {
        let hit = self
            .key_value(source, values)?
            .and_then(|key| self.values.get(key.to_string().trim()).cloned());
        Ok(hit.or_else(|| self.default.clone()).unwrap_or(Value::Null))
    }
}

/// A datasource answering lookups from in-memory keyed tables.
///
/// Registered as the `table` class in [`DatasourceRegistry::with_builtins`]; each entry of the
/// source's `params` declares the table for one field.
#[derive(Debug, Clone, Default)]
pub struct TableDatasource {
    type_name: String,
    tables: BTreeMap<String, TableLookup>,
}

impl TableDatasource {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            tables: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, field: impl Into<String>, table: TableLookup) -> Self {
        self.tables.insert(field.into(), table);
        self
    }

    /// Build from a source configuration's `params` mapping.
    pub fn from_config(source: &SourceConfig) -> MapResult<Self> {
        let tables: BTreeMap<String, TableLookup> =
            serde_yaml::from_value(serde_yaml::Value::Mapping(source.params.clone()))?;
        Ok(Self {
            type_name: source.class.clone(),
            tables,
        })
    }
}

impl Datasource for TableDatasource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn supports(&self, field: &str) -> bool {
        self.tables.contains_key(field)
    }

    fn lookup(&self, field: &str, source: &Record, values: &ValueMap) -> MapResult<Value> {
        match self.tables.get(field) {
            Some(table) => table.lookup(source, values),
            None => Err(no_such_lookup(self, field)),
        }
    }
}

/// Constructor stored in a [`DatasourceRegistry`].
///
/// Receives the source descriptor and, when the source names one, its database descriptor with
/// environment variables already expanded.
pub type DatasourceFactory =
    fn(&SourceConfig, Option<&DatabaseConfig>) -> MapResult<Arc<dyn Datasource>>;

/// Compile-time table mapping datasource class names to constructors.
#[derive(Clone, Default)]
pub struct DatasourceRegistry {
    factories: BTreeMap<String, DatasourceFactory>,
}

impl DatasourceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in classes (`table`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("table", table_factory);
        registry
    }

    pub fn register(&mut self, class: impl Into<String>, factory: DatasourceFactory) {
        self.factories.insert(class.into(), factory);
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Instantiate the datasource described by `source`.
    ///
    /// Fails with [`MapError::UnregisteredDatasourceType`] for unknown classes.
    pub fn instantiate(
        &self,
        source: &SourceConfig,
        database: Option<&DatabaseConfig>,
    ) -> MapResult<Arc<dyn Datasource>> {
        let factory = self
            .factories
            .get(&source.class)
            .ok_or_else(|| MapError::UnregisteredDatasourceType {
                class: source.class.clone(),
            })?;
        debug!(class = %source.class, database = ?database.map(|d| d.url()), "instantiating datasource");
        factory(source, database)
    }
}

impl fmt::Debug for DatasourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasourceRegistry")
            .field("classes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn table_factory(
    source: &SourceConfig,
    _database: Option<&DatabaseConfig>,
) -> MapResult<Arc<dyn Datasource>> {
    Ok(Arc::new(TableDatasource::from_config(source)?))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{Datasource, DatasourceRegistry, FnDatasource, TableDatasource, TableLookup};
    use crate::config::SourceConfig;
    use crate::error::MapError;
    use crate::resolver::{ConstResolver, ValueMap};
    use crate::types::{record_from_pairs, Record, Value};

    fn region_table() -> TableLookup {
        TableLookup {
            key: "state|st".to_string(),
            values: BTreeMap::from([
                ("NY".to_string(), Value::from("EAST")),
                ("CA".to_string(), Value::from("WEST")),
            ]),
            default: Some(Value::from("UNKNOWN")),
        }
    }

    #[test]
    fn fn_datasource_rejects_unregistered_field() {
        let ds = FnDatasource::new("Stub").with_lookup("region", |_, _, _| Ok(Value::from("EAST")));
        assert!(!ds.supports("zone"));
        let err = ds.lookup("zone", &Record::new(), &ValueMap::new()).unwrap_err();
        assert!(matches!(err, MapError::NoSuchLookupMethod { operation, .. } if operation == "lookup_zone"));
    }

    #[test]
    fn table_lookup_uses_source_chain_and_default() {
        let ds = TableDatasource::new("table").with_table("region", region_table());
        let values = ValueMap::new();

        let hit = ds.lookup("region", &record_from_pairs([("st", "CA")]), &values).unwrap();
        assert_eq!(hit, Value::from("WEST"));

        let miss = ds.lookup("region", &record_from_pairs([("st", "TX")]), &values).unwrap();
        assert_eq!(miss, Value::from("UNKNOWN"));
    }

    #[test]
    fn table_lookup_prefers_value_map_for_sibling_fields() {
        let table = TableLookup {
            key: "state".to_string(),
            ..region_table()
        };
        let ds = TableDatasource::new("table").with_table("region", table);
        let mut values = ValueMap::new();
        values.insert_const("state", ConstResolver::new("NY"));

        let out = ds.lookup("region", &record_from_pairs([("state", "CA")]), &values).unwrap();
        assert_eq!(out, Value::from("EAST"));
    }

    #[test]
    fn registry_builds_table_datasource_from_params() {
        let yaml = r#"
class: table
params:
  region:
    key: state
    values: { NY: EAST }
"#;
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        let ds = DatasourceRegistry::with_builtins().instantiate(&source, None).unwrap();
        assert_eq!(ds.type_name(), "table");
        assert!(ds.supports("region"));
        let out = ds
            .lookup("region", &record_from_pairs([("state", "NY")]), &ValueMap::new())
            .unwrap();
        assert_eq!(out, Value::from("EAST"));
    }

    #[test]
    fn registry_rejects_unknown_class() {
        let source: SourceConfig = serde_yaml::from_str("class: postgres_lookup").unwrap();
        let err = DatasourceRegistry::with_builtins().instantiate(&source, None).err().unwrap();
        assert!(matches!(err, MapError::UnregisteredDatasourceType { class } if class == "postgres_lookup"));
    }
}
