//! Builds a [`RecordTransformer`] from a named map in a [`MappingConfig`].

use std::sync::Arc;

use tracing::debug;

use crate::config::{FieldSpec, MapSpec, MappingConfig};
use crate::datasource::{Datasource, DatasourceRegistry};
use crate::error::{MapError, MapResult};
use crate::resolver::lookup_operation_name;
use crate::transformer::RecordTransformer;
use crate::types::Value;

const SOURCE_RECORD: &str = "record";
const SOURCE_LOOKUP: &str = "lookup";
const SOURCE_VALUE: &str = "value";

/// Wires resolvers and the map's datasource into a [`RecordTransformer`].
///
/// All configuration problems surface from [`RecordTransformerBuilder::build`]: unknown map,
/// unknown `source` discriminator, missing parameters, unknown or unregistered datasource, and a
/// datasource lacking an operation for one of the lookup fields.
///
/// ```
/// use record_transform::builder::RecordTransformerBuilder;
/// use record_transform::config::MappingConfig;
/// use record_transform::datasource::DatasourceRegistry;
/// use record_transform::types::{record_from_pairs, Value};
///
/// # fn main() -> Result<(), record_transform::MapError> {
/// let config = MappingConfig::from_yaml_str(r#"
/// maps:
///   people:
///     fields:
///       fullname: { source: record, value: "full_name|name" }
///       status: { source: value, value: active }
/// "#)?;
/// let registry = DatasourceRegistry::with_builtins();
/// let transformer = RecordTransformerBuilder::new(&config, &registry, "people").build()?;
///
/// let out = transformer.transform(&record_from_pairs([("name", "Jane")]))?;
/// assert_eq!(out.get("status"), Some(&Value::from("active")));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RecordTransformerBuilder<'a> {
    config: &'a MappingConfig,
    registry: &'a DatasourceRegistry,
    map_name: &'a str,
}

impl<'a> RecordTransformerBuilder<'a> {
    pub fn new(config: &'a MappingConfig, registry: &'a DatasourceRegistry, map_name: &'a str) -> Self {
        Self {
            config,
            registry,
            map_name,
        }
    }

    /// Target field names of the map, in declaration order.
    pub fn target_header(&self) -> MapResult<Vec<String>> {
        Ok(self
            .config
            .map(self.map_name)?
            .field_names()
            .map(str::to_string)
            .collect())
    }

    pub fn build(&self) -> MapResult<RecordTransformer> {
        let map = self.config.map(self.map_name)?;
        let datasource = self.datasource_for(map)?;

        let mut transformer = RecordTransformer::new();
        for (field, spec) in &map.fields {
            transformer.add_target_field(field.as_str());
            match spec.source.as_str() {
                SOURCE_RECORD => {
                    let designator = record_designator(field, spec)?;
                    transformer.map_source_to_target_field(&designator, field)?;
                }
                SOURCE_VALUE => {
                    let value = literal_value(field, spec)?;
                    transformer.map_const_to_target_field(field, value)?;
                }
                SOURCE_LOOKUP => {
                    let ds = datasource.as_ref().ok_or_else(|| MapError::MissingConfigSection {
                        section: format!("maps.{}.lookup_source", self.map_name),
                    })?;
                    if !ds.supports(field) {
                        return Err(MapError::NoSuchLookupMethod {
                            datasource_type: ds.type_name().to_string(),
                            operation: lookup_operation_name(field),
                        });
                    }
                    transformer.register_datasource(field, Arc::clone(ds))?;
                }
                other => {
                    return Err(MapError::UnknownFieldSource {
                        field: field.clone(),
                        source_kind: other.to_string(),
                    });
                }
            }
            debug!(map = self.map_name, field = %field, source = %spec.source, "mapped target field");
        }

        Ok(transformer)
    }

    /// Instantiate the map's `lookup_source`, if it names one.
    fn datasource_for(&self, map: &MapSpec) -> MapResult<Option<Arc<dyn Datasource>>> {
        let Some(source_name) = map.lookup_source.as_deref() else {
            return Ok(None);
        };
        let source = self.config.source(source_name)?;
        let database = match source.database.as_deref() {
            Some(db_name) => Some(self.config.database(db_name)?.expanded()?),
            None => None,
        };
        let ds = self.registry.instantiate(source, database.as_ref())?;
        debug!(map = self.map_name, source = source_name, class = %source.class, "datasource ready");
        Ok(Some(ds))
    }
}

fn record_designator(field: &str, spec: &FieldSpec) -> MapResult<String> {
    match &spec.value {
        Some(serde_yaml::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(MapError::MissingFieldParameter {
            field: field.to_string(),
            source_kind: spec.source.clone(),
        }),
    }
}

fn literal_value(field: &str, spec: &FieldSpec) -> MapResult<Value> {
    match &spec.value {
        Some(v) => Ok(serde_yaml::from_value(v.clone())?),
        None => Err(MapError::MissingFieldParameter {
            field: field.to_string(),
            source_kind: spec.source.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::RecordTransformerBuilder;
    use crate::config::{DatabaseConfig, MappingConfig, SourceConfig};
    use crate::datasource::{Datasource, DatasourceRegistry, FnDatasource};
    use crate::error::{MapError, MapResult};
    use crate::types::{record_from_pairs, Record, Value};

    fn stub_factory(_source: &SourceConfig, _db: Option<&DatabaseConfig>) -> MapResult<Arc<dyn Datasource>> {
        Ok(Arc::new(
            FnDatasource::new("RegionStub").with_lookup("region", |_, _, _| Ok(Value::from("EAST"))),
        ))
    }

    fn registry() -> DatasourceRegistry {
        let mut registry = DatasourceRegistry::with_builtins();
        registry.register("region_stub", stub_factory);
        registry
    }

    const CONFIG: &str = r#"
sources:
  regions:
    class: region_stub
maps:
  customer:
    lookup_source: regions
    fields:
      fullname: { source: record, value: "full_name|name" }
      status: { source: value, value: active }
      region: { source: lookup }
"#;

    #[test]
    fn builds_end_to_end_transformer() {
        let config = MappingConfig::from_yaml_str(CONFIG).unwrap();
        let registry = registry();
        let builder = RecordTransformerBuilder::new(&config, &registry, "customer");
        let t = builder.build().unwrap();

        assert_eq!(builder.target_header().unwrap(), vec!["fullname", "status", "region"]);
        let out = t.transform(&record_from_pairs([("name", "Jane Doe")])).unwrap();
        assert_eq!(
            out,
            record_from_pairs([("fullname", "Jane Doe"), ("status", "active"), ("region", "EAST")])
        );
    }

    #[test]
    fn numeric_literals_keep_their_type() {
        let config = MappingConfig::from_yaml_str(
            "maps:\n  m:\n    fields:\n      version: { source: value, value: 3 }\n",
        )
        .unwrap();
        let t = RecordTransformerBuilder::new(&config, &registry(), "m").build().unwrap();
        assert_eq!(t.transform(&Record::new()).unwrap().get("version"), Some(&Value::Int64(3)));
    }

    #[test]
    fn unknown_source_discriminator_fails_build() {
        let config = MappingConfig::from_yaml_str(
            "maps:\n  m:\n    fields:\n      email: { source: formula, value: x }\n",
        )
        .unwrap();
        let err = RecordTransformerBuilder::new(&config, &registry(), "m").build().unwrap_err();
        assert!(matches!(
            err,
            MapError::UnknownFieldSource { field, source_kind } if field == "email" && source_kind == "formula"
        ));
    }

    #[test]
    fn record_field_without_designator_fails_build() {
        let config = MappingConfig::from_yaml_str("maps:\n  m:\n    fields:\n      email: { source: record }\n").unwrap();
        let err = RecordTransformerBuilder::new(&config, &registry(), "m").build().unwrap_err();
        assert!(matches!(err, MapError::MissingFieldParameter { .. }));
    }

    #[test]
    fn lookup_field_without_lookup_source_fails_build() {
        let config = MappingConfig::from_yaml_str("maps:\n  m:\n    fields:\n      region: { source: lookup }\n").unwrap();
        let err = RecordTransformerBuilder::new(&config, &registry(), "m").build().unwrap_err();
        assert!(matches!(err, MapError::MissingConfigSection { section } if section == "maps.m.lookup_source"));
    }

    #[test]
    fn lookup_field_unsupported_by_datasource_fails_build() {
        let yaml = CONFIG.replace("region: { source: lookup }", "zone: { source: lookup }");
        let config = MappingConfig::from_yaml_str(&yaml).unwrap();
        let err = RecordTransformerBuilder::new(&config, &registry(), "customer").build().unwrap_err();
        assert!(matches!(err, MapError::NoSuchLookupMethod { operation, .. } if operation == "lookup_zone"));
    }

    #[test]
    fn unregistered_datasource_class_fails_build() {
        let yaml = CONFIG.replace("class: region_stub", "class: oracle_lookup");
        let config = MappingConfig::from_yaml_str(&yaml).unwrap();
        let err = RecordTransformerBuilder::new(&config, &registry(), "customer").build().unwrap_err();
        assert!(matches!(err, MapError::UnregisteredDatasourceType { class } if class == "oracle_lookup"));
    }

    #[test]
    fn unknown_map_fails_build() {
        let config = MappingConfig::from_yaml_str(CONFIG).unwrap();
        let err = RecordTransformerBuilder::new(&config, &registry(), "orders").build().unwrap_err();
        assert!(matches!(err, MapError::UnknownMap { name } if name == "orders"));
    }
}
