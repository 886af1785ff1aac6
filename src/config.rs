//! Mapping and schema configuration documents.
//!
//! Both documents are YAML (JSON parses too). Field order in `maps.<name>.fields` and
//! `record_types.<name>` is significant and preserved: it fixes the target header order and the
//! order compliance checks visit required fields.
//!
//! ```yaml
//! databases:
//!   crm:
//!     db_type: postgresql
//!     host: localhost
//!     port: 5432
//!     schema: crm
//!     username: $CRM_USER
//! sources:
//!   regions:
//!     class: table
//!     database: crm
//!     params:
//!       region: { key: state, values: { NY: EAST } }
//! maps:
//!   customer:
//!     lookup_source: regions
//!     fields:
//!       fullname: { source: record, value: "full_name|name" }
//!       status:   { source: value, value: active }
//!       region:   { source: lookup }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MapError, MapResult};
use crate::types::{DataType, FieldDecl, RecordSchema};

/// Connection descriptor for a named database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub db_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DatabaseConfig {
    /// Connection URL without credentials.
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}/{}", self.db_type, self.host, port, self.schema),
            None => format!("{}://{}/{}", self.db_type, self.host, self.schema),
        }
    }

    /// Copy of this descriptor with `$VAR` and `~/` references expanded.
    pub fn expanded(&self) -> MapResult<Self> {
        Ok(Self {
            db_type: expand_env(&self.db_type)?,
            host: expand_env(&self.host)?,
            port: self.port,
            schema: expand_env(&self.schema)?,
            username: self.username.as_deref().map(expand_env).transpose()?,
            password: self.password.as_deref().map(expand_env).transpose()?,
        })
    }
}

/// Expand a configuration value of the form `$NAME` from the environment, or a leading `~/`
/// to the home directory.
///
/// Other values pass through unchanged. An unset variable (including `HOME` for `~/` paths) is a
/// [`MapError::MissingEnvironmentVar`].
pub fn expand_env(value: &str) -> MapResult<String> {
    if let Some(var) = value.strip_prefix('$').filter(|v| !v.is_empty()) {
        return env_value(var);
    }
    if let Some(rest) = value.strip_prefix("~/") {
        let home = env_value(HOME_VAR)?;
        return Ok(PathBuf::from(home).join(rest).to_string_lossy().into_owned());
    }
    Ok(value.to_string())
}

#[cfg(windows)]
const HOME_VAR: &str = "USERPROFILE";
#[cfg(not(windows))]
const HOME_VAR: &str = "HOME";

fn env_value(var: &str) -> MapResult<String> {
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(MapError::MissingEnvironmentVar {
            var: var.to_string(),
        }),
    }
}

/// A named datasource: the registry class to instantiate, its database and free-form params.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    pub class: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub params: serde_yaml::Mapping,
}

/// Per-field mapping entry: `source` is one of `record`, `lookup`, `value`.
///
/// The discriminator is kept as text so the builder can report unknown values with the field
/// name attached.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSpec {
    pub source: String,
    #[serde(default)]
    pub value: Option<serde_yaml::Value>,
}

/// A named field mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapSpec {
    /// Name of the datasource serving `lookup` fields.
    pub lookup_source: Option<String>,
    /// Target fields in declaration order.
    pub fields: Vec<(String, FieldSpec)>,
}

impl MapSpec {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

#[derive(Deserialize)]
struct RawMapSpec {
    #[serde(default)]
    lookup_source: Option<String>,
    #[serde(default)]
    fields: serde_yaml::Mapping,
}

#[derive(Deserialize)]
struct RawMappingConfig {
    #[serde(default)]
    globals: Option<serde_yaml::Value>,
    #[serde(default)]
    databases: BTreeMap<String, DatabaseConfig>,
    #[serde(default)]
    sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    maps: Option<BTreeMap<String, RawMapSpec>>,
}

/// Parsed mapping configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingConfig {
    /// Opaque `globals` section. Carried for completeness; nothing reads it.
    pub globals: Option<serde_yaml::Value>,
    pub databases: BTreeMap<String, DatabaseConfig>,
    pub sources: BTreeMap<String, SourceConfig>,
    pub maps: BTreeMap<String, MapSpec>,
}

impl MappingConfig {
    pub fn from_path(path: impl AsRef<Path>) -> MapResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(input: &str) -> MapResult<Self> {
        let raw: RawMappingConfig = serde_yaml::from_str(input)?;
        let raw_maps = raw.maps.ok_or_else(|| MapError::MissingConfigSection {
            section: "maps".to_string(),
        })?;

        let mut maps = BTreeMap::new();
        for (name, spec) in raw_maps {
            let mut fields = Vec::with_capacity(spec.fields.len());
            for (key, value) in spec.fields {
                let field = yaml_key(&key).ok_or_else(|| MapError::SchemaMismatch {
                    message: format!("map '{name}' has a non-scalar field name: {key:?}"),
                })?;
                let field_spec: FieldSpec = serde_yaml::from_value(value)?;
                fields.push((field, field_spec));
            }
            maps.insert(
                name,
                MapSpec {
                    lookup_source: spec.lookup_source,
                    fields,
                },
            );
        }

        Ok(Self {
            globals: raw.globals,
            databases: raw.databases,
            sources: raw.sources,
            maps,
        })
    }

    pub fn map(&self, name: &str) -> MapResult<&MapSpec> {
        self.maps.get(name).ok_or_else(|| MapError::UnknownMap {
            name: name.to_string(),
        })
    }

    pub fn source(&self, name: &str) -> MapResult<&SourceConfig> {
        self.sources.get(name).ok_or_else(|| MapError::UnknownSource {
            name: name.to_string(),
        })
    }

    pub fn database(&self, name: &str) -> MapResult<&DatabaseConfig> {
        self.databases.get(name).ok_or_else(|| MapError::UnknownDatabase {
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawFieldDecl {
    #[serde(default)]
    required: bool,
    #[serde(rename = "type", default = "default_type_name")]
    type_name: String,
}

fn default_type_name() -> String {
    "string".to_string()
}

#[derive(Deserialize)]
struct RawSchemaConfig {
    record_types: Option<BTreeMap<String, serde_yaml::Mapping>>,
}

/// Parsed schema configuration: record type name to ordered field declarations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaConfig {
    pub record_types: BTreeMap<String, RecordSchema>,
}

impl SchemaConfig {
    pub fn from_path(path: impl AsRef<Path>) -> MapResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(input: &str) -> MapResult<Self> {
        let raw: RawSchemaConfig = serde_yaml::from_str(input)?;
        let raw_types = raw.record_types.ok_or_else(|| MapError::MissingConfigSection {
            section: "record_types".to_string(),
        })?;

        let mut record_types = BTreeMap::new();
        for (type_name, raw_fields) in raw_types {
            let mut fields = Vec::with_capacity(raw_fields.len());
            for (key, value) in raw_fields {
                let name = yaml_key(&key).ok_or_else(|| MapError::SchemaMismatch {
                    message: format!("record type '{type_name}' has a non-scalar field name: {key:?}"),
                })?;
                let decl: RawFieldDecl = serde_yaml::from_value(value)?;
                let data_type = decl.type_name.parse::<DataType>().map_err(|()| {
                    MapError::UnknownDataType {
                        field: name.clone(),
                        type_name: decl.type_name.clone(),
                    }
                })?;
                fields.push(FieldDecl::new(name, decl.required, data_type));
            }
            record_types.insert(type_name.clone(), RecordSchema::new(type_name, fields));
        }

        Ok(Self { record_types })
    }

    pub fn record_schema(&self, record_type: &str) -> MapResult<&RecordSchema> {
        self.record_types
            .get(record_type)
            .ok_or_else(|| MapError::UnknownRecordType {
                name: record_type.to_string(),
            })
    }
}

fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
