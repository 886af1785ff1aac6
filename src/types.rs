//! Core data model types.
//!
//! Records flow through the crate as [`Record`]s: ordered maps from field name to [`Value`].
//! Source rows read from delimited text hold only [`Value::Utf8`] cells; lookups and constants
//! may introduce the other variants.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single value in a [`Record`].
///
/// Serialises untagged, so a record renders as a plain JSON/YAML object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns `true` for values that fallback chains and compliance checks treat as absent:
    /// [`Value::Null`] and the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Utf8(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Borrow the string payload, if this is a [`Value::Utf8`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Flat rendering used for delimited output; null renders as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A source or target record: field name to value, iterated in name order.
pub type Record = BTreeMap<String, Value>;

/// Build a [`Record`] of string values from `(name, value)` pairs.
///
/// ```
/// use record_transform::types::{record_from_pairs, Value};
///
/// let rec = record_from_pairs([("name", "Jane"), ("email", "")]);
/// assert_eq!(rec.get("name"), Some(&Value::Utf8("Jane".to_string())));
/// ```
pub fn record_from_pairs<'a, I>(pairs: I) -> Record
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::from(v)))
        .collect()
}

/// Logical data type declared for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Returns `true` if `raw` can be read as this type.
    pub fn accepts(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        match self {
            Self::Utf8 => true,
            Self::Int64 => trimmed.parse::<i64>().is_ok(),
            Self::Float64 => trimmed.parse::<f64>().is_ok(),
            Self::Bool => parse_bool(trimmed).is_some(),
        }
    }
}

impl FromStr for DataType {
    type Err = ();

    /// Parse the type names used in schema configuration files (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" | "utf8" | "varchar" => Ok(Self::Utf8),
            "int" | "integer" | "int64" | "long" => Ok(Self::Int64),
            "float" | "double" | "decimal" | "number" | "float64" => Ok(Self::Float64),
            "bool" | "boolean" => Ok(Self::Bool),
            _ => Err(()),
        }
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// A declared field of a [`RecordSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name.
    pub name: String,
    /// Whether compliance checks require a value.
    pub required: bool,
    /// Declared data type.
    pub data_type: DataType,
}

impl FieldDecl {
    /// Create a new field declaration.
    pub fn new(name: impl Into<String>, required: bool, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            required,
            data_type,
        }
    }

    /// Shorthand for a required field.
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, true, data_type)
    }
}

/// Ordered field declarations for one record type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSchema {
    /// Record type name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDecl>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDecl>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Required fields, in schema order.
    pub fn required_fields(&self) -> Vec<FieldDecl> {
        self.fields.iter().filter(|f| f.required).cloned().collect()
    }
}
