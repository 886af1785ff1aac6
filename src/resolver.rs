//! Field resolution strategies.
//!
//! A [`FieldResolver`] derives one target field's value from a source [`Record`]:
//!
//! - [`ConstResolver`]: always the same value
//! - [`ChainResolver`]: first non-empty value among an ordered list of source field names
//! - [`LookupResolver`]: delegates to a [`Datasource`] operation registered for the field
//!
//! Absent results (`Ok(None)`) mean "no value available" and are not errors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::datasource::Datasource;
use crate::error::{MapError, MapResult};
use crate::types::{Record, Value};

/// Resolves to a fixed value, ignoring the source record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstResolver {
    value: Value,
}

impl ConstResolver {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into() }
    }

    pub fn resolve(&self, _source: &Record) -> Option<Value> {
        Some(self.value.clone())
    }
}

/// Resolves to the first candidate source field holding a non-empty value.
///
/// Candidate order is significant: `"email|email_address"` tries `email` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResolver {
    candidates: Vec<String>,
}

impl ChainResolver {
    /// Build from explicit candidate names.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a pipe-delimited designator such as `"full_name|name"`.
    pub fn parse(designator: &str) -> Self {
        Self::new(designator.split('|'))
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Missing keys, nulls and empty strings all fall through to the next candidate.
    pub fn resolve(&self, source: &Record) -> Option<Value> {
        self.candidates
            .iter()
            .filter_map(|name| source.get(name))
            .find(|value| !value.is_empty())
            .cloned()
    }
}

/// Resolves a field through the datasource operation registered for it.
#[derive(Clone)]
pub struct LookupResolver {
    datasource: Arc<dyn Datasource>,
    field: String,
}

impl LookupResolver {
    pub fn new(datasource: Arc<dyn Datasource>, field: impl Into<String>) -> Self {
        Self {
            datasource,
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Invoke the datasource operation for this resolver's field.
    ///
    /// Fails with [`MapError::NoSuchLookupMethod`] when the datasource has no such operation.
    pub fn resolve(&self, source: &Record, values: &ValueMap) -> MapResult<Option<Value>> {
        if !self.datasource.supports(&self.field) {
            return Err(MapError::NoSuchLookupMethod {
                datasource_type: self.datasource.type_name().to_string(),
                operation: lookup_operation_name(&self.field),
            });
        }
        let value = self.datasource.lookup(&self.field, source, values)?;
        Ok(Some(value))
    }
}

impl fmt::Debug for LookupResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupResolver")
            .field("datasource", &self.datasource.type_name())
            .field("field", &self.field)
            .finish()
    }
}

/// Conventional name of the lookup operation serving `field`.
pub fn lookup_operation_name(field: &str) -> String {
    format!("lookup_{field}")
}

/// Tagged union of the three resolution strategies.
#[derive(Debug, Clone)]
pub enum FieldResolver {
    Const(ConstResolver),
    Chain(ChainResolver),
    Lookup(LookupResolver),
}

impl FieldResolver {
    pub fn resolve(&self, source: &Record, values: &ValueMap) -> MapResult<Option<Value>> {
        match self {
            Self::Const(r) => Ok(r.resolve(source)),
            Self::Chain(r) => Ok(r.resolve(source)),
            Self::Lookup(r) => r.resolve(source, values),
        }
    }
}

impl From<ConstResolver> for FieldResolver {
    fn from(value: ConstResolver) -> Self {
        Self::Const(value)
    }
}

impl From<ChainResolver> for FieldResolver {
    fn from(value: ChainResolver) -> Self {
        Self::Chain(value)
    }
}

impl From<LookupResolver> for FieldResolver {
    fn from(value: LookupResolver) -> Self {
        Self::Lookup(value)
    }
}

/// Named registry of constant and fallback-chain resolvers.
///
/// Lookup operations receive the map so they can read sibling field values without re-deriving
/// them. Lookup-backed fields are never registered here.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    resolvers: BTreeMap<String, FieldResolver>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_const(&mut self, field: impl Into<String>, resolver: ConstResolver) {
        self.resolvers.insert(field.into(), resolver.into());
    }

    pub fn insert_chain(&mut self, field: impl Into<String>, resolver: ChainResolver) {
        self.resolvers.insert(field.into(), resolver.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.resolvers.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldResolver> {
        self.resolvers.get(field)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolve a registered field against `source`.
    ///
    /// Fails with [`MapError::UnregisteredValue`] if `field` has no resolver.
    pub fn value(&self, field: &str, source: &Record) -> MapResult<Option<Value>> {
        let resolver = self
            .resolvers
            .get(field)
            .ok_or_else(|| MapError::UnregisteredValue {
                field: field.to_string(),
            })?;
        resolver.resolve(source, self)
    }
}
