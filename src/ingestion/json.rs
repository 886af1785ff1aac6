//! JSON ingestion.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Nested objects flatten into dot-path field names (`{"user":{"name":"Ada"}}` yields
//! `user.name`).

use std::fs;
use std::path::Path;

use crate::error::{MapError, MapResult};
use crate::types::{Record, Value};

/// Read JSON records from a file.
pub fn read_json_records_from_path(path: impl AsRef<Path>) -> MapResult<Vec<Record>> {
    let text = fs::read_to_string(path)?;
    read_json_records_from_str(&text)
}

/// Read JSON records from an in-memory string.
pub fn read_json_records_from_str(input: &str) -> MapResult<Vec<Record>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MapError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => json_values_to_records(&items),
            serde_json::Value::Object(_) => json_values_to_records(std::slice::from_ref(&v)),
            _ => Err(MapError::SchemaMismatch {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            }),
        }
    } else {
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| MapError::SchemaMismatch {
                message: format!("invalid ndjson at line {}: {}", i + 1, e),
            })?;
            values.push(v);
        }
        json_values_to_records(&values)
    }
}

fn json_values_to_records(values: &[serde_json::Value]) -> MapResult<Vec<Record>> {
    let mut records = Vec::with_capacity(values.len());
    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = v.as_object().ok_or_else(|| MapError::SchemaMismatch {
            message: format!("row {row_num} is not a json object"),
        })?;
        let mut record = Record::new();
        flatten_into(&mut record, "", obj, row_num)?;
        records.push(record);
    }
    Ok(records)
}

fn flatten_into(
    record: &mut Record,
    prefix: &str,
    obj: &serde_json::Map<String, serde_json::Value>,
    row_num: usize,
) -> MapResult<()> {
    for (key, jv) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match jv {
            serde_json::Value::Object(inner) => flatten_into(record, &name, inner, row_num)?,
            serde_json::Value::Array(_) => {
                return Err(MapError::SchemaMismatch {
                    message: format!("row {row_num} field '{name}' is an array; only scalar values are supported"),
                });
            }
            scalar => {
                record.insert(name, scalar_value(scalar));
            }
        }
    }
    Ok(())
}

fn scalar_value(jv: &serde_json::Value) -> Value {
    match jv {
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => n.as_f64().map(Value::Float64).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Utf8(s.clone()),
        _ => Value::Null,
    }
}
