//! Memory record codec: flattens structured metadata for the index and
//! restores it on read.
//!
//! The index only stores scalars. Lists and maps are written as their JSON
//! text; nulls are dropped so that "unset" and "never set" read back the same.
//! Restoring never fails on a corrupted list or map: list fields degrade to
//! an empty list, map fields to absent.

use memir_core::error::MemoryError;
use memir_core::memory::{FlatMetadata, MemoryMetadata, Scalar};
use serde_json::{Map, Value};
use tracing::warn;

/// Fields stored as serialized lists of strings.
pub const LIST_FIELDS: [&str; 2] = ["tags", "related_ids"];

/// Fields stored as serialized maps.
pub const MAP_FIELDS: [&str; 1] = ["extra"];

/// Flatten a metadata map: drop nulls, serialize lists and maps to strings,
/// pass scalars through unchanged.
pub fn sanitize(metadata: &Map<String, Value>) -> FlatMetadata {
    metadata
        .iter()
        .filter_map(|(key, value)| {
            let flat = match value {
                Value::Null => return None,
                Value::Array(_) | Value::Object(_) => Scalar::Text(value.to_string()),
                scalar => Scalar::from_json(scalar)?,
            };
            Some((key.clone(), flat))
        })
        .collect()
}

/// Reverse [`sanitize`] for the known structured fields.
pub fn restore(flat: &FlatMetadata) -> Map<String, Value> {
    let mut restored = Map::new();
    for (key, value) in flat {
        let value = match (key.as_str(), value) {
            (field, Scalar::Text(text)) if LIST_FIELDS.contains(&field) => restore_list(field, text),
            (field, Scalar::Text(text)) if MAP_FIELDS.contains(&field) => {
                match restore_map(field, text) {
                    Some(map) => map,
                    None => continue,
                }
            }
            (_, scalar) => scalar.to_json(),
        };
        restored.insert(key.clone(), value);
    }
    restored
}

fn restore_list(field: &str, text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Value::String(s),
                    other => Value::String(other.to_string()),
                })
                .collect(),
        ),
        _ => {
            warn!(field, "Stored list is malformed, reading it as empty");
            Value::Array(Vec::new())
        }
    }
}

fn restore_map(field: &str, text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(map @ Value::Object(_)) => Some(map),
        _ => {
            warn!(field, "Stored map is malformed, dropping it");
            None
        }
    }
}

/// Flatten typed metadata for storage.
pub fn encode(metadata: &MemoryMetadata) -> Result<FlatMetadata, MemoryError> {
    match serde_json::to_value(metadata) {
        Ok(Value::Object(map)) => Ok(sanitize(&map)),
        Ok(_) => Err(MemoryError::InvalidRecord(
            "metadata did not serialize to an object".into(),
        )),
        Err(e) => Err(MemoryError::InvalidRecord(e.to_string())),
    }
}

/// Rebuild typed metadata from storage.
pub fn decode(flat: &FlatMetadata) -> Result<MemoryMetadata, MemoryError> {
    serde_json::from_value(Value::Object(restore(flat)))
        .map_err(|e| MemoryError::InvalidRecord(format!("stored metadata: {e}")))
}
