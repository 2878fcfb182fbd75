//! Conversions between tabular rows and key/value records.

use super::types::CommandError;
use super::value::{Map, Value};

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Zips `columns` with `values` into a record.
///
/// Both sides must have the same length.
pub fn tabular_to_map(columns: &[String], values: &[Value]) -> Result<Map, CommandError> {
    if columns.is_empty() {
        return Err(CommandError::Remap(
            "columns are required to define the record layout".to_string(),
        ));
    }
    if columns.len() != values.len() {
        return Err(CommandError::Remap(format!(
            "{} columns but {} values",
            columns.len(),
            values.len()
        )));
    }
    Ok(columns.iter().cloned().zip(values.iter().cloned()).collect())
}

/// Lays `record` out in `columns` order; absent keys become [`Value::Null`].
pub fn map_to_tabular(columns: &[String], record: &Map) -> Result<Vec<Value>, CommandError> {
    if columns.is_empty() {
        return Err(CommandError::Remap(
            "columns are required to define the row layout".to_string(),
        ));
    }
    Ok(columns
        .iter()
        .map(|column| record.get(column).cloned().unwrap_or_default())
        .collect())
}

/// Replaces UTF-8 byte cells with strings, for stores that return text
/// columns undecoded.
pub fn normalize_bytes(record: &mut Map) {
    for value in record.values_mut() {
        if let Value::Bytes(bytes) = value {
            if let Ok(text) = std::str::from_utf8(bytes) {
                *value = Value::String(text.to_string());
            }
        }
    }
}

/// Rounds half up to `places` decimal places.
pub fn round(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    ((value + 0.5 / scale) * scale).trunc() / scale
}

/// Shapes `src` into a JSON document.
///
/// With no template the document holds the listed `columns` directly. With a
/// template every leaf is reset first, each listed column present in `src` is
/// written to the matching key at any depth of the template, and a column
/// missing from the template is an error. Nulls, empty objects and empty
/// arrays are pruned from the result.
pub fn json_from_map(
    src: &Map,
    columns: &[String],
    template: Option<&JsonMap>,
) -> Result<serde_json::Value, CommandError> {
    let mut container = match template {
        Some(template) if !template.is_empty() => {
            let mut container = template.clone();
            reset_leaves(&mut container);
            for column in columns {
                if let Some(value) = src.get(column) {
                    if !set_nested(&mut container, column, value.to_json()) {
                        return Err(CommandError::Remap(format!(
                            "key '{}' not found in the template",
                            column
                        )));
                    }
                }
            }
            container
        }
        _ => columns
            .iter()
            .map(|column| {
                let value = src.get(column).map(Value::to_json).unwrap_or_default();
                (column.clone(), value)
            })
            .collect(),
    };

    // second pass removes parents emptied by the first
    prune_empty(&mut container);
    prune_empty(&mut container);
    Ok(serde_json::Value::Object(container))
}

fn reset_leaves(doc: &mut JsonMap) {
    for value in doc.values_mut() {
        match value {
            serde_json::Value::Object(inner) => reset_leaves(inner),
            serde_json::Value::Array(items) => items.clear(),
            other => *other = serde_json::Value::Null,
        }
    }
}

fn set_nested(doc: &mut JsonMap, key: &str, value: serde_json::Value) -> bool {
    if let Some(slot) = doc.get_mut(key) {
        *slot = value;
        return true;
    }
    for inner in doc.values_mut() {
        if let serde_json::Value::Object(inner) = inner {
            if set_nested(inner, key, value.clone()) {
                return true;
            }
        }
    }
    false
}

fn prune_empty(doc: &mut JsonMap) {
    doc.retain(|_, value| match value {
        serde_json::Value::Null => false,
        serde_json::Value::Object(inner) => !inner.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => true,
    });
    for value in doc.values_mut() {
        match value {
            serde_json::Value::Object(inner) => prune_empty(inner),
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    if let serde_json::Value::Object(inner) = item {
                        prune_empty(inner);
                    }
                }
            }
            _ => {}
        }
    }
}
