//! Scalar coercions.
//!
//! Each function accepts a fixed set of source kinds and rejects everything
//! else with [`CommandError::TypeCoercion`]. There is no implicit fallback.

use chrono::{DateTime, Local, TimeZone};

use super::layout::{self, Layout, DEFAULT_TIME_LAYOUT};
use super::types::{CommandError, Geometry, RegexPattern};
use super::value::{Map, Value};
use super::{CommandValue, TypeTag};

/// Parses a number that may carry comma separators or scientific notation.
///
/// After stripping commas the exponent form is rebuilt as
/// `mantissa * 10^exponent`.
pub fn parse_float(text: &str) -> Option<f64> {
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    let text = text.replace(',', "");
    match text.find(['e', 'E']) {
        None => text.parse::<f64>().ok(),
        Some(pos) => {
            let mantissa = text[..pos].parse::<f64>().ok()?;
            let exponent = text[pos + 1..].parse::<i32>().ok()?;
            Some(mantissa * 10f64.powi(exponent))
        }
    }
}

pub fn string_from(value: &Value) -> Result<String, CommandError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        Value::Time(t) => Ok(t.to_string()),
        Value::Null | Value::Bool(_) | Value::List(_) | Value::Map(_) => {
            Err(CommandError::coercion(value, "string"))
        }
    }
}

/// Floats round half away from zero; numeric strings truncate toward zero.
pub fn int_from(value: &Value) -> Result<i64, CommandError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) => to_i64(f.round()).ok_or_else(|| CommandError::coercion(value, "int")),
        Value::String(s) => parse_float(s)
            .and_then(|f| to_i64(f.trunc()))
            .ok_or_else(|| CommandError::coercion(value, "int")),
        _ => Err(CommandError::coercion(value, "int")),
    }
}

/// `None` for NaN, infinities and integral values outside the `i64` range.
fn to_i64(f: f64) -> Option<i64> {
    (i64::MIN as f64..i64::MAX as f64)
        .contains(&f)
        .then_some(f as i64)
}

pub fn float_from(value: &Value) -> Result<f64, CommandError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::String(s) => parse_float(s).ok_or_else(|| CommandError::coercion(value, "float")),
        _ => Err(CommandError::coercion(value, "float")),
    }
}

pub fn bool_from(value: &Value) -> Result<bool, CommandError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "1" | "true" | "t" | "y" | "yes" | "是" => Ok(true),
            "0" | "false" | "f" | "n" | "no" | "否" | "不是" => Ok(false),
            _ => Err(CommandError::coercion(value, "bool")),
        },
        _ => Err(CommandError::coercion(value, "bool")),
    }
}

/// Coerces to a local time.
///
/// Integers are Unix seconds. Strings may carry their own layout after `::`;
/// without one, loosely-written dates are zero-padded before being parsed
/// against `layout`.
pub fn time_from(value: &Value, layout: &str) -> Result<DateTime<Local>, CommandError> {
    match value {
        Value::Time(t) => Ok(*t),
        Value::Int(secs) => Local
            .timestamp_opt(*secs, 0)
            .single()
            .ok_or_else(|| CommandError::coercion(value, "time")),
        Value::String(s) => {
            let (text, embedded) = layout::split_embedded(s);
            let (text, layout) = match embedded {
                Some(embedded) => (text.to_string(), embedded),
                None => (
                    layout::normalize_date(text)
                        .ok_or_else(|| CommandError::coercion(value, "time"))?,
                    layout,
                ),
            };
            Layout::parse(layout)?
                .parse_local(&text)
                .ok_or_else(|| CommandError::coercion(value, "time"))
        }
        _ => Err(CommandError::coercion(value, "time")),
    }
}

pub fn map_from(value: &Value) -> Result<Map, CommandError> {
    match value {
        Value::Map(map) => Ok(map.clone()),
        Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(json @ serde_json::Value::Object(_)) => match Value::from(json) {
                Value::Map(map) => Ok(map),
                _ => Err(CommandError::coercion(value, "map")),
            },
            _ => Err(CommandError::coercion(value, "map")),
        },
        _ => Err(CommandError::coercion(value, "map")),
    }
}

pub fn list_from(value: &Value) -> Result<Vec<Value>, CommandError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(serde_json::Value::Array(items)) => Ok(items.into_iter().map(Value::from).collect()),
            _ => Err(CommandError::coercion(value, "list")),
        },
        _ => Err(CommandError::coercion(value, "list")),
    }
}

pub fn geometry_from(value: &Value) -> Result<Geometry, CommandError> {
    let parsed = match value {
        Value::Map(_) => serde_json::from_value::<Geometry>(value.to_json()),
        Value::String(s) => serde_json::from_str::<Geometry>(s),
        Value::Bytes(b) => serde_json::from_slice::<Geometry>(b),
        _ => return Err(CommandError::coercion(value, "geometry")),
    };
    parsed.map_err(|_| CommandError::coercion(value, "geometry"))
}

/// `[pattern]` or `[pattern, options]`.
pub fn regex_from(value: &Value) -> Result<RegexPattern, CommandError> {
    let target = TypeTag::Regex.as_str();
    let Value::List(items) = value else {
        return Err(CommandError::coercion(value, target));
    };
    match items.as_slice() {
        [pattern] => Ok(RegexPattern {
            pattern: string_from(pattern)?,
            options: String::new(),
        }),
        [pattern, options] => Ok(RegexPattern {
            pattern: string_from(pattern)?,
            options: string_from(options)?,
        }),
        _ => Err(CommandError::coercion(value, target)),
    }
}

pub fn json_document_from(
    value: &Value,
) -> Result<serde_json::Map<String, serde_json::Value>, CommandError> {
    let json = match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.to_json()),
    };
    match json {
        Some(serde_json::Value::Object(doc)) => Ok(doc),
        _ => Err(CommandError::coercion(value, "json")),
    }
}

pub fn json_array_from(
    value: &Value,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, CommandError> {
    let json = match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.to_json()),
    };
    let Some(serde_json::Value::Array(items)) = json else {
        return Err(CommandError::coercion(value, "jsonarray"));
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(doc) => Ok(doc),
            _ => Err(CommandError::coercion(value, "jsonarray")),
        })
        .collect()
}

/// Coerces `value` to the kind selected by `tag`.
///
/// `layout` only matters for [`TypeTag::Time`] and defaults to
/// [`DEFAULT_TIME_LAYOUT`]. Structural and raw tags describe how a payload is
/// read, not a value kind, so they are rejected here.
pub fn coerce(tag: TypeTag, value: &Value, layout: Option<&str>) -> Result<CommandValue, CommandError> {
    let coerced = match tag {
        TypeTag::Int => CommandValue::Int(int_from(value)?),
        TypeTag::Float => CommandValue::Float(float_from(value)?),
        TypeTag::String => CommandValue::String(string_from(value)?),
        TypeTag::Bool => CommandValue::Bool(bool_from(value)?),
        TypeTag::Time => {
            CommandValue::Time(time_from(value, layout.unwrap_or(DEFAULT_TIME_LAYOUT))?)
        }
        TypeTag::Map => CommandValue::Map(map_from(value)?),
        TypeTag::List => CommandValue::List(list_from(value)?),
        TypeTag::Geometry => CommandValue::Geometry(geometry_from(value)?),
        TypeTag::Regex => CommandValue::Regex(regex_from(value)?),
        TypeTag::Json => CommandValue::Json(json_document_from(value)?),
        TypeTag::JsonArray => CommandValue::JsonArray(json_array_from(value)?),
        TypeTag::Complex | TypeTag::Single | TypeTag::Raw => {
            return Err(CommandError::UnsupportedType(tag.to_string()))
        }
    };
    Ok(coerced)
}

/// Same as [`coerce`], with the tag given by name.
pub fn coerce_named(tag: &str, value: &Value, layout: Option<&str>) -> Result<CommandValue, CommandError> {
    coerce(tag.parse()?, value, layout)
}
