use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a [`super::Command`] or coercing a value.
///
/// Coercion problems always surface here, at construction time; a command
/// that was built successfully never fails later because of its value kind.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The source value could not be interpreted as the requested type.
    #[error("value {value} ({kind}) could not be converted to {target}")]
    TypeCoercion {
        value: String,
        kind: &'static str,
        target: String,
    },

    /// The type tag is not one the engine knows.
    #[error("type '{0}' is not supported")]
    UnsupportedType(String),

    /// A time layout could not be understood.
    #[error("invalid time layout '{0}'")]
    Layout(String),

    /// The command payload was not well-formed JSON.
    #[error("malformed command: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Remap(String),
}

impl CommandError {
    pub(crate) fn coercion(value: &super::Value, target: impl Into<String>) -> Self {
        CommandError::TypeCoercion {
            value: value.to_string(),
            kind: value.kind(),
            target: target.into(),
        }
    }
}

/// GeoJSON geometry shapes recognised by the `geometry` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

/// Opaque GeoJSON geometry; coordinates are kept as the raw JSON tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: serde_json::Value,
}

/// Regular-expression filter (`bson.RegEx`): a pattern plus option flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegexPattern {
    pub pattern: String,
    pub options: String,
}

impl fmt::Display for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Value;

    #[test]
    fn test_coercion_error_names_value_and_target() {
        let err = CommandError::coercion(&Value::from("abc"), "int");
        assert_eq!(
            err.to_string(),
            "value \"abc\" (string) could not be converted to int"
        );
    }

    #[test]
    fn test_unsupported_type_display() {
        let err = CommandError::UnsupportedType("decimal".to_string());
        assert_eq!(err.to_string(), "type 'decimal' is not supported");
    }
}
