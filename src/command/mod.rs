//! Declarative commands and type coercion.
//!
//! A [`Command`] is the typed form of one `{"name", "type", "value", "arg"}`
//! node. The value is coerced once, when the command is built, into the
//! [`CommandValue`] variant selected by its [`TypeTag`]; handlers never see a
//! value whose kind disagrees with its tag.

pub mod coerce;
pub mod layout;
pub mod remap;
pub mod types;
pub mod value;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::value::RawValue;

pub use coerce::{coerce, coerce_named, parse_float};
pub use layout::DEFAULT_TIME_LAYOUT;
pub use remap::{json_from_map, map_to_tabular, normalize_bytes, round, tabular_to_map};
pub use types::{CommandError, Geometry, GeometryKind, RegexPattern};
pub use value::{Map, Value};

/// Selects how a command value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Float,
    String,
    Bool,
    Time,
    Map,
    /// `list` or `array`.
    List,
    Geometry,
    /// `bson.RegEx`.
    Regex,
    /// Opaque JSON object.
    Json,
    /// Opaque JSON array of objects.
    JsonArray,
    /// Ordered nested commands.
    Complex,
    /// Ordered nested commands with a single logical target.
    Single,
    /// The literal payload text, uninterpreted.
    Raw,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Bool => "bool",
            TypeTag::Time => "time",
            TypeTag::Map => "map",
            TypeTag::List => "list",
            TypeTag::Geometry => "geometry",
            TypeTag::Regex => "bson.RegEx",
            TypeTag::Json => "json",
            TypeTag::JsonArray => "jsonarray",
            TypeTag::Complex => "complex",
            TypeTag::Single => "single",
            TypeTag::Raw => "raw",
        }
    }

    /// `complex` and `single` carry child commands.
    pub fn is_structural(&self) -> bool {
        matches!(self, TypeTag::Complex | TypeTag::Single)
    }
}

impl FromStr for TypeTag {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s {
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "string" => TypeTag::String,
            "bool" => TypeTag::Bool,
            "time" => TypeTag::Time,
            "map" => TypeTag::Map,
            "list" | "array" => TypeTag::List,
            "geometry" => TypeTag::Geometry,
            "bson.RegEx" => TypeTag::Regex,
            "json" => TypeTag::Json,
            "jsonarray" => TypeTag::JsonArray,
            "complex" => TypeTag::Complex,
            "single" => TypeTag::Single,
            "raw" => TypeTag::Raw,
            other => return Err(CommandError::UnsupportedType(other.to_string())),
        };
        Ok(tag)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced command value; one variant per [`TypeTag`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Time(DateTime<Local>),
    Map(Map),
    List(Vec<Value>),
    Geometry(Geometry),
    Regex(RegexPattern),
    Json(serde_json::Map<String, serde_json::Value>),
    JsonArray(Vec<serde_json::Map<String, serde_json::Value>>),
    Complex(Vec<Command>),
    Single(Vec<Command>),
    Raw(String),
}

impl CommandValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            CommandValue::Int(_) => TypeTag::Int,
            CommandValue::Float(_) => TypeTag::Float,
            CommandValue::String(_) => TypeTag::String,
            CommandValue::Bool(_) => TypeTag::Bool,
            CommandValue::Time(_) => TypeTag::Time,
            CommandValue::Map(_) => TypeTag::Map,
            CommandValue::List(_) => TypeTag::List,
            CommandValue::Geometry(_) => TypeTag::Geometry,
            CommandValue::Regex(_) => TypeTag::Regex,
            CommandValue::Json(_) => TypeTag::Json,
            CommandValue::JsonArray(_) => TypeTag::JsonArray,
            CommandValue::Complex(_) => TypeTag::Complex,
            CommandValue::Single(_) => TypeTag::Single,
            CommandValue::Raw(_) => TypeTag::Raw,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CommandValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            CommandValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CommandValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CommandValue::String(s) | CommandValue::Raw(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&DateTime<Local>> {
        match self {
            CommandValue::Time(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            CommandValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            CommandValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Nested commands of a `complex` or `single` value.
    pub fn as_commands(&self) -> Option<&[Command]> {
        match self {
            CommandValue::Complex(children) | CommandValue::Single(children) => Some(children),
            _ => None,
        }
    }
}

/// A named, typed unit of handler configuration.
///
/// Commands are immutable once built. `arg` is an opaque JSON payload a
/// handler may read with its own schema through [`Command::arg_as`].
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    kind: TypeTag,
    value: Option<CommandValue>,
    arg: Option<Box<RawValue>>,
}

/// Wire form; `value` and `arg` stay raw until the tag is known.
#[derive(Deserialize)]
struct WireCommand {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: Option<Box<RawValue>>,
    #[serde(default)]
    arg: Option<Box<RawValue>>,
}

impl Command {
    /// Builds a command by coercing `value` to `kind`.
    ///
    /// Structural tags expect a list of command objects; `raw` keeps the JSON
    /// encoding of `value`.
    pub fn new(name: impl Into<String>, kind: TypeTag, value: &Value) -> Result<Self, CommandError> {
        let name = name.into();
        let value = match kind {
            _ if kind.is_structural() => {
                let raw = serde_json::value::to_raw_value(&value.to_json())?;
                Self::nested_from_raw(kind, &raw)?
            }
            TypeTag::Raw => CommandValue::Raw(value.to_json().to_string()),
            _ => coerce(kind, value, None)?,
        };
        Ok(Command {
            name,
            kind,
            value: Some(value),
            arg: None,
        })
    }

    /// Builds a `complex`/`single` command from already-built children.
    pub fn nested(
        name: impl Into<String>,
        kind: TypeTag,
        children: Vec<Command>,
    ) -> Result<Self, CommandError> {
        let value = match kind {
            TypeTag::Complex => CommandValue::Complex(children),
            TypeTag::Single => CommandValue::Single(children),
            other => return Err(CommandError::UnsupportedType(other.to_string())),
        };
        Ok(Command {
            name: name.into(),
            kind,
            value: Some(value),
            arg: None,
        })
    }

    /// Parses one command object from JSON text.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let wire: WireCommand = serde_json::from_str(text)?;
        Self::from_wire(wire)
    }

    /// Parses a JSON array of command objects, preserving order.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, CommandError> {
        let wires: Vec<WireCommand> = serde_json::from_str(text)?;
        wires.into_iter().map(Self::from_wire).collect()
    }

    fn from_wire(wire: WireCommand) -> Result<Self, CommandError> {
        let kind: TypeTag = wire.kind.parse()?;
        let value = match wire.value {
            None => None,
            Some(raw) => Some(match kind {
                _ if kind.is_structural() => Self::nested_from_raw(kind, &raw)?,
                TypeTag::Raw => CommandValue::Raw(raw.get().to_string()),
                _ => {
                    let json: serde_json::Value = serde_json::from_str(raw.get())?;
                    coerce(kind, &Value::from(json), None)?
                }
            }),
        };
        Ok(Command {
            name: wire.name,
            kind,
            value,
            arg: wire.arg,
        })
    }

    fn nested_from_raw(kind: TypeTag, raw: &RawValue) -> Result<CommandValue, CommandError> {
        let wires: Vec<WireCommand> = serde_json::from_str(raw.get())?;
        let children = wires
            .into_iter()
            .map(Self::from_wire)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match kind {
            TypeTag::Single => CommandValue::Single(children),
            _ => CommandValue::Complex(children),
        })
    }

    /// Attaches an opaque handler-specific payload.
    pub fn with_arg(mut self, arg: &serde_json::Value) -> Result<Self, CommandError> {
        self.arg = Some(serde_json::value::to_raw_value(arg)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeTag {
        self.kind
    }

    /// `None` when the declaration carried no value.
    pub fn value(&self) -> Option<&CommandValue> {
        self.value.as_ref()
    }

    /// Nested commands for `complex`/`single`; empty otherwise.
    pub fn children(&self) -> &[Command] {
        self.value
            .as_ref()
            .and_then(CommandValue::as_commands)
            .unwrap_or_default()
    }

    /// The raw `arg` payload text.
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref().map(RawValue::get)
    }

    /// Reads `arg` with a handler-defined schema.
    pub fn arg_as<T: DeserializeOwned>(&self) -> Option<Result<T, CommandError>> {
        self.arg
            .as_deref()
            .map(|raw| serde_json::from_str(raw.get()).map_err(CommandError::from))
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.value == other.value
            && self.arg() == other.arg()
    }
}

/// Commands embed in any serde_json-deserialized config.
///
/// `value` and `arg` are buffered as [`RawValue`], so the deserializer must
/// be able to hand out raw JSON. serde_json's does; formats such as YAML or
/// TOML fail here and should go through `serde_json::Value` text first.
impl<'de> Deserialize<'de> for Command {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireCommand::deserialize(deserializer)?;
        Command::from_wire(wire).map_err(de::Error::custom)
    }
}

/// First command named `name`.
pub fn find<'a>(commands: &'a [Command], name: &str) -> Option<&'a Command> {
    commands.iter().find(|c| c.name == name)
}
