//! Conversion between the textual form of a value and its typed form.
//!
//! Every function here is total: text that does not parse under a type
//! degrades to that type's default instead of failing, so hand-edited files
//! always load.

use serde::{Deserialize, Serialize};

/// Token written for `true` booleans.
pub const ENABLED: &str = "enabled";
/// Token written for `false` booleans.
pub const DISABLED: &str = "disabled";

/// Type tag of a schema key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Boolean,
    #[serde(alias = "int")]
    Integer,
    List,
}

impl ValueType {
    /// Value a key of this type takes when the file does not set it.
    pub fn default_value(self) -> Value {
        match self {
            ValueType::String => Value::String(String::new()),
            ValueType::Boolean => Value::Boolean(false),
            ValueType::Integer => Value::Integer(0),
            ValueType::List => Value::List(Vec::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::List => "list",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    List(Vec<String>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::List(_) => ValueType::List,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&encode(self))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

impl From<&[&str]> for Value {
    fn from(items: &[&str]) -> Self {
        Value::List(items.iter().map(|s| s.to_string()).collect())
    }
}

/// Decode the unquoted text of an entry under `ty`.
pub fn decode(ty: ValueType, raw: &str) -> Value {
    match ty {
        ValueType::String => Value::String(raw.to_string()),
        ValueType::Boolean => Value::Boolean(decode_bool(raw)),
        ValueType::Integer => Value::Integer(raw.trim().parse().unwrap_or(0)),
        ValueType::List => Value::List(raw.split_whitespace().map(str::to_string).collect()),
    }
}

fn decode_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        ENABLED | "true" | "yes" | "1"
    )
}

/// Encode a value to its unquoted text.
pub fn encode(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Boolean(true) => ENABLED.to_string(),
        Value::Boolean(false) => DISABLED.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::List(items) => items.join(" "),
    }
}

/// Convert `value` to `ty` through its text form.
///
/// A value already of type `ty` is returned unchanged.
pub fn coerce(ty: ValueType, value: Value) -> Value {
    if value.value_type() == ty {
        return value;
    }
    decode(ty, &encode(&value))
}
