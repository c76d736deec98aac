//! Scalar broker client option values.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// A broker client option value.
///
/// The settings file may spell options as JSON strings, numbers or booleans
/// (`"enable.auto.commit": false`, `"session.timeout.ms": 6000`). The broker
/// client only accepts strings, so every value is rendered once at load time.
/// `null`, arrays and objects are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub struct OptionValue(String);

impl OptionValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<Value> for OptionValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(Self(s)),
            Value::Bool(b) => Ok(Self(b.to_string())),
            Value::Number(n) => Ok(Self(n.to_string())),
            Value::Null => Err("option value must not be null".to_string()),
            Value::Array(_) | Value::Object(_) => {
                Err("option value must be a string, number or boolean".to_string())
            }
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
