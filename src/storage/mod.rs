pub mod json_store;
pub mod memory_store;

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use json_store::JsonConfigStore;
pub use memory_store::MemoryConfigStore;

/// Configuration values keyed by name, as stored in `env_config.json`.
pub type ConfigMap = Map<String, Value>;

/// Declared value type per key, as stored in `config_types.json`.
pub type TypeMap = BTreeMap<String, ValueType>;

/// Declared type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    #[serde(rename = "string")]
    String,
    /// A secret, stored as a string.
    #[serde(rename = "token")]
    Token,
    /// A JSON string `{"key1": .., "key2": .., "key3": ..}` naming three
    /// other keys.
    #[serde(rename = "3KeyGroup")]
    KeyGroup,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "boolean")]
    Boolean,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueTypeError {
    #[error("unknown value type: {0}")]
    Unknown(String),
    #[error("cannot convert '{value}' to {ty}")]
    Conversion { value: String, ty: &'static str },
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Token => "token",
            ValueType::KeyGroup => "3KeyGroup",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
        }
    }

    /// Convert a raw string into the JSON value stored for this type.
    pub fn convert(&self, raw: &str) -> Result<Value, ValueTypeError> {
        let fail = || ValueTypeError::Conversion {
            value: raw.to_string(),
            ty: self.as_str(),
        };
        match self {
            ValueType::String | ValueType::Token | ValueType::KeyGroup => {
                Ok(Value::String(raw.to_string()))
            }
            ValueType::Integer => raw.trim().parse::<i64>().map(Value::from).map_err(|_| fail()),
            ValueType::Float => {
                let f = raw.trim().parse::<f64>().map_err(|_| fail())?;
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(fail)
            }
            ValueType::Boolean => Ok(Value::Bool(matches!(
                raw.trim().to_lowercase().as_str(),
                "true" | "1" | "t" | "y" | "yes"
            ))),
        }
    }
}

impl FromStr for ValueType {
    type Err = ValueTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ValueType::String),
            "token" => Ok(ValueType::Token),
            "3KeyGroup" => Ok(ValueType::KeyGroup),
            "integer" => Ok(ValueType::Integer),
            "float" => Ok(ValueType::Float),
            "boolean" => Ok(ValueType::Boolean),
            other => Err(ValueTypeError::Unknown(other.to_string())),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Render a stored value the way nodes emit it: strings bare, everything
/// else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Trait for configuration persistence.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load every configuration value. A missing store is empty.
    async fn load(&self) -> Result<ConfigMap>;

    /// Replace every configuration value.
    async fn save(&self, values: &ConfigMap) -> Result<()>;

    /// Load the declared type of every key that has one.
    async fn load_types(&self) -> Result<TypeMap>;

    /// Record the declared type of `key`.
    async fn set_type(&self, key: &str, ty: ValueType) -> Result<()>;

    /// Forget the declared type of `key`.
    async fn delete_type(&self, key: &str) -> Result<()>;

    /// Convert `raw` to `ty`, store it under `key` and record its type.
    async fn set_value(&self, key: &str, raw: &str, ty: ValueType) -> Result<Value> {
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("config key must not be empty");
        }
        let value = ty.convert(raw)?;

        let mut values = self.load().await?;
        values.insert(key.to_string(), value.clone());
        self.save(&values).await?;
        self.set_type(key, ty).await?;
        Ok(value)
    }

    /// Remove `key` and its type. Returns `false` when the key did not exist.
    async fn delete_value(&self, key: &str) -> Result<bool> {
        let key = key.trim();
        let mut values = self.load().await?;
        if values.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&values).await?;
        self.delete_type(key).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_conversion() {
        assert_eq!(ValueType::Integer.convert(" 42 ").unwrap(), Value::from(42));
        assert_eq!(ValueType::Float.convert("0.5").unwrap(), Value::from(0.5));
        assert_eq!(ValueType::Boolean.convert("Yes").unwrap(), Value::Bool(true));
        assert_eq!(ValueType::Boolean.convert("off").unwrap(), Value::Bool(false));
        assert_eq!(
            ValueType::Token.convert("sk-123").unwrap(),
            Value::String("sk-123".into())
        );
        assert!(matches!(
            ValueType::Integer.convert("4.5"),
            Err(ValueTypeError::Conversion { ty: "integer", .. })
        ));
        assert!(ValueType::Float.convert("NaN").is_err());
    }

    #[test]
    fn test_value_type_names_round_trip() {
        for ty in [
            ValueType::String,
            ValueType::Token,
            ValueType::KeyGroup,
            ValueType::Integer,
            ValueType::Float,
            ValueType::Boolean,
        ] {
            assert_eq!(ty.as_str().parse::<ValueType>().unwrap(), ty);
            assert_eq!(
                serde_json::to_value(ty).unwrap(),
                Value::String(ty.as_str().into())
            );
        }
        assert!("list".parse::<ValueType>().is_err());
    }
}
