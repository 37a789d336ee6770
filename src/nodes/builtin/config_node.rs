use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::host::types::{Context, NodeOutput};
use crate::nodes::Node;
use crate::nodes::input::str_field;
use crate::storage::{ConfigStore, ValueType, value_to_string};

/// Reads one configuration value as a string.
pub struct ConfigReadNode {
    pub store: Arc<dyn ConfigStore>,
}

#[async_trait]
impl Node for ConfigReadNode {
    fn node_type(&self) -> &str {
        "config_read"
    }

    fn description(&self) -> &str {
        "Read a value from the configuration store"
    }

    fn outputs(&self) -> &[&'static str] {
        &["value"]
    }

    async fn execute(&self, config: &serde_json::Value, _ctx: Context) -> Result<NodeOutput> {
        let key = str_field(config, "key")
            .ok_or_else(|| anyhow::anyhow!("config_read requires 'key' parameter"))?;

        let values = self.store.load().await?;
        let value = values.get(key).map(value_to_string).unwrap_or_default();

        let mut output = NodeOutput::new();
        output.insert("value".to_string(), Value::String(value));
        Ok(output)
    }
}

/// Lists, adds, updates and deletes configuration values.
///
/// Problems with the request itself (empty key, unconvertible value,
/// missing key) are reported in `result`, not raised.
pub struct ConfigManageNode {
    pub store: Arc<dyn ConfigStore>,
}

impl ConfigManageNode {
    async fn run(&self, config: &serde_json::Value) -> Result<String> {
        let action = str_field(config, "action").unwrap_or("get_all");
        let key = str_field(config, "key").unwrap_or("").trim();
        let raw = str_field(config, "value").unwrap_or("");

        match action {
            "get_all" => {
                let values = self.store.load().await?;
                Ok(serde_json::to_string_pretty(&values)?)
            }
            "add" | "update" => {
                if key.is_empty() {
                    return Ok("ERROR: key must not be empty".to_string());
                }
                let value_type = str_field(config, "value_type").unwrap_or("string");
                let ty = match value_type.parse::<ValueType>() {
                    Ok(ty) => ty,
                    Err(e) => return Ok(format!("ERROR: {e}")),
                };
                if let Err(e) = ty.convert(raw) {
                    return Ok(format!("ERROR: {e}"));
                }
                let value = self.store.set_value(key, raw, ty).await?;
                let verb = if action == "add" { "Added" } else { "Updated" };
                info!(key = %key, value_type = %ty, "Config value stored");
                Ok(format!("{verb} config: {key} = {}", value_to_string(&value)))
            }
            "delete" => {
                if key.is_empty() {
                    return Ok("ERROR: key must not be empty".to_string());
                }
                if self.store.delete_value(key).await? {
                    info!(key = %key, "Config value deleted");
                    Ok(format!("Deleted config: {key}"))
                } else {
                    Ok(format!("ERROR: config key '{key}' does not exist"))
                }
            }
            other => anyhow::bail!("config_manage: unknown action '{}'", other),
        }
    }
}

#[async_trait]
impl Node for ConfigManageNode {
    fn node_type(&self) -> &str {
        "config_manage"
    }

    fn description(&self) -> &str {
        "List, add, update or delete configuration values"
    }

    fn outputs(&self) -> &[&'static str] {
        &["result"]
    }

    async fn execute(&self, config: &serde_json::Value, _ctx: Context) -> Result<NodeOutput> {
        let result = self.run(config).await?;

        let mut output = NodeOutput::new();
        output.insert("result".to_string(), Value::String(result));
        Ok(output)
    }
}

/// Resolves a `3KeyGroup` value into the three values it points at.
pub struct ConfigKeyGroupNode {
    pub store: Arc<dyn ConfigStore>,
}

impl ConfigKeyGroupNode {
    async fn resolve(&self, group_key: &str) -> Result<[String; 3]> {
        let values = self.store.load().await?;

        let Some(group) = values.get(group_key) else {
            warn!(key = %group_key, "Key group does not exist");
            return Ok(Default::default());
        };
        let group: Value = match serde_json::from_str(&value_to_string(group)) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %group_key, error = %e, "Key group is not valid JSON");
                return Ok(Default::default());
            }
        };

        let lookup = |slot: &str| {
            group
                .get(slot)
                .and_then(Value::as_str)
                .filter(|k| !k.is_empty())
                .and_then(|k| values.get(k))
                .map(value_to_string)
                .unwrap_or_default()
        };
        Ok([lookup("key1"), lookup("key2"), lookup("key3")])
    }
}

#[async_trait]
impl Node for ConfigKeyGroupNode {
    fn node_type(&self) -> &str {
        "config_key_group"
    }

    fn description(&self) -> &str {
        "Load the three values named by a 3KeyGroup configuration entry"
    }

    fn outputs(&self) -> &[&'static str] {
        &["value1", "value2", "value3"]
    }

    async fn execute(&self, config: &serde_json::Value, _ctx: Context) -> Result<NodeOutput> {
        let group_key = str_field(config, "group_key")
            .ok_or_else(|| anyhow::anyhow!("config_key_group requires 'group_key' parameter"))?;

        let [value1, value2, value3] = self.resolve(group_key).await?;

        let mut output = NodeOutput::new();
        output.insert("value1".to_string(), Value::String(value1));
        output.insert("value2".to_string(), Value::String(value2));
        output.insert("value3".to_string(), Value::String(value3));
        Ok(output)
    }
}
