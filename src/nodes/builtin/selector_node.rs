use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::host::types::{Context, NodeOutput};
use crate::nodes::Node;
use crate::nodes::input::str_field;

/// Number of `option_N` inputs a custom selector accepts.
pub const MAX_OPTIONS: usize = 20;

/// Packs a `name`/`value` pair into an option object.
pub struct SelectorOptionNode;

#[async_trait]
impl Node for SelectorOptionNode {
    fn node_type(&self) -> &str {
        "selector_option"
    }

    fn description(&self) -> &str {
        "Create a named option for a custom selector"
    }

    fn outputs(&self) -> &[&'static str] {
        &["option"]
    }

    async fn execute(&self, config: &serde_json::Value, _ctx: Context) -> Result<NodeOutput> {
        let name = str_field(config, "name").unwrap_or("");
        let value = str_field(config, "value").unwrap_or("");

        let mut output = NodeOutput::new();
        output.insert("option".to_string(), json!({"name": name, "value": value}));
        Ok(output)
    }
}

/// Picks the value of the option whose name equals `selected_option`.
///
/// Options come from `option_1` .. `option_20`, each either an inline
/// option object or the name of an upstream value holding one.
pub struct CustomSelectorNode;

fn option_pair(option: &Value) -> Option<(&str, &str)> {
    if let Some([name, value]) = option.as_array().map(Vec::as_slice) {
        return Some((name.as_str()?, value.as_str()?));
    }
    Some((option.get("name")?.as_str()?, option.get("value")?.as_str()?))
}

#[async_trait]
impl Node for CustomSelectorNode {
    fn node_type(&self) -> &str {
        "custom_selector"
    }

    fn description(&self) -> &str {
        "Select one of up to 20 connected options by name"
    }

    fn outputs(&self) -> &[&'static str] {
        &["value"]
    }

    async fn execute(&self, config: &serde_json::Value, ctx: Context) -> Result<NodeOutput> {
        let selected = str_field(config, "selected_option").unwrap_or("");

        let mut chosen = None;
        for i in 1..=MAX_OPTIONS {
            let slot = format!("option_{i}");
            let option = match config.get(&slot) {
                Some(Value::String(key)) => ctx.get(key),
                Some(Value::Null) | None => None,
                Some(inline) => Some(inline),
            };
            let Some(option) = option else {
                continue;
            };
            let Some((name, value)) = option_pair(option) else {
                warn!(slot = %slot, "Ignoring incompatible selector option");
                continue;
            };
            if name == selected {
                chosen = Some(value.to_string());
                break;
            }
        }
        let chosen = chosen.unwrap_or_else(|| {
            debug!(selected = %selected, "No option matched the selection");
            String::new()
        });

        let mut output = NodeOutput::new();
        output.insert("value".to_string(), Value::String(chosen));
        Ok(output)
    }
}
