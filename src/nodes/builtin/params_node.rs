use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::host::types::{Context, NodeOutput};
use crate::metadata::{OUTPUT_NAMES, assemble_text, parse_summary};
use crate::nodes::Node;
use crate::nodes::input::text_input;

/// Parses pasted or upstream WebUI parameter text into the same seven
/// slots the image loader produces.
pub struct WebUiParamsParseNode;

#[async_trait]
impl Node for WebUiParamsParseNode {
    fn node_type(&self) -> &str {
        "webui_params_parse"
    }

    fn description(&self) -> &str {
        "Parse WebUI parameter text into prompts and structured parameters"
    }

    fn outputs(&self) -> &[&'static str] {
        &OUTPUT_NAMES
    }

    async fn execute(&self, config: &serde_json::Value, ctx: Context) -> Result<NodeOutput> {
        let text = text_input("webui_params_parse", "text", config, &ctx)?;
        Ok(assemble_text(&text).into_node_output())
    }
}

/// Reduces `parsed_params` JSON (or raw parameter text) to typed sampler
/// settings.
pub struct MetadataParseNode;

const SUMMARY_OUTPUTS: [&str; 8] = [
    "steps",
    "sampler",
    "cfg_scale",
    "seed",
    "width",
    "height",
    "model",
    "parsed_params_json",
];

#[async_trait]
impl Node for MetadataParseNode {
    fn node_type(&self) -> &str {
        "metadata_parse"
    }

    fn description(&self) -> &str {
        "Extract steps, sampler, CFG scale, seed, size and model from parsed parameters"
    }

    fn outputs(&self) -> &[&'static str] {
        &SUMMARY_OUTPUTS
    }

    async fn execute(&self, config: &serde_json::Value, ctx: Context) -> Result<NodeOutput> {
        let text = text_input("metadata_parse", "text", config, &ctx)?;
        let summary = parse_summary(&text);

        let mut output = NodeOutput::new();
        output.insert("steps".to_string(), Value::from(summary.steps));
        output.insert("sampler".to_string(), Value::String(summary.sampler));
        output.insert("cfg_scale".to_string(), Value::from(summary.cfg_scale));
        output.insert("seed".to_string(), Value::from(summary.seed));
        output.insert("width".to_string(), Value::from(summary.width));
        output.insert("height".to_string(), Value::from(summary.height));
        output.insert("model".to_string(), Value::String(summary.model));
        output.insert(
            "parsed_params_json".to_string(),
            Value::String(summary.parsed_params_json),
        );
        Ok(output)
    }
}
