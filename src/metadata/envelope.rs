//! JSON-bearing producer formats: Civitai `extraMetadata` envelopes and
//! ComfyUI node graphs.
//!
//! A Civitai envelope is a JSON object with an `extraMetadata` member. The
//! member is either an object, or a string that may itself hold escaped JSON.
//! When the rest of the envelope is an API-format ComfyUI graph (node id →
//! `{class_type, inputs}`), sampler settings are harvested from the node
//! inputs.

use serde_json::{Map, Value};
use tracing::debug;

use super::params::json_scalar_to_string;

pub const EXTRA_METADATA_KEY: &str = "extraMetadata";

/// Prompts shorter than this are considered placeholders.
const MIN_PROMPT_CHARS: usize = 20;
const TRUNCATED_PROMPT_CHARS: usize = 200;

/// A parsed envelope and the field it was recovered from.
#[derive(Debug, Clone, PartialEq)]
pub struct CivitaiEnvelope {
    pub data: Map<String, Value>,
    /// Field name, suffixed with ` (bytes)` when recovered from a byte field.
    pub source_field: String,
}

/// What `extraMetadata` yielded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraMetadata {
    pub positive: String,
    pub negative: String,
    /// Type tag of the interpreted value: `str`, `dict`, `list`, ...
    pub kind: &'static str,
    /// The object form, when there is one.
    pub object: Option<Map<String, Value>>,
}

impl CivitaiEnvelope {
    /// Parse `text` as an envelope. `None` unless it is a JSON object with
    /// an `extraMetadata` member.
    pub fn parse(text: &str, source_field: impl Into<String>) -> Option<Self> {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Envelope candidate is not valid JSON");
                return None;
            }
        };
        match value {
            Value::Object(data) if data.contains_key(EXTRA_METADATA_KEY) => Some(Self {
                data,
                source_field: source_field.into(),
            }),
            _ => None,
        }
    }

    pub fn extra_metadata(&self) -> ExtraMetadata {
        self.data
            .get(EXTRA_METADATA_KEY)
            .map(interpret_extra_metadata)
            .unwrap_or_default()
    }

    /// Number of top-level keys that look like node ids.
    pub fn workflow_nodes(&self) -> usize {
        self.data
            .keys()
            .filter(|k| !k.is_empty() && k.chars().all(|c| c.is_ascii_digit()))
            .count()
    }

    /// Parameter object describing the envelope: format tag, recovered
    /// prompt, object-form `extraMetadata` members, harvested node inputs.
    pub fn parameter_object(&self) -> Value {
        let extra = self.extra_metadata();

        let mut params = Map::new();
        params.insert("format".into(), Value::String("Civitai ComfyUI".into()));
        params.insert(
            "source_field".into(),
            Value::String(self.source_field.clone()),
        );
        params.insert("prompt".into(), Value::String(extra.positive.clone()));
        params.insert(
            "extraMetadata_type".into(),
            Value::String(extra.kind.to_string()),
        );
        params.insert("workflow_nodes".into(), Value::from(self.workflow_nodes()));
        params.insert("has_extraMetadata".into(), Value::Bool(true));

        if let Some(object) = extra.object {
            for (k, v) in object {
                params.insert(k, v);
            }
        }

        harvest_node_inputs(&self.data, &mut params);
        Value::Object(params)
    }
}

/// Interpret an `extraMetadata` value, accepting both the object form and the
/// string form (plain prompt, or double-encoded JSON).
pub fn interpret_extra_metadata(value: &Value) -> ExtraMetadata {
    match value {
        Value::String(s) => {
            if s.trim_start().starts_with('{') {
                match serde_json::from_str::<Value>(s) {
                    Ok(Value::Object(inner)) => return interpret_object(inner),
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "extraMetadata string is not nested JSON"),
                }
            }
            ExtraMetadata {
                positive: s.clone(),
                kind: "str",
                ..Default::default()
            }
        }
        Value::Object(obj) => interpret_object(obj.clone()),
        other => ExtraMetadata {
            positive: other.to_string(),
            kind: json_type_name(other),
            ..Default::default()
        },
    }
}

fn interpret_object(obj: Map<String, Value>) -> ExtraMetadata {
    let prompt_field = obj
        .get("prompt")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let positive = if prompt_field.chars().count() >= MIN_PROMPT_CHARS {
        prompt_field
    } else if let Some(long) = obj
        .values()
        .filter_map(Value::as_str)
        .find(|s| s.chars().count() > MIN_PROMPT_CHARS)
    {
        long.to_string()
    } else if !prompt_field.trim().is_empty() {
        prompt_field
    } else {
        let dump = Value::Object(obj.clone()).to_string();
        let truncated: String = dump.chars().take(TRUNCATED_PROMPT_CHARS).collect();
        format!("{truncated}...")
    };

    let negative = obj
        .get("negative_prompt")
        .map(json_scalar_to_string)
        .unwrap_or_default();

    ExtraMetadata {
        positive,
        negative,
        kind: "dict",
        object: Some(obj),
    }
}

/// Copy well-known sampler inputs from every node into `params`.
/// Later nodes overwrite earlier ones.
pub fn harvest_node_inputs(graph: &Map<String, Value>, params: &mut Map<String, Value>) {
    for node in graph.values() {
        let Some(inputs) = node.get("inputs").and_then(Value::as_object) else {
            continue;
        };

        for (input, target) in [
            ("steps", "steps"),
            ("cfg", "cfg_scale"),
            ("seed", "seed"),
            ("sampler_name", "sampler"),
            ("scheduler", "scheduler"),
            ("ckpt_name", "model"),
        ] {
            if let Some(v) = inputs.get(input) {
                params.insert(target.to_string(), v.clone());
            }
        }
        if let (Some(w), Some(h)) = (inputs.get("width"), inputs.get("height")) {
            params.insert("width".into(), w.clone());
            params.insert("height".into(), h.clone());
        }
    }
}

/// Positive and negative prompt from a ComfyUI graph.
///
/// Handles the API format (node id → `{class_type, inputs}`) and the UI
/// format (`nodes: [{type, widgets_values}]`). Text that is not JSON is
/// returned whole as the positive prompt.
pub fn comfy_prompt_pair(workflow_text: &str) -> (String, String) {
    let graph: Value = match serde_json::from_str(workflow_text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Workflow text is not JSON, using it as the prompt");
            return (workflow_text.to_string(), String::new());
        }
    };

    let mut pair = PromptCollector::default();
    match &graph {
        Value::Object(obj) => {
            if let Some(nodes) = obj.get("nodes").and_then(Value::as_array) {
                for node in nodes {
                    let class_type = node.get("type").and_then(Value::as_str).unwrap_or("");
                    let text = node
                        .get("widgets_values")
                        .and_then(Value::as_array)
                        .and_then(|w| w.first())
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    pair.offer(class_type, text);
                }
            }
            for node in obj.values() {
                let Some(node) = node.as_object() else {
                    continue;
                };
                let class_type = node
                    .get("class_type")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let text = node
                    .get("inputs")
                    .and_then(|i| i.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                pair.offer(class_type, text);
            }
        }
        _ => return (workflow_text.to_string(), String::new()),
    }

    (pair.positive, pair.negative)
}

#[derive(Default)]
struct PromptCollector {
    positive: String,
    negative: String,
}

impl PromptCollector {
    fn offer(&mut self, class_type: &str, text: &str) {
        if text.is_empty() {
            return;
        }

        let is_text_encoder =
            class_type.contains("CLIPTextEncode") || class_type.to_lowercase().contains("prompt");
        if is_text_encoder {
            if self.positive.is_empty() {
                self.positive = text.to_string();
            } else if self.negative.is_empty() {
                self.negative = text.to_string();
            }
        }

        if self.positive.is_empty() {
            self.positive = text.to_string();
        } else if self.negative.is_empty() && text != self.positive {
            self.negative = text.to_string();
        }
    }
}

/// The first balanced `{...}` span of `text`, counting brace depth from the
/// first `{`. `None` when the braces never balance.
pub fn extract_balanced_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
