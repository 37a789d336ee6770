//! Turn a resolved payload into the fixed seven-slot extraction result.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span};

use super::envelope::comfy_prompt_pair;
use super::params::ParsedParameters;
use super::resolver::ResolvedPayload;
use super::segment::prompt_pair;
use super::source::{ImageHandle, RawMetadata};
use crate::host::types::NodeOutput;

/// Slot names, in output order.
pub const OUTPUT_NAMES: [&str; 7] = [
    "image",
    "positive_prompt",
    "negative_prompt",
    "parameters",
    "workflow",
    "raw_metadata",
    "parsed_params",
];

/// The extraction result. Every slot is always present; string slots are
/// empty when the source format has nothing to put there.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionOutput {
    pub image: Option<ImageHandle>,
    pub positive_prompt: String,
    pub negative_prompt: String,
    pub parameters: String,
    pub workflow: String,
    pub raw_metadata: String,
    pub parsed_params: String,
}

impl ExtractionOutput {
    pub fn into_node_output(self) -> NodeOutput {
        let image = self
            .image
            .and_then(|handle| serde_json::to_value(handle).ok())
            .unwrap_or(Value::Null);

        let mut output = NodeOutput::new();
        output.insert("image".into(), image);
        output.insert("positive_prompt".into(), Value::String(self.positive_prompt));
        output.insert("negative_prompt".into(), Value::String(self.negative_prompt));
        output.insert("parameters".into(), Value::String(self.parameters));
        output.insert("workflow".into(), Value::String(self.workflow));
        output.insert("raw_metadata".into(), Value::String(self.raw_metadata));
        output.insert("parsed_params".into(), Value::String(self.parsed_params));
        output
    }
}

pub fn assemble(
    image: Option<ImageHandle>,
    raw: &RawMetadata,
    payload: ResolvedPayload,
) -> ExtractionOutput {
    let source = image
        .as_ref()
        .map(|h| h.path.clone())
        .unwrap_or_else(|| "text".to_string());
    let span = info_span!("assemble", source = %source, kind = payload.kind());
    let _enter = span.enter();

    // Payloads found in the textual chunks dump those chunks; anything
    // recovered from the informational fields dumps those fields instead.
    let from_text_chunks = match &payload {
        ResolvedPayload::WebUiText(_) => raw.text.contains_key("parameters"),
        ResolvedPayload::ComfyWorkflow(_) => true,
        ResolvedPayload::CivitaiEnvelope(_)
        | ResolvedPayload::FreeText(_)
        | ResolvedPayload::Empty => false,
    };
    let raw_metadata = raw_metadata_dump(raw, from_text_chunks);

    let mut out = ExtractionOutput {
        image,
        raw_metadata,
        ..Default::default()
    };

    match payload {
        ResolvedPayload::WebUiText(text) => {
            (out.positive_prompt, out.negative_prompt) = prompt_pair(&text);
            out.parsed_params = ParsedParameters::from_parameters_text(&text)
                .to_json()
                .unwrap_or_else(|e| format!("ERROR: failed to serialize parameters: {e}"));
            out.parameters = text;
        }
        ResolvedPayload::ComfyWorkflow(workflow) => {
            (out.positive_prompt, out.negative_prompt) = comfy_prompt_pair(&workflow);
            out.workflow = workflow;
        }
        ResolvedPayload::CivitaiEnvelope(envelope) => {
            let extra = envelope.extra_metadata();
            out.positive_prompt = extra.positive;
            out.negative_prompt = extra.negative;
            out.workflow = pretty(&Value::Object(envelope.data.clone()));
            out.parsed_params = pretty(&envelope.parameter_object());
        }
        ResolvedPayload::FreeText(prompt) => {
            out.positive_prompt = prompt.positive;
            out.negative_prompt = prompt.negative;
            out.parsed_params = prompt.label.to_string();
        }
        ResolvedPayload::Empty => debug!("Nothing to assemble"),
    }

    out
}

/// Assemble from a bare WebUI parameter text; the image slot stays empty.
pub fn assemble_text(text: &str) -> ExtractionOutput {
    assemble(
        None,
        &RawMetadata::default(),
        ResolvedPayload::WebUiText(text.to_string()),
    )
}

fn raw_metadata_dump(raw: &RawMetadata, from_text_chunks: bool) -> String {
    let prefer_info = !from_text_chunks && !raw.info.is_empty();
    if prefer_info {
        pretty(&raw.info_json())
    } else if !raw.text.is_empty() {
        pretty(&raw.text_json())
    } else if !raw.info.is_empty() {
        pretty(&raw.info_json())
    } else {
        String::new()
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("ERROR: failed to serialize metadata: {e}"))
}
