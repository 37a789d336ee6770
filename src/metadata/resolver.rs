//! Decide which producer format an image's metadata is in.
//!
//! Strategies run in a fixed order and the first hit wins:
//!
//! 1. a `parameters` text chunk (WebUI),
//! 2. a `workflow` or `prompt` text chunk (ComfyUI),
//! 3. an info field holding a Civitai envelope, as a string or inside bytes,
//! 4. a `UserComment`, direct or recovered from the EXIF blob,
//! 5. nothing.
//!
//! Malformed JSON never aborts resolution; it only moves on to the next
//! strategy.

use tracing::debug;

use super::envelope::{CivitaiEnvelope, EXTRA_METADATA_KEY, extract_balanced_json};
use super::segment::NEGATIVE_PROMPT_MARKER;
use super::source::{MetaValue, RawMetadata, decode_latin1};

/// Minimum length of an info field worth scanning for an envelope.
const ENVELOPE_MIN_LEN: usize = 100;

const PROMPT_KEYWORDS: [&str; 6] = [
    "masterpiece",
    "best quality",
    "high quality",
    "detailed",
    "realistic",
    "absurdres",
];

pub const DIRECT_PROMPT_LABEL: &str = "direct prompt text";
pub const MULTI_LINE_LABEL: &str = "multi-line text";

/// A prompt recovered from a free-form comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeTextPrompt {
    pub positive: String,
    pub negative: String,
    /// Short description of how the prompt was read.
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPayload {
    /// WebUI parameter text.
    WebUiText(String),
    /// ComfyUI workflow or prompt graph, kept as the raw chunk text.
    ComfyWorkflow(String),
    CivitaiEnvelope(CivitaiEnvelope),
    FreeText(FreeTextPrompt),
    Empty,
}

impl ResolvedPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedPayload::WebUiText(_) => "webui",
            ResolvedPayload::ComfyWorkflow(_) => "comfyui",
            ResolvedPayload::CivitaiEnvelope(_) => "civitai",
            ResolvedPayload::FreeText(_) => "free_text",
            ResolvedPayload::Empty => "empty",
        }
    }
}

pub fn resolve(raw: &RawMetadata) -> ResolvedPayload {
    if let Some(text) = raw.text.get("parameters") {
        debug!("Resolved WebUI parameters chunk");
        return ResolvedPayload::WebUiText(text.to_text_lossy());
    }

    for key in ["workflow", "prompt"] {
        if let Some(text) = raw.text.get(key) {
            debug!(chunk = key, "Resolved ComfyUI chunk");
            return ResolvedPayload::ComfyWorkflow(text.to_text_lossy());
        }
    }
    if !raw.text.is_empty() {
        debug!("Text chunks hold no known key, scanning info fields");
    }

    if let Some(envelope) = find_envelope(raw) {
        debug!(field = %envelope.source_field, "Resolved Civitai envelope");
        return ResolvedPayload::CivitaiEnvelope(envelope);
    }

    if let Some(comment) = user_comment(raw) {
        debug!(len = comment.len(), "Interpreting UserComment");
        return interpret_comment(&comment);
    }

    debug!("No metadata source matched");
    ResolvedPayload::Empty
}

fn find_envelope(raw: &RawMetadata) -> Option<CivitaiEnvelope> {
    for (key, value) in &raw.info {
        match value {
            MetaValue::Text(s) => {
                if s.chars().count() > ENVELOPE_MIN_LEN
                    && s.trim_start().starts_with('{')
                    && s.contains(EXTRA_METADATA_KEY)
                    && let Some(envelope) = CivitaiEnvelope::parse(s, key.as_str())
                {
                    return Some(envelope);
                }
            }
            MetaValue::Bytes(b) => {
                if b.len() <= ENVELOPE_MIN_LEN {
                    continue;
                }
                let decoded = value.to_text_lossy();
                if !decoded.contains('{') || !decoded.contains(EXTRA_METADATA_KEY) {
                    continue;
                }
                let Some(json) = extract_balanced_json(&decoded) else {
                    debug!(field = %key, "Unbalanced braces in byte field");
                    continue;
                };
                if let Some(envelope) = CivitaiEnvelope::parse(json, format!("{key} (bytes)")) {
                    return Some(envelope);
                }
            }
        }
    }
    None
}

/// The `UserComment` field, or the comment embedded in the EXIF blob after
/// its `UNICODE` character-code marker.
pub fn user_comment(raw: &RawMetadata) -> Option<String> {
    if let Some(value) = raw.info.get("UserComment") {
        let comment = value.to_text_lossy();
        return (!comment.is_empty()).then_some(comment);
    }

    let MetaValue::Bytes(exif) = raw.info.get("exif")? else {
        return None;
    };
    let decoded = decode_latin1(exif);
    let Some(pos) = decoded.find("UNICODE") else {
        debug!("EXIF blob has no UNICODE comment");
        return None;
    };

    let filtered: String = decoded[pos + "UNICODE".len()..]
        .chars()
        .filter(|&c| c as u32 >= 0x20 || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    let comment = filtered
        .trim_end_matches(|c: char| {
            matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e' | '\x0f')
        })
        .trim()
        .to_string();
    (!comment.is_empty()).then_some(comment)
}

fn interpret_comment(comment: &str) -> ResolvedPayload {
    if comment.trim_start().starts_with('{') {
        if let Some(envelope) = CivitaiEnvelope::parse(comment, "UserComment") {
            return ResolvedPayload::CivitaiEnvelope(envelope);
        }
        debug!("UserComment JSON is not an envelope");
    }

    if comment.contains(NEGATIVE_PROMPT_MARKER) || comment.contains("Steps:") {
        return ResolvedPayload::WebUiText(comment.to_string());
    }

    let lower = comment.to_lowercase();
    let hits = PROMPT_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    if hits >= 2 {
        return ResolvedPayload::FreeText(FreeTextPrompt {
            positive: comment.to_string(),
            negative: String::new(),
            label: DIRECT_PROMPT_LABEL,
        });
    }

    let mut lines = comment.lines();
    let positive = lines.next().unwrap_or_default().trim().to_string();
    let negative = lines
        .map(str::trim)
        .find(|l| l.starts_with("Negative:") || l.starts_with(NEGATIVE_PROMPT_MARKER))
        .and_then(|l| l.split_once(':'))
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default();

    ResolvedPayload::FreeText(FreeTextPrompt {
        positive,
        negative,
        label: MULTI_LINE_LABEL,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope_json() -> String {
        let mut s = String::from(
            r#"{"extraMetadata":"{\"prompt\":\"a photo\"}","resources":[],"padding":""#,
        );
        s.push_str(&"x".repeat(120));
        s.push_str("\"}");
        s
    }

    #[test]
    fn test_parameters_chunk_wins() {
        let mut raw = RawMetadata::default();
        raw.insert_text("parameters", "a cat\nSteps: 20");
        raw.insert_text("prompt", "{}");
        assert_eq!(
            resolve(&raw),
            ResolvedPayload::WebUiText("a cat\nSteps: 20".into())
        );
    }

    #[test]
    fn test_workflow_chunk_before_prompt_chunk() {
        let mut raw = RawMetadata::default();
        raw.insert_text("prompt", "{\"p\": 1}");
        raw.insert_text("workflow", "{\"w\": 1}");
        assert_eq!(
            resolve(&raw),
            ResolvedPayload::ComfyWorkflow("{\"w\": 1}".into())
        );
    }

    #[test]
    fn test_envelope_in_byte_field() {
        let mut bytes = b"ASCII\0\0\0".to_vec();
        bytes.extend_from_slice(envelope_json().as_bytes());
        bytes.extend_from_slice(&[0xFF, 0x00, 0x01]);

        let mut raw = RawMetadata::default();
        raw.insert_info("exif", bytes);

        let ResolvedPayload::CivitaiEnvelope(envelope) = resolve(&raw) else {
            panic!("expected envelope");
        };
        assert_eq!(envelope.source_field, "exif (bytes)");
        assert_eq!(envelope.extra_metadata().positive, "a photo");
    }

    #[test]
    fn test_envelope_in_text_field() {
        let mut raw = RawMetadata::default();
        raw.insert_info("Comment", envelope_json());
        let ResolvedPayload::CivitaiEnvelope(envelope) = resolve(&raw) else {
            panic!("expected envelope");
        };
        assert_eq!(envelope.source_field, "Comment");
    }

    #[test]
    fn test_short_or_malformed_info_falls_through() {
        let mut raw = RawMetadata::default();
        raw.insert_info("Comment", "{\"extraMetadata\": \"short\"}");
        let mut broken = "{\"extraMetadata\": ".to_string();
        broken.push_str(&"y".repeat(150));
        raw.insert_info("Other", broken);
        assert_eq!(resolve(&raw), ResolvedPayload::Empty);
    }

    #[test]
    fn test_unicode_user_comment_from_exif() {
        let mut exif = b"Exif\0\0II*\0".to_vec();
        exif.extend_from_slice(b"UNICODE\0\0");
        exif.extend_from_slice(b"a red fox\nSteps: 20, Seed: 5\0\0");

        let mut raw = RawMetadata::default();
        raw.insert_info("exif", exif);
        assert_eq!(
            user_comment(&raw).as_deref(),
            Some("a red fox\nSteps: 20, Seed: 5")
        );
        assert_eq!(
            resolve(&raw),
            ResolvedPayload::WebUiText("a red fox\nSteps: 20, Seed: 5".into())
        );
    }

    #[test]
    fn test_user_comment_keyword_prompt() {
        let mut raw = RawMetadata::default();
        raw.insert_info("UserComment", "Masterpiece, best quality, 1girl, garden");
        let ResolvedPayload::FreeText(prompt) = resolve(&raw) else {
            panic!("expected free text");
        };
        assert_eq!(prompt.label, DIRECT_PROMPT_LABEL);
        assert_eq!(prompt.positive, "Masterpiece, best quality, 1girl, garden");
    }

    #[test]
    fn test_user_comment_multi_line() {
        let mut raw = RawMetadata::default();
        raw.insert_info("UserComment", "a boat on a lake\nmore words\nNegative: fog, rain");
        let ResolvedPayload::FreeText(prompt) = resolve(&raw) else {
            panic!("expected free text");
        };
        assert_eq!(prompt.label, MULTI_LINE_LABEL);
        assert_eq!(prompt.positive, "a boat on a lake");
        assert_eq!(prompt.negative, "fog, rain");
    }

    #[test]
    fn test_user_comment_envelope() {
        let mut raw = RawMetadata::default();
        raw.insert_info(
            "UserComment",
            r#"{"extraMetadata": {"prompt": "a tall lighthouse at night, stars"}}"#,
        );
        let ResolvedPayload::CivitaiEnvelope(envelope) = resolve(&raw) else {
            panic!("expected envelope");
        };
        assert_eq!(envelope.source_field, "UserComment");
    }

    #[test]
    fn test_user_comment_json_without_envelope_falls_through() {
        let mut raw = RawMetadata::default();
        raw.insert_info(
            "UserComment",
            r#"{"description": "a lighthouse", "settings": "Steps: 30, Seed: 9"}"#,
        );
        let ResolvedPayload::WebUiText(text) = resolve(&raw) else {
            panic!("expected WebUI text");
        };
        assert!(text.starts_with("{\"description\""));

        let mut raw = RawMetadata::default();
        raw.insert_info("UserComment", r#"{"title": "harbor"}"#);
        let ResolvedPayload::FreeText(prompt) = resolve(&raw) else {
            panic!("expected free text");
        };
        assert_eq!(prompt.label, MULTI_LINE_LABEL);
        assert_eq!(prompt.positive, r#"{"title": "harbor"}"#);
        assert_eq!(prompt.negative, "");
    }

    #[test]
    fn test_user_comment_negative_prompt_line_reads_as_webui() {
        let comment = "a boat on a lake\nNegative prompt: fog, rain";
        let mut raw = RawMetadata::default();
        raw.insert_info("UserComment", comment);
        assert_eq!(resolve(&raw), ResolvedPayload::WebUiText(comment.into()));

        let (positive, negative) = crate::metadata::segment::prompt_pair(comment);
        assert_eq!(positive, "a boat on a lake");
        assert_eq!(negative, "fog, rain");
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(resolve(&RawMetadata::default()), ResolvedPayload::Empty);
        let mut raw = RawMetadata::default();
        raw.insert_info("dpi", "72");
        assert_eq!(resolve(&raw), ResolvedPayload::Empty);
    }
}
