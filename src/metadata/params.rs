//! Structured generation parameters and the `key: value` block parser.
//!
//! A WebUI parameter block looks like:
//!
//! ```text
//! Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 12345, Size: 512x768
//! Lora hashes: foo: 1a2b3c
//! ```
//!
//! Every line that starts a field carries a primary `key: value` pair and,
//! after commas, any number of chained `key: value` sub-fields.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use super::segment;

/// Alternate spellings seen in JSON-emitting tools, mapped to canonical keys.
const SYNONYMS: &[(&str, &str)] = &[
    ("modelHash", "model_hash"),
    ("scheduleType", "schedule_type"),
    ("cfgScale", "cfg_scale"),
    ("clipSkip", "clip_skip"),
    ("denoisingStrength", "denoising_strength"),
];

/// Generation parameters recovered from a parameter block or a JSON object.
///
/// Every named field is optional. Keys that are not recognized, and values
/// that fail numeric coercion, land in `other_params` as raw strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hires_upscale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hires_steps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hires_upscaler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vae: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vae_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ti_hashes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lora_hashes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addnet_enabled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wildcard_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_prompts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adetailer_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controlnet_model: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub other_params: BTreeMap<String, String>,
}

impl ParsedParameters {
    /// Parse a full WebUI parameter text (prompt, negative prompt and
    /// trailing parameter block). Only the parameter block contributes.
    pub fn from_parameters_text(text: &str) -> Self {
        parse_fields(&segment::segment(text).params)
    }

    /// Read back a JSON object such as the one produced by [`Self::to_json`]
    /// or emitted by JSON-based tools. Returns `None` for anything that is
    /// not a JSON object.
    pub fn from_json_str(text: &str) -> Option<Self> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Parameter text is not JSON");
                return None;
            }
        };
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut params = Self::default();

        for (key, value) in obj {
            if key == "other_params" {
                if let Some(extra) = value.as_object() {
                    for (k, v) in extra {
                        params.other_params.insert(k.clone(), json_scalar_to_string(v));
                    }
                }
                continue;
            }
            if value.is_null() {
                continue;
            }
            params.set_single_parameter(key, &json_scalar_to_string(value));
        }

        Some(params)
    }

    /// Assign one accumulated `key: value` pair.
    ///
    /// A value containing commas carries a primary value for `key` followed
    /// by chained sub-fields, e.g. `20, Sampler: Euler a, CFG scale: 7`.
    pub fn set_parameter(&mut self, key: &str, value: &str) {
        if !value.contains(',') {
            self.set_single_parameter(key, value);
            return;
        }

        let mut parts = value.split(',').map(str::trim);
        if let Some(first) = parts.next() {
            self.set_single_parameter(key, first);
        }
        for part in parts {
            if let Some((sub_key, sub_value)) = part.split_once(':') {
                self.set_single_parameter(sub_key, sub_value.trim());
            }
        }
    }

    /// Assign a single field with no comma chaining.
    pub fn set_single_parameter(&mut self, key: &str, value: &str) {
        let key = canonical_key(key);
        let value = value.trim();

        let stored = match key.as_str() {
            "steps" => store(&mut self.steps, parse_int(value)),
            "seed" => store(&mut self.seed, parse_int(value)),
            "clip_skip" => store(&mut self.clip_skip, parse_int(value)),
            "hires_steps" => store(&mut self.hires_steps, parse_int(value)),
            "width" => store(&mut self.width, parse_int(value)),
            "height" => store(&mut self.height, parse_int(value)),
            "cfg_scale" => store(&mut self.cfg_scale, parse_float(value)),
            "denoising_strength" => store(&mut self.denoising_strength, parse_float(value)),
            "hires_upscale" => store(&mut self.hires_upscale, parse_float(value)),
            "size" => {
                self.assign_size(value);
                true
            }
            "sampler" => store(&mut self.sampler, Some(value.to_string())),
            "schedule_type" => store(&mut self.schedule_type, Some(value.to_string())),
            "model_hash" => store(&mut self.model_hash, Some(value.to_string())),
            "model" => store(&mut self.model, Some(value.to_string())),
            "ensd" => store(&mut self.ensd, Some(value.to_string())),
            "version" => store(&mut self.version, Some(value.to_string())),
            "hires_upscaler" => store(&mut self.hires_upscaler, Some(value.to_string())),
            "vae" => store(&mut self.vae, Some(value.to_string())),
            "vae_hash" => store(&mut self.vae_hash, Some(value.to_string())),
            "ti_hashes" => store(&mut self.ti_hashes, Some(value.to_string())),
            "lora_hashes" => store(&mut self.lora_hashes, Some(value.to_string())),
            "addnet_enabled" => store(&mut self.addnet_enabled, Some(value.to_string())),
            "wildcard_prompt" => store(&mut self.wildcard_prompt, Some(value.to_string())),
            "dynamic_prompts" => store(&mut self.dynamic_prompts, Some(value.to_string())),
            "adetailer_model" => store(&mut self.adetailer_model, Some(value.to_string())),
            "controlnet_model" => store(&mut self.controlnet_model, Some(value.to_string())),
            _ => {
                self.other_params.insert(key.clone(), value.to_string());
                true
            }
        };

        if !stored {
            debug!(key = %key, value = %value, "Numeric coercion failed, keeping raw value");
            self.other_params.insert(key, value.to_string());
        }
    }

    /// `WxH` populates width and height; the original string is kept either way.
    fn assign_size(&mut self, value: &str) {
        self.size = Some(value.to_string());

        let mut dims = value.split('x');
        let (Some(w), Some(h), None) = (dims.next(), dims.next(), dims.next()) else {
            return;
        };
        match (w.trim().parse::<i64>(), h.trim().parse::<i64>()) {
            (Ok(w), Ok(h)) => {
                self.width = Some(w);
                self.height = Some(h);
            }
            _ => debug!(size = %value, "Size is not WxH"),
        }
    }

    /// Serialize every present field as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Parse a parameter block into a record.
///
/// A line starts a new field when it contains a colon and does not begin
/// with whitespace; any other non-empty line continues the current value.
pub fn parse_fields(block: &str) -> ParsedParameters {
    let mut params = ParsedParameters::default();
    let mut current: Option<(String, String)> = None;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let starts_field = line.contains(':') && !line.starts_with(char::is_whitespace);
        if starts_field {
            if let Some((key, value)) = current.take() {
                params.set_parameter(&key, value.trim());
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                current = Some((key.trim().to_string(), value.trim().to_string()));
            }
        } else if let Some((_, value)) = current.as_mut() {
            value.push(' ');
            value.push_str(trimmed);
        }
    }

    if let Some((key, value)) = current {
        params.set_parameter(&key, value.trim());
    }

    params
}

/// Resolve synonyms on the raw key, otherwise lowercase and replace spaces
/// and hyphens with underscores.
fn canonical_key(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((_, canonical)) = SYNONYMS.iter().find(|(alias, _)| *alias == raw) {
        return (*canonical).to_string();
    }
    raw.to_lowercase().replace([' ', '-'], "_")
}

fn store<T>(slot: &mut Option<T>, parsed: Option<T>) -> bool {
    match parsed {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

/// Integers also accept float-looking strings (`"7.0"`, `"1e3"`), truncated.
/// A value outside the range of `T` is a coercion failure, never clamped.
fn parse_int<T>(value: &str) -> Option<T>
where
    T: FromStr + TryFrom<i128>,
{
    value.parse::<T>().ok().or_else(|| {
        let f = value.parse::<f64>().ok().filter(|f| f.is_finite())?;
        // saturates far outside both i64 and u64, so try_from still rejects it
        T::try_from(f.trunc() as i128).ok()
    })
}

fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub(crate) fn json_scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields_chained_line() {
        let params = parse_fields(
            "Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 12345, Size: 512x768",
        );
        assert_eq!(params.steps, Some(20));
        assert_eq!(params.sampler.as_deref(), Some("Euler a"));
        assert_eq!(params.cfg_scale, Some(7.0));
        assert_eq!(params.seed, Some(12345));
        assert_eq!(params.size.as_deref(), Some("512x768"));
        assert_eq!(params.width, Some(512));
        assert_eq!(params.height, Some(768));
        assert!(params.other_params.is_empty());
    }

    #[test]
    fn test_steps_value_carries_sampler() {
        let mut params = ParsedParameters::default();
        params.set_parameter("Steps", "20, Sampler: Euler a");
        assert_eq!(params.steps, Some(20));
        assert_eq!(params.sampler.as_deref(), Some("Euler a"));
    }

    #[test]
    fn test_synonym_resolves_before_normalization() {
        let params = parse_fields("cfgScale: 7.5");
        assert_eq!(params.cfg_scale, Some(7.5));
        assert!(!params.other_params.contains_key("cfgScale"));
        assert!(!params.other_params.contains_key("cfgscale"));
    }

    #[test]
    fn test_unknown_key_goes_to_other_params() {
        let params = parse_fields("wildcard_seed: 99");
        assert_eq!(
            params.other_params,
            BTreeMap::from([("wildcard_seed".to_string(), "99".to_string())])
        );
        assert_eq!(params.seed, None);
    }

    #[test]
    fn test_empty_block_gives_empty_record() {
        assert_eq!(parse_fields(""), ParsedParameters::default());
    }

    #[test]
    fn test_malformed_number_keeps_raw_string() {
        let params = parse_fields("Steps: lots\nSeed: 42");
        assert_eq!(params.steps, None);
        assert_eq!(params.other_params.get("steps").map(String::as_str), Some("lots"));
        assert_eq!(params.seed, Some(42));
    }

    #[test]
    fn test_float_looking_integers_truncate() {
        let params = parse_fields("Seed: 42.0\nClip skip: 2");
        assert_eq!(params.seed, Some(42));
        assert_eq!(params.clip_skip, Some(2));
    }

    #[test]
    fn test_out_of_range_integer_keeps_raw_string() {
        let params = parse_fields("Seed: 99999999999999999999\nSteps: 1e30\nClip skip: 9223372036854775808");
        assert_eq!(params.seed, None);
        assert_eq!(params.steps, None);
        assert_eq!(params.clip_skip, None);
        assert_eq!(
            params.other_params.get("seed").map(String::as_str),
            Some("99999999999999999999")
        );
        assert_eq!(params.other_params.get("steps").map(String::as_str), Some("1e30"));
        assert_eq!(
            params.other_params.get("clip_skip").map(String::as_str),
            Some("9223372036854775808")
        );
    }

    #[test]
    fn test_seed_covers_full_unsigned_range() {
        let params = parse_fields("Seed: 18446744073709551615");
        assert_eq!(params.seed, Some(u64::MAX));
        assert!(params.other_params.is_empty());

        let params = parse_fields("Seed: -1");
        assert_eq!(params.seed, None);
        assert_eq!(params.other_params.get("seed").map(String::as_str), Some("-1"));
    }

    #[test]
    fn test_multi_line_value_is_space_joined() {
        let params = parse_fields("Wildcard prompt: a cat\n  on a mat\nVAE: kl-f8");
        assert_eq!(params.wildcard_prompt.as_deref(), Some("a cat on a mat"));
        assert_eq!(params.vae.as_deref(), Some("kl-f8"));
    }

    #[test]
    fn test_hyphenated_keys_normalize() {
        let params = parse_fields("Hires-upscale: 1.5\nDenoising strength: 0.4");
        assert_eq!(params.hires_upscale, Some(1.5));
        assert_eq!(params.denoising_strength, Some(0.4));
    }

    #[test]
    fn test_bad_size_keeps_raw_only() {
        let params = parse_fields("Size: huge");
        assert_eq!(params.size.as_deref(), Some("huge"));
        assert_eq!(params.width, None);
        assert_eq!(params.height, None);

        let params = parse_fields("Size: 512xabc");
        assert_eq!(params.size.as_deref(), Some("512xabc"));
        assert_eq!(params.width, None);
    }

    #[test]
    fn test_json_round_trip() {
        let params = parse_fields(
            "Steps: 30, Sampler: DPM++ 2M, CFG scale: 6.5, Seed: 3141592653, Size: 832x1216, Model hash: 31e35c80fc, Model: sdxl_base\nDenoising strength: 0.35\nFoo bar: baz",
        );
        let json = params.to_json().unwrap();
        let back = ParsedParameters::from_json_str(&json).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.other_params.get("foo_bar").map(String::as_str), Some("baz"));
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let block = "Steps: 20, Sampler: Euler a\nLora hashes: detail: 1a2b";
        assert_eq!(parse_fields(block), parse_fields(block));
    }

    #[test]
    fn test_from_json_applies_synonyms() {
        let params = ParsedParameters::from_json_str(
            r#"{"modelHash": "abc123", "clipSkip": 2, "denoisingStrength": 0.5, "resources": [1]}"#,
        )
        .unwrap();
        assert_eq!(params.model_hash.as_deref(), Some("abc123"));
        assert_eq!(params.clip_skip, Some(2));
        assert_eq!(params.denoising_strength, Some(0.5));
        assert_eq!(params.other_params.get("resources").map(String::as_str), Some("[1]"));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(ParsedParameters::from_json_str("[1, 2]").is_none());
        assert!(ParsedParameters::from_json_str("Steps: 20").is_none());
    }
}
