//! Reduce a parameter record to the handful of values downstream nodes wire
//! into a sampler.

use serde::Serialize;
use tracing::debug;

use super::params::ParsedParameters;

pub const EMPTY_INPUT_MESSAGE: &str = "ERROR: parameter text is empty";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamSummary {
    pub steps: i64,
    pub sampler: String,
    pub cfg_scale: f64,
    pub seed: u64,
    pub width: i64,
    pub height: i64,
    pub model: String,
    pub parsed_params_json: String,
}

/// Summarize either a `parsed_params` JSON object or raw WebUI parameter
/// text. Absent values default to zero or the empty string.
pub fn parse_summary(text: &str) -> ParamSummary {
    if text.trim().is_empty() {
        return ParamSummary {
            parsed_params_json: EMPTY_INPUT_MESSAGE.to_string(),
            ..Default::default()
        };
    }

    let params = match ParsedParameters::from_json_str(text) {
        Some(params) => params,
        None => {
            debug!("Summarizing as WebUI parameter text");
            ParsedParameters::from_parameters_text(text)
        }
    };

    let parsed_params_json = params
        .to_json()
        .unwrap_or_else(|e| format!("ERROR: failed to serialize parameters: {e}"));

    ParamSummary {
        steps: params.steps.unwrap_or(0),
        sampler: params.sampler.unwrap_or_default(),
        cfg_scale: params.cfg_scale.unwrap_or(0.0),
        seed: params.seed.unwrap_or(0),
        width: params.width.unwrap_or(0),
        height: params.height.unwrap_or(0),
        model: params.model.unwrap_or_default(),
        parsed_params_json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_json() {
        let summary = parse_summary(
            r#"{"steps": 30, "sampler": "DPM++ 2M", "cfgScale": 6.5, "seed": 42, "size": "832x1216", "model": "sdxl"}"#,
        );
        assert_eq!(summary.steps, 30);
        assert_eq!(summary.sampler, "DPM++ 2M");
        assert_eq!(summary.cfg_scale, 6.5);
        assert_eq!(summary.seed, 42);
        assert_eq!(summary.width, 832);
        assert_eq!(summary.height, 1216);
        assert_eq!(summary.model, "sdxl");
        assert!(summary.parsed_params_json.contains("\"steps\": 30"));
    }

    #[test]
    fn test_summary_from_webui_text() {
        let summary = parse_summary("a cat\nSteps: 12, Sampler: Euler, Seed: 3, Size: 64x32");
        assert_eq!(summary.steps, 12);
        assert_eq!(summary.sampler, "Euler");
        assert_eq!(summary.width, 64);
        assert_eq!(summary.height, 32);
        assert_eq!(summary.cfg_scale, 0.0);
        assert_eq!(summary.model, "");
    }

    #[test]
    fn test_summary_keeps_large_seed_exact() {
        let summary = parse_summary(r#"{"seed": 18446744073709551615, "steps": 20}"#);
        assert_eq!(summary.seed, u64::MAX);
        assert_eq!(summary.steps, 20);
    }

    #[test]
    fn test_summary_out_of_range_steps_stay_raw() {
        let summary = parse_summary(r#"{"steps": 99999999999999999999}"#);
        assert_eq!(summary.steps, 0);
        let parsed: serde_json::Value = serde_json::from_str(&summary.parsed_params_json).unwrap();
        assert!(parsed.get("steps").is_none());
        assert!(parsed["other_params"]["steps"].is_string());
    }

    #[test]
    fn test_summary_empty_input() {
        let summary = parse_summary("  ");
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.parsed_params_json, EMPTY_INPUT_MESSAGE);
    }
}
