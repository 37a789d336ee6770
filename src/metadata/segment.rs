//! Split WebUI-style parameter text into prompt, negative prompt and the
//! trailing parameter block.
//!
//! ```text
//! cat, masterpiece
//! Negative prompt: blurry, low quality
//! Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 12345, Size: 512x768
//! ```
//!
//! The parameter block is found by a line-start boundary: first against the
//! list of parameter keywords WebUI writes, then against any `Word:` at the
//! start of a line. Boundaries are only ever matched right after a newline so
//! a colon inside prompt text does not end the prompt.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

pub const NEGATIVE_PROMPT_MARKER: &str = "Negative prompt:";

static PARAM_KEYWORD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\n(?:Steps|Sampler|CFG scale|Seed|Size|Model hash|Model|Denoising strength|Clip skip|ENSD|Version|Hires upscale|Hires steps|Hires upscaler|VAE|VAE hash|ADetailer|ControlNet|TI hashes|Lora hashes|AddNet|Wildcard prompt|Dynamic prompts):",
    )
    .expect("parameter keyword pattern is valid")
});

static GENERIC_PARAM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n[A-Za-z][A-Za-z0-9\s]*:(?:\s|$)").expect("generic parameter pattern is valid")
});

/// The three parts of a WebUI parameter text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub positive: String,
    pub negative: String,
    /// Parameter block starting at the first parameter line, trimmed.
    pub params: String,
}

/// Split `text` into prompt, negative prompt and parameter block.
pub fn segment(text: &str) -> Segments {
    if text.trim().is_empty() {
        return Segments::default();
    }

    match text.find(NEGATIVE_PROMPT_MARKER) {
        Some(idx) => {
            let positive = text[..idx].trim().to_string();
            let section = &text[idx + NEGATIVE_PROMPT_MARKER.len()..];
            let (negative, params) = split_at_params(section);
            Segments {
                positive,
                negative,
                params,
            }
        }
        None => {
            let (positive, params) = split_at_params(text);
            Segments {
                positive,
                negative: String::new(),
                params,
            }
        }
    }
}

/// Convenience wrapper returning only `(positive, negative)`.
pub fn prompt_pair(text: &str) -> (String, String) {
    let Segments {
        positive, negative, ..
    } = segment(text);
    (positive, negative)
}

/// Byte offset of the newline that precedes the parameter block, if any.
pub fn find_params_start(section: &str) -> Option<usize> {
    if let Some(m) = PARAM_KEYWORD_LINE.find(section) {
        return Some(m.start());
    }
    let m = GENERIC_PARAM_LINE.find(section)?;
    debug!(offset = m.start(), "No parameter keyword line, using generic key pattern");
    Some(m.start())
}

fn split_at_params(section: &str) -> (String, String) {
    match find_params_start(section) {
        Some(start) => (
            section[..start].trim().to_string(),
            section[start..].trim().to_string(),
        ),
        None => (section.trim().to_string(), String::new()),
    }
}
