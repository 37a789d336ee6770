//! Prompt and generation-parameter extraction.
//!
//! An image's embedded fields are read by [`source`], classified by
//! [`resolver`], and turned into the fixed [`ExtractionOutput`] by
//! [`assemble`]. WebUI parameter text goes through [`segment`] and
//! [`params`]; JSON-bearing formats through [`envelope`].

pub mod assemble;
pub mod envelope;
pub mod params;
pub mod resolver;
pub mod segment;
pub mod source;
pub mod summary;

use std::path::Path;

use thiserror::Error;
use tracing::info_span;

pub use assemble::{ExtractionOutput, OUTPUT_NAMES, assemble_text};
pub use params::ParsedParameters;
pub use resolver::{ResolvedPayload, resolve};
pub use source::{ImageHandle, MetaValue, RawMetadata};
pub use summary::{ParamSummary, parse_summary};

/// Failures that prevent reading an image at all. Everything past this
/// point degrades to empty or partial output instead of failing.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to open image {path}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported image format: {path}")]
    UnsupportedFormat { path: String },

    #[error("failed to decode image {path}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Read `path` and extract prompts and parameters from its metadata.
pub fn extract_file(path: &Path) -> Result<ExtractionOutput, MetadataError> {
    let span = info_span!("extract", path = %path.display());
    let _enter = span.enter();

    let (image, raw) = source::read_image(path)?;
    let payload = resolve(&raw);
    Ok(assemble::assemble(Some(image), &raw, payload))
}
