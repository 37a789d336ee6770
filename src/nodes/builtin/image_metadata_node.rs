use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tracing::info;

use crate::host::types::{Context, NodeOutput};
use crate::metadata::{self, OUTPUT_NAMES};
use crate::nodes::Node;
use crate::nodes::input::str_field;
use crate::storage::value_to_string;

/// Loads an image and extracts its prompts and generation parameters.
///
/// The image is named by `image` (relative to the input directory), by
/// `path`, or by the upstream value under `source_key`.
pub struct ImageMetadataLoadNode {
    pub input_dir: PathBuf,
}

impl ImageMetadataLoadNode {
    fn image_path(&self, config: &serde_json::Value, ctx: &Context) -> Result<PathBuf> {
        if let Some(path) = str_field(config, "path") {
            return Ok(PathBuf::from(path));
        }
        if let Some(name) = str_field(config, "image") {
            let name = Path::new(name);
            return Ok(if name.is_absolute() {
                name.to_path_buf()
            } else {
                self.input_dir.join(name)
            });
        }
        if let Some(source_key) = str_field(config, "source_key") {
            let val = ctx
                .get(source_key)
                .ok_or_else(|| anyhow::anyhow!("Key '{}' not found in context", source_key))?;
            return Ok(PathBuf::from(value_to_string(val)));
        }
        anyhow::bail!("image_metadata_load requires 'image', 'path' or 'source_key'");
    }
}

#[async_trait]
impl Node for ImageMetadataLoadNode {
    fn node_type(&self) -> &str {
        "image_metadata_load"
    }

    fn description(&self) -> &str {
        "Load an image and extract prompts and generation parameters from its metadata"
    }

    fn outputs(&self) -> &[&'static str] {
        &OUTPUT_NAMES
    }

    async fn execute(&self, config: &serde_json::Value, ctx: Context) -> Result<NodeOutput> {
        let path = self.image_path(config, &ctx)?;
        info!(path = %path.display(), "Extracting image metadata");

        let task_path = path.clone();
        let extraction = tokio::task::spawn_blocking(move || metadata::extract_file(&task_path))
            .await
            .context("image_metadata_load: extraction task failed")?
            .with_context(|| format!("image_metadata_load: cannot read {}", path.display()))?;

        Ok(extraction.into_node_output())
    }
}
