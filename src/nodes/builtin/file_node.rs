use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::host::types::{Context, NodeOutput};
use crate::nodes::Node;
use crate::nodes::input::str_field;

/// Counts files under a directory, overall and for one extension.
pub struct FileCountNode;

#[async_trait]
impl Node for FileCountNode {
    fn node_type(&self) -> &str {
        "file_count"
    }

    fn description(&self) -> &str {
        "Count files in a directory tree by extension"
    }

    fn outputs(&self) -> &[&'static str] {
        &["file_count", "available_extensions", "selected_files"]
    }

    async fn execute(&self, config: &serde_json::Value, _ctx: Context) -> Result<NodeOutput> {
        let directory = str_field(config, "directory_path").unwrap_or("").trim();
        let extension = str_field(config, "file_extension").unwrap_or("");

        let (count, extensions, selected) = if directory.is_empty() {
            warn!("file_count: directory path is empty");
            (0, Vec::new(), Vec::new())
        } else if !tokio::fs::metadata(directory)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            warn!(path = %directory, "file_count: not a directory");
            (0, Vec::new(), Vec::new())
        } else {
            let root = std::path::absolute(directory)?;
            let files = list_files(root).await?;
            let (count, extensions, selected) = count_by_extension(&files, extension);
            info!(path = %directory, count, "Counted files");
            (count, extensions, selected)
        };

        let mut output = NodeOutput::new();
        output.insert("file_count".to_string(), Value::from(count));
        output.insert(
            "available_extensions".to_string(),
            Value::String(serde_json::to_string(&extensions)?),
        );
        output.insert(
            "selected_files".to_string(),
            Value::String(serde_json::to_string(&selected)?),
        );
        Ok(output)
    }
}

/// Lower-cased extension without the dot; empty when there is none.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Count `files` matching `wanted` (any extension when blank). Extensions
/// are listed most frequent first, ties by name.
fn count_by_extension(files: &[PathBuf], wanted: &str) -> (usize, Vec<String>, Vec<String>) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for file in files {
        let ext = extension_of(file);
        if !ext.is_empty() {
            *counts.entry(ext).or_default() += 1;
        }
    }
    let mut extensions: Vec<(String, usize)> = counts.into_iter().collect();
    extensions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let extensions = extensions.into_iter().map(|(ext, _)| ext).collect();

    let wanted = wanted.trim().trim_start_matches('.').to_lowercase();
    let selected: Vec<String> = files
        .iter()
        .filter(|f| wanted.is_empty() || extension_of(f) == wanted)
        .map(|f| f.to_string_lossy().to_string())
        .collect();

    (selected.len(), extensions, selected)
}

/// Recursively list regular files, sorted by path.
fn list_files(
    root: PathBuf,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<PathBuf>>> + Send>> {
    Box::pin(async move {
        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                files.extend(list_files(entry.path()).await?);
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    })
}

/// Returns an existing folder as an absolute path, or the base directory.
pub struct FolderSelectNode {
    pub base_dir: PathBuf,
}

#[async_trait]
impl Node for FolderSelectNode {
    fn node_type(&self) -> &str {
        "folder_select"
    }

    fn description(&self) -> &str {
        "Return a folder as an absolute path, falling back to the base directory"
    }

    fn outputs(&self) -> &[&'static str] {
        &["folder_path"]
    }

    async fn execute(&self, config: &serde_json::Value, _ctx: Context) -> Result<NodeOutput> {
        let requested = str_field(config, "folder_path").unwrap_or("").trim();

        let is_dir = !requested.is_empty()
            && tokio::fs::metadata(requested)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
        let folder = if is_dir {
            std::path::absolute(requested)?
        } else {
            if !requested.is_empty() {
                warn!(path = %requested, "folder_select: not a directory, using base directory");
            }
            std::path::absolute(&self.base_dir)?
        };

        let mut output = NodeOutput::new();
        output.insert(
            "folder_path".to_string(),
            Value::String(folder.to_string_lossy().to_string()),
        );
        Ok(output)
    }
}

/// Reads `<prompts_dir>/<filename>.txt`.
pub struct PromptFileSelectNode {
    pub prompts_dir: PathBuf,
}

impl PromptFileSelectNode {
    /// Names (without `.txt`) of the prompt files, sorted. Creates the
    /// prompts directory when it does not exist.
    pub async fn available(&self) -> Result<Vec<String>> {
        tokio::fs::create_dir_all(&self.prompts_dir).await?;

        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.prompts_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("txt")
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl Node for PromptFileSelectNode {
    fn node_type(&self) -> &str {
        "prompt_file_select"
    }

    fn description(&self) -> &str {
        "Load a prompt text file from the prompts directory"
    }

    fn outputs(&self) -> &[&'static str] {
        &["text"]
    }

    async fn execute(&self, config: &serde_json::Value, _ctx: Context) -> Result<NodeOutput> {
        let filename = str_field(config, "filename")
            .ok_or_else(|| anyhow::anyhow!("prompt_file_select requires 'filename' parameter"))?;

        let path = self.prompts_dir.join(format!("{filename}.txt"));
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "prompt_file_select: cannot read file");
                String::new()
            }
        };

        let mut output = NodeOutput::new();
        output.insert("text".to_string(), Value::String(text));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_by_extension() {
        let files = vec![
            PathBuf::from("/a/one.PNG"),
            PathBuf::from("/a/two.png"),
            PathBuf::from("/a/b/three.txt"),
            PathBuf::from("/a/README"),
        ];

        let (count, extensions, selected) = count_by_extension(&files, ".png");
        assert_eq!(count, 2);
        assert_eq!(extensions, vec!["png", "txt"]);
        assert_eq!(selected, vec!["/a/one.PNG", "/a/two.png"]);

        let (count, _, selected) = count_by_extension(&files, " ");
        assert_eq!(count, 4);
        assert_eq!(selected.len(), 4);
    }
}
