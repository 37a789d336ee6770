use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::host::types::HostPaths;

pub const DEFAULT_CONFIG_FILE: &str = "promptmeta.yaml";

/// Configuration loaded from `promptmeta.yaml`.
/// All fields are optional; missing fields fall back to CLI/env/defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PromptMetaConfig {
    /// Holds `env_config.json`, `config_types.json` and `prompts/`.
    pub base_dir: Option<PathBuf>,
    /// Relative image names resolve here (default: `<base_dir>/input`).
    pub input_dir: Option<PathBuf>,
    /// Prompt text files (default: `<base_dir>/prompts`).
    pub prompts_dir: Option<PathBuf>,
}

impl PromptMetaConfig {
    /// Load configuration from a YAML file.
    ///
    /// - If `path` is `Some`, load that specific file (error if missing).
    /// - If `path` is `None`, auto-detect `promptmeta.yaml` in cwd; return defaults if absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path.to_path_buf()
            }
        };

        let contents = std::fs::read_to_string(&file_path)
            .with_context(|| format!("Failed to read config file: {}", file_path.display()))?;

        let config: PromptMetaConfig = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", file_path.display()))?;

        Ok(config)
    }

    /// Host directories, with explicit overrides taking precedence over the
    /// file.
    pub fn host_paths(&self, base_dir: Option<PathBuf>, input_dir: Option<PathBuf>) -> HostPaths {
        let base_dir = base_dir
            .or_else(|| self.base_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut paths = HostPaths::under(base_dir);
        if let Some(input_dir) = input_dir.or_else(|| self.input_dir.clone()) {
            paths.input_dir = input_dir;
        }
        if let Some(prompts_dir) = self.prompts_dir.clone() {
            paths.prompts_dir = prompts_dir;
        }
        paths
    }
}
