use std::collections::HashMap;
use std::path::PathBuf;

/// Upstream values the host hands to a node, keyed by name.
pub type Context = HashMap<String, serde_json::Value>;

/// Output returned by a node execution, keyed by the node's output names.
pub type NodeOutput = HashMap<String, serde_json::Value>;

/// Directories the host exposes to the nodes.
#[derive(Debug, Clone)]
pub struct HostPaths {
    /// Root of the host installation; holds `env_config.json`,
    /// `config_types.json` and the `prompts/` directory.
    pub base_dir: PathBuf,
    /// Directory that relative image names are resolved against.
    pub input_dir: PathBuf,
    /// Directory scanned by `prompt_file_select`.
    pub prompts_dir: PathBuf,
}

impl HostPaths {
    /// Lay out the default directories under a single base directory.
    pub fn under(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            input_dir: base_dir.join("input"),
            prompts_dir: base_dir.join("prompts"),
            base_dir,
        }
    }
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::under(".")
    }
}
