pub mod config_node;
pub mod file_node;
pub mod image_metadata_node;
pub mod params_node;
pub mod selector_node;

use std::sync::Arc;

use crate::host::types::HostPaths;
use crate::nodes::NodeRegistry;
use crate::storage::ConfigStore;

/// Register all built-in nodes into the registry.
pub fn register_all(registry: &mut NodeRegistry, paths: &HostPaths, store: Arc<dyn ConfigStore>) {
    registry.register(Arc::new(image_metadata_node::ImageMetadataLoadNode {
        input_dir: paths.input_dir.clone(),
    }));
    registry.register(Arc::new(params_node::WebUiParamsParseNode));
    registry.register(Arc::new(params_node::MetadataParseNode));
    registry.register(Arc::new(config_node::ConfigReadNode {
        store: store.clone(),
    }));
    registry.register(Arc::new(config_node::ConfigManageNode {
        store: store.clone(),
    }));
    registry.register(Arc::new(config_node::ConfigKeyGroupNode { store }));
    registry.register(Arc::new(selector_node::SelectorOptionNode));
    registry.register(Arc::new(selector_node::CustomSelectorNode));
    registry.register(Arc::new(file_node::FileCountNode));
    registry.register(Arc::new(file_node::FolderSelectNode {
        base_dir: paths.base_dir.clone(),
    }));
    registry.register(Arc::new(file_node::PromptFileSelectNode {
        prompts_dir: paths.prompts_dir.clone(),
    }));
}
