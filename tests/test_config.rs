use std::io::Write;
use std::path::{Path, PathBuf};

use promptmeta::cli::PromptMetaConfig;
use tempfile::NamedTempFile;

#[test]
fn load_valid_config_all_fields() {
    let yaml = r#"
base_dir: "/srv/comfy"
input_dir: "/srv/comfy/uploads"
prompts_dir: "/srv/prompts"
"#;

    let mut f = NamedTempFile::new().unwrap();
    f.write_all(yaml.as_bytes()).unwrap();

    let cfg = PromptMetaConfig::load(Some(f.path())).unwrap();

    assert_eq!(cfg.base_dir.as_deref(), Some(Path::new("/srv/comfy")));
    assert_eq!(cfg.input_dir.as_deref(), Some(Path::new("/srv/comfy/uploads")));
    assert_eq!(cfg.prompts_dir.as_deref(), Some(Path::new("/srv/prompts")));
}

#[test]
fn load_partial_config() {
    let yaml = r#"
base_dir: "data"
"#;

    let mut f = NamedTempFile::new().unwrap();
    f.write_all(yaml.as_bytes()).unwrap();

    let cfg = PromptMetaConfig::load(Some(f.path())).unwrap();

    assert_eq!(cfg.base_dir.as_deref(), Some(Path::new("data")));
    assert!(cfg.input_dir.is_none());
    assert!(cfg.prompts_dir.is_none());
}

#[test]
fn missing_explicit_path_returns_error() {
    let result = PromptMetaConfig::load(Some(Path::new("/nonexistent/promptmeta.yaml")));
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("Config file not found")
    );
}

#[test]
fn invalid_yaml_returns_error() {
    let yaml = "base_dir: [this is not valid yaml";

    let mut f = NamedTempFile::new().unwrap();
    f.write_all(yaml.as_bytes()).unwrap();

    let result = PromptMetaConfig::load(Some(f.path()));
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file")
    );
}

#[test]
fn unknown_keys_are_ignored() {
    let yaml = r#"
base_dir: "data"
port: 4000
"#;

    let mut f = NamedTempFile::new().unwrap();
    f.write_all(yaml.as_bytes()).unwrap();

    let cfg = PromptMetaConfig::load(Some(f.path())).unwrap();
    assert_eq!(cfg.base_dir.as_deref(), Some(Path::new("data")));
}

#[test]
fn host_paths_default_under_base_dir() {
    let cfg = PromptMetaConfig {
        base_dir: Some(PathBuf::from("/srv/comfy")),
        ..Default::default()
    };

    let paths = cfg.host_paths(None, None);
    assert_eq!(paths.base_dir, PathBuf::from("/srv/comfy"));
    assert_eq!(paths.input_dir, PathBuf::from("/srv/comfy/input"));
    assert_eq!(paths.prompts_dir, PathBuf::from("/srv/comfy/prompts"));
}

#[test]
fn host_paths_overrides_win() {
    let cfg = PromptMetaConfig {
        base_dir: Some(PathBuf::from("/srv/comfy")),
        input_dir: Some(PathBuf::from("/srv/comfy/uploads")),
        prompts_dir: Some(PathBuf::from("/srv/prompts")),
    };

    let paths = cfg.host_paths(Some(PathBuf::from("/opt/base")), Some(PathBuf::from("/tmp/in")));
    assert_eq!(paths.base_dir, PathBuf::from("/opt/base"));
    assert_eq!(paths.input_dir, PathBuf::from("/tmp/in"));
    assert_eq!(paths.prompts_dir, PathBuf::from("/srv/prompts"));
}
