use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::warn;

use crate::storage::{ConfigMap, ConfigStore, TypeMap, ValueType};

pub const CONFIG_FILE: &str = "env_config.json";
pub const TYPES_FILE: &str = "config_types.json";

/// File-based configuration store: values in `env_config.json`, declared
/// types in `config_types.json`, both under one base directory.
pub struct JsonConfigStore {
    base_dir: PathBuf,
    lock: RwLock<()>,
}

impl JsonConfigStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE)
    }

    pub fn types_path(&self) -> PathBuf {
        self.base_dir.join(TYPES_FILE)
    }

    async fn read_types(&self) -> Result<TypeMap> {
        let raw: BTreeMap<String, String> = read_json_or_default(&self.types_path()).await?;
        let mut types = TypeMap::new();
        for (key, name) in raw {
            match name.parse::<ValueType>() {
                Ok(ty) => {
                    types.insert(key, ty);
                }
                Err(e) => warn!(key = %key, error = %e, "Ignoring unknown config type"),
            }
        }
        Ok(types)
    }
}

/// Missing file yields the default; a malformed file is logged and yields
/// the default as well.
async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(T::default());
    }
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    match serde_json::from_str(&data) {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed config file, treating as empty");
            Ok(T::default())
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("json.tmp");

    let data = serde_json::to_string_pretty(value)?;
    tokio::fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("Failed to write config file: {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path).await?;

    Ok(())
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<ConfigMap> {
        let _lock = self.lock.read().await;
        read_json_or_default(&self.config_path()).await
    }

    async fn save(&self, values: &ConfigMap) -> Result<()> {
        let _lock = self.lock.write().await;
        write_json(&self.config_path(), values).await
    }

    async fn load_types(&self) -> Result<TypeMap> {
        let _lock = self.lock.read().await;
        self.read_types().await
    }

    async fn set_type(&self, key: &str, ty: ValueType) -> Result<()> {
        let _lock = self.lock.write().await;
        let mut types = self.read_types().await?;
        types.insert(key.to_string(), ty);
        write_json(&self.types_path(), &types).await
    }

    async fn delete_type(&self, key: &str) -> Result<()> {
        let _lock = self.lock.write().await;
        let mut types = self.read_types().await?;
        if types.remove(key).is_some() {
            write_json(&self.types_path(), &types).await?;
        }
        Ok(())
    }
}
