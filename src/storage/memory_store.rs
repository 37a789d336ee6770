use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::storage::{ConfigMap, ConfigStore, TypeMap, ValueType};

/// In-memory configuration store.
/// Holds values only for the lifetime of the store instance.
#[derive(Default)]
pub struct MemoryConfigStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    values: ConfigMap,
    types: TypeMap,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing values and no declared types.
    pub fn with_values(values: ConfigMap) -> Self {
        Self {
            inner: Mutex::new(Inner {
                values,
                types: TypeMap::new(),
            }),
        }
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("config store lock poisoned"))
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<ConfigMap> {
        Ok(self.inner()?.values.clone())
    }

    async fn save(&self, values: &ConfigMap) -> Result<()> {
        self.inner()?.values = values.clone();
        Ok(())
    }

    async fn load_types(&self) -> Result<TypeMap> {
        Ok(self.inner()?.types.clone())
    }

    async fn set_type(&self, key: &str, ty: ValueType) -> Result<()> {
        self.inner()?.types.insert(key.to_string(), ty);
        Ok(())
    }

    async fn delete_type(&self, key: &str) -> Result<()> {
        self.inner()?.types.remove(key);
        Ok(())
    }
}
