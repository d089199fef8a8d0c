use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use modules::{Module, ModuleCatalog, ModuleConfig, ModuleStatus};
use registry::{Manifest, ModuleSpec};

use crate::FrontDoorError;

#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub max_size: usize,
    pub environment: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            environment: "dev".to_string(),
        }
    }
}

struct PoolEntry {
    module: Arc<dyn Module>,
    label: String,
    last_used: u64,
}

/// Bounded LRU pool of live module instances.
///
/// The table mutex is held across health checks and initialization, both of
/// which may await, so a key can never race into two live instances.
pub struct ModulePool {
    config: PoolConfig,
    catalog: Arc<ModuleCatalog>,
    entries: Mutex<HashMap<u64, PoolEntry>>,
    ticks: AtomicU64,
}

impl ModulePool {
    pub fn new(catalog: Arc<ModuleCatalog>, config: PoolConfig) -> Self {
        Self {
            config,
            catalog,
            entries: Mutex::new(HashMap::new()),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn module_key(project_id: &str, module_name: &str, environment: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        project_id.hash(&mut hasher);
        module_name.hash(&mut hasher);
        environment.hash(&mut hasher);
        hasher.finish()
    }

    fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::SeqCst)
    }

    fn environment<'a>(&'a self, manifest: &'a Manifest) -> &'a str {
        if manifest.environment.is_empty() {
            &self.config.environment
        } else {
            &manifest.environment
        }
    }

    pub async fn get_or_create(
        &self,
        manifest: &Manifest,
        spec: &ModuleSpec,
        runtime_references: &HashMap<String, Value>,
    ) -> Result<Arc<dyn Module>, FrontDoorError> {
        let environment = self.environment(manifest).to_string();
        let key = Self::module_key(&manifest.project_id, &spec.name, &environment);

        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&key) {
            if entry.module.health_check().await == ModuleStatus::Ready {
                entry.last_used = self.tick();
                return Ok(entry.module.clone());
            }
            let stale = entries.remove(&key);
            if let Some(stale) = stale {
                tracing::warn!(module = %stale.label, "replacing unhealthy module instance");
                stale.module.shutdown().await;
            }
        }

        let tag = spec.kind.tag();
        let module = self.catalog.create(tag).ok_or_else(|| {
            FrontDoorError::ModuleInitializationFailed(format!(
                "no implementation registered for module type {tag}"
            ))
        })?;

        let config = ModuleConfig {
            module_id: format!("{key:016x}"),
            module_type: tag.to_string(),
            version: manifest
                .manifest_version
                .clone()
                .unwrap_or_else(|| "1.0".to_string()),
            environment: environment.clone(),
            backend_endpoints: manifest.environment_endpoints(&environment),
            runtime_references: runtime_references.clone(),
            metadata: manifest.metadata.clone(),
        };
        module.initialize(config).await?;

        if entries.len() >= self.config.max_size.max(1) {
            let evict_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| *key);
            if let Some(evict_key) = evict_key {
                if let Some(evicted) = entries.remove(&evict_key) {
                    tracing::info!(module = %evicted.label, "evicting least recently used module");
                    evicted.module.shutdown().await;
                }
            }
        }

        let label = format!("{}:{}:{}", manifest.project_id, spec.name, environment);
        tracing::info!(module = %label, "created module instance");
        entries.insert(
            key,
            PoolEntry {
                module: module.clone(),
                label,
                last_used: self.tick(),
            },
        );
        Ok(module)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn loaded(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        let mut labels: Vec<String> = entries.values().map(|entry| entry.label.clone()).collect();
        labels.sort();
        labels
    }

    pub async fn shutdown_all(&self) {
        let mut entries = self.entries.lock().await;
        for (_, entry) in entries.drain() {
            entry.module.shutdown().await;
        }
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }
}
