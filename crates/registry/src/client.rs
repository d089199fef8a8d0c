use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use crate::manifest::Manifest;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("manifest not found for project {0}")]
    NotFound(String),
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("registry request timed out: {0}")]
    Timeout(String),
    #[error("invalid manifest payload: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, project_id: &str) -> Result<Manifest, RegistryError>;
    async fn list(&self) -> Result<Vec<Manifest>, RegistryError>;
}

#[derive(Clone, Debug)]
pub struct RegistryClientConfig {
    pub base_url: String,
    pub client_secret: String,
    pub timeout_ms: u64,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            client_secret: String::new(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone)]
pub struct HttpManifestRegistry {
    client: reqwest::Client,
    config: RegistryClientConfig,
}

impl HttpManifestRegistry {
    pub fn new(config: RegistryClientConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    fn manifest_url(&self, project_id: &str) -> String {
        format!(
            "{}/manifests/{}?resolve_env=true",
            self.config.base_url.trim_end_matches('/'),
            project_id
        )
    }

    fn list_url(&self) -> String {
        format!("{}/manifests", self.config.base_url.trim_end_matches('/'))
    }

    async fn get_json(&self, url: &str) -> Result<(u16, Value), RegistryError> {
        let mut request = self.client.get(url);
        if !self.config.client_secret.is_empty() {
            request = request.header("X-DSPAI-Client-Secret", &self.config.client_secret);
        }
        let response = request.send().await.map_err(classify_error)?;
        let status = response.status().as_u16();
        let body = response
            .json::<Value>()
            .await
            .map_err(|err| RegistryError::Decode(err.to_string()))?;
        Ok((status, body))
    }
}

fn classify_error(err: reqwest::Error) -> RegistryError {
    if err.is_timeout() {
        RegistryError::Timeout(err.to_string())
    } else {
        RegistryError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestRegistry {
    async fn fetch(&self, project_id: &str) -> Result<Manifest, RegistryError> {
        let (status, body) = self.get_json(&self.manifest_url(project_id)).await?;
        if status == 404 {
            return Err(RegistryError::NotFound(project_id.to_string()));
        }
        if !(200..300).contains(&status) {
            return Err(RegistryError::Unavailable(format!(
                "registry returned status {status} for project {project_id}"
            )));
        }
        let payload = match body.get("manifest") {
            Some(inner) => inner.clone(),
            None => body,
        };
        serde_json::from_value(payload).map_err(|err| RegistryError::Decode(err.to_string()))
    }

    async fn list(&self) -> Result<Vec<Manifest>, RegistryError> {
        let (status, body) = self.get_json(&self.list_url()).await?;
        if !(200..300).contains(&status) {
            return Err(RegistryError::Unavailable(format!(
                "registry returned status {status} for manifest list"
            )));
        }
        let payload = match body.get("manifests") {
            Some(inner) => inner.clone(),
            None => body,
        };
        serde_json::from_value(payload).map_err(|err| RegistryError::Decode(err.to_string()))
    }
}

/// In-memory fetcher used by tests and local development.
#[derive(Default)]
pub struct StaticManifestFetcher {
    manifests: RwLock<HashMap<String, Manifest>>,
    fetch_count: AtomicU64,
}

impl StaticManifestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, manifest: Manifest) {
        self.manifests
            .write()
            .insert(manifest.project_id.clone(), manifest);
    }

    pub fn fetches(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestFetcher for StaticManifestFetcher {
    async fn fetch(&self, project_id: &str) -> Result<Manifest, RegistryError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.manifests
            .read()
            .get(project_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(project_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Manifest>, RegistryError> {
        let mut manifests: Vec<Manifest> = self.manifests.read().values().cloned().collect();
        manifests.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(manifests)
    }
}
