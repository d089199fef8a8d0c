use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;

use crate::manifest::Manifest;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("cache connection failed: {0}")]
    Connect(String),
}

/// Cache lookups never fail the request path. A backend error is a miss.
#[async_trait]
pub trait ManifestCache: Send + Sync {
    async fn get(&self, project_id: &str) -> Option<Manifest>;
    async fn put(&self, manifest: &Manifest, ttl: Duration);
    async fn invalidate(&self, project_id: &str);
}

pub struct NoopManifestCache;

#[async_trait]
impl ManifestCache for NoopManifestCache {
    async fn get(&self, _project_id: &str) -> Option<Manifest> {
        None
    }

    async fn put(&self, _manifest: &Manifest, _ttl: Duration) {}

    async fn invalidate(&self, _project_id: &str) {}
}

#[derive(Default)]
pub struct InMemoryManifestCache {
    entries: Mutex<HashMap<String, (Manifest, Instant)>>,
}

impl InMemoryManifestCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ManifestCache for InMemoryManifestCache {
    async fn get(&self, project_id: &str) -> Option<Manifest> {
        let mut entries = self.entries.lock();
        match entries.get(project_id) {
            Some((manifest, deadline)) if *deadline > Instant::now() => Some(manifest.clone()),
            Some(_) => {
                entries.remove(project_id);
                None
            }
            None => None,
        }
    }

    async fn put(&self, manifest: &Manifest, ttl: Duration) {
        self.entries.lock().insert(
            manifest.project_id.clone(),
            (manifest.clone(), Instant::now() + ttl),
        );
    }

    async fn invalidate(&self, project_id: &str) {
        self.entries.lock().remove(project_id);
    }
}

#[derive(Clone)]
pub struct RedisManifestCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisManifestCache {
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|err| CacheError::InvalidEndpoint(err.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|err| CacheError::Connect(err.to_string()))?;
        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    fn manifest_key(&self, project_id: &str) -> String {
        format!("{}:manifest:{}", self.key_prefix, project_id)
    }
}

#[async_trait]
impl ManifestCache for RedisManifestCache {
    async fn get(&self, project_id: &str) -> Option<Manifest> {
        let mut conn = self.conn.clone();
        let key = self.manifest_key(project_id);
        let payload: Option<String> = match conn.get(&key).await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(project_id, error = %err, "manifest cache read failed");
                return None;
            }
        };
        payload.and_then(|raw| serde_json::from_str(&raw).ok())
    }

    async fn put(&self, manifest: &Manifest, ttl: Duration) {
        let Ok(payload) = serde_json::to_string(manifest) else {
            return;
        };
        let mut conn = self.conn.clone();
        let key = self.manifest_key(&manifest.project_id);
        let ttl_seconds = ttl.as_secs().max(1);
        if let Err(err) = conn.set_ex::<_, _, ()>(&key, payload, ttl_seconds).await {
            tracing::warn!(project_id = %manifest.project_id, error = %err, "manifest cache write failed");
        }
    }

    async fn invalidate(&self, project_id: &str) {
        let mut conn = self.conn.clone();
        let key = self.manifest_key(project_id);
        if let Err(err) = conn.del::<_, ()>(&key).await {
            tracing::warn!(project_id, error = %err, "manifest cache invalidate failed");
        }
    }
}
