use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::ResourceKind;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("gateway admin returned status {status}: {detail}")]
    Failed { status: u16, detail: String },
    #[error("gateway admin request timed out: {0}")]
    Timeout(String),
    #[error("gateway admin unreachable: {0}")]
    Transport(String),
    #[error("invalid gateway admin response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Create-or-replace a resource by id.
    async fn put(&self, kind: ResourceKind, id: &str, payload: Value) -> Result<Value, AdminError>;
    /// List all resources of a kind as `{key, value}` entries.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>, AdminError>;
    /// Delete a resource by id. Returns false when it did not exist.
    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<bool, AdminError>;

    async fn healthy(&self) -> bool {
        self.list(ResourceKind::Routes).await.is_ok()
    }
}

#[derive(Clone, Debug)]
pub struct AdminClientConfig {
    pub admin_url: String,
    pub admin_key: String,
    pub timeout_ms: u64,
}

impl Default for AdminClientConfig {
    fn default() -> Self {
        Self {
            admin_url: "http://localhost:9180".to_string(),
            admin_key: String::new(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Clone)]
pub struct HttpAdminClient {
    client: reqwest::Client,
    config: AdminClientConfig,
}

impl HttpAdminClient {
    pub fn new(config: AdminClientConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    fn resource_url(&self, kind: ResourceKind, id: Option<&str>) -> String {
        let base = self.config.admin_url.trim_end_matches('/');
        match id {
            Some(id) => format!("{}/admin/{}/{}", base, kind.path(), id),
            None => format!("{}/admin/{}", base, kind.path()),
        }
    }

    fn apply_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("X-API-KEY", &self.config.admin_key)
    }
}

fn classify_error(err: reqwest::Error) -> AdminError {
    if err.is_timeout() {
        AdminError::Timeout(err.to_string())
    } else {
        AdminError::Transport(err.to_string())
    }
}

#[async_trait]
impl AdminApi for HttpAdminClient {
    async fn put(&self, kind: ResourceKind, id: &str, payload: Value) -> Result<Value, AdminError> {
        let url = self.resource_url(kind, Some(id));
        let response = self
            .apply_headers(self.client.put(&url).json(&payload))
            .send()
            .await
            .map_err(classify_error)?;
        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdminError::Failed { status, detail });
        }
        response
            .json()
            .await
            .map_err(|err| AdminError::Decode(err.to_string()))
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>, AdminError> {
        let url = self.resource_url(kind, None);
        let response = self
            .apply_headers(self.client.get(&url))
            .send()
            .await
            .map_err(classify_error)?;
        let status = response.status().as_u16();
        if status != 200 {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdminError::Failed { status, detail });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| AdminError::Decode(err.to_string()))?;
        let entries = match body.get("list") {
            Some(Value::Array(entries)) => entries.clone(),
            _ => match body {
                Value::Array(entries) => entries,
                _ => Vec::new(),
            },
        };
        Ok(entries)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<bool, AdminError> {
        let url = self.resource_url(kind, Some(id));
        let response = self
            .apply_headers(self.client.delete(&url))
            .send()
            .await
            .map_err(classify_error)?;
        Ok(response.status().as_u16() == 200)
    }
}

/// Admin API double backed by maps, used by tests and local development.
#[derive(Default)]
pub struct InMemoryAdmin {
    resources: Mutex<HashMap<ResourceKind, BTreeMap<String, Value>>>,
    failing: Mutex<HashSet<ResourceKind>>,
}

impl InMemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call touching the given kind fail, for error-path tests.
    pub fn fail_kind(&self, kind: ResourceKind) {
        self.failing.lock().insert(kind);
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources
            .lock()
            .get(&kind)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn get(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.resources
            .lock()
            .get(&kind)
            .and_then(|entries| entries.get(id))
            .cloned()
    }
}

#[async_trait]
impl AdminApi for InMemoryAdmin {
    async fn put(&self, kind: ResourceKind, id: &str, payload: Value) -> Result<Value, AdminError> {
        if self.failing.lock().contains(&kind) {
            return Err(AdminError::Failed {
                status: 500,
                detail: format!("injected failure for {}", kind.path()),
            });
        }
        self.resources
            .lock()
            .entry(kind)
            .or_default()
            .insert(id.to_string(), payload.clone());
        Ok(json!({
            "key": format!("/admin/{}/{}", kind.path(), id),
            "value": payload,
        }))
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>, AdminError> {
        if self.failing.lock().contains(&kind) {
            return Err(AdminError::Failed {
                status: 500,
                detail: format!("injected failure for {}", kind.path()),
            });
        }
        let resources = self.resources.lock();
        let entries = resources
            .get(&kind)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(id, payload)| {
                        json!({
                            "key": format!("/admin/{}/{}", kind.path(), id),
                            "value": payload,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<bool, AdminError> {
        Ok(self
            .resources
            .lock()
            .get_mut(&kind)
            .map(|entries| entries.remove(id).is_some())
            .unwrap_or(false))
    }
}
