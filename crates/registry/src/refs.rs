use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::manifest::Reference;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to resolve required reference {0}: {1}")]
    MissingRequired(String, String),
    #[error("reference {0} lookup timed out")]
    Timeout(String),
}

#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn resolve(
        &self,
        references: &[Reference],
    ) -> Result<HashMap<String, Value>, ReferenceError>;
}

#[derive(Clone, Debug)]
pub struct ReferenceResolverConfig {
    pub vault_url: String,
    pub vault_token: String,
    pub config_service_url: String,
    pub timeout_ms: u64,
}

impl Default for ReferenceResolverConfig {
    fn default() -> Self {
        Self {
            vault_url: "http://localhost:8200".to_string(),
            vault_token: String::new(),
            config_service_url: "http://localhost:8081".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone)]
pub struct HttpReferenceResolver {
    client: reqwest::Client,
    config: ReferenceResolverConfig,
}

impl HttpReferenceResolver {
    pub fn new(config: ReferenceResolverConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    async fn resolve_one(&self, reference: &Reference) -> Result<Option<Value>, String> {
        let source = reference.source.as_str();
        if let Some(path) = source.strip_prefix("vault://") {
            return self.fetch_vault(path).await.map(Some);
        }
        if let Some(path) = source.strip_prefix("configmap://") {
            return self.fetch_config(path).await.map(Some);
        }
        if let Some(name) = source.strip_prefix("service://") {
            return Ok(Some(Value::String(format!("http://{name}.svc.cluster.local"))));
        }
        Ok(None)
    }

    async fn fetch_vault(&self, path: &str) -> Result<Value, String> {
        let url = format!("{}/v1/{}", self.config.vault_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .header("X-Vault-Token", &self.config.vault_token)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("vault returned status {}", response.status().as_u16()));
        }
        let body: Value = response.json().await.map_err(|err| err.to_string())?;
        body.get("data")
            .and_then(|data| data.get("value"))
            .cloned()
            .ok_or_else(|| "vault response missing data.value".to_string())
    }

    async fn fetch_config(&self, path: &str) -> Result<Value, String> {
        let url = format!(
            "{}/configs/{}",
            self.config.config_service_url.trim_end_matches('/'),
            path
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!(
                "config service returned status {}",
                response.status().as_u16()
            ));
        }
        response.json().await.map_err(|err| err.to_string())
    }
}

#[async_trait]
impl ReferenceResolver for HttpReferenceResolver {
    async fn resolve(
        &self,
        references: &[Reference],
    ) -> Result<HashMap<String, Value>, ReferenceError> {
        let mut resolved = HashMap::new();
        for reference in references {
            match self.resolve_one(reference).await {
                Ok(Some(value)) => {
                    resolved.insert(reference.name.clone(), value);
                }
                // Unrecognized scheme: the default satisfies the reference even
                // when it is required. Only required-and-no-default is an error.
                Ok(None) => match &reference.default {
                    Some(default) => {
                        resolved.insert(reference.name.clone(), default.clone());
                    }
                    None if reference.required => {
                        return Err(ReferenceError::MissingRequired(
                            reference.name.clone(),
                            format!("unsupported reference source {}", reference.source),
                        ));
                    }
                    None => {}
                },
                Err(reason) => {
                    if reference.required {
                        return Err(ReferenceError::MissingRequired(
                            reference.name.clone(),
                            reason,
                        ));
                    }
                    if let Some(default) = &reference.default {
                        resolved.insert(reference.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(resolved)
    }
}

/// Resolver backed by a fixed map, used by tests.
#[derive(Default)]
pub struct StaticReferenceResolver {
    values: HashMap<String, Value>,
}

impl StaticReferenceResolver {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

#[async_trait]
impl ReferenceResolver for StaticReferenceResolver {
    async fn resolve(
        &self,
        references: &[Reference],
    ) -> Result<HashMap<String, Value>, ReferenceError> {
        let mut resolved = HashMap::new();
        for reference in references {
            match (self.values.get(&reference.name), &reference.default) {
                (Some(value), _) => {
                    resolved.insert(reference.name.clone(), value.clone());
                }
                (None, Some(default)) => {
                    resolved.insert(reference.name.clone(), default.clone());
                }
                (None, None) if reference.required => {
                    return Err(ReferenceError::MissingRequired(
                        reference.name.clone(),
                        "no value configured".to_string(),
                    ));
                }
                (None, None) => {}
            }
        }
        Ok(resolved)
    }
}
