use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Created,
    Initializing,
    Ready,
    ShuttingDown,
    Error,
}

#[derive(Clone, Debug, Default)]
pub struct ModuleConfig {
    pub module_id: String,
    pub module_type: String,
    pub version: String,
    pub environment: String,
    pub backend_endpoints: HashMap<String, Value>,
    pub runtime_references: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
}

#[derive(Clone, Debug)]
pub struct ModuleRequest {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct ModuleResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ModuleResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module initialization failed: {0}")]
    Init(String),
    #[error("module request failed: {0}")]
    Request(String),
    #[error("module not ready: {0}")]
    NotReady(String),
}

/// Implementations keep their own state behind interior mutability so the
/// pool can hand out shared handles while health checks run concurrently
/// with in-flight requests.
#[async_trait]
pub trait Module: Send + Sync {
    async fn initialize(&self, config: ModuleConfig) -> Result<(), ModuleError>;
    async fn handle_request(&self, request: ModuleRequest) -> Result<ModuleResponse, ModuleError>;
    async fn health_check(&self) -> ModuleStatus;
    async fn shutdown(&self);

    fn streaming(&self) -> Option<&dyn StreamingModule> {
        None
    }
}

#[async_trait]
pub trait StreamingModule: Send + Sync {
    async fn handle_streaming_request(
        &self,
        request: ModuleRequest,
    ) -> Result<ByteStream, ModuleError>;
}
