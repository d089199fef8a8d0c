use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;

use crate::contract::{Module, ModuleConfig, ModuleError, ModuleRequest, ModuleResponse, ModuleStatus};

/// Generic backend that reflects the request back to the caller.
pub struct EchoModule {
    status: RwLock<ModuleStatus>,
    module_id: RwLock<String>,
}

impl EchoModule {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(ModuleStatus::Created),
            module_id: RwLock::new(String::new()),
        }
    }
}

impl Default for EchoModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for EchoModule {
    async fn initialize(&self, config: ModuleConfig) -> Result<(), ModuleError> {
        *self.module_id.write() = config.module_id;
        *self.status.write() = ModuleStatus::Ready;
        Ok(())
    }

    async fn handle_request(&self, request: ModuleRequest) -> Result<ModuleResponse, ModuleError> {
        if *self.status.read() != ModuleStatus::Ready {
            return Err(ModuleError::NotReady("echo module is not ready".to_string()));
        }
        Ok(ModuleResponse::ok(json!({
            "module_id": self.module_id.read().clone(),
            "request_id": request.request_id,
            "echo": {
                "method": request.method,
                "path": request.path,
                "query": request.query,
                "body": request.body,
            },
        })))
    }

    async fn health_check(&self) -> ModuleStatus {
        *self.status.read()
    }

    async fn shutdown(&self) {
        *self.status.write() = ModuleStatus::ShuttingDown;
    }
}
