use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use crate::contract::{
    ByteStream, Module, ModuleConfig, ModuleError, ModuleRequest, ModuleResponse, ModuleStatus,
    StreamingModule,
};

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Clone, Default)]
struct InferenceState {
    status: Option<ModuleStatus>,
    client: Option<reqwest::Client>,
    endpoint_url: String,
    model_name: Option<String>,
    system_prompt: Option<String>,
    api_key: Option<String>,
}

/// Proxies chat-completion style requests to a configured inference backend.
pub struct InferenceEndpointModule {
    state: RwLock<InferenceState>,
}

impl InferenceEndpointModule {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(InferenceState {
                status: Some(ModuleStatus::Created),
                ..InferenceState::default()
            }),
        }
    }

    fn snapshot(&self) -> InferenceState {
        self.state.read().clone()
    }

    fn build_payload(state: &InferenceState, request: &ModuleRequest, stream: bool) -> Value {
        let mut payload = match &request.body {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(other) => other.clone(),
            None => Value::Object(Map::new()),
        };
        if let Value::Object(map) = &mut payload {
            if let Some(model) = &state.model_name {
                map.entry("model".to_string())
                    .or_insert_with(|| Value::String(model.clone()));
            }
            if let Some(prompt) = &state.system_prompt {
                if let Some(Value::Array(messages)) = map.get_mut("messages") {
                    let has_system = messages.iter().any(|message| {
                        message.get("role").and_then(Value::as_str) == Some("system")
                    });
                    if !has_system {
                        messages.insert(0, json!({"role": "system", "content": prompt}));
                    }
                }
            }
            if stream {
                map.insert("stream".to_string(), Value::Bool(true));
            }
        }
        payload
    }

    async fn send(
        &self,
        request: &ModuleRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ModuleError> {
        let state = self.snapshot();
        if state.status != Some(ModuleStatus::Ready) {
            return Err(ModuleError::NotReady(
                "inference module is not ready".to_string(),
            ));
        }
        let client = state
            .client
            .clone()
            .ok_or_else(|| ModuleError::NotReady("inference client missing".to_string()))?;
        let payload = Self::build_payload(&state, request, stream);
        let mut builder = client.post(&state.endpoint_url).json(&payload);
        if let Some(api_key) = &state.api_key {
            builder = builder.bearer_auth(api_key);
        }
        builder
            .send()
            .await
            .map_err(|err| ModuleError::Request(err.to_string()))
    }
}

impl Default for InferenceEndpointModule {
    fn default() -> Self {
        Self::new()
    }
}

fn string_value(map: &HashMap<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

#[async_trait]
impl Module for InferenceEndpointModule {
    async fn initialize(&self, config: ModuleConfig) -> Result<(), ModuleError> {
        {
            let mut state = self.state.write();
            state.status = Some(ModuleStatus::Initializing);
        }
        let endpoint_url =
            string_value(&config.backend_endpoints, &["inference_url", "url"]).ok_or_else(
                || ModuleError::Init("no inference endpoint configured".to_string()),
            )?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .build()
            .map_err(|err| ModuleError::Init(err.to_string()))?;

        let mut state = self.state.write();
        state.endpoint_url = endpoint_url;
        state.model_name = string_value(&config.metadata, &["model_name", "model"]);
        state.system_prompt = string_value(&config.metadata, &["system_prompt"]);
        state.api_key = string_value(&config.runtime_references, &["api-key", "api_key"]);
        state.client = Some(client);
        state.status = Some(ModuleStatus::Ready);
        Ok(())
    }

    async fn handle_request(&self, request: ModuleRequest) -> Result<ModuleResponse, ModuleError> {
        let response = self.send(&request, false).await?;
        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        let raw = response
            .text()
            .await
            .map_err(|err| ModuleError::Request(err.to_string()))?;
        let body = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(_) if raw.is_empty() => None,
            Err(_) => Some(Value::String(raw)),
        };
        Ok(ModuleResponse {
            status,
            headers,
            body,
        })
    }

    async fn health_check(&self) -> ModuleStatus {
        self.state.read().status.unwrap_or(ModuleStatus::Error)
    }

    async fn shutdown(&self) {
        let mut state = self.state.write();
        state.client = None;
        state.status = Some(ModuleStatus::ShuttingDown);
    }

    fn streaming(&self) -> Option<&dyn StreamingModule> {
        Some(self)
    }
}

#[async_trait]
impl StreamingModule for InferenceEndpointModule {
    async fn handle_streaming_request(
        &self,
        request: ModuleRequest,
    ) -> Result<ByteStream, ModuleError> {
        let response = self.send(&request, true).await?;
        if !response.status().is_success() {
            return Err(ModuleError::Request(format!(
                "inference backend returned status {}",
                response.status().as_u16()
            )));
        }
        let stream = response.bytes_stream().map(|item| {
            item.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
        });
        Ok(Box::pin(stream))
    }
}
