use std::collections::HashMap;

use modules::{
    EchoModule, Module, ModuleCatalog, ModuleConfig, ModuleError, ModuleRequest, ModuleStatus,
};
use serde_json::json;

fn request(path: &str) -> ModuleRequest {
    ModuleRequest {
        request_id: "req-1".to_string(),
        method: "POST".to_string(),
        path: path.to_string(),
        headers: HashMap::new(),
        query: HashMap::new(),
        body: Some(json!({"input": "hello"})),
    }
}

#[tokio::test]
async fn echo_module_lifecycle() {
    let module = EchoModule::new();
    assert_eq!(module.health_check().await, ModuleStatus::Created);

    let config = ModuleConfig {
        module_id: "echo-1".to_string(),
        module_type: "generic_backend".to_string(),
        ..ModuleConfig::default()
    };
    module.initialize(config).await.expect("initialize should succeed");
    assert_eq!(module.health_check().await, ModuleStatus::Ready);

    let response = module
        .handle_request(request("/v1/echo"))
        .await
        .expect("request should succeed");
    assert_eq!(response.status, 200);
    let body = response.body.expect("echo returns a body");
    assert_eq!(body["module_id"], "echo-1");
    assert_eq!(body["echo"]["path"], "/v1/echo");
    assert_eq!(body["echo"]["body"]["input"], "hello");

    module.shutdown().await;
    assert_eq!(module.health_check().await, ModuleStatus::ShuttingDown);
    let rejected = module.handle_request(request("/v1/echo")).await;
    assert!(matches!(rejected, Err(ModuleError::NotReady(_))));
}

#[tokio::test]
async fn echo_module_has_no_streaming_capability() {
    let module = EchoModule::new();
    assert!(module.streaming().is_none());
}

#[test]
fn catalog_discovers_registered_module_kinds() {
    let catalog = ModuleCatalog::with_defaults();
    assert!(catalog.contains("inference_endpoint"));
    assert!(catalog.contains("generic_backend"));
    assert!(catalog.create("generic_backend").is_some());
    assert!(catalog.create("api_gateway").is_none());
}

#[test]
fn catalog_supports_custom_registrations() {
    let mut catalog = ModuleCatalog::empty();
    assert!(catalog.is_empty());
    catalog.register("custom", || std::sync::Arc::new(EchoModule::new()));
    assert!(catalog.contains("custom"));
    assert_eq!(catalog.kinds(), vec!["custom".to_string()]);
}

#[tokio::test]
async fn inference_module_requires_an_endpoint() {
    let module = modules::InferenceEndpointModule::new();
    let err = module.initialize(ModuleConfig::default()).await;
    assert!(matches!(err, Err(ModuleError::Init(_))));

    let mut backend_endpoints = HashMap::new();
    backend_endpoints.insert("inference_url".to_string(), json!("http://localhost:9999/v1/chat"));
    let config = ModuleConfig {
        module_id: "inf-1".to_string(),
        module_type: "inference_endpoint".to_string(),
        backend_endpoints,
        ..ModuleConfig::default()
    };
    module.initialize(config).await.expect("initialize should succeed");
    assert_eq!(module.health_check().await, ModuleStatus::Ready);
    assert!(module.streaming().is_some());
}
