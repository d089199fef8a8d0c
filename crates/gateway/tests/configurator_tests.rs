use std::sync::Arc;

use gateway::{consumer_username, AdminApi, GatewayConfigurator, InMemoryAdmin, ResourceKind};
use registry::Manifest;
use serde_json::json;

fn gateway_manifest() -> Manifest {
    serde_json::from_value(json!({
        "project_id": "proj-a",
        "project_name": "Project A",
        "environment": "dev",
        "modules": [
            {
                "name": "apisix-gateway",
                "type": "api_gateway",
                "config": {
                    "upstreams": [
                        {
                            "name": "backend",
                            "type": "roundrobin",
                            "nodes": {"backend.internal:8080": 1}
                        }
                    ],
                    "routes": [
                        {
                            "name": "chat",
                            "uri": "/v1/chat/*",
                            "methods": ["POST"],
                            "plugins": [
                                {"name": "jwt-auth", "enabled": true, "config": {}},
                                {"name": "prometheus", "enabled": false, "config": {}}
                            ]
                        },
                        {
                            "name": "embed",
                            "uri": "/v1/embed/*",
                            "methods": ["POST"],
                            "upstream": {
                                "type": "roundrobin",
                                "nodes": {"embed.internal:9000": 1}
                            }
                        }
                    ],
                    "global_plugins": [
                        {"name": "cors", "enabled": true, "config": {"allow_origins": "*"}}
                    ]
                }
            },
            {
                "name": "jwt",
                "type": "jwt_config",
                "config": {"secret_key": "shh"}
            }
        ]
    }))
    .expect("manifest should deserialize")
}

#[tokio::test]
async fn configures_prefixed_resources_from_manifest() {
    let admin = Arc::new(InMemoryAdmin::new());
    let configurator = GatewayConfigurator::new(admin.clone());

    let results = configurator.configure_from_manifest(&gateway_manifest()).await;
    assert!(results.errors.is_empty(), "unexpected errors: {:?}", results.errors);
    assert_eq!(results.routes.len(), 2);
    assert_eq!(results.upstreams.len(), 2);
    assert_eq!(results.services.len(), 1);
    assert_eq!(results.consumers.len(), 1);
    assert_eq!(results.global_rules.len(), 1);

    // Route without inline upstream is linked to the project service.
    let chat = admin
        .get(ResourceKind::Routes, "proj-a-chat")
        .expect("chat route should exist");
    assert_eq!(chat["service_id"], "proj-a-service");
    assert_eq!(chat["desc"], "Route for Project A - chat");
    // Plugin list converted to a map, disabled entries dropped, jwt key pinned.
    assert_eq!(chat["plugins"]["jwt-auth"]["key"], "proj-a-key");
    assert!(chat["plugins"].get("prometheus").is_none());

    // Inline upstream extracted into a standalone resource.
    let embed = admin
        .get(ResourceKind::Routes, "proj-a-embed")
        .expect("embed route should exist");
    assert_eq!(embed["upstream_id"], "proj-a-embed-upstream");
    assert!(embed.get("upstream").is_none());
    assert!(admin.get(ResourceKind::Upstreams, "proj-a-embed-upstream").is_some());

    // Consumer carries the jwt-auth plugin from the jwt_config module.
    let consumer = admin
        .get(ResourceKind::Consumers, &consumer_username("proj-a"))
        .expect("consumer should exist");
    assert_eq!(consumer["plugins"]["jwt-auth"]["secret"], "shh");

    assert!(admin.get(ResourceKind::GlobalRules, "proj-a-global-plugins").is_some());
}

#[tokio::test]
async fn reapplying_a_manifest_is_idempotent() {
    let admin = Arc::new(InMemoryAdmin::new());
    let configurator = GatewayConfigurator::new(admin.clone());
    let manifest = gateway_manifest();

    let first = configurator.configure_from_manifest(&manifest).await;
    let routes_after_first = admin.count(ResourceKind::Routes);
    let upstreams_after_first = admin.count(ResourceKind::Upstreams);

    let second = configurator.configure_from_manifest(&manifest).await;
    assert!(second.errors.is_empty());
    assert_eq!(first.resource_count(), second.resource_count());
    assert_eq!(admin.count(ResourceKind::Routes), routes_after_first);
    assert_eq!(admin.count(ResourceKind::Upstreams), upstreams_after_first);
}

#[tokio::test]
async fn collects_per_resource_errors_without_aborting() {
    let admin = Arc::new(InMemoryAdmin::new());
    admin.fail_kind(ResourceKind::Routes);
    let configurator = GatewayConfigurator::new(admin.clone());

    let results = configurator.configure_from_manifest(&gateway_manifest()).await;
    assert_eq!(results.routes.len(), 0);
    assert_eq!(results.errors.len(), 2);
    // The rest of the manifest still applied.
    assert_eq!(admin.count(ResourceKind::Services), 1);
    assert_eq!(admin.count(ResourceKind::Consumers), 1);
    assert_eq!(admin.count(ResourceKind::Upstreams), 2);
}

#[tokio::test]
async fn rejects_manifest_without_gateway_module() {
    let admin = Arc::new(InMemoryAdmin::new());
    let configurator = GatewayConfigurator::new(admin.clone());
    let manifest: Manifest = serde_json::from_value(json!({
        "project_id": "proj-b",
        "modules": [{"name": "llm", "type": "inference_endpoint", "config": {}}]
    }))
    .expect("manifest should deserialize");

    let results = configurator.configure_from_manifest(&manifest).await;
    assert_eq!(results.errors, vec!["no gateway module found in manifest".to_string()]);
    assert_eq!(admin.count(ResourceKind::Consumers), 0);
}

#[tokio::test]
async fn health_check_follows_the_route_listing() {
    let admin = Arc::new(InMemoryAdmin::new());
    let configurator = GatewayConfigurator::new(admin.clone());
    assert!(configurator.healthy().await);

    admin.fail_kind(ResourceKind::Routes);
    assert!(!configurator.healthy().await);
}

#[tokio::test]
async fn cleanup_and_listing_scope_to_the_project_prefix() {
    let admin = Arc::new(InMemoryAdmin::new());
    let configurator = GatewayConfigurator::new(admin.clone());
    configurator.configure_from_manifest(&gateway_manifest()).await;

    // A resource from another project must survive cleanup.
    admin
        .put(
            ResourceKind::Routes,
            "proj-z-chat",
            json!({"name": "proj-z-chat", "uri": "/v1/chat/*"}),
        )
        .await
        .expect("put should succeed");

    let listed = configurator.list_project("proj-a").await;
    assert_eq!(listed.summary.total_routes, 2);
    assert_eq!(listed.summary.total_upstreams, 2);
    assert_eq!(listed.summary.total_services, 1);
    assert_eq!(listed.summary.total_consumers, 1);

    let cleaned = configurator.cleanup_project("proj-a").await;
    assert!(cleaned.errors.is_empty());
    assert_eq!(cleaned.deleted_routes, 2);
    assert_eq!(cleaned.deleted_upstreams, 2);
    assert_eq!(cleaned.deleted_services, 1);
    assert_eq!(cleaned.deleted_consumers, 1);

    assert_eq!(admin.count(ResourceKind::Routes), 1);
    let remaining = configurator.list_project("proj-a").await;
    assert_eq!(remaining.summary.total_routes, 0);
}
