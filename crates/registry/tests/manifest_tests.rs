use std::collections::HashMap;
use std::time::Duration;

use registry::refs::StaticReferenceResolver;
use registry::{
    routing_mode_for, HttpReferenceResolver, InMemoryManifestCache, Manifest, ManifestCache,
    ManifestFetcher, ModuleKind, Reference, ReferenceError, ReferenceResolver,
    ReferenceResolverConfig, RegistryError, RoutingMode, StaticManifestFetcher,
};
use serde_json::json;

fn manifest_from(value: serde_json::Value) -> Manifest {
    serde_json::from_value(value).expect("manifest should deserialize")
}

#[test]
fn deserializes_manifest_with_unknown_module_type() {
    let manifest = manifest_from(json!({
        "project_id": "proj-a",
        "project_name": "Project A",
        "modules": [
            {"name": "edge", "type": "api_gateway", "config": {}},
            {"name": "mystery", "type": "quantum_router", "config": {}}
        ]
    }));

    assert_eq!(manifest.modules.len(), 2);
    assert_eq!(manifest.modules[0].kind, ModuleKind::ApiGateway);
    assert_eq!(manifest.modules[1].kind, ModuleKind::Unknown);
}

#[test]
fn routing_mode_follows_module_composition() {
    let gateway_only = manifest_from(json!({
        "project_id": "p1",
        "modules": [{"name": "edge", "type": "api_gateway", "config": {}}]
    }));
    let direct = manifest_from(json!({
        "project_id": "p2",
        "modules": [{"name": "llm", "type": "inference_endpoint", "config": {}}]
    }));
    let hybrid = manifest_from(json!({
        "project_id": "p3",
        "modules": [
            {"name": "edge", "type": "api_gateway", "config": {}},
            {"name": "llm", "type": "inference_endpoint", "config": {}}
        ]
    }));
    let empty = manifest_from(json!({"project_id": "p4"}));

    assert_eq!(routing_mode_for(&gateway_only), RoutingMode::Gateway);
    assert_eq!(routing_mode_for(&direct), RoutingMode::Direct);
    assert_eq!(routing_mode_for(&hybrid), RoutingMode::Hybrid);
    assert_eq!(routing_mode_for(&empty), RoutingMode::Direct);
    assert!(RoutingMode::Hybrid.uses_gateway());
    assert!(!RoutingMode::Direct.uses_gateway());
}

#[test]
fn references_default_to_required() {
    let reference: Reference =
        serde_json::from_value(json!({"name": "api-key", "source": "vault://secret/app"}))
            .expect("reference should deserialize");
    assert!(reference.required);
    assert!(reference.default.is_none());
}

#[tokio::test]
async fn in_memory_cache_round_trips_and_invalidates() {
    let cache = InMemoryManifestCache::new();
    let manifest = manifest_from(json!({
        "project_id": "cached",
        "modules": [{"name": "llm", "type": "inference_endpoint", "config": {}}]
    }));

    assert!(cache.get("cached").await.is_none());
    cache.put(&manifest, Duration::from_secs(60)).await;
    let hit = cache.get("cached").await.expect("entry should be cached");
    assert_eq!(hit.project_id, "cached");

    cache.invalidate("cached").await;
    assert!(cache.get("cached").await.is_none());
}

#[tokio::test]
async fn static_fetcher_counts_fetches_and_reports_missing_projects() {
    let fetcher = StaticManifestFetcher::new();
    fetcher.insert(manifest_from(json!({"project_id": "known"})));

    let found = fetcher.fetch("known").await.expect("manifest should exist");
    assert_eq!(found.project_id, "known");
    let missing = fetcher.fetch("unknown").await;
    assert!(matches!(missing, Err(RegistryError::NotFound(id)) if id == "unknown"));
    assert_eq!(fetcher.fetches(), 2);

    let all = fetcher.list().await.expect("list should succeed");
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn reference_resolution_enforces_required_and_applies_defaults() {
    let mut values = HashMap::new();
    values.insert("api-key".to_string(), json!("k-123"));
    let resolver = StaticReferenceResolver::new(values);

    let references = vec![
        Reference {
            name: "api-key".to_string(),
            source: "vault://secret/app".to_string(),
            required: true,
            default: None,
        },
        Reference {
            name: "region".to_string(),
            source: "configmap://app/region".to_string(),
            required: false,
            default: Some(json!("us-east-1")),
        },
    ];
    let resolved = resolver.resolve(&references).await.expect("resolve should succeed");
    assert_eq!(resolved.get("api-key"), Some(&json!("k-123")));
    assert_eq!(resolved.get("region"), Some(&json!("us-east-1")));

    let missing = vec![Reference {
        name: "db-password".to_string(),
        source: "vault://secret/db".to_string(),
        required: true,
        default: None,
    }];
    let err = resolver.resolve(&missing).await;
    assert!(matches!(err, Err(ReferenceError::MissingRequired(name, _)) if name == "db-password"));
}

#[tokio::test]
async fn unrecognized_sources_fall_back_to_defaults() {
    let resolver = HttpReferenceResolver::new(ReferenceResolverConfig::default());

    // A default satisfies the reference even when it is required.
    let references = vec![
        Reference {
            name: "region".to_string(),
            source: "env://DEPLOY_REGION".to_string(),
            required: true,
            default: Some(json!("us-east-1")),
        },
        Reference {
            name: "billing".to_string(),
            source: "service://billing".to_string(),
            required: true,
            default: None,
        },
    ];
    let resolved = resolver.resolve(&references).await.expect("resolve should succeed");
    assert_eq!(resolved.get("region"), Some(&json!("us-east-1")));
    assert_eq!(
        resolved.get("billing"),
        Some(&json!("http://billing.svc.cluster.local"))
    );

    // Required with no default is the only failing combination.
    let missing = vec![Reference {
        name: "flag".to_string(),
        source: "env://FEATURE_FLAG".to_string(),
        required: true,
        default: None,
    }];
    let err = resolver.resolve(&missing).await;
    assert!(matches!(err, Err(ReferenceError::MissingRequired(name, _)) if name == "flag"));
}
