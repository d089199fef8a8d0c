use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use registry::{Manifest, ModuleKind, ModuleSpec};

use crate::client::AdminApi;
use crate::models::{
    CleanupResults, ConfigureResults, GatewayConsumer, GatewayService, ProjectResources,
    ResourceKind, ResourceSummary,
};

pub fn consumer_username(project_id: &str) -> String {
    format!("{}_consumer", project_id.replace('-', "_"))
}

fn prefixed(project_id: &str, name: &str) -> String {
    format!("{project_id}-{name}")
}

fn entry_id(entry: &Value) -> Option<String> {
    entry
        .get("key")
        .and_then(Value::as_str)
        .and_then(|key| key.rsplit('/').next())
        .map(str::to_string)
}

fn entry_name(entry: &Value, field: &str) -> String {
    entry
        .get("value")
        .and_then(|value| value.get(field))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Translates a manifest's gateway module into admin API calls.
///
/// Every resource is named deterministically from the project id, so
/// re-applying a manifest overwrites instead of duplicating.
pub struct GatewayConfigurator {
    admin: Arc<dyn AdminApi>,
}

impl GatewayConfigurator {
    pub fn new(admin: Arc<dyn AdminApi>) -> Self {
        Self { admin }
    }

    /// Checks the admin API is reachable with a cheap listing call.
    pub async fn healthy(&self) -> bool {
        self.admin.healthy().await
    }

    pub async fn configure_from_manifest(&self, manifest: &Manifest) -> ConfigureResults {
        let mut results = ConfigureResults::default();
        let project_id = manifest.project_id.as_str();
        let project_name = if manifest.project_name.is_empty() {
            project_id
        } else {
            manifest.project_name.as_str()
        };
        let environment = if manifest.environment.is_empty() {
            "default"
        } else {
            manifest.environment.as_str()
        };

        let gateway_modules: Vec<&ModuleSpec> = manifest
            .modules
            .iter()
            .filter(|m| m.kind == ModuleKind::ApiGateway)
            .collect();
        let jwt_module = manifest.modules.iter().find(|m| m.kind == ModuleKind::JwtConfig);

        if gateway_modules.is_empty() {
            results
                .errors
                .push("no gateway module found in manifest".to_string());
            return results;
        }

        self.apply_consumer(project_id, project_name, environment, jwt_module, &mut results)
            .await;
        self.apply_service(project_id, project_name, environment, &mut results)
            .await;

        for module in &gateway_modules {
            self.apply_module(project_id, project_name, &module.config, &mut results)
                .await;
        }

        self.apply_global_rules(project_id, &gateway_modules, &mut results)
            .await;
        results
    }

    async fn apply_consumer(
        &self,
        project_id: &str,
        project_name: &str,
        environment: &str,
        jwt_module: Option<&ModuleSpec>,
        results: &mut ConfigureResults,
    ) {
        let username = consumer_username(project_id);
        let mut plugins = HashMap::new();
        if let Some(jwt) = jwt_module {
            if let Some(secret) = jwt.config.get("secret_key").and_then(Value::as_str) {
                plugins.insert(
                    "jwt-auth".to_string(),
                    crate::plugins::jwt_auth_plugin(&prefixed(project_id, "key"), secret),
                );
            }
        }
        let consumer = GatewayConsumer {
            username: username.clone(),
            desc: Some(format!("Consumer for project: {project_name} ({environment})")),
            plugins,
        };
        let payload = match serde_json::to_value(&consumer) {
            Ok(payload) => payload,
            Err(err) => {
                results.errors.push(format!("failed to encode consumer: {err}"));
                return;
            }
        };
        match self.admin.put(ResourceKind::Consumers, &username, payload).await {
            Ok(result) => {
                tracing::info!(username, "created consumer");
                results.consumers.push(result);
            }
            Err(err) => {
                results
                    .errors
                    .push(format!("failed to create consumer for {project_id}: {err}"));
            }
        }
    }

    async fn apply_service(
        &self,
        project_id: &str,
        project_name: &str,
        environment: &str,
        results: &mut ConfigureResults,
    ) {
        let service_id = prefixed(project_id, "service");
        let service = GatewayService {
            id: service_id.clone(),
            name: prefixed(project_id, "api-service"),
            desc: Some(format!(
                "API Service for {project_name} - Environment: {environment}"
            )),
            upstream_id: None,
            enable_websocket: false,
        };
        let payload = match serde_json::to_value(&service) {
            Ok(payload) => payload,
            Err(err) => {
                results.errors.push(format!("failed to encode service: {err}"));
                return;
            }
        };
        match self.admin.put(ResourceKind::Services, &service_id, payload).await {
            Ok(result) => {
                tracing::info!(service_id, "created service");
                results.services.push(result);
            }
            Err(err) => {
                results
                    .errors
                    .push(format!("failed to create service for {project_id}: {err}"));
            }
        }
    }

    async fn apply_module(
        &self,
        project_id: &str,
        project_name: &str,
        config: &Value,
        results: &mut ConfigureResults,
    ) {
        for upstream in config.get("upstreams").and_then(Value::as_array).into_iter().flatten() {
            let Some(mut upstream) = upstream.as_object().cloned() else {
                continue;
            };
            let original_name = upstream
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("upstream")
                .to_string();
            let id = prefixed(project_id, &original_name);
            upstream.insert("name".to_string(), Value::String(id.clone()));
            upstream.insert("id".to_string(), Value::String(id.clone()));
            match self
                .admin
                .put(ResourceKind::Upstreams, &id, Value::Object(upstream))
                .await
            {
                Ok(result) => {
                    tracing::info!(upstream = id, "created upstream");
                    results.upstreams.push(result);
                }
                Err(err) => {
                    results
                        .errors
                        .push(format!("failed to create upstream {original_name}: {err}"));
                }
            }
        }

        // Inline upstreams become standalone resources referenced by id.
        let routes: Vec<Value> = config
            .get("routes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut inline_upstreams: HashMap<String, String> = HashMap::new();
        for route in &routes {
            let Some(inline) = route.get("upstream") else {
                continue;
            };
            let route_name = route
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("route")
                .to_string();
            let upstream_id = prefixed(project_id, &format!("{route_name}-upstream"));
            let payload = json!({
                "id": upstream_id,
                "name": upstream_id,
                "type": inline.get("type").cloned().unwrap_or_else(|| json!("roundrobin")),
                "nodes": inline.get("nodes").cloned().unwrap_or_else(|| json!({})),
                "timeout": inline.get("timeout").cloned()
                    .unwrap_or_else(|| json!({"connect": 30, "send": 30, "read": 30})),
                "retries": inline.get("retries").cloned().unwrap_or_else(|| json!(1)),
                "pass_host": inline.get("pass_host").cloned().unwrap_or_else(|| json!("pass")),
                "scheme": inline.get("scheme").cloned().unwrap_or_else(|| json!("https")),
            });
            match self.admin.put(ResourceKind::Upstreams, &upstream_id, payload).await {
                Ok(result) => {
                    tracing::info!(upstream = upstream_id, "created inline upstream");
                    results.upstreams.push(result);
                    inline_upstreams.insert(route_name, upstream_id);
                }
                Err(err) => {
                    results.errors.push(format!(
                        "failed to create inline upstream for route {route_name}: {err}"
                    ));
                }
            }
        }

        for route in routes {
            let Some(mut route) = route.as_object().cloned() else {
                continue;
            };
            let original_name = route
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("route")
                .to_string();
            let route_id = prefixed(project_id, &original_name);
            route.insert("name".to_string(), Value::String(route_id.clone()));
            route.insert("id".to_string(), Value::String(route_id.clone()));

            if route.contains_key("upstream") {
                if let Some(upstream_id) = inline_upstreams.get(&original_name) {
                    route.remove("upstream");
                    route.insert("upstream_id".to_string(), Value::String(upstream_id.clone()));
                }
            } else {
                route.insert(
                    "service_id".to_string(),
                    Value::String(prefixed(project_id, "service")),
                );
            }
            route.insert(
                "desc".to_string(),
                Value::String(format!("Route for {project_name} - {original_name}")),
            );

            let plugins = route.remove("plugins").unwrap_or_else(|| json!({}));
            route.insert(
                "plugins".to_string(),
                normalize_plugins(project_id, plugins),
            );

            match self
                .admin
                .put(ResourceKind::Routes, &route_id, Value::Object(route))
                .await
            {
                Ok(result) => {
                    tracing::info!(route = route_id, "created route");
                    results.routes.push(result);
                }
                Err(err) => {
                    results
                        .errors
                        .push(format!("failed to create route {original_name}: {err}"));
                }
            }
        }
    }

    async fn apply_global_rules(
        &self,
        project_id: &str,
        gateway_modules: &[&ModuleSpec],
        results: &mut ConfigureResults,
    ) {
        let mut global_plugins = Map::new();
        for module in gateway_modules {
            for plugin in module
                .config
                .get("global_plugins")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let enabled = plugin.get("enabled").and_then(Value::as_bool).unwrap_or(true);
                let Some(name) = plugin.get("name").and_then(Value::as_str) else {
                    continue;
                };
                if enabled {
                    global_plugins.insert(
                        name.to_string(),
                        plugin.get("config").cloned().unwrap_or_else(|| json!({})),
                    );
                }
            }
        }
        if global_plugins.is_empty() {
            return;
        }
        let rule_id = prefixed(project_id, "global-plugins");
        let payload = json!({"plugins": Value::Object(global_plugins)});
        match self.admin.put(ResourceKind::GlobalRules, &rule_id, payload).await {
            Ok(result) => {
                tracing::info!(rule = rule_id, "configured global plugins");
                results.global_rules.push(result);
            }
            Err(err) => {
                results
                    .errors
                    .push(format!("failed to set global plugins: {err}"));
            }
        }
    }

    pub async fn cleanup_project(&self, project_id: &str) -> CleanupResults {
        let mut results = CleanupResults::default();
        let prefix = format!("{project_id}-");

        for (kind, counter) in [
            (ResourceKind::Routes, 0usize),
            (ResourceKind::Upstreams, 1),
            (ResourceKind::Services, 2),
        ] {
            let entries = match self.admin.list(kind).await {
                Ok(entries) => entries,
                Err(err) => {
                    results
                        .errors
                        .push(format!("failed to list {}: {err}", kind.path()));
                    continue;
                }
            };
            for entry in entries {
                if !entry_name(&entry, "name").starts_with(&prefix) {
                    continue;
                }
                let Some(id) = entry_id(&entry) else {
                    continue;
                };
                match self.admin.delete(kind, &id).await {
                    Ok(true) => {
                        tracing::info!(kind = kind.path(), id, "deleted gateway resource");
                        match counter {
                            0 => results.deleted_routes += 1,
                            1 => results.deleted_upstreams += 1,
                            _ => results.deleted_services += 1,
                        }
                    }
                    Ok(false) => {}
                    Err(err) => {
                        results
                            .errors
                            .push(format!("failed to delete {} {id}: {err}", kind.path()));
                    }
                }
            }
        }

        let username = consumer_username(project_id);
        match self.admin.delete(ResourceKind::Consumers, &username).await {
            Ok(true) => results.deleted_consumers += 1,
            Ok(false) => {}
            Err(err) => {
                results
                    .errors
                    .push(format!("failed to delete consumer {username}: {err}"));
            }
        }
        results
    }

    pub async fn list_project(&self, project_id: &str) -> ProjectResources {
        let mut resources = ProjectResources::default();
        let prefix = format!("{project_id}-");

        if let Ok(entries) = self.admin.list(ResourceKind::Routes).await {
            for entry in entries {
                if entry_name(&entry, "name").starts_with(&prefix) {
                    let value = entry.get("value").cloned().unwrap_or_default();
                    resources.routes.push(json!({
                        "name": value.get("name"),
                        "uri": value.get("uri"),
                        "methods": value.get("methods").cloned().unwrap_or_else(|| json!([])),
                        "service_id": value.get("service_id"),
                        "desc": value.get("desc"),
                    }));
                }
            }
        }
        if let Ok(entries) = self.admin.list(ResourceKind::Upstreams).await {
            for entry in entries {
                if entry_name(&entry, "name").starts_with(&prefix) {
                    let value = entry.get("value").cloned().unwrap_or_default();
                    resources.upstreams.push(json!({
                        "name": value.get("name"),
                        "type": value.get("type"),
                        "nodes": value.get("nodes").cloned().unwrap_or_else(|| json!({})),
                    }));
                }
            }
        }
        if let Ok(entries) = self.admin.list(ResourceKind::Services).await {
            for entry in entries {
                if entry_name(&entry, "name").starts_with(&prefix) {
                    let value = entry.get("value").cloned().unwrap_or_default();
                    resources.services.push(json!({
                        "name": value.get("name"),
                        "desc": value.get("desc"),
                        "upstream_id": value.get("upstream_id"),
                    }));
                }
            }
        }
        let username = consumer_username(project_id);
        if let Ok(entries) = self.admin.list(ResourceKind::Consumers).await {
            for entry in entries {
                if entry_name(&entry, "username") == username {
                    let value = entry.get("value").cloned().unwrap_or_default();
                    let plugins: Vec<String> = value
                        .get("plugins")
                        .and_then(Value::as_object)
                        .map(|map| map.keys().cloned().collect())
                        .unwrap_or_default();
                    resources.consumers.push(json!({
                        "username": value.get("username"),
                        "desc": value.get("desc"),
                        "plugins": plugins,
                    }));
                }
            }
        }

        resources.summary = ResourceSummary {
            project_id: project_id.to_string(),
            total_routes: resources.routes.len(),
            total_upstreams: resources.upstreams.len(),
            total_services: resources.services.len(),
            total_consumers: resources.consumers.len(),
        };
        resources
    }
}

fn normalize_plugins(project_id: &str, plugins: Value) -> Value {
    match plugins {
        Value::Array(list) => {
            let mut converted = Map::new();
            for plugin in list {
                let enabled = plugin.get("enabled").and_then(Value::as_bool).unwrap_or(true);
                if !enabled {
                    continue;
                }
                let Some(name) = plugin.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let mut config = plugin
                    .get("config")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                if name == "jwt-auth" {
                    config.insert(
                        "key".to_string(),
                        Value::String(prefixed(project_id, "key")),
                    );
                }
                converted.insert(name.to_string(), Value::Object(config));
            }
            Value::Object(converted)
        }
        Value::Object(map) => Value::Object(map),
        _ => json!({}),
    }
}
