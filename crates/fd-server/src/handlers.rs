use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use front_door::{ResponseBody, SyncOutcome, SyncReport};
use gateway::{CleanupResults, ProjectResources};
use registry::MetricsSink;
use serde::Serialize;
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut mode_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for mode in state.front_door.routing().snapshot().into_values() {
        *mode_counts.entry(mode.as_str()).or_insert(0) += 1;
    }
    let gateway = match state.front_door.configurator() {
        Some(configurator) => json!({
            "configured": true,
            "reachable": configurator.healthy().await,
        }),
        None => json!({"configured": false}),
    };
    Json(json!({
        "status": "healthy",
        "service": "front-door",
        "environment": state.front_door.environment(),
        "routing": mode_counts,
        "gateway": gateway,
        "modules": {
            "loaded": state.front_door.pool().len().await,
            "capacity": state.front_door.pool().max_size(),
        },
    }))
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let modes: BTreeMap<String, &'static str> = state
        .front_door
        .routing()
        .snapshot()
        .into_iter()
        .map(|(project_id, mode)| (project_id, mode.as_str()))
        .collect();
    let loaded = state.front_door.pool().loaded().await;
    let mut config_keys = state.config.read().await.keys();
    config_keys.sort();
    Json(json!({
        "environment": state.front_door.environment(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "projects": {
            "total": modes.len(),
            "modes": modes,
        },
        "modules": {
            "loaded": loaded,
            "capacity": state.front_door.pool().max_size(),
        },
        "config_keys": config_keys,
    }))
}

pub async fn sync_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncReport>, AppError> {
    let report = state.front_door.sync_all().await?;
    Ok(Json(report))
}

pub async fn configure_handler(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state.front_door.sync_project(&project_id).await?;
    Ok(Json(outcome))
}

pub async fn projects_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let modes: BTreeMap<String, &'static str> = state
        .front_door
        .routing()
        .snapshot()
        .into_iter()
        .map(|(project_id, mode)| (project_id, mode.as_str()))
        .collect();
    Json(json!({"total": modes.len(), "projects": modes}))
}

pub async fn gateway_resources_handler(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectResources>, AppError> {
    let configurator = state
        .front_door
        .configurator()
        .ok_or_else(|| AppError::not_found("gateway admin api is not configured"))?;
    Ok(Json(configurator.list_project(&project_id).await))
}

pub async fn gateway_cleanup_handler(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> Result<Json<CleanupResults>, AppError> {
    let configurator = state
        .front_door
        .configurator()
        .ok_or_else(|| AppError::not_found("gateway admin api is not configured"))?;
    Ok(Json(configurator.cleanup_project(&project_id).await))
}

#[derive(Serialize)]
pub struct MetricPointResponse {
    pub name: String,
    pub value: f64,
    pub timestamp_ms: u64,
    pub tags: HashMap<String, String>,
}

pub async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<MetricPointResponse>> {
    let points = state
        .metrics
        .list()
        .into_iter()
        .map(|point| MetricPointResponse {
            name: point.name,
            value: point.value,
            timestamp_ms: point.timestamp_ms,
            tags: point.tags,
        })
        .collect();
    Json(points)
}

pub async fn admin_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.admin_token.read().await.clone();
    authorize_admin(&expected, request.headers())?;
    Ok(next.run(request).await)
}

/// An empty configured token leaves the admin surface open. That is the
/// development default; deployments set `security.admin_token`.
fn authorize_admin(expected: &str, headers: &HeaderMap) -> Result<(), AppError> {
    if expected.is_empty() {
        return Ok(());
    }
    match extract_bearer_token(headers) {
        Some(token) if token == expected => Ok(()),
        _ => Err(AppError::unauthorized("invalid admin token")),
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::to_string)
}

/// Tenant traffic lands here. Everything that is not a reserved service
/// route is handed to the front door for project dispatch.
pub async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|err| AppError::bad_request(format!("failed to read request body: {err}")))?;

    let request = front_door::HttpRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: convert_headers(&parts.headers),
        body: body.to_vec(),
    };
    let response = state.front_door.handle(request).await?;
    Ok(front_door_response(response))
}

fn convert_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_lowercase(), value.to_string()))
        })
        .collect()
}

fn front_door_response(response: front_door::HttpResponse) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }
    let body = match response.body {
        ResponseBody::Bytes(bytes) => Body::from(bytes),
        ResponseBody::Stream(stream) => Body::from_stream(stream),
    };
    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    use front_door::{
        FrontDoor, FrontDoorConfig, FrontDoorDeps, HttpProxyForwarder, ProxyConfig,
    };
    use gateway::{GatewayConfigurator, InMemoryAdmin};
    use modules::ModuleCatalog;
    use registry::refs::StaticReferenceResolver;
    use registry::{
        InMemoryManifestCache, InMemoryMetricsSink, Manifest, StaticManifestFetcher,
        SystemConfigLoader,
    };
    use serde_json::Value;
    use tokio::sync::RwLock;

    fn test_state(fetcher: Arc<StaticManifestFetcher>) -> Arc<AppState> {
        let metrics = InMemoryMetricsSink::shared();
        let front_door = FrontDoor::new(
            FrontDoorConfig {
                environment: "dev".to_string(),
                cache_ttl: std::time::Duration::from_secs(60),
                gateway_proxy_url: "http://gw.local".to_string(),
            },
            4,
            FrontDoorDeps {
                fetcher,
                cache: Arc::new(InMemoryManifestCache::new()),
                references: Arc::new(StaticReferenceResolver::new(HashMap::new())),
                catalog: Arc::new(ModuleCatalog::with_defaults()),
                configurator: Some(Arc::new(GatewayConfigurator::new(Arc::new(
                    InMemoryAdmin::new(),
                )))),
                proxy: Arc::new(HttpProxyForwarder::new(ProxyConfig::default())),
                metrics: metrics.clone(),
            },
        );
        let config = SystemConfigLoader::from_str("").expect("empty config should parse");
        Arc::new(AppState {
            config_path: PathBuf::from("system.toml"),
            config: RwLock::new(config),
            admin_token: RwLock::new(String::new()),
            front_door: Arc::new(front_door),
            metrics,
            started_at: Instant::now(),
        })
    }

    fn direct_manifest(project_id: &str) -> Manifest {
        serde_json::from_value(serde_json::json!({
            "project_id": project_id,
            "environment": "dev",
            "modules": [{"name": "backend", "type": "generic_backend", "config": {}}]
        }))
        .expect("manifest should deserialize")
    }

    fn json_request(path: &str, body: Value) -> Request {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("body encodes")))
            .expect("request builds")
    }

    #[tokio::test]
    async fn dispatches_tenant_requests_through_the_front_door() {
        let fetcher = Arc::new(StaticManifestFetcher::new());
        fetcher.insert(direct_manifest("acme"));
        let state = test_state(fetcher);

        let response = dispatch_handler(
            State(state),
            json_request("/acme/v1/chat", serde_json::json!({"input": "hi"})),
        )
        .await
        .expect("dispatch should succeed");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body: Value = serde_json::from_slice(&body).expect("body is json");
        assert_eq!(body["echo"]["path"], "/v1/chat");
    }

    #[tokio::test]
    async fn unknown_projects_surface_as_not_found() {
        let state = test_state(Arc::new(StaticManifestFetcher::new()));
        let err = dispatch_handler(
            State(state),
            json_request("/ghost/v1/chat", serde_json::json!({})),
        )
        .await
        .expect_err("dispatch should fail");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reflects_synced_projects() {
        let fetcher = Arc::new(StaticManifestFetcher::new());
        fetcher.insert(direct_manifest("acme"));
        let state = test_state(fetcher);
        state
            .front_door
            .sync_project("acme")
            .await
            .expect("sync should succeed");

        let Json(status) = status_handler(State(state)).await;
        assert_eq!(status["projects"]["total"], 1);
        assert_eq!(status["projects"]["modes"]["acme"], "direct");
    }

    #[tokio::test]
    async fn health_reports_gateway_reachability() {
        let state = test_state(Arc::new(StaticManifestFetcher::new()));
        let Json(health) = health_handler(State(state)).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["gateway"]["configured"], true);
        assert_eq!(health["gateway"]["reachable"], true);
    }

    #[test]
    fn bearer_tokens_are_extracted_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc".parse().expect("header parses"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        headers.insert("authorization", "bearer xyz".parse().expect("header parses"));
        assert_eq!(extract_bearer_token(&headers), Some("xyz".to_string()));

        headers.insert("authorization", "Basic abc".parse().expect("header parses"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn empty_admin_token_leaves_the_admin_surface_open() {
        let headers = HeaderMap::new();
        assert!(authorize_admin("", &headers).is_ok());
        assert!(authorize_admin("secret", &headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret".parse().expect("header parses"));
        assert!(authorize_admin("secret", &headers).is_ok());
        assert!(authorize_admin("other", &headers).is_err());
    }
}
