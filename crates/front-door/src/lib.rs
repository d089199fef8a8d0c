use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod pool;
pub mod proxy;
pub mod routing;
pub mod types;

pub use pool::{ModulePool, PoolConfig};
pub use proxy::{HttpProxyForwarder, ProxyConfig, ProxyForwarder};
pub use routing::{extract_project, strip_project, ProjectRef, RoutingTable, PROJECT_HEADER};
pub use types::{parse_query, HttpRequest, HttpResponse, ProxyRequest, ResponseBody};

use gateway::{ConfigureResults, GatewayConfigurator};
use modules::{ModuleCatalog, ModuleError, ModuleRequest, ModuleResponse};
use registry::{
    routing_mode_for, Manifest, ManifestCache, ManifestFetcher, MetricPoint, MetricsSink,
    ReferenceError, ReferenceResolver, RegistryError, RoutingMode,
};

#[derive(Debug, Error)]
pub enum FrontDoorError {
    #[error("could not determine project from request")]
    RoutingUnresolved,
    #[error("project {0} is not configured")]
    ProjectNotConfigured(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),
    #[error("missing required reference: {0}")]
    MissingRequiredReference(String),
    #[error("module initialization failed: {0}")]
    ModuleInitializationFailed(String),
    #[error("module request failed: {0}")]
    ModuleRequestFailed(String),
}

impl FrontDoorError {
    pub fn status(&self) -> u16 {
        match self {
            FrontDoorError::RoutingUnresolved | FrontDoorError::BadRequest(_) => 400,
            FrontDoorError::ProjectNotConfigured(_) => 404,
            FrontDoorError::UpstreamUnavailable(_) => 502,
            FrontDoorError::UpstreamTimeout(_) => 504,
            FrontDoorError::MissingRequiredReference(_)
            | FrontDoorError::ModuleInitializationFailed(_)
            | FrontDoorError::ModuleRequestFailed(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FrontDoorError::RoutingUnresolved => "routing_unresolved",
            FrontDoorError::ProjectNotConfigured(_) => "project_not_configured",
            FrontDoorError::BadRequest(_) => "bad_request",
            FrontDoorError::UpstreamUnavailable(_) => "upstream_unavailable",
            FrontDoorError::UpstreamTimeout(_) => "upstream_timeout",
            FrontDoorError::MissingRequiredReference(_) => "missing_reference",
            FrontDoorError::ModuleInitializationFailed(_) => "module_init_failed",
            FrontDoorError::ModuleRequestFailed(_) => "module_request_failed",
        }
    }
}

impl From<RegistryError> for FrontDoorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(project_id) => FrontDoorError::ProjectNotConfigured(project_id),
            RegistryError::Timeout(detail) => FrontDoorError::UpstreamTimeout(detail),
            RegistryError::Unavailable(detail) | RegistryError::Decode(detail) => {
                FrontDoorError::UpstreamUnavailable(detail)
            }
        }
    }
}

impl From<ReferenceError> for FrontDoorError {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::MissingRequired(name, detail) => {
                FrontDoorError::MissingRequiredReference(format!("{name}: {detail}"))
            }
            ReferenceError::Timeout(name) => FrontDoorError::UpstreamTimeout(name),
        }
    }
}

impl From<ModuleError> for FrontDoorError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::Init(detail) => FrontDoorError::ModuleInitializationFailed(detail),
            ModuleError::Request(detail) | ModuleError::NotReady(detail) => {
                FrontDoorError::ModuleRequestFailed(detail)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct FrontDoorConfig {
    pub environment: String,
    pub cache_ttl: Duration,
    pub gateway_proxy_url: String,
}

impl Default for FrontDoorConfig {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            cache_ttl: Duration::from_secs(300),
            gateway_proxy_url: String::new(),
        }
    }
}

pub struct FrontDoorDeps {
    pub fetcher: Arc<dyn ManifestFetcher>,
    pub cache: Arc<dyn ManifestCache>,
    pub references: Arc<dyn ReferenceResolver>,
    pub catalog: Arc<ModuleCatalog>,
    pub configurator: Option<Arc<GatewayConfigurator>>,
    pub proxy: Arc<dyn ProxyForwarder>,
    pub metrics: Arc<dyn MetricsSink>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncOutcome {
    pub project_id: String,
    pub mode: RoutingMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<ConfigureResults>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub outcomes: Vec<SyncOutcome>,
    pub errors: Vec<String>,
}

pub struct FrontDoor {
    config: FrontDoorConfig,
    fetcher: Arc<dyn ManifestFetcher>,
    cache: Arc<dyn ManifestCache>,
    references: Arc<dyn ReferenceResolver>,
    catalog: Arc<ModuleCatalog>,
    configurator: Option<Arc<GatewayConfigurator>>,
    proxy: Arc<dyn ProxyForwarder>,
    metrics: Arc<dyn MetricsSink>,
    routing: RoutingTable,
    pool: ModulePool,
    sync_lock: tokio::sync::Mutex<()>,
}

impl FrontDoor {
    pub fn new(config: FrontDoorConfig, pool_size: usize, deps: FrontDoorDeps) -> Self {
        let pool = ModulePool::new(
            deps.catalog.clone(),
            PoolConfig {
                max_size: pool_size,
                environment: config.environment.clone(),
            },
        );
        Self {
            config,
            fetcher: deps.fetcher,
            cache: deps.cache,
            references: deps.references,
            catalog: deps.catalog,
            configurator: deps.configurator,
            proxy: deps.proxy,
            metrics: deps.metrics,
            routing: RoutingTable::new(),
            pool,
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn pool(&self) -> &ModulePool {
        &self.pool
    }

    pub fn configurator(&self) -> Option<&Arc<GatewayConfigurator>> {
        self.configurator.as_ref()
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, FrontDoorError> {
        let started = Instant::now();
        let project = extract_project(&request.path, &request.headers);
        let project_tag = project
            .as_ref()
            .map(|p| p.project_id.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let result = match project {
            Some(project) => self.dispatch(&project, &request).await,
            None => Err(FrontDoorError::RoutingUnresolved),
        };

        let elapsed_ms = started.elapsed().as_millis() as f64;
        let mut tags = HashMap::new();
        tags.insert("project".to_string(), project_tag.clone());
        match &result {
            Ok(response) => {
                tags.insert("outcome".to_string(), "ok".to_string());
                tags.insert("status".to_string(), response.status.to_string());
            }
            Err(err) => {
                tags.insert("outcome".to_string(), err.kind().to_string());
                tags.insert("status".to_string(), err.status().to_string());
                tracing::warn!(
                    project = %project_tag,
                    error = %err,
                    "request failed"
                );
            }
        }
        self.metrics
            .record(MetricPoint::now("front_door.request_ms", elapsed_ms, tags));
        result
    }

    async fn dispatch(
        &self,
        project: &ProjectRef,
        request: &HttpRequest,
    ) -> Result<HttpResponse, FrontDoorError> {
        let mut mode = self.routing.get(&project.project_id);
        if mode == RoutingMode::Unconfigured {
            mode = self.ensure_project(&project.project_id).await?.mode;
        }
        match mode {
            RoutingMode::Gateway | RoutingMode::Hybrid => {
                self.forward_to_gateway(project, request).await
            }
            RoutingMode::Direct => self.dispatch_direct(project, request).await,
            RoutingMode::Unconfigured => {
                Err(FrontDoorError::ProjectNotConfigured(project.project_id.clone()))
            }
        }
    }

    /// First-sight sync, serialized so concurrent first requests to the same
    /// project do the analyze step once.
    async fn ensure_project(&self, project_id: &str) -> Result<SyncOutcome, FrontDoorError> {
        let _guard = self.sync_lock.lock().await;
        let current = self.routing.get(project_id);
        if current != RoutingMode::Unconfigured {
            return Ok(SyncOutcome {
                project_id: project_id.to_string(),
                mode: current,
                gateway: None,
            });
        }
        self.sync_project_inner(project_id).await
    }

    /// Re-sync a project from the registry regardless of its current mode.
    pub async fn sync_project(&self, project_id: &str) -> Result<SyncOutcome, FrontDoorError> {
        let _guard = self.sync_lock.lock().await;
        self.sync_project_inner(project_id).await
    }

    async fn sync_project_inner(&self, project_id: &str) -> Result<SyncOutcome, FrontDoorError> {
        let manifest = self.fetcher.fetch(project_id).await?;
        let mode = routing_mode_for(&manifest);

        let mut gateway_results = None;
        if mode.uses_gateway() {
            match &self.configurator {
                Some(configurator) => {
                    let results = configurator.configure_from_manifest(&manifest).await;
                    for error in &results.errors {
                        tracing::warn!(project_id, error, "gateway resource failed to apply");
                    }
                    gateway_results = Some(results);
                }
                None => {
                    tracing::warn!(
                        project_id,
                        "manifest declares a gateway module but no admin api is configured"
                    );
                }
            }
        }

        self.cache.put(&manifest, self.config.cache_ttl).await;
        self.routing.set(project_id, mode);
        tracing::info!(project_id, mode = mode.as_str(), "project synchronized");
        Ok(SyncOutcome {
            project_id: project_id.to_string(),
            mode,
            gateway: gateway_results,
        })
    }

    pub async fn sync_all(&self) -> Result<SyncReport, FrontDoorError> {
        let manifests = self.fetcher.list().await?;
        let mut report = SyncReport::default();
        for manifest in manifests {
            match self.sync_project(&manifest.project_id).await {
                Ok(outcome) => {
                    report.synced += 1;
                    report.outcomes.push(outcome);
                }
                Err(err) => {
                    report
                        .errors
                        .push(format!("{}: {err}", manifest.project_id));
                }
            }
        }
        Ok(report)
    }

    async fn manifest_for(&self, project_id: &str) -> Result<Manifest, FrontDoorError> {
        if let Some(manifest) = self.cache.get(project_id).await {
            self.record_cache(project_id, "hit");
            return Ok(manifest);
        }
        let manifest = self.fetcher.fetch(project_id).await?;
        self.cache.put(&manifest, self.config.cache_ttl).await;
        self.record_cache(project_id, "miss");
        Ok(manifest)
    }

    fn record_cache(&self, project_id: &str, outcome: &str) {
        let mut tags = HashMap::new();
        tags.insert("project".to_string(), project_id.to_string());
        tags.insert("outcome".to_string(), outcome.to_string());
        self.metrics
            .record(MetricPoint::now("front_door.manifest_cache", 1.0, tags));
    }

    async fn forward_to_gateway(
        &self,
        project: &ProjectRef,
        request: &HttpRequest,
    ) -> Result<HttpResponse, FrontDoorError> {
        if self.config.gateway_proxy_url.is_empty() {
            return Err(FrontDoorError::UpstreamUnavailable(
                "no gateway proxy url configured".to_string(),
            ));
        }
        let mut url = format!(
            "{}{}",
            self.config.gateway_proxy_url.trim_end_matches('/'),
            request.path
        );
        if let Some(query) = &request.query {
            if !query.is_empty() {
                url.push('?');
                url.push_str(query);
            }
        }
        let proxy_request = ProxyRequest {
            method: request.method.clone(),
            url,
            headers: request.headers.clone(),
            body: request.body.clone(),
        };
        tracing::debug!(project = %project.project_id, url = %proxy_request.url, "proxying to gateway");
        self.proxy.forward(&proxy_request).await
    }

    async fn dispatch_direct(
        &self,
        project: &ProjectRef,
        request: &HttpRequest,
    ) -> Result<HttpResponse, FrontDoorError> {
        let manifest = self.manifest_for(&project.project_id).await?;
        let spec = manifest
            .dispatchable_modules()
            .find(|spec| self.catalog.contains(spec.kind.tag()))
            .ok_or_else(|| {
                FrontDoorError::ModuleInitializationFailed(format!(
                    "no runnable module for project {}",
                    project.project_id
                ))
            })?;

        let references = self
            .references
            .resolve(&manifest.configuration_references)
            .await?;
        let module = self.pool.get_or_create(&manifest, spec, &references).await?;
        let module_request = build_module_request(project, request)?;

        if wants_streaming(&module_request, request) {
            if let Some(streaming) = module.streaming() {
                let stream = streaming.handle_streaming_request(module_request).await?;
                let mut headers = HashMap::new();
                headers.insert("content-type".to_string(), "text/event-stream".to_string());
                return Ok(HttpResponse {
                    status: 200,
                    headers,
                    body: ResponseBody::Stream(stream),
                });
            }
        }

        let response = module.handle_request(module_request).await?;
        Ok(module_response_to_http(response))
    }

    pub async fn shutdown(&self) {
        self.pool.shutdown_all().await;
    }
}

fn build_module_request(
    project: &ProjectRef,
    request: &HttpRequest,
) -> Result<ModuleRequest, FrontDoorError> {
    let request_id = request
        .headers
        .get("x-request-id")
        .cloned()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let path = if project.from_path {
        strip_project(&request.path, &project.project_id)
    } else {
        request.path.clone()
    };
    let query = request
        .query
        .as_deref()
        .map(parse_query)
        .unwrap_or_default();
    let body = if request.body.is_empty() {
        None
    } else if is_json(&request.headers) {
        Some(
            serde_json::from_slice::<Value>(&request.body)
                .map_err(|err| FrontDoorError::BadRequest(format!("invalid json body: {err}")))?,
        )
    } else {
        None
    };
    Ok(ModuleRequest {
        request_id,
        method: request.method.clone(),
        path,
        headers: request.headers.clone(),
        query,
        body,
    })
}

fn is_json(headers: &HashMap<String, String>) -> bool {
    headers
        .get("content-type")
        .map(|value| value.contains("json"))
        .unwrap_or(true)
}

fn wants_streaming(module_request: &ModuleRequest, request: &HttpRequest) -> bool {
    let body_streams = module_request
        .body
        .as_ref()
        .and_then(|body| body.get("stream"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let accepts_stream = request
        .headers
        .get("accept")
        .map(|value| value.contains("text/event-stream"))
        .unwrap_or(false);
    body_streams || accepts_stream
}

fn module_response_to_http(response: ModuleResponse) -> HttpResponse {
    let mut headers = response.headers;
    let body = match response.body {
        Some(value) => {
            headers
                .entry("content-type".to_string())
                .or_insert_with(|| "application/json".to_string());
            serde_json::to_vec(&value).unwrap_or_default()
        }
        None => Vec::new(),
    };
    HttpResponse {
        status: response.status,
        headers,
        body: ResponseBody::Bytes(body),
    }
}
