use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use front_door::{FrontDoor, FrontDoorConfig, FrontDoorDeps, HttpProxyForwarder, ProxyConfig};
use gateway::{AdminClientConfig, GatewayConfigurator, HttpAdminClient};
use modules::ModuleCatalog;
use registry::{
    HttpManifestRegistry, HttpReferenceResolver, InMemoryMetricsSink, ManifestCache,
    NoopManifestCache, RedisManifestCache, ReferenceResolverConfig, RegistryClientConfig,
    SystemConfig, SystemConfigLoader,
};
use tokio::sync::RwLock;

use crate::error::AppError;

pub struct AppState {
    pub config_path: PathBuf,
    pub config: RwLock<SystemConfig>,
    pub admin_token: RwLock<String>,
    pub front_door: Arc<FrontDoor>,
    pub metrics: Arc<InMemoryMetricsSink>,
    pub started_at: Instant,
}

impl AppState {
    pub async fn new(config_path: PathBuf) -> Result<Arc<Self>, AppError> {
        let config = load_config(&config_path)?;
        let admin_token = config.get_string("security.admin_token");
        let (front_door, metrics) = build_front_door(&config).await;
        Ok(Arc::new(Self {
            config_path,
            config: RwLock::new(config),
            admin_token: RwLock::new(admin_token),
            front_door,
            metrics,
            started_at: Instant::now(),
        }))
    }
}

pub fn load_config(path: &Path) -> Result<SystemConfig, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(SystemConfigLoader::from_str(&raw)?)
}

pub async fn build_front_door(
    config: &SystemConfig,
) -> (Arc<FrontDoor>, Arc<InMemoryMetricsSink>) {
    let registry_timeout = config.get_number("registry.timeout_ms").max(1) as u64;
    let request_timeout = config.get_number("runtime.request_timeout_ms").max(1) as u64;

    let fetcher = Arc::new(HttpManifestRegistry::new(RegistryClientConfig {
        base_url: config.get_string("registry.url"),
        client_secret: config.get_string("registry.secret"),
        timeout_ms: registry_timeout,
    }));
    let references = Arc::new(HttpReferenceResolver::new(ReferenceResolverConfig {
        vault_url: config.get_string("vault.url"),
        vault_token: config.get_string("vault.token"),
        config_service_url: config.get_string("registry.url"),
        timeout_ms: registry_timeout,
    }));

    let admin_url = config.get_string("gateway.admin_url");
    let configurator = if admin_url.trim().is_empty() {
        None
    } else {
        let admin = HttpAdminClient::new(AdminClientConfig {
            admin_url,
            admin_key: config.get_string("gateway.admin_key"),
            timeout_ms: request_timeout,
        });
        Some(Arc::new(GatewayConfigurator::new(Arc::new(admin))))
    };

    let proxy = Arc::new(HttpProxyForwarder::new(ProxyConfig {
        timeout_ms: request_timeout,
        user_agent: "fd-server".to_string(),
    }));

    let metrics = InMemoryMetricsSink::shared();
    let front_door = FrontDoor::new(
        FrontDoorConfig {
            environment: config.get_string("runtime.environment"),
            cache_ttl: std::time::Duration::from_secs(
                config.get_number("cache.ttl_seconds").max(1) as u64,
            ),
            gateway_proxy_url: config.get_string("gateway.proxy_url"),
        },
        config.get_number("runtime.module_pool_size").max(1) as usize,
        FrontDoorDeps {
            fetcher,
            cache: build_cache(config).await,
            references,
            catalog: Arc::new(ModuleCatalog::with_defaults()),
            configurator,
            proxy,
            metrics: metrics.clone(),
        },
    );
    (Arc::new(front_door), metrics)
}

async fn build_cache(config: &SystemConfig) -> Arc<dyn ManifestCache> {
    let redis_url = config.get_string("cache.redis_url");
    if redis_url.trim().is_empty() {
        return Arc::new(NoopManifestCache);
    }
    match RedisManifestCache::connect(&redis_url, "fd").await {
        Ok(cache) => Arc::new(cache),
        Err(err) => {
            tracing::warn!(error = %err, "manifest cache unavailable, continuing without one");
            Arc::new(NoopManifestCache)
        }
    }
}

pub fn create_default_config(path: &Path) -> Result<(), AppError> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, default_config_template())?;
    tracing::info!(path = %path.display(), "wrote default config");
    Ok(())
}

fn default_config_template() -> String {
    [
        "[registry]",
        "url = \"http://localhost:8081\"",
        "secret = \"\"",
        "timeout_ms = 10000",
        "",
        "[vault]",
        "url = \"http://localhost:8200\"",
        "token = \"\"",
        "",
        "[gateway]",
        "admin_url = \"\"",
        "admin_key = \"\"",
        "proxy_url = \"http://localhost:9080\"",
        "",
        "[cache]",
        "redis_url = \"\"",
        "ttl_seconds = 300",
        "",
        "[runtime]",
        "environment = \"dev\"",
        "module_pool_size = 10",
        "request_timeout_ms = 30000",
        "",
        "[bootstrap]",
        "auto_configure = false",
        "",
        "[security]",
        "admin_token = \"\"",
        "",
    ]
    .join("\n")
}
