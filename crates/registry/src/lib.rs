pub mod cache;
pub mod client;
pub mod config;
pub mod manifest;
pub mod metrics;
pub mod refs;
pub mod static_config;

pub use cache::{
    CacheError, InMemoryManifestCache, ManifestCache, NoopManifestCache, RedisManifestCache,
};
pub use client::{
    HttpManifestRegistry, ManifestFetcher, RegistryClientConfig, RegistryError,
    StaticManifestFetcher,
};
pub use config::{ConfigError, ConfigProblem, SystemConfig, SystemConfigLoader};
pub use manifest::{
    routing_mode_for, Manifest, ModuleKind, ModuleSpec, Reference, RoutingMode,
};
pub use metrics::{InMemoryMetricsSink, MetricPoint, MetricsSink, NoopMetricsSink};
pub use refs::{
    HttpReferenceResolver, ReferenceError, ReferenceResolver, ReferenceResolverConfig,
    StaticReferenceResolver,
};
pub use static_config::{config_item, StaticConfigItem, ValueKind, STATIC_CONFIG_TABLE};
