pub mod client;
pub mod configurator;
pub mod models;
pub mod plugins;

pub use client::{AdminApi, AdminClientConfig, AdminError, HttpAdminClient, InMemoryAdmin};
pub use configurator::{consumer_username, GatewayConfigurator};
pub use models::{
    CleanupResults, ConfigureResults, GatewayConsumer, GatewayService, GatewayUpstream,
    ProjectResources, ResourceKind, ResourceSummary,
};
