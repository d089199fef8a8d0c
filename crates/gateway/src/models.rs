use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Routes,
    Upstreams,
    Services,
    Consumers,
    GlobalRules,
}

impl ResourceKind {
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Routes => "routes",
            ResourceKind::Upstreams => "upstreams",
            ResourceKind::Services => "services",
            ResourceKind::Consumers => "consumers",
            ResourceKind::GlobalRules => "global_rules",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatewayUpstream {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub balancer: String,
    #[serde(default)]
    pub nodes: HashMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatewayService {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_id: Option<String>,
    #[serde(default)]
    pub enable_websocket: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatewayConsumer {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub plugins: HashMap<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ConfigureResults {
    pub routes: Vec<Value>,
    pub upstreams: Vec<Value>,
    pub services: Vec<Value>,
    pub consumers: Vec<Value>,
    pub global_rules: Vec<Value>,
    pub errors: Vec<String>,
}

impl ConfigureResults {
    pub fn resource_count(&self) -> usize {
        self.routes.len()
            + self.upstreams.len()
            + self.services.len()
            + self.consumers.len()
            + self.global_rules.len()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CleanupResults {
    pub deleted_routes: usize,
    pub deleted_upstreams: usize,
    pub deleted_services: usize,
    pub deleted_consumers: usize,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ProjectResources {
    pub routes: Vec<Value>,
    pub upstreams: Vec<Value>,
    pub services: Vec<Value>,
    pub consumers: Vec<Value>,
    pub summary: ResourceSummary,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResourceSummary {
    pub project_id: String,
    pub total_routes: usize,
    pub total_upstreams: usize,
    pub total_services: usize,
    pub total_consumers: usize,
}
