use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    ApiGateway,
    InferenceEndpoint,
    GenericBackend,
    JwtConfig,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ModuleKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ModuleKind::ApiGateway => "api_gateway",
            ModuleKind::InferenceEndpoint => "inference_endpoint",
            ModuleKind::GenericBackend => "generic_backend",
            ModuleKind::JwtConfig => "jwt_config",
            ModuleKind::Unknown => "unknown",
        }
    }

    pub fn is_dispatchable(&self) -> bool {
        matches!(self, ModuleKind::InferenceEndpoint | ModuleKind::GenericBackend)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ModuleKind,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub config: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_required() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub manifest_version: Option<String>,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
    #[serde(default)]
    pub endpoints: HashMap<String, HashMap<String, Value>>,
    #[serde(default)]
    pub configuration_references: Vec<Reference>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Manifest {
    pub fn gateway_module(&self) -> Option<&ModuleSpec> {
        self.modules.iter().find(|m| m.kind == ModuleKind::ApiGateway)
    }

    pub fn dispatchable_modules(&self) -> impl Iterator<Item = &ModuleSpec> {
        self.modules.iter().filter(|m| m.kind.is_dispatchable())
    }

    pub fn environment_endpoints(&self, environment: &str) -> HashMap<String, Value> {
        self.endpoints.get(environment).cloned().unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Direct,
    Gateway,
    Hybrid,
    Unconfigured,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Direct => "direct",
            RoutingMode::Gateway => "gateway",
            RoutingMode::Hybrid => "hybrid",
            RoutingMode::Unconfigured => "unconfigured",
        }
    }

    pub fn uses_gateway(&self) -> bool {
        matches!(self, RoutingMode::Gateway | RoutingMode::Hybrid)
    }
}

pub fn routing_mode_for(manifest: &Manifest) -> RoutingMode {
    let has_gateway = manifest.gateway_module().is_some();
    let has_dispatchable = manifest.dispatchable_modules().next().is_some();
    match (has_gateway, has_dispatchable) {
        (true, true) => RoutingMode::Hybrid,
        (true, false) => RoutingMode::Gateway,
        _ => RoutingMode::Direct,
    }
}
