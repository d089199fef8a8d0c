/// Value shape a config key admits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaticConfigItem {
    pub key: &'static str,
    pub description: &'static str,
    pub kind: ValueKind,
    pub default_value: &'static str,
}

/// Looks a key up in the static table. Keys not listed here are rejected
/// at load time.
pub fn config_item(key: &str) -> Option<&'static StaticConfigItem> {
    STATIC_CONFIG_TABLE.iter().find(|item| item.key == key)
}

pub static STATIC_CONFIG_TABLE: &[StaticConfigItem] = &[
    StaticConfigItem {
        key: "registry.url",
        description: "Manifest registry base URL",
        kind: ValueKind::String,
        default_value: "http://localhost:8081",
    },
    StaticConfigItem {
        key: "registry.secret",
        description: "Client secret sent to the manifest registry",
        kind: ValueKind::String,
        default_value: "",
    },
    StaticConfigItem {
        key: "registry.timeout_ms",
        description: "Manifest registry request timeout in milliseconds",
        kind: ValueKind::Number,
        default_value: "10000",
    },
    StaticConfigItem {
        key: "vault.url",
        description: "Secrets vault base URL",
        kind: ValueKind::String,
        default_value: "http://localhost:8200",
    },
    StaticConfigItem {
        key: "vault.token",
        description: "Vault access token",
        kind: ValueKind::String,
        default_value: "",
    },
    StaticConfigItem {
        key: "gateway.admin_url",
        description: "API gateway admin base URL (empty disables gateway configuration)",
        kind: ValueKind::String,
        default_value: "",
    },
    StaticConfigItem {
        key: "gateway.admin_key",
        description: "API gateway admin API key",
        kind: ValueKind::String,
        default_value: "",
    },
    StaticConfigItem {
        key: "gateway.proxy_url",
        description: "API gateway data-plane URL proxied requests are sent to",
        kind: ValueKind::String,
        default_value: "http://localhost:9080",
    },
    StaticConfigItem {
        key: "cache.redis_url",
        description: "Redis connection string for the manifest cache (empty disables caching)",
        kind: ValueKind::String,
        default_value: "",
    },
    StaticConfigItem {
        key: "cache.ttl_seconds",
        description: "Manifest cache TTL in seconds",
        kind: ValueKind::Number,
        default_value: "300",
    },
    StaticConfigItem {
        key: "runtime.environment",
        description: "Deployment environment used for endpoint selection",
        kind: ValueKind::String,
        default_value: "dev",
    },
    StaticConfigItem {
        key: "runtime.module_pool_size",
        description: "Maximum number of loaded module instances",
        kind: ValueKind::Number,
        default_value: "10",
    },
    StaticConfigItem {
        key: "runtime.request_timeout_ms",
        description: "Upstream request timeout in milliseconds",
        kind: ValueKind::Number,
        default_value: "30000",
    },
    StaticConfigItem {
        key: "bootstrap.auto_configure",
        description: "Synchronize all registry projects on startup",
        kind: ValueKind::Boolean,
        default_value: "false",
    },
    StaticConfigItem {
        key: "security.admin_token",
        description: "Bearer token for admin endpoints (empty leaves them open)",
        kind: ValueKind::String,
        default_value: "",
    },
];
