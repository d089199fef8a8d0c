use serde_json::{json, Value};

pub fn jwt_auth_plugin(key: &str, secret: &str) -> Value {
    json!({
        "key": key,
        "secret": secret,
        "algorithm": "HS256",
        "exp": 3600,
        "header": "Authorization",
        "cookie": "jwt",
        "hide_credentials": true,
    })
}

pub fn rate_limit_plugin(rate: u32, burst: u32) -> Value {
    json!({
        "rate": rate,
        "burst": burst,
        "key_type": "var",
        "key": "remote_addr",
        "rejected_code": 429,
        "rejected_msg": "Too many requests",
    })
}

pub fn cors_plugin(origins: &str) -> Value {
    json!({
        "allow_origins": origins,
        "allow_methods": "*",
        "allow_headers": "*",
        "expose_headers": "*",
        "max_age": 3600,
        "allow_credential": true,
    })
}
