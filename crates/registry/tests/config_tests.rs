use registry::{ConfigError, ConfigProblem, SystemConfigLoader, ValueKind};

#[test]
fn parses_known_keys_and_applies_defaults() {
    let config = SystemConfigLoader::from_str(
        r#"
[registry]
url = "http://registry.internal:8081"
secret = "s3cret"

[cache]
ttl_seconds = 120

[bootstrap]
auto_configure = true
"#,
    )
    .expect("config should parse");

    assert_eq!(config.get_string("registry.url"), "http://registry.internal:8081");
    assert_eq!(config.get_string("registry.secret"), "s3cret");
    assert_eq!(config.get_number("cache.ttl_seconds"), 120);
    assert!(config.get_bool("bootstrap.auto_configure"));

    // Unset keys fall back to the static table.
    assert_eq!(config.get_number("runtime.module_pool_size"), 10);
    assert_eq!(config.get_string("runtime.environment"), "dev");
    assert_eq!(config.get_number("runtime.request_timeout_ms"), 30_000);
    assert_eq!(config.get_string("security.admin_token"), "");
}

#[test]
fn rejects_unknown_keys() {
    let result = SystemConfigLoader::from_str(
        r#"
[registry]
uri = "http://registry.internal:8081"
"#,
    );
    let Err(ConfigError::Invalid(problems)) = result else {
        panic!("unknown key should be rejected");
    };
    assert_eq!(problems, vec![ConfigProblem::UnknownKey("registry.uri".to_string())]);
}

#[test]
fn rejects_type_mismatch() {
    let result = SystemConfigLoader::from_str(
        r#"
[cache]
ttl_seconds = "five minutes"
"#,
    );
    let Err(ConfigError::Invalid(problems)) = result else {
        panic!("mistyped key should be rejected");
    };
    assert_eq!(
        problems,
        vec![ConfigProblem::WrongType {
            key: "cache.ttl_seconds".to_string(),
            expected: ValueKind::Number,
        }]
    );
}

#[test]
fn reports_every_offending_key_in_one_pass() {
    let result = SystemConfigLoader::from_str(
        r#"
[registry]
uri = "http://registry.internal:8081"

[cache]
ttl_seconds = "five minutes"

[bootstrap]
auto_configure = "maybe"
"#,
    );
    let err = result.expect_err("all offending keys should be rejected");
    let message = err.to_string();
    let ConfigError::Invalid(problems) = err else {
        panic!("offending keys should surface as Invalid");
    };
    assert_eq!(problems.len(), 3);
    assert!(problems.contains(&ConfigProblem::UnknownKey("registry.uri".to_string())));
    assert!(problems.contains(&ConfigProblem::WrongType {
        key: "cache.ttl_seconds".to_string(),
        expected: ValueKind::Number,
    }));
    assert!(problems.contains(&ConfigProblem::WrongType {
        key: "bootstrap.auto_configure".to_string(),
        expected: ValueKind::Boolean,
    }));

    // The message lists every problem, not just the first.
    assert!(message.contains("registry.uri"));
    assert!(message.contains("cache.ttl_seconds"));
    assert!(message.contains("bootstrap.auto_configure"));
}

#[test]
fn duration_helper_never_returns_zero() {
    let config = SystemConfigLoader::from_str("").expect("empty config should parse");
    assert!(config.get_duration_ms("runtime.request_timeout_ms").as_millis() >= 1);
}
