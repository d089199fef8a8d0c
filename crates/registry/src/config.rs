use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::static_config::{config_item, ValueKind};

/// Flattened system configuration. Every key is validated against the
/// static table at load time, so the getters only deal with fallback to
/// table defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    values: HashMap<String, String>,
}

impl SystemConfig {
    /// Raw value as written in the config file, without default fallback.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn effective(&self, key: &str) -> Option<&str> {
        self.get(key)
            .or_else(|| config_item(key).map(|item| item.default_value))
    }

    pub fn get_string(&self, key: &str) -> String {
        self.effective(key).unwrap_or_default().to_string()
    }

    pub fn get_number(&self, key: &str) -> i64 {
        self.effective(key)
            .and_then(|value| value.parse().ok())
            .or_else(|| {
                config_item(key).and_then(|item| item.default_value.parse().ok())
            })
            .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.effective(key)
            .and_then(parse_bool)
            .or_else(|| config_item(key).and_then(|item| parse_bool(item.default_value)))
            .unwrap_or(false)
    }

    /// Millisecond duration, clamped to at least 1ms so timeouts built from
    /// it never disable themselves.
    pub fn get_duration_ms(&self, key: &str) -> Duration {
        Duration::from_millis(self.get_number(key).max(1) as u64)
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// A single offending key found while loading a config file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigProblem {
    UnknownKey(String),
    WrongType { key: String, expected: ValueKind },
}

impl fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigProblem::UnknownKey(key) => write!(f, "unknown key {key}"),
            ConfigProblem::WrongType { key, expected } => {
                write!(f, "key {key} expects a {}", expected.name())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {}", list_problems(.0))]
    Invalid(Vec<ConfigProblem>),
}

fn list_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct SystemConfigLoader;

impl SystemConfigLoader {
    /// Flattens the TOML tree into dotted keys and validates each leaf
    /// against the static table. All offending keys are collected and
    /// reported together, so one load surfaces every mistake in the file.
    pub fn from_str(input: &str) -> Result<SystemConfig, ConfigError> {
        let root: toml::Value =
            toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let mut values = HashMap::new();
        let mut problems = Vec::new();
        let mut pending = vec![(String::new(), root)];
        while let Some((key, value)) = pending.pop() {
            match value {
                toml::Value::Table(table) => {
                    for (name, nested) in table {
                        let child = if key.is_empty() {
                            name
                        } else {
                            format!("{key}.{name}")
                        };
                        pending.push((child, nested));
                    }
                }
                leaf => match config_item(&key) {
                    None => problems.push(ConfigProblem::UnknownKey(key)),
                    Some(item) => match render(&leaf, item.kind) {
                        Some(rendered) => {
                            values.insert(key, rendered);
                        }
                        None => {
                            problems.push(ConfigProblem::WrongType { key, expected: item.kind })
                        }
                    },
                },
            }
        }

        if problems.is_empty() {
            Ok(SystemConfig { values })
        } else {
            problems.sort_by_key(|problem| problem.to_string());
            Err(ConfigError::Invalid(problems))
        }
    }
}

fn render(value: &toml::Value, kind: ValueKind) -> Option<String> {
    match (kind, value) {
        (ValueKind::String, toml::Value::String(text)) => Some(text.clone()),
        (ValueKind::Number, toml::Value::Integer(number)) => Some(number.to_string()),
        (ValueKind::Number, toml::Value::Float(number)) => Some(number.to_string()),
        (ValueKind::Boolean, toml::Value::Boolean(flag)) => Some(flag.to_string()),
        _ => None,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
