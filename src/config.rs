//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// REST server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    pub port: u16,
    /// Start with two demo todos instead of an empty list.
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            seed_demo: false,
        }
    }
}

impl ServerConfig {
    /// Build config from `TODO_HOST`, `TODO_PORT` and `TODO_SEED_DEMO`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reading through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: lookup("TODO_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "TODO_PORT", defaults.port)?,
            seed_demo: parse_flag(&lookup, "TODO_SEED_DEMO", defaults.seed_demo)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Local client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory holding the key-value files and the client log.
    pub data_dir: PathBuf,
}

impl ClientConfig {
    /// `TODO_DATA_DIR`, else `$HOME/.todo-app`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("TODO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| ".".to_string());
                PathBuf::from(home).join(".todo-app")
            });
        Self { data_dir }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off" | "") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn server_overrides() {
        let config = ServerConfig::from_lookup(env(&[
            ("TODO_HOST", "127.0.0.1"),
            ("TODO_PORT", "8081"),
            ("TODO_SEED_DEMO", "true"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8081");
        assert!(config.seed_demo);
    }

    #[test]
    fn server_rejects_bad_port() {
        let err = ServerConfig::from_lookup(env(&[("TODO_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("TODO_PORT"));
    }

    #[test]
    fn server_rejects_bad_flag() {
        assert!(ServerConfig::from_lookup(env(&[("TODO_SEED_DEMO", "maybe")])).is_err());
    }

    #[test]
    fn client_data_dir() {
        let config = ClientConfig::from_lookup(env(&[("TODO_DATA_DIR", "/tmp/todos")]));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/todos"));

        let config = ClientConfig::from_lookup(env(&[("HOME", "/home/ada")]));
        assert_eq!(config.data_dir, PathBuf::from("/home/ada/.todo-app"));
    }
}
