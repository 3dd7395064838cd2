use std::env;

use serde::{Deserialize, Serialize};

use crate::libs::dialect::DialectKind;
use crate::libs::error::ConfigError;

pub const ENV_DATABASE_URL: &str = "SLINTSCHEMA_DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "SLINTSCHEMA_MAX_CONNECTIONS";
pub const ENV_DIALECT: &str = "SLINTSCHEMA_DIALECT";
pub const ENV_IF_NOT_EXISTS: &str = "SLINTSCHEMA_IF_NOT_EXISTS";

/// Connection and rendering settings for a [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Rendering dialect; guessed from `database_url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<DialectKind>,
    /// Emit `CREATE TABLE IF NOT EXISTS` so `migrate` can run repeatedly.
    #[serde(default = "default_true")]
    pub if_not_exists: bool,
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            dialect: None,
            if_not_exists: true,
        }
    }
}

impl EngineConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn dialect_kind(&self) -> DialectKind {
        self.dialect
            .unwrap_or_else(|| DialectKind::from_url(&self.database_url))
    }

    /// An in-memory SQLite database lives only as long as its connection.
    pub fn is_in_memory_sqlite(&self) -> bool {
        self.database_url.starts_with("sqlite:") && self.database_url.contains(":memory:")
    }

    /// Build from `SLINTSCHEMA_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            config.database_url = url;
        }
        if let Some(value) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = value
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_MAX_CONNECTIONS,
                    value,
                })?;
        }
        if let Some(value) = lookup(ENV_DIALECT) {
            config.dialect = Some(DialectKind::parse(&value).ok_or(ConfigError::InvalidValue {
                key: ENV_DIALECT,
                value,
            })?);
        }
        if let Some(value) = lookup(ENV_IF_NOT_EXISTS) {
            config.if_not_exists = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_IF_NOT_EXISTS,
                        value,
                    });
                }
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_in_memory_sqlite() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.is_in_memory_sqlite());
        assert_eq!(config.dialect_kind(), DialectKind::Sqlite);
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_DATABASE_URL, "postgres://postgres@localhost:5432/postgres"),
            (ENV_MAX_CONNECTIONS, "12"),
            (ENV_DIALECT, "generic"),
            (ENV_IF_NOT_EXISTS, "false"),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.dialect_kind(), DialectKind::Generic);
        assert!(!config.if_not_exists);
        assert!(!config.is_in_memory_sqlite());
    }

    #[test]
    fn rejects_bad_values() {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_MAX_CONNECTIONS,
                ..
            }
        ));
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_DIALECT, "oracle")])).is_err());
    }

    #[test]
    fn parses_json_with_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"database_url": "sqlite://movies.db", "dialect": "postgres"}"#)
                .unwrap();
        assert_eq!(config.database_url, "sqlite://movies.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.dialect_kind(), DialectKind::Postgres);
        assert!(config.if_not_exists);
    }
}
