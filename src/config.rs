//! Application configuration
//!
//! Loaded from a TOML file, by default
//! `~/.config/parking-service/config.toml`. Every section and field has a
//! default, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::slot::slot_labels;
use crate::support::errors::InfraError;

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parking-service")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds a client has to deliver its request
    pub request_timeout_secs: u64,
    pub max_request_bytes: usize,
    /// Seconds in-flight connections get to finish on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5555,
            request_timeout_secs: 10,
            max_request_bytes: 64 * 1024,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, used when `url` is not set
    pub path: String,
    /// Full connection URL; wins over `path`
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "parking_system.db".to_string(),
            url: None,
            max_connections: 1,
        }
    }
}

impl DatabaseSettings {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("sqlite://{}?mode=rwc", self.path),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub slot_prefix: String,
    pub slot_count: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            slot_prefix: "A".to_string(),
            slot_count: 10,
        }
    }
}

impl CatalogConfig {
    /// Labels seeded into an empty slot table
    pub fn labels(&self) -> Vec<String> {
        slot_labels(&self.slot_prefix, self.slot_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Prometheus scrape address
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:9464".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, InfraError> {
        let config: Self = toml::from_str(raw).map_err(|e| InfraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        if self.catalog.slot_prefix.trim().is_empty() {
            return Err(InfraError::Config("catalog.slot_prefix must not be empty".into()));
        }
        if self.catalog.slot_count == 0 {
            return Err(InfraError::Config("catalog.slot_count must be at least 1".into()));
        }
        if self.server.max_request_bytes == 0 {
            return Err(InfraError::Config("server.max_request_bytes must be at least 1".into()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(InfraError::Config(
                "server.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(InfraError::Config("database.max_connections must be at least 1".into()));
        }
        if self.metrics.enabled && self.metrics.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(InfraError::Config(format!(
                "metrics.listen '{}' is not a socket address",
                self.metrics.listen
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.address(), "0.0.0.0:5555");
        assert_eq!(
            config.database.connection_url(),
            "sqlite://parking_system.db?mode=rwc"
        );
        assert_eq!(config.catalog.labels().len(), 10);
    }

    #[test]
    fn partial_sections_are_merged_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 6000

            [catalog]
            slot_prefix = "B"
            slot_count = 3

            [database]
            url = "sqlite::memory:"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.catalog.labels(), vec!["B1", "B2", "B3"]);
        assert_eq!(config.database.connection_url(), "sqlite::memory:");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(AppConfig::from_toml("[catalog]\nslot_count = 0").is_err());
        assert!(AppConfig::from_toml("[catalog]\nslot_prefix = \"  \"").is_err());
        assert!(AppConfig::from_toml("[database]\nmax_connections = 0").is_err());
        assert!(AppConfig::from_toml("[server]\nport = \"high\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("parking-service-no-such-config.toml");
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }
}
