//! Server configuration and environment variable handling

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use warden_rbac::{RbacConfig, RbacError};

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading configuration file
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvError(String),
}

impl From<RbacError> for ConfigError {
    fn from(err: RbacError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_address: String,

    pub database: DatabaseConfig,

    pub logging: LoggingConfig,

    pub rbac: RbacConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            rbac: RbacConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            ConfigError::ValidationError(format!("Invalid bind address '{}': {}", self.bind_address, e))
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.socket_addr()?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if matches!(self.database.url.as_deref(), Some("")) {
            return Err(ConfigError::ValidationError(
                "database.url cannot be empty".to_string(),
            ));
        }

        self.rbac.validate()?;
        Ok(())
    }
}

/// Policy store database. Without a URL the server keeps policies in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `warden_rbac=debug,info`
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "WARDEN".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<ServerConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml_str(&content)
    }

    pub fn from_yaml_str(&self, yaml: &str) -> ConfigResult<ServerConfig> {
        let mut config: ServerConfig = serde_yaml::from_str(yaml)?;
        self.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<ServerConfig> {
        let mut config = ServerConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<ServerConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut ServerConfig) -> ConfigResult<()> {
        if let Ok(bind) = self.get_env_var("BIND_ADDRESS") {
            config.bind_address = bind;
        }

        if let Ok(url) = self.get_env_var("DATABASE_URL") {
            config.database.url = Some(url);
        }

        if let Ok(level) = self.get_env_var("LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(id) = self.get_env_var("SUPER_ADMIN_ID") {
            config.rbac.super_admin_user_id = id
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid SUPER_ADMIN_ID: {}", e)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert!(config.database.url.is_none());
        assert_eq!(config.rbac.super_admin_user_id, 1);
    }

    #[test]
    fn test_yaml_with_partial_sections() {
        let loader = ConfigLoader::with_prefix("WARDEN_TEST_YAML");
        let config = loader
            .from_yaml_str(
                r#"
bind_address: "0.0.0.0:9000"
database:
  url: "sqlite::memory:"
logging:
  level: debug
"#,
            )
            .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_env_overrides() {
        let prefix = "WARDEN_TEST_ENV";
        std::env::set_var(format!("{}_BIND_ADDRESS", prefix), "127.0.0.1:7001");
        std::env::set_var(format!("{}_SUPER_ADMIN_ID", prefix), "42");

        let config = ConfigLoader::with_prefix(prefix).from_env().unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:7001");
        assert_eq!(config.rbac.super_admin_user_id, 42);

        std::env::set_var(format!("{}_SUPER_ADMIN_ID", prefix), "root");
        assert!(matches!(
            ConfigLoader::with_prefix(prefix).from_env(),
            Err(ConfigError::EnvError(_))
        ));

        std::env::remove_var(format!("{}_BIND_ADDRESS", prefix));
        std::env::remove_var(format!("{}_SUPER_ADMIN_ID", prefix));
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = ServerConfig {
            bind_address: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rbac_errors_surface_as_validation() {
        let loader = ConfigLoader::with_prefix("WARDEN_TEST_RBAC");
        let result = loader.from_yaml_str(
            r#"
rbac:
  super_admin_user_id: 0
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
