//! Configuration management for resmux
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use resmux::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `RESMUX__<section>__<key>`
//!
//! Examples:
//! - `RESMUX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `RESMUX__SERVER__CHUNK_SIZE=16384`
//! - `RESMUX__RESOURCES__DEFAULT_MIME_TYPE=text/plain`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/resmux.toml`.
//! This can be overridden using the `RESMUX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, ProviderConfig, ProviderKind, ResourcesConfig, ServerConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`RESMUX__*`)
    /// 2. TOML file (default: `config/resmux.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a
    /// provider entry is incomplete.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("resmux.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:8080"
origin = "http://resmux.local"
chunk_size = 65536

[resources]
default_mime_type = "text/plain"

[[providers]]
kind = "content"
url = "http://resmux.local/a"
content = "X"
mime_type = "text/plain"
identifier = "static"

[[providers]]
kind = "archive"
url = "http://resmux.local/bundle"
path = "bundle.tar"
order = 10
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.resources.default_mime_type, "text/plain");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].kind, ProviderKind::Archive);
        assert_eq!(config.providers[1].order, 10);
    }

    #[test]
    fn test_validation_catches_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("resmux.toml");

        let toml_content = r#"
[[providers]]
kind = "directory"
url = "http://resmux.local/"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MissingPath { .. })
        ));
    }
}
