use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "RESMUX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/resmux.toml";
const ENV_PREFIX: &str = "RESMUX";
const ENV_SEPARATOR: &str = "__";

/// Load `.env` into the process environment, then read the file named by
/// `RESMUX_CONFIG` (default `config/resmux.toml`) through
/// [`load_from_sources`].
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Struct defaults, overlaid by `config_path` when it exists, overlaid by
/// `RESMUX__SECTION__KEY` variables. Values set through `.env` are ordinary
/// environment variables by this point.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(config_path));
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "No configuration file, using defaults and environment overrides"
        );
    }

    // RESMUX__SERVER__CHUNK_SIZE=4096 sets server.chunk_size
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.server.origin, "http://resmux.local");
        assert_eq!(config.server.chunk_size, 65536);
        assert_eq!(config.resources.default_mime_type, "text/html");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_load_providers_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
chunk_size = 4096

[[providers]]
kind = "content"
url = "http://resmux.local/a"
content = "X"

[[providers]]
kind = "directory"
url = "http://resmux.local/static"
path = "public"
order = -10
identifier = "static"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.chunk_size, 4096);

        assert_eq!(config.providers.len(), 2);
        let content = &config.providers[0];
        assert_eq!(content.kind, ProviderKind::Content);
        assert_eq!(content.content.as_deref(), Some("X"));
        assert_eq!(content.order, 0);
        assert_eq!(content.identifier, "");

        let directory = &config.providers[1];
        assert_eq!(directory.kind, ProviderKind::Directory);
        assert_eq!(directory.path.as_deref(), Some(std::path::Path::new("public")));
        assert_eq!(directory.order, -10);
        assert_eq!(directory.identifier, "static");
    }

    #[test]
    fn test_malformed_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[server\nchunk_size = ").unwrap();

        assert!(load_from_sources(config_path).is_err());
    }

    #[test]
    fn test_unknown_provider_kind_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[[providers]]
kind = "ftp"
url = "ftp://x/"
            "#,
        )
        .unwrap();

        assert!(load_from_sources(config_path).is_err());
    }
}
