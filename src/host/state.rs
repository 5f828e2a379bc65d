use std::sync::Arc;

use crate::config::Config;
use crate::manager::ResourceManager;

#[derive(Clone)]
pub struct HostState {
    pub config: Arc<Config>,
    pub manager: ResourceManager,
}

impl HostState {
    /// Manager with every configured provider installed.
    /// Must run inside a Tokio runtime.
    pub fn from_config(config: Config) -> Self {
        let manager = ResourceManager::with_default_mime_type(&config.resources.default_mime_type);
        manager.register_providers(&config.providers);
        Self::new(config, manager)
    }

    pub fn new(config: Config, manager: ResourceManager) -> Self {
        Self {
            config: Arc::new(config),
            manager,
        }
    }

    /// Absolute URL for a request path and query
    pub fn resource_url(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.config.server.origin.trim_end_matches('/'),
            path_and_query
        )
    }
}
