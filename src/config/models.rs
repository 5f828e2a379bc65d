use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// HTTP host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Scheme and authority prepended to request paths before dispatch
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Bytes requested per `read_response` call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            origin: default_origin(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_origin() -> String {
    "http://resmux.local".to_string()
}

fn default_chunk_size() -> usize {
    64 * 1024
}

/// Manager-wide resource settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourcesConfig {
    /// MIME type for URLs without a known extension
    #[serde(default = "default_mime_type")]
    pub default_mime_type: String,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            default_mime_type: default_mime_type(),
        }
    }
}

fn default_mime_type() -> String {
    "text/html".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Content,
    Directory,
    Archive,
}

/// One provider registered at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Exact URL for `content`, URL prefix otherwise
    pub url: String,
    /// Body served by a `content` provider
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Directory or archive file
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub identifier: String,
}
