use std::collections::HashMap;

use bytes::Bytes;

use super::{Provider, normalize_url_path};
use crate::handler::StreamResourceHandler;
use crate::manager::Request;
use crate::stream::MemoryStream;

/// Serves compiled-in files under a URL prefix
///
/// ```rust,ignore
/// let provider = EmbeddedProvider::new(
///     "http://app.local/",
///     &[("index.html", include_bytes!("../assets/index.html"))],
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedProvider {
    url_path: String,
    files: HashMap<&'static str, Bytes>,
}

impl EmbeddedProvider {
    pub fn new(url_path: impl Into<String>, files: &[(&'static str, &'static [u8])]) -> Self {
        Self {
            url_path: normalize_url_path(url_path),
            files: files
                .iter()
                .map(|&(name, data)| (name.trim_start_matches('/'), Bytes::from_static(data)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Provider for EmbeddedProvider {
    fn on_request(&self, request: Request) -> bool {
        let Some(data) = request
            .url()
            .strip_prefix(&self.url_path)
            .and_then(|name| self.files.get(name))
        else {
            return false;
        };

        request.respond(StreamResourceHandler::new(
            request.mime_type(),
            MemoryStream::new(data.clone()),
        ));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ResourceManager;
    use crate::providers::test_support::fetch;

    const FILES: &[(&str, &[u8])] = &[
        ("index.html", b"<main></main>" as &[u8]),
        ("/app.wasm", b"\0asm" as &[u8]),
    ];

    #[tokio::test]
    async fn test_serves_embedded_files() {
        let provider = EmbeddedProvider::new("http://app.local", FILES);
        assert_eq!(provider.len(), 2);

        let manager = ResourceManager::new();
        manager.add_provider(provider, 0, "embedded");

        let (mime_type, body) = fetch(&manager, "http://app.local/index.html").await.unwrap();
        assert_eq!(mime_type, "text/html");
        assert_eq!(body, b"<main></main>");

        let (mime_type, body) = fetch(&manager, "http://app.local/app.wasm").await.unwrap();
        assert_eq!(mime_type, "application/wasm");
        assert_eq!(body, b"\0asm");

        assert!(fetch(&manager, "http://app.local/missing.js").await.is_none());
    }
}
