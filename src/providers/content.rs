use bytes::Bytes;

use super::Provider;
use crate::handler::StreamResourceHandler;
use crate::manager::Request;
use crate::stream::MemoryStream;

/// Serves one in-memory body for one exact URL
#[derive(Debug)]
pub struct ContentProvider {
    url: String,
    content: Bytes,
    mime_type: Option<String>,
}

impl ContentProvider {
    /// Without an explicit `mime_type`, each request's resolver decides it.
    pub fn new(url: impl Into<String>, content: impl Into<Bytes>, mime_type: Option<String>) -> Self {
        let url = url.into();
        debug_assert!(!url.is_empty(), "content provider needs a URL");

        Self {
            url,
            content: content.into(),
            mime_type: mime_type.filter(|m| !m.is_empty()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Provider for ContentProvider {
    fn on_request(&self, request: Request) -> bool {
        if request.url() != self.url {
            return false;
        }

        let mime_type = match &self.mime_type {
            Some(mime_type) => mime_type.clone(),
            None => request.mime_type_for(&self.url),
        };
        request.respond(StreamResourceHandler::new(
            mime_type,
            MemoryStream::new(self.content.clone()),
        ));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ResourceManager;
    use crate::providers::test_support::fetch;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_serves_exact_url_only() {
        let manager = ResourceManager::new();
        manager.add_content_provider("http://test/page.css", "body{}", None, 0, "");

        let (mime_type, body) = fetch(&manager, "http://test/page.css?v=3").await.unwrap();
        assert_eq!(mime_type, "text/css");
        assert_eq!(body, b"body{}");

        assert!(fetch(&manager, "http://test/page.css/extra").await.is_none());
        assert!(fetch(&manager, "http://test/other.css").await.is_none());
    }

    #[tokio::test]
    async fn test_explicit_mime_type_wins() {
        let manager = ResourceManager::new();
        manager.add_content_provider("http://test/data.txt", "[]", Some("application/json"), 0, "");

        let (mime_type, _) = fetch(&manager, "http://test/data.txt").await.unwrap();
        assert_eq!(mime_type, "application/json");
    }

    #[tokio::test]
    async fn test_resolver_change_reaches_later_requests() {
        let manager = ResourceManager::new();
        manager.add_content_provider("http://test/data", "{}", None, 0, "");

        let (mime_type, _) = fetch(&manager, "http://test/data").await.unwrap();
        assert_eq!(mime_type, "text/html");

        manager.set_mime_type_resolver(Some(Arc::new(|_: &str| "application/json".to_string())));
        let (mime_type, _) = fetch(&manager, "http://test/data").await.unwrap();
        assert_eq!(mime_type, "application/json");

        manager.set_mime_type_resolver(None);
        let (mime_type, _) = fetch(&manager, "http://test/data").await.unwrap();
        assert_eq!(mime_type, "text/html");
    }

    #[tokio::test]
    async fn test_serves_repeatedly() {
        let manager = ResourceManager::new();
        manager.add_provider(ContentProvider::new("http://test/a", "X", None), 0, "");

        for _ in 0..3 {
            let (_, body) = fetch(&manager, "http://test/a").await.unwrap();
            assert_eq!(body, b"X");
        }
    }
}
