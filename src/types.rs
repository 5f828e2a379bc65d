use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type HeadersMap = BTreeMap<String, String>;

/// Maps an inbound URL to the URL providers match against
pub type UrlFilter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Maps a URL to a MIME type string
pub type MimeTypeResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Caller-side completion callback for one inbound load.
///
/// Invoked exactly once per `on_before_resource_load`, on the dispatch lane.
pub type LoadCallback = Box<dyn FnOnce(Resolution) + Send + 'static>;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier the hosting framework assigns to each inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Allocate a process-unique identifier
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque browser identifier, passed through to providers untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BrowserId(pub i32);

/// Opaque frame identifier, passed through to providers untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameId(pub i64);

/// Inbound resource request as seen by the manager and its providers
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    id: RequestId,
    url: String,
    method: String,
    headers: HeadersMap,
}

impl ResourceRequest {
    /// GET request for `url` with a freshly allocated identifier
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(RequestId::next(), url)
    }

    pub fn new(id: RequestId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            method: "GET".to_string(),
            headers: HeadersMap::new(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    pub fn headers(&self) -> &HeadersMap {
        &self.headers
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }
}

/// Synchronous answer of `on_before_resource_load`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValue {
    /// No provider is deciding anymore; the callback has already fired.
    Continue,
    /// A provider claimed the request and may still be deciding.
    ContinueAsync,
}

/// What the caller callback learns about a finished dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A handler is waiting in the pending map for this request id.
    Handled,
    /// Declined by every provider, stopped, or canceled.
    Unhandled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_request_defaults_to_get() {
        let mut request = ResourceRequest::get("http://test/a?x=1");
        assert_eq!(request.method(), "GET");
        assert_eq!(request.url(), "http://test/a?x=1");

        request.set_header("Accept", "text/html");
        request.set_method("HEAD");
        assert_eq!(request.method(), "HEAD");
        assert_eq!(request.headers().get("Accept").unwrap(), "text/html");
    }
}
