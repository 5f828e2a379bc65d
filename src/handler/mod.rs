//! Resource handler contract consumed by the hosting framework
//!
//! A handler produced by a provider is parked in the manager's pending map
//! until the host asks for it. The host then drives it in three steps:
//!
//! 1. [`ResourceHandler::process_request`] - accept or refuse the request
//! 2. [`ResourceHandler::response_head`] - status, MIME type and headers
//! 3. [`ResourceHandler::read_response`] - body bytes in caller-sized chunks
//!
//! [`StreamResourceHandler`] is the reference implementation over a
//! [`ResourceStream`](crate::stream::ResourceStream).

mod stream;

pub use stream::StreamResourceHandler;

use bon::Builder;
use tokio::sync::oneshot;
use tracing::warn;

use crate::types::{HeadersMap, ResourceRequest};

/// Fired by a handler once a pending read can make progress
pub type ResumeCallback = Box<dyn FnOnce() + Send + 'static>;

/// Response metadata reported before any body bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status_code: u16,
    pub status_text: String,
    pub mime_type: String,
    pub headers: HeadersMap,
    /// `None` when the length is unknown and the body is streamed
    pub content_length: Option<u64>,
}

/// Result of one `read_response` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n > 0` bytes were written to the caller buffer; more may follow.
    Data(usize),
    /// Nothing available yet. The resume callback fires when the caller
    /// should read again.
    Pending,
    /// End of body.
    Complete,
}

impl ReadOutcome {
    /// `(bytes_read, has_more)` view of the outcome
    pub fn as_parts(self) -> (usize, bool) {
        match self {
            ReadOutcome::Data(n) => (n, true),
            ReadOutcome::Pending => (0, true),
            ReadOutcome::Complete => (0, false),
        }
    }
}

pub trait ResourceHandler: Send {
    /// Accept the request. Returning false fails the load.
    fn process_request(&mut self, request: &ResourceRequest) -> bool;

    fn response_head(&self) -> ResponseHead;

    /// Fill `out` with the next body bytes. `out` must not be empty.
    fn read_response(&mut self, out: &mut [u8], resume: ResumeCallback) -> ReadOutcome;

    fn cancel(&mut self) {}
}

/// Status line, MIME type and headers for a [`StreamResourceHandler`]
#[derive(Debug, Clone, Builder)]
pub struct ResponseMetadata {
    #[builder(default = 200)]
    pub status_code: u16,
    #[builder(into, default = String::from("OK"))]
    pub status_text: String,
    #[builder(into)]
    pub mime_type: String,
    #[builder(default)]
    pub headers: HeadersMap,
}

impl ResponseMetadata {
    /// `200 OK` with no extra headers
    pub fn ok(mime_type: impl Into<String>) -> Self {
        Self::builder().mime_type(mime_type).build()
    }
}

/// Drain a handler into memory, waiting out pending reads
pub async fn read_to_end(handler: &mut dyn ResourceHandler, chunk_size: usize) -> Vec<u8> {
    let mut body = Vec::new();
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        let (tx, rx) = oneshot::channel();
        let resume: ResumeCallback = Box::new(move || {
            let _ = tx.send(());
        });

        match handler.read_response(&mut chunk, resume) {
            ReadOutcome::Data(n) => body.extend_from_slice(&chunk[..n]),
            ReadOutcome::Pending => {
                if rx.await.is_err() {
                    warn!(read = body.len(), "Handler dropped its resume callback, body truncated");
                    break;
                }
            }
            ReadOutcome::Complete => break,
        }
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let metadata = ResponseMetadata::ok("text/plain");
        assert_eq!(metadata.status_code, 200);
        assert_eq!(metadata.status_text, "OK");
        assert_eq!(metadata.mime_type, "text/plain");
        assert!(metadata.headers.is_empty());
    }

    #[test]
    fn test_metadata_builder_overrides() {
        let headers: HeadersMap = [("Cache-Control".to_string(), "no-store".to_string())].into();
        let metadata = ResponseMetadata::builder()
            .status_code(404)
            .status_text("Not Found")
            .mime_type("text/html")
            .headers(headers)
            .build();

        assert_eq!(metadata.status_code, 404);
        assert_eq!(metadata.status_text, "Not Found");
        assert_eq!(metadata.headers.get("Cache-Control").unwrap(), "no-store");
    }

    #[test]
    fn test_read_outcome_parts() {
        assert_eq!(ReadOutcome::Data(3).as_parts(), (3, true));
        assert_eq!(ReadOutcome::Pending.as_parts(), (0, true));
        assert_eq!(ReadOutcome::Complete.as_parts(), (0, false));
    }
}
