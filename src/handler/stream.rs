use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{ReadOutcome, ResourceHandler, ResponseHead, ResponseMetadata, ResumeCallback};
use crate::lane::WorkerLane;
use crate::stream::{ResourceStream, fill};
use crate::types::ResourceRequest;

type SharedStream = Arc<Mutex<Box<dyn ResourceStream>>>;

/// Serves a [`ResourceStream`] with fixed response metadata.
///
/// Non-blocking streams are read directly into the caller buffer. Streams
/// that may block are read on the worker lane into an internal buffer that
/// later calls drain; the buffer alternates strictly between the two lanes.
pub struct StreamResourceHandler {
    metadata: ResponseMetadata,
    stream: SharedStream,
    blocking: Option<BlockingReads>,
}

impl StreamResourceHandler {
    /// `200 OK` handler for `stream`
    pub fn new(mime_type: impl Into<String>, stream: impl ResourceStream + 'static) -> Self {
        Self::with_metadata(ResponseMetadata::ok(mime_type), Box::new(stream))
    }

    pub fn with_metadata(metadata: ResponseMetadata, stream: Box<dyn ResourceStream>) -> Self {
        let blocking = stream.may_block().then(|| BlockingReads {
            slot: Arc::new(Mutex::new(BufferSlot::Empty)),
            lane: WorkerLane::current(),
        });

        Self {
            metadata,
            stream: Arc::new(Mutex::new(stream)),
            blocking,
        }
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Override the lane used for blocking reads
    pub fn with_worker_lane(mut self, lane: WorkerLane) -> Self {
        if let Some(blocking) = self.blocking.as_mut() {
            blocking.lane = lane;
        }
        self
    }
}

impl ResourceHandler for StreamResourceHandler {
    fn process_request(&mut self, _request: &ResourceRequest) -> bool {
        // Nothing to open up front; headers are available immediately.
        true
    }

    fn response_head(&self) -> ResponseHead {
        ResponseHead {
            status_code: self.metadata.status_code,
            status_text: self.metadata.status_text.clone(),
            mime_type: self.metadata.mime_type.clone(),
            headers: self.metadata.headers.clone(),
            content_length: None,
        }
    }

    fn read_response(&mut self, out: &mut [u8], resume: ResumeCallback) -> ReadOutcome {
        debug_assert!(!out.is_empty(), "read_response needs a non-empty buffer");

        match &self.blocking {
            Some(blocking) => blocking.read(out, resume, &self.stream),
            None => {
                let mut stream = lock(&self.stream);
                match fill(&mut **stream, out) {
                    0 => ReadOutcome::Complete,
                    n => ReadOutcome::Data(n),
                }
            }
        }
    }

    fn cancel(&mut self) {
        // Worker reads are short and not interruptible; a finished fill is
        // simply never drained.
    }
}

struct BlockingReads {
    slot: Arc<Mutex<BufferSlot>>,
    lane: WorkerLane,
}

enum BufferSlot {
    /// No fill has been requested yet.
    Empty,
    /// Owned by the calling lane.
    Ready(Buffer),
    /// Owned by the worker lane until its fill completes.
    Worker,
}

impl BlockingReads {
    fn read(&self, out: &mut [u8], resume: ResumeCallback, stream: &SharedStream) -> ReadOutcome {
        let mut slot = lock(&self.slot);
        let current = std::mem::replace(&mut *slot, BufferSlot::Worker);

        match current {
            BufferSlot::Worker => {
                debug_assert!(false, "buffer read while the worker lane owns it");
                ReadOutcome::Pending
            }
            BufferSlot::Ready(mut buffer) if buffer.can_read() => {
                let n = buffer.write_to(out);
                *slot = BufferSlot::Ready(buffer);
                ReadOutcome::Data(n)
            }
            BufferSlot::Ready(buffer) if buffer.is_empty() => {
                // The last fill produced nothing.
                *slot = BufferSlot::Ready(buffer);
                ReadOutcome::Complete
            }
            previous => {
                let mut buffer = match previous {
                    BufferSlot::Ready(buffer) => buffer,
                    _ => Buffer::default(),
                };
                drop(slot);

                let requested = out.len();
                let slot = Arc::clone(&self.slot);
                let stream = Arc::clone(stream);
                self.lane.post(move || {
                    buffer.reset(requested);
                    let written = buffer.read_from(&mut **lock(&stream));
                    trace!(requested, written, "Worker lane filled response buffer");
                    *lock(&slot) = BufferSlot::Ready(buffer);
                    resume();
                });

                ReadOutcome::Pending
            }
        }
    }
}

/// Lazily grown byte buffer filled on the worker lane.
///
/// Invariant: `read <= written <= requested <= data.len()`.
#[derive(Debug, Default)]
struct Buffer {
    data: Vec<u8>,
    requested: usize,
    written: usize,
    read: usize,
}

impl Buffer {
    fn reset(&mut self, requested: usize) {
        if self.data.len() < requested {
            self.data.resize(requested, 0);
        }
        self.requested = requested;
        self.written = 0;
        self.read = 0;
    }

    fn is_empty(&self) -> bool {
        self.written == 0
    }

    fn can_read(&self) -> bool {
        self.read < self.written
    }

    fn write_to(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.written - self.read);
        out[..n].copy_from_slice(&self.data[self.read..self.read + n]);
        self.read += n;
        debug_assert!(self.read <= self.written);
        n
    }

    fn read_from(&mut self, stream: &mut dyn ResourceStream) -> usize {
        self.written += fill(stream, &mut self.data[self.written..self.requested]);
        debug_assert!(self.written <= self.requested && self.requested <= self.data.len());
        self.written
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{CallbackStream, MemoryStream};
    use bytes::Bytes;
    use std::io;
    use tokio::sync::oneshot;

    fn noop() -> ResumeCallback {
        Box::new(|| {})
    }

    fn resume_channel() -> (ResumeCallback, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Box::new(move || {
                let _ = tx.send(());
            }),
            rx,
        )
    }

    #[test]
    fn test_default_headers() {
        let handler = StreamResourceHandler::new("text/html", MemoryStream::new("abc"));
        let head = handler.response_head();

        assert_eq!(head.status_code, 200);
        assert_eq!(head.status_text, "OK");
        assert_eq!(head.mime_type, "text/html");
        assert!(head.headers.is_empty());
        assert_eq!(head.content_length, None);
    }

    #[test]
    fn test_custom_metadata() {
        let metadata = ResponseMetadata::builder()
            .status_code(201)
            .status_text("Created")
            .mime_type("application/json")
            .headers([("X-Test".to_string(), "1".to_string())].into())
            .build();
        let handler =
            StreamResourceHandler::with_metadata(metadata, Box::new(MemoryStream::new("{}")));
        let head = handler.response_head();

        assert_eq!(head.status_code, 201);
        assert_eq!(head.status_text, "Created");
        assert_eq!(head.headers.get("X-Test").unwrap(), "1");
    }

    #[test]
    fn test_process_request_always_accepts() {
        let mut handler = StreamResourceHandler::new("text/plain", MemoryStream::new("x"));
        assert!(handler.process_request(&ResourceRequest::get("http://test/x")));
    }

    #[test]
    fn test_direct_reads_fill_caller_buffer() {
        let mut handler = StreamResourceHandler::new(
            "text/plain",
            MemoryStream::new(Bytes::from_static(b"0123456789")),
        );
        let mut out = [0u8; 4];

        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Data(4));
        assert_eq!(&out, b"0123");
        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Data(4));
        assert_eq!(&out, b"4567");
        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Data(2));
        assert_eq!(&out[..2], b"89");
        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Complete);
    }

    #[test]
    fn test_direct_read_of_empty_stream_completes() {
        let mut handler = StreamResourceHandler::new("text/plain", MemoryStream::new(""));
        let mut out = [0u8; 8];
        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Complete);
    }

    fn blocking_stream(data: &'static [u8]) -> impl ResourceStream {
        let mut remaining = data;
        CallbackStream::new(move |buf: &mut [u8]| {
            let n = buf.len().min(remaining.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            remaining = &remaining[n..];
            Ok::<usize, io::Error>(n)
        })
        .blocking()
    }

    #[tokio::test]
    async fn test_blocking_reads_go_through_worker_lane() {
        let mut handler = StreamResourceHandler::new("text/plain", blocking_stream(b"abcdef"));
        let mut out = [0u8; 4];

        // First read schedules a fill and reports "more to come".
        let (resume, rx) = resume_channel();
        assert_eq!(handler.read_response(&mut out, resume), ReadOutcome::Pending);
        rx.await.unwrap();

        // Drained from the buffer without touching the worker lane.
        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Data(4));
        assert_eq!(&out, b"abcd");

        // Buffer exhausted: another fill.
        let (resume, rx) = resume_channel();
        assert_eq!(handler.read_response(&mut out, resume), ReadOutcome::Pending);
        rx.await.unwrap();
        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Data(2));
        assert_eq!(&out[..2], b"ef");

        // Final fill finds nothing.
        let (resume, rx) = resume_channel();
        assert_eq!(handler.read_response(&mut out, resume), ReadOutcome::Pending);
        rx.await.unwrap();
        assert_eq!(handler.read_response(&mut out, noop()), ReadOutcome::Complete);
    }

    #[tokio::test]
    async fn test_blocking_buffer_drains_in_smaller_chunks() {
        let mut handler = StreamResourceHandler::new("text/plain", blocking_stream(b"abcdef"));

        let mut big = [0u8; 8];
        let (resume, rx) = resume_channel();
        assert_eq!(handler.read_response(&mut big, resume), ReadOutcome::Pending);
        rx.await.unwrap();

        let mut small = [0u8; 4];
        assert_eq!(handler.read_response(&mut small, noop()), ReadOutcome::Data(4));
        assert_eq!(&small, b"abcd");
        assert_eq!(handler.read_response(&mut small, noop()), ReadOutcome::Data(2));
        assert_eq!(&small[..2], b"ef");
    }

    #[tokio::test]
    async fn test_read_to_end_collects_blocking_body() {
        let mut handler = StreamResourceHandler::new("text/plain", blocking_stream(b"streamed body"));
        let body = crate::handler::read_to_end(&mut handler, 3).await;
        assert_eq!(body, b"streamed body");
    }

    #[test]
    fn test_buffer_counters() {
        let mut buffer = Buffer::default();
        assert!(buffer.is_empty());
        assert!(!buffer.can_read());

        buffer.reset(4);
        let mut stream = MemoryStream::new("xyz");
        assert_eq!(buffer.read_from(&mut stream), 3);
        assert!(buffer.can_read());

        let mut out = [0u8; 2];
        assert_eq!(buffer.write_to(&mut out), 2);
        assert_eq!(buffer.write_to(&mut out), 1);
        assert!(!buffer.can_read());
        assert!(!buffer.is_empty());

        // Shrinking requests keep the allocation.
        buffer.reset(2);
        assert_eq!(buffer.data.len(), 4);
        assert!(buffer.is_empty());
    }
}
