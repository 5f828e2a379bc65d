use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::WeakUnboundedSender;
use tracing::{debug, warn};

use super::dispatcher::Command;
use super::registry::EntryKey;
use crate::handler::ResourceHandler;
use crate::lane::WorkerLane;
use crate::types::{
    BrowserId, FrameId, LoadCallback, MimeTypeResolver, Resolution, ResourceRequest, UrlFilter,
};

/// Non-owning link back to the dispatch lane.
///
/// Upgrading fails once every [`ResourceManager`](super::ResourceManager)
/// handle is gone.
pub(crate) type ManagerLink = WeakUnboundedSender<Command>;

/// Immutable per-request snapshot taken when dispatch starts
pub struct RequestParams {
    pub(crate) url: String,
    pub(crate) request: ResourceRequest,
    pub(crate) browser: BrowserId,
    pub(crate) frame: FrameId,
    pub(crate) url_filter: UrlFilter,
    pub(crate) mime_type_resolver: MimeTypeResolver,
    pub(crate) worker_lane: WorkerLane,
}

/// Cursor for one in-flight dispatch.
///
/// Owned by exactly one of: the dispatch lane, a [`Request`], or a command
/// in transit between them.
pub(crate) struct RequestState {
    pub(crate) serial: u64,
    manager: ManagerLink,
    callback: Option<LoadCallback>,
    pub(crate) params: Arc<RequestParams>,
    pub(crate) cursor: Option<EntryKey>,
}

impl RequestState {
    pub(crate) fn new(
        serial: u64,
        manager: ManagerLink,
        callback: LoadCallback,
        params: Arc<RequestParams>,
        cursor: EntryKey,
    ) -> Self {
        Self {
            serial,
            manager,
            callback: Some(callback),
            params,
            cursor: Some(cursor),
        }
    }

    /// Answer the caller and consume the state
    pub(crate) fn finish(mut self, resolution: Resolution) {
        if let Some(callback) = self.callback.take() {
            callback(resolution);
        }
    }

    /// Hand the state back to the dispatch lane.
    ///
    /// If the lane is gone the state is dropped, which answers the caller.
    fn post(self, command: impl FnOnce(RequestState) -> Command) {
        let Some(sender) = self.manager.upgrade() else {
            debug!(serial = self.serial, "Manager is gone, dropping request state");
            return;
        };
        // A failed send drops the command and with it the state.
        let _ = sender.send(command(self));
    }
}

impl Drop for RequestState {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            warn!(
                serial = self.serial,
                url = %self.params.url,
                "Request state dropped unanswered, reporting unhandled"
            );
            callback(Resolution::Unhandled);
        }
    }
}

/// Dispatch handle passed to [`Provider::on_request`](crate::providers::Provider::on_request).
///
/// Cloneable and `Send`: a provider may answer from any thread. The first of
/// [`continue_with`](Self::continue_with) or [`stop`](Self::stop) wins; later
/// calls are no-ops. Dropping the last clone without answering declines.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

struct RequestInner {
    params: Arc<RequestParams>,
    state: Mutex<Option<RequestState>>,
}

impl Request {
    pub(crate) fn new(state: RequestState) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                params: Arc::clone(&state.params),
                state: Mutex::new(Some(state)),
            }),
        }
    }

    /// Filtered URL providers match against
    pub fn url(&self) -> &str {
        &self.inner.params.url
    }

    /// The unfiltered inbound request
    pub fn request(&self) -> &ResourceRequest {
        &self.inner.params.request
    }

    pub fn browser(&self) -> BrowserId {
        self.inner.params.browser
    }

    pub fn frame(&self) -> FrameId {
        self.inner.params.frame
    }

    /// URL filter in effect when this request was dispatched
    pub fn url_filter(&self) -> &UrlFilter {
        &self.inner.params.url_filter
    }

    /// MIME resolver in effect when this request was dispatched
    pub fn mime_type_resolver(&self) -> &MimeTypeResolver {
        &self.inner.params.mime_type_resolver
    }

    /// MIME type of the filtered URL
    pub fn mime_type(&self) -> String {
        self.mime_type_for(self.url())
    }

    pub fn mime_type_for(&self, url: &str) -> String {
        (self.inner.params.mime_type_resolver)(url)
    }

    /// Lane for blocking work on behalf of this request
    pub fn worker_lane(&self) -> &WorkerLane {
        &self.inner.params.worker_lane
    }

    /// Claim with `handler`, or decline with `None` so the next provider is
    /// asked.
    pub fn continue_with(&self, handler: Option<Box<dyn ResourceHandler>>) {
        let Some(state) = self.take_state() else {
            debug!(url = %self.url(), "Request already answered, ignoring continue");
            return;
        };
        state.post(|state| Command::Continue { state, handler });
    }

    pub fn respond(&self, handler: impl ResourceHandler + 'static) {
        self.continue_with(Some(Box::new(handler)));
    }

    pub fn decline(&self) {
        self.continue_with(None);
    }

    /// End dispatch without a handler and without asking further providers
    pub fn stop(&self) {
        let Some(state) = self.take_state() else {
            debug!(url = %self.url(), "Request already answered, ignoring stop");
            return;
        };
        state.post(|state| Command::Stop { state });
    }

    /// True until the request has been answered or canceled
    pub fn has_state(&self) -> bool {
        self.lock_state().is_some()
    }

    pub(crate) fn take_state(&self) -> Option<RequestState> {
        self.lock_state().take()
    }

    pub(crate) fn downgrade(&self) -> WeakRequest {
        WeakRequest(Arc::downgrade(&self.inner))
    }

    /// True if both handles refer to the same dispatch attempt
    pub fn ptr_eq(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<RequestState>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url())
            .field("id", &self.request().id())
            .field("has_state", &self.has_state())
            .finish()
    }
}

impl Drop for RequestInner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(state) = state {
            debug!(url = %self.params.url, "Request dropped unanswered, declining");
            state.post(|state| Command::Continue {
                state,
                handler: None,
            });
        }
    }
}

/// Non-owning reference kept by a provider entry for each attachment
#[derive(Clone, Default)]
pub(crate) struct WeakRequest(Weak<RequestInner>);

impl WeakRequest {
    pub(crate) fn upgrade(&self) -> Option<Request> {
        self.0.upgrade().map(|inner| Request { inner })
    }
}
