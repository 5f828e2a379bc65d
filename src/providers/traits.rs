use std::sync::Arc;

use crate::manager::Request;

/// Provider trait for answering resource requests
///
/// Both methods run on the dispatch lane and must not block: post slow work
/// to [`Request::worker_lane`] and answer from there.
pub trait Provider: Send + Sync {
    /// Decide on `request`.
    ///
    /// Return false to decline right away. Return true to keep the decision,
    /// then answer exactly once through [`Request::continue_with`] or
    /// [`Request::stop`], now or later from any thread.
    fn on_request(&self, request: Request) -> bool;

    /// `request` was canceled while this provider was still deciding.
    /// Drop any reference to it; answering it again is a no-op.
    fn on_request_canceled(&self, _request: &Request) {}
}

impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn on_request(&self, request: Request) -> bool {
        (**self).on_request(request)
    }

    fn on_request_canceled(&self, request: &Request) {
        (**self).on_request_canceled(request)
    }
}
