//! The dispatch lane
//!
//! A single task owns the [`Dispatcher`]: the provider registry, the pending
//! handler map and the active filters. Everything else talks to it through
//! [`Command`]s, so `&mut Dispatcher` doubles as proof of being on the lane.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::filters::{default_url_filter, mime_type_resolver_with_fallback};
use super::registry::ProviderRegistry;
use super::request::{ManagerLink, Request, RequestParams, RequestState};
use crate::handler::ResourceHandler;
use crate::lane::WorkerLane;
use crate::observability::Metrics;
use crate::providers::Provider;
use crate::types::{
    BrowserId, FrameId, LoadCallback, MimeTypeResolver, RequestId, Resolution, ResourceRequest,
    ReturnValue, UrlFilter,
};

pub(crate) enum Command {
    AddProvider {
        provider: Box<dyn Provider>,
        order: i32,
        identifier: String,
    },
    RemoveProviders {
        identifier: String,
    },
    RemoveAllProviders,
    SetUrlFilter(Option<UrlFilter>),
    SetMimeTypeResolver(Option<MimeTypeResolver>),
    BeginRequest {
        browser: BrowserId,
        frame: FrameId,
        request: ResourceRequest,
        callback: LoadCallback,
        reply: oneshot::Sender<ReturnValue>,
    },
    Continue {
        state: RequestState,
        handler: Option<Box<dyn ResourceHandler>>,
    },
    Stop {
        state: RequestState,
    },
    TakeHandler {
        id: RequestId,
        reply: oneshot::Sender<Option<Box<dyn ResourceHandler>>>,
    },
    Flush(oneshot::Sender<()>),
}

/// How attachments of a removed provider are finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    /// Decline, letting later providers answer
    Continue,
    /// End dispatch with no handler
    Stop,
}

pub(crate) struct Dispatcher {
    registry: ProviderRegistry,
    pending_handlers: HashMap<RequestId, Box<dyn ResourceHandler>>,
    url_filter: UrlFilter,
    mime_type_resolver: MimeTypeResolver,
    default_mime_type: String,
    link: ManagerLink,
    worker_lane: WorkerLane,
    metrics: Arc<Metrics>,
    next_serial: u64,
}

impl Dispatcher {
    pub(crate) fn new(
        link: ManagerLink,
        default_mime_type: String,
        worker_lane: WorkerLane,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry: ProviderRegistry::new(),
            pending_handlers: HashMap::new(),
            url_filter: default_url_filter(),
            mime_type_resolver: mime_type_resolver_with_fallback(default_mime_type.clone()),
            default_mime_type,
            link,
            worker_lane,
            metrics,
            next_serial: 0,
        }
    }

    /// Serve commands until every manager handle is dropped, then tear down
    pub(crate) async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        debug!("Dispatch lane started");
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        self.shutdown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::AddProvider {
                provider,
                order,
                identifier,
            } => {
                debug!(order, identifier = %identifier, "Adding provider");
                self.registry.insert(provider, order, identifier);
                self.metrics.provider_added();
            }
            Command::RemoveProviders { identifier } => {
                self.remove_where(Removal::Continue, |id| id == identifier);
            }
            Command::RemoveAllProviders => self.remove_where(Removal::Continue, |_| true),
            Command::SetUrlFilter(filter) => {
                self.url_filter = filter.unwrap_or_else(default_url_filter);
            }
            Command::SetMimeTypeResolver(resolver) => {
                self.mime_type_resolver = resolver.unwrap_or_else(|| {
                    mime_type_resolver_with_fallback(self.default_mime_type.clone())
                });
            }
            Command::BeginRequest {
                browser,
                frame,
                request,
                callback,
                reply,
            } => {
                let value = self.begin_request(browser, frame, request, callback);
                let _ = reply.send(value);
            }
            Command::Continue { state, handler } => self.continue_request(state, handler),
            Command::Stop { state } => self.stop_request(state),
            Command::TakeHandler { id, reply } => {
                let handler = self.pending_handlers.remove(&id);
                if handler.is_none() {
                    debug!(request_id = %id, "No pending handler");
                }
                let _ = reply.send(handler);
            }
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn begin_request(
        &mut self,
        browser: BrowserId,
        frame: FrameId,
        request: ResourceRequest,
        callback: LoadCallback,
    ) -> ReturnValue {
        self.metrics.request_started();

        let Some(first) = self.registry.first_valid() else {
            debug!(url = %request.url(), "No providers, passing request through");
            self.metrics.request_unhandled();
            callback(Resolution::Unhandled);
            return ReturnValue::Continue;
        };

        let params = Arc::new(RequestParams {
            url: (self.url_filter)(request.url()),
            request,
            browser,
            frame,
            url_filter: Arc::clone(&self.url_filter),
            mime_type_resolver: Arc::clone(&self.mime_type_resolver),
            worker_lane: self.worker_lane.clone(),
        });

        let serial = self.next_serial;
        self.next_serial += 1;
        let state = RequestState::new(serial, self.link.clone(), callback, params, first);

        if self.send_request(state) {
            ReturnValue::ContinueAsync
        } else {
            ReturnValue::Continue
        }
    }

    /// Offer the request to providers from the cursor on.
    ///
    /// Returns true once a provider takes ownership of the decision, false if
    /// the chain ran out and the caller has been answered.
    fn send_request(&mut self, mut state: RequestState) -> bool {
        loop {
            let Some(key) = state.cursor else {
                debug_assert!(false, "dispatch with the cursor past the end");
                self.finish(state, Resolution::Unhandled);
                return false;
            };

            let serial = state.serial;
            let request = Request::new(state);
            let Some(entry) = self.registry.attach(key, serial, request.downgrade()) else {
                debug_assert!(false, "cursor points at a missing provider entry");
                return match request.take_state() {
                    Some(state) => {
                        self.finish(state, Resolution::Unhandled);
                        false
                    }
                    None => true,
                };
            };

            debug!(
                url = %request.url(),
                provider = %entry.identifier,
                "Offering request to provider"
            );
            if entry.provider.on_request(request.clone()) {
                return true;
            }

            // Declined synchronously, unless the provider already answered.
            let Some(declined) = request.take_state() else {
                return true;
            };
            state = declined;

            if !self.increment_provider(&mut state) {
                debug!(url = %state.params.url, "No provider handled the request");
                self.finish(state, Resolution::Unhandled);
                return false;
            }
        }
    }

    fn continue_request(&mut self, mut state: RequestState, handler: Option<Box<dyn ResourceHandler>>) {
        match handler {
            Some(handler) => {
                let id = state.params.request.id();
                debug!(request_id = %id, url = %state.params.url, "Request handled");
                if self.pending_handlers.insert(id, handler).is_some() {
                    warn!(request_id = %id, "Replaced a pending handler that was never taken");
                }
                self.detach(&mut state);
                self.finish(state, Resolution::Handled);
            }
            None => {
                if self.increment_provider(&mut state) {
                    self.send_request(state);
                } else {
                    debug!(url = %state.params.url, "No provider handled the request");
                    self.finish(state, Resolution::Unhandled);
                }
            }
        }
    }

    fn stop_request(&mut self, mut state: RequestState) {
        debug!(url = %state.params.url, "Request stopped");
        self.detach(&mut state);
        self.finish(state, Resolution::Unhandled);
    }

    /// Detach from the current entry and move to the next selectable one
    fn increment_provider(&mut self, state: &mut RequestState) -> bool {
        let Some(current) = state.cursor else {
            return false;
        };
        self.detach(state);
        state.cursor = self.registry.next_valid(current);
        state.cursor.is_some()
    }

    fn detach(&mut self, state: &mut RequestState) {
        let Some(key) = state.cursor.take() else {
            return;
        };
        if self.registry.detach(key, state.serial) {
            debug!("Erased deletion-pending provider after its last request");
        }
    }

    fn finish(&self, state: RequestState, resolution: Resolution) {
        match resolution {
            Resolution::Handled => self.metrics.request_handled(),
            Resolution::Unhandled => self.metrics.request_unhandled(),
        }
        state.finish(resolution);
    }

    fn remove_where(&mut self, removal: Removal, matches: impl Fn(&str) -> bool) {
        // Mark every match first so continued requests cannot land on a
        // provider that is about to go.
        let (removed, attached) = self
            .registry
            .remove_where(|entry| matches(&entry.identifier));
        if removed == 0 {
            return;
        }
        self.metrics.providers_removed(removed);
        debug!(removed, in_flight = attached.len(), ?removal, "Removed providers");

        for (key, weak) in attached {
            let Some(request) = weak.upgrade() else {
                continue;
            };
            // Requests already answered are on their way back to the lane.
            let Some(state) = request.take_state() else {
                continue;
            };

            if let Some(entry) = self.registry.get(key) {
                entry.provider.on_request_canceled(&request);
            }
            self.metrics.request_canceled();

            match removal {
                Removal::Continue => self.continue_request(state, None),
                Removal::Stop => self.stop_request(state),
            }
        }
    }

    fn shutdown(&mut self) {
        self.remove_where(Removal::Stop, |_| true);
        if !self.pending_handlers.is_empty() {
            debug!(count = self.pending_handlers.len(), "Dropping untaken handlers");
            self.pending_handlers.clear();
        }
        if !self.registry.is_empty() {
            debug!(remaining = self.registry.len(), "Dropping deletion-pending providers");
        }
        info!("Dispatch lane stopped");
    }
}
