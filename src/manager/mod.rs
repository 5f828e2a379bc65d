//! Resource manager: routes inbound resource requests through an ordered
//! chain of providers
//!
//! [`ResourceManager`] is a cheap, cloneable handle. Every call is posted to a
//! single dispatch lane task that owns the provider registry, so mutations
//! are applied in call order and never race with dispatch. When the last
//! handle is dropped the lane stops every in-flight request and exits.
//!
//! ```no_run
//! # async fn demo() {
//! use resmux::manager::ResourceManager;
//! use resmux::types::{BrowserId, FrameId, ResourceRequest};
//!
//! let manager = ResourceManager::new();
//! manager.add_content_provider("http://app.local/", "<h1>hi</h1>", Some("text/html"), 0, "");
//!
//! let request = ResourceRequest::get("http://app.local/");
//! let handler = manager.load(BrowserId(1), FrameId(1), request).await;
//! assert!(handler.is_some());
//! # }
//! ```

mod dispatcher;
pub mod filters;
mod registry;
mod request;

pub use request::{Request, RequestParams};

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tracing::warn;

use crate::config::{ProviderConfig, ProviderKind};
use crate::handler::ResourceHandler;
use crate::lane::WorkerLane;
use crate::observability::{Metrics, MetricsSnapshot};
use crate::providers::{ArchiveProvider, ContentProvider, DirectoryProvider, Provider};
use crate::types::{
    BrowserId, FrameId, MimeTypeResolver, RequestId, Resolution, ResourceRequest, ReturnValue,
    UrlFilter,
};
use dispatcher::{Command, Dispatcher};
use filters::FALLBACK_MIME_TYPE;

#[derive(Clone)]
pub struct ResourceManager {
    commands: UnboundedSender<Command>,
    metrics: Arc<Metrics>,
}

impl ResourceManager {
    /// Spawn the dispatch lane on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_default_mime_type(FALLBACK_MIME_TYPE)
    }

    /// Like [`new`](Self::new), with a different fallback for URLs whose
    /// extension is unknown
    pub fn with_default_mime_type(default_mime_type: impl Into<String>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Dispatcher::new(
            commands.downgrade(),
            default_mime_type.into(),
            WorkerLane::current(),
            Arc::clone(&metrics),
        );
        tokio::spawn(dispatcher.run(receiver));

        Self { commands, metrics }
    }

    /// Serve `content` for requests whose filtered URL equals `url`.
    /// The MIME type is resolved from `url` when not given.
    pub fn add_content_provider(
        &self,
        url: impl Into<String>,
        content: impl Into<Bytes>,
        mime_type: Option<&str>,
        order: i32,
        identifier: impl Into<String>,
    ) {
        let provider = ContentProvider::new(url, content, mime_type.map(str::to_string));
        self.add_provider(provider, order, identifier);
    }

    /// Serve files below `directory` for URLs starting with `url_path`
    pub fn add_directory_provider(
        &self,
        url_path: impl Into<String>,
        directory: impl Into<PathBuf>,
        order: i32,
        identifier: impl Into<String>,
    ) {
        self.add_provider(DirectoryProvider::new(url_path, directory), order, identifier);
    }

    /// Serve members of the archive at `archive_path` for URLs starting with
    /// `url_path`. The archive is loaded once, on first use.
    pub fn add_archive_provider(
        &self,
        url_path: impl Into<String>,
        archive_path: impl Into<PathBuf>,
        password: Option<&str>,
        order: i32,
        identifier: impl Into<String>,
    ) {
        let provider = ArchiveProvider::new(url_path, archive_path, password.map(str::to_string));
        self.add_provider(provider, order, identifier);
    }

    /// Register `provider`. Lower `order` is asked first; equal orders keep
    /// insertion order.
    pub fn add_provider(
        &self,
        provider: impl Provider + 'static,
        order: i32,
        identifier: impl Into<String>,
    ) {
        self.send(Command::AddProvider {
            provider: Box::new(provider),
            order,
            identifier: identifier.into(),
        });
    }

    /// Remove every provider registered under `identifier`.
    ///
    /// Requests a removed provider is still deciding are declined and move on
    /// to the next provider.
    pub fn remove_providers(&self, identifier: impl Into<String>) {
        self.send(Command::RemoveProviders {
            identifier: identifier.into(),
        });
    }

    pub fn remove_all_providers(&self) {
        self.send(Command::RemoveAllProviders);
    }

    /// Replace the URL filter; `None` restores the default. Only affects
    /// requests that start after the change.
    pub fn set_url_filter(&self, filter: Option<UrlFilter>) {
        self.send(Command::SetUrlFilter(filter));
    }

    /// Replace the MIME type resolver; `None` restores the default. Only
    /// affects requests that start after the change.
    pub fn set_mime_type_resolver(&self, resolver: Option<MimeTypeResolver>) {
        self.send(Command::SetMimeTypeResolver(resolver));
    }

    /// Install providers from configuration
    pub fn register_providers(&self, providers: &[ProviderConfig]) {
        for config in providers {
            let url = config.url.clone();
            let path = config.path.clone().unwrap_or_default();
            match config.kind {
                ProviderKind::Content => self.add_content_provider(
                    url,
                    config.content.clone().unwrap_or_default(),
                    config.mime_type.as_deref(),
                    config.order,
                    config.identifier.clone(),
                ),
                ProviderKind::Directory => {
                    self.add_directory_provider(url, path, config.order, config.identifier.clone())
                }
                ProviderKind::Archive => self.add_archive_provider(
                    url,
                    path,
                    config.password.as_deref(),
                    config.order,
                    config.identifier.clone(),
                ),
            }
        }
    }

    /// Start dispatching `request`.
    ///
    /// `callback` runs exactly once on the dispatch lane: with
    /// [`Resolution::Handled`] once a handler is waiting for
    /// [`get_resource_handler`](Self::get_resource_handler), otherwise with
    /// [`Resolution::Unhandled`]. [`ReturnValue::Continue`] means it has
    /// already run.
    pub async fn on_before_resource_load(
        &self,
        browser: BrowserId,
        frame: FrameId,
        request: ResourceRequest,
        callback: impl FnOnce(Resolution) + Send + 'static,
    ) -> ReturnValue {
        let (reply, answer) = oneshot::channel();
        let command = Command::BeginRequest {
            browser,
            frame,
            request,
            callback: Box::new(callback),
            reply,
        };

        if let Err(mpsc::error::SendError(command)) = self.commands.send(command) {
            warn!("Dispatch lane is gone, passing request through");
            if let Command::BeginRequest { callback, .. } = command {
                callback(Resolution::Unhandled);
            }
            return ReturnValue::Continue;
        }

        answer.await.unwrap_or(ReturnValue::Continue)
    }

    /// Take the handler claimed for `request`, at most once
    pub async fn get_resource_handler(
        &self,
        _browser: BrowserId,
        _frame: FrameId,
        request: &ResourceRequest,
    ) -> Option<Box<dyn ResourceHandler>> {
        self.take_handler(request.id()).await
    }

    /// Dispatch `request` and wait for the handler, if any provider claims it.
    ///
    /// Cancel-safe: the claimed handler is taken on the lane right after the
    /// claim, so dropping this future never strands it.
    pub async fn load(
        &self,
        browser: BrowserId,
        frame: FrameId,
        request: ResourceRequest,
    ) -> Option<Box<dyn ResourceHandler>> {
        let id = request.id();
        let link = self.commands.downgrade();
        let (reply, handler) = oneshot::channel();
        self.on_before_resource_load(browser, frame, request, move |resolution| {
            if resolution != Resolution::Handled {
                return;
            }
            // Queued behind the insert; a failed reply drops the handler.
            if let Some(commands) = link.upgrade() {
                let _ = commands.send(Command::TakeHandler { id, reply });
            }
        })
        .await;

        handler.await.ok().flatten()
    }

    /// Wait until every command posted before this call has been applied
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        self.send(Command::Flush(reply));
        let _ = done.await;
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn take_handler(&self, id: RequestId) -> Option<Box<dyn ResourceHandler>> {
        let (reply, handler) = oneshot::channel();
        self.send(Command::TakeHandler { id, reply });
        handler.await.ok().flatten()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Dispatch lane is gone, dropping command");
        }
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
