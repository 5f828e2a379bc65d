//! Observability (tracing setup, dispatch counters)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honoring `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second init (tests, embedding hosts) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Metrics handle for dispatch counters
#[derive(Debug, Default)]
pub struct Metrics {
    requests_started: AtomicU64,
    requests_handled: AtomicU64,
    requests_unhandled: AtomicU64,
    requests_canceled: AtomicU64,
    providers_added: AtomicU64,
    providers_removed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_started(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "requests_started", "Metric incremented");
    }

    pub fn request_handled(&self) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "requests_handled", "Metric incremented");
    }

    pub fn request_unhandled(&self) {
        self.requests_unhandled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "requests_unhandled", "Metric incremented");
    }

    pub fn request_canceled(&self) {
        self.requests_canceled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "requests_canceled", "Metric incremented");
    }

    pub fn provider_added(&self) {
        self.providers_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn providers_removed(&self, count: usize) {
        self.providers_removed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            requests_unhandled: self.requests_unhandled.load(Ordering::Relaxed),
            requests_canceled: self.requests_canceled.load(Ordering::Relaxed),
            providers_added: self.providers_added.load(Ordering::Relaxed),
            providers_removed: self.providers_removed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_started: u64,
    pub requests_handled: u64,
    pub requests_unhandled: u64,
    pub requests_canceled: u64,
    pub providers_added: u64,
    pub providers_removed: u64,
}

impl MetricsSnapshot {
    /// Providers still registered, including ones waiting on attachments
    pub fn providers_active(&self) -> u64 {
        self.providers_added.saturating_sub(self.providers_removed)
    }
}
