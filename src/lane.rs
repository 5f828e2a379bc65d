//! Blocking-capable worker lane
//!
//! File opens, archive loads and blocking stream reads are posted here so the
//! dispatch lane never waits on I/O.

use std::time::Duration;

use tokio::runtime::Handle;

/// Handle for posting blocking work
///
/// Backed by the Tokio blocking pool of the runtime it was created on. When
/// created outside a runtime, tasks run on a dedicated thread instead.
#[derive(Debug, Clone)]
pub struct WorkerLane {
    handle: Option<Handle>,
}

impl WorkerLane {
    /// Worker lane bound to the current runtime, if any
    pub fn current() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Run `task` on the worker lane as soon as possible
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.handle {
            Some(handle) => {
                handle.spawn_blocking(task);
            }
            None => {
                std::thread::spawn(task);
            }
        }
    }

    /// Run `task` on the worker lane once `delay` has elapsed
    pub fn post_delayed<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.handle {
            Some(handle) => {
                let blocking = handle.clone();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    blocking.spawn_blocking(task);
                });
            }
            None => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    task();
                });
            }
        }
    }
}

impl Default for WorkerLane {
    fn default() -> Self {
        Self::current()
    }
}
