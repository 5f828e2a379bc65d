//! Provider system for resmux
//!
//! A provider answers some subset of resource requests. The manager asks
//! providers in ascending order until one claims the request.
//!
//! ## Key Components
//!
//! - [`Provider`] - Trait implemented by every provider
//! - [`ContentProvider`] - One exact URL served from memory
//! - [`DirectoryProvider`] - URL prefix mapped onto a directory
//! - [`ArchiveProvider`] - URL prefix mapped onto an archive, loaded once
//! - [`EmbeddedProvider`] - URL prefix mapped onto compiled-in files
//!
//! ## Example
//!
//! ```rust,ignore
//! use resmux::providers::{Provider, ContentProvider};
//!
//! struct Teapot;
//!
//! impl Provider for Teapot {
//!     fn on_request(&self, request: Request) -> bool {
//!         if !request.url().ends_with("/teapot") {
//!             return false;
//!         }
//!         request.stop();
//!         true
//!     }
//! }
//!
//! manager.add_provider(Teapot, -10, "teapot");
//! ```

mod archive;
mod content;
mod directory;
mod embedded;
mod traits;

pub use archive::{ArchiveProvider, ArchiveReaderFactory};
pub use content::ContentProvider;
pub use directory::DirectoryProvider;
pub use embedded::EmbeddedProvider;
pub use traits::Provider;

/// URL prefix with exactly one trailing slash
pub(crate) fn normalize_url_path(url_path: impl Into<String>) -> String {
    let mut url_path = url_path.into();
    if !url_path.ends_with('/') {
        url_path.push('/');
    }
    url_path
}
