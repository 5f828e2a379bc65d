//! HTTP host serving resources through a [`ResourceManager`](crate::manager::ResourceManager)
//!
//! Every path except `/health` is rebuilt into an absolute URL under the
//! configured origin and dispatched through the provider chain.

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;

pub use error::HostError;
pub use server::{router, run};
pub use state::HostState;
