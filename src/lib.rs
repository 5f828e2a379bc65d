pub mod archive;
pub mod config;
pub mod handler;
pub mod host;
pub mod lane;
pub mod manager;
pub mod observability;
pub mod providers;
pub mod stream;
pub mod types;
