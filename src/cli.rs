use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "resmux")]
#[command(about = "Resource routing through ordered providers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve configured providers over HTTP
    Serve(ServeArgs),
    /// Resolve one URL and write the body to stdout
    Fetch(FetchArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Configuration file (defaults to RESMUX_CONFIG or config/resmux.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to, overriding the configuration
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Absolute URL to resolve
    pub url: String,

    /// Configuration file (defaults to RESMUX_CONFIG or config/resmux.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
