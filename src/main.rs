mod cli;

use std::io::Write;

use clap::Parser;
use cli::{Cli, Commands, FetchArgs};
use resmux::config::Config;
use resmux::handler::read_to_end;
use resmux::host::{self, HostState};
use resmux::observability::init_tracing;
use resmux::types::{BrowserId, FrameId, ResourceRequest};

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = load_config(args.config)?;
            host::run(config, args.address).await?
        }
        Commands::Fetch(args) => fetch(args).await?,
    }

    Ok(())
}

fn load_config(path: Option<std::path::PathBuf>) -> Result<Config, AnyError> {
    let config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

async fn fetch(args: FetchArgs) -> Result<(), AnyError> {
    let config = load_config(args.config)?;
    let chunk_size = config.server.chunk_size;
    let state = HostState::from_config(config);

    let request = ResourceRequest::get(&args.url);
    let mut handler = state
        .manager
        .load(BrowserId::default(), FrameId::default(), request.clone())
        .await
        .ok_or_else(|| format!("no provider handled {}", args.url))?;

    if !handler.process_request(&request) {
        return Err(format!("handler refused {}", args.url).into());
    }

    let body = read_to_end(handler.as_mut(), chunk_size).await;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;
    Ok(())
}
