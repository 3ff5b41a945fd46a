use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "livebridge",
    version,
    about = "Push live results updates to websocket subscribers"
)]
struct Args {
    /// Path to the TOML config file (default: ./livebridge.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Results file to watch, overriding `watch.path`
    #[arg(long)]
    watch: Option<PathBuf>,

    /// Listen address for the status page and websocket, overriding `server.bind`
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Only log warnings and errors
    #[arg(long, short)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();
    livebridge_core::init_logging(args.json_logs, args.quiet);
    info!(event = "server.start_started");

    let exit_code = match run(args) {
        Ok(()) => {
            info!(event = "server.start_completed");
            0
        }
        Err(e) => {
            error!(event = "server.start_failed", error = %e);
            eprintln!("livebridge: {}", e);
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = livebridge_core::load_config(args.config.as_deref())?;
    if let Some(path) = args.watch {
        config.watch.path = path;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(livebridge_server::run_server(config))?;
    Ok(())
}
