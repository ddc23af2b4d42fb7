//! CLI for SubPub
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `client`: run the command-line client in `sub`, `pub` or `both` mode

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use subpub::client::{self, Mode};
use subpub::config::load_config;
use subpub::service::PubSubService;
use subpub::transport::websocket::start_websocket_server;
use subpub::utils::{logging, signal};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "subpub", version, about = "In-process pub/sub broker over WebSocket")]
enum Command {
    /// Start the WebSocket server
    Server {
        /// Path to the config file (JSON or TOML)
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
    },
    /// Run the command-line client
    Client {
        /// Server address, `host:port` or a ws:// URL
        #[arg(long, default_value = "localhost:50051")]
        addr: String,
        /// Client mode
        #[arg(long, value_enum, default_value_t = Mode::Both)]
        mode: Mode,
        /// Subscription/publish key
        #[arg(long, default_value = "test-key")]
        key: String,
        /// Message to publish
        #[arg(long, default_value = "Hello!")]
        message: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    match Command::parse() {
        Command::Server { config } => {
            if let Err(e) = run_server(&config).await {
                // config and logging setup fail before a subscriber exists
                eprintln!("Server failed: {e}");
                std::process::exit(1);
            }
        }
        Command::Client {
            addr,
            mode,
            key,
            message,
        } => {
            if let Err(e) = logging::init("info", None) {
                eprintln!("Failed to initialize logging: {e}");
            }
            if let Err(e) = client::run(&addr, mode, &key, &message).await {
                error!("Client failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run_server(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    logging::init(&config.log.level, config.log.file.as_deref())?;

    let service = PubSubService::default();
    let shutdown = async {
        if let Err(e) = signal::wait_for_shutdown_signal().await {
            error!("Failed to listen for shutdown signals: {e}");
        }
    };

    start_websocket_server(&config.server.addr(), service.clone(), shutdown).await?;

    info!("Initiating graceful shutdown...");
    let deadline = Duration::from_secs(config.server.shutdown_timeout_secs);
    match service.shutdown(deadline).await {
        Ok(()) => info!("Server stopped gracefully"),
        Err(e) => warn!("Shutdown timeout exceeded, forcing server stop: {e}"),
    }

    Ok(())
}
