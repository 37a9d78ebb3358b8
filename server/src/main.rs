use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::game_manager::LoggingObserver;
use server::network::Server;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "22023")]
    port: u16,

    /// Maximum concurrent connections
    #[arg(long, default_value = "256")]
    max_clients: usize,

    /// Seats per game
    #[arg(long, default_value = "10")]
    max_players: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    client_timeout_secs: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            max_clients: args.max_clients,
            max_players: args.max_players,
            client_timeout: Duration::from_secs(args.client_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let config = ServerConfig::from(&args);
    info!(
        "Starting server on {} ({} clients, {} players per game)",
        config.bind_addr, config.max_clients, config.max_players
    );

    let mut server = Server::new(config, Arc::new(LoggingObserver)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
