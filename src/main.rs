//! Block Duel Server
//!
//! Starts the authoritative loop on its own thread and serves TCP on the
//! main runtime until Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use block_duel::{GameLoop, GameServer, InMemoryStore, JsonFileStore, PlayerStore, ServerConfig, TICK_RATE, VERSION};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[arg(short, long, default_value = "7777")]
    port: u16,
    /// Loop ticks per second
    #[arg(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,
    /// Number of connection slots
    #[arg(long, default_value = "64")]
    pool_size: usize,
    /// Minimum delay between two bot moves
    #[arg(long, default_value = "1500")]
    bot_cooldown_ms: u64,
    /// JSON file for player records; in-memory when omitted
    #[arg(long)]
    store: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))?;
        Ok(ServerConfig {
            bind_addr,
            pool_size: self.pool_size,
            tick_rate: self.tick_rate.max(1),
            bot_cooldown: Duration::from_millis(self.bot_cooldown_ms),
            store_path: self.store,
            log_level: self.log_level,
            ..ServerConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Block Duel Server v{}", VERSION);
    info!("Tick Rate: {} Hz, {} connection slots", config.tick_rate, config.pool_size);

    let store: Box<dyn PlayerStore> = match &config.store_path {
        Some(path) => Box::new(
            JsonFileStore::open(path).with_context(|| format!("failed to load player store {}", path.display()))?,
        ),
        None => Box::new(InMemoryStore::new()),
    };

    let (actions_tx, actions_rx) = mpsc::unbounded_channel();
    let game_loop = GameLoop::new(config.clone(), store, actions_rx);
    let loop_handle = thread::Builder::new()
        .name("game-loop".to_string())
        .spawn(move || game_loop.run())
        .context("failed to spawn game loop thread")?;

    let server = GameServer::new(config.bind_addr, config.pool_size, actions_tx);
    tokio::select! {
        result = server.run() => result.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Ctrl+C received, shutting down"),
    }

    // The loop exits once the last action sender is gone
    server.shutdown();
    drop(server);
    match tokio::task::spawn_blocking(move || loop_handle.join()).await {
        Ok(Ok(())) => info!("Shutdown complete"),
        Ok(Err(_)) => error!("Game loop thread panicked"),
        Err(err) => error!(error = %err, "Failed to join game loop thread"),
    }
    Ok(())
}
