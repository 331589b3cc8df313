//! Maze Rush Server
//!
//! Starts the engine task, the persistence worker and the WebSocket
//! listener, then serves until Ctrl-C.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use maze_rush::{
    Engine, EngineConfig, GameServer, MemoryRunStore, ModeCatalog, PersistenceHandle,
    RunStore, ServerConfig, VERSION,
    network::RateLimiter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Maze Rush Server v{}", VERSION);

    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: {}, tick_rate={}, max_connections={}",
        config.socket_addr(),
        config.tick_rate,
        config.max_connections
    );

    let store = Arc::new(MemoryRunStore::new());
    let high_score = match store.load_high_score() {
        Ok(best) => best.map(|h| (h.score, h.skin)),
        Err(e) => {
            warn!("Could not load high score: {}", e);
            None
        }
    };
    let (persistence, persistence_task) = PersistenceHandle::spawn(store);

    let catalog = ModeCatalog::builtin();
    info!("Modes: {}", catalog.ids().collect::<Vec<_>>().join(", "));

    let engine = Engine::new(EngineConfig {
        catalog,
        tick_rate: config.tick_rate,
        version: config.version.clone(),
        gate: Box::new(RateLimiter::default()),
        persistence,
        high_score,
    });
    let (commands, command_rx) = mpsc::channel(config.channel_capacity);
    let engine_task = tokio::spawn(engine.run(command_rx));

    let server = Arc::new(GameServer::new(config, commands));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        signal_server.shutdown();
    });

    server.run().await?;

    // Dropping the last command sender stops the engine once connections drain
    drop(server);
    if let Err(e) = engine_task.await {
        error!("Engine task failed: {}", e);
    }
    if let Err(e) = persistence_task.await {
        error!("Persistence task failed: {}", e);
    }

    info!("Server stopped");
    Ok(())
}
