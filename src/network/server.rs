//! WebSocket Game Server
//!
//! Accepts WebSocket connections, decodes JSON client messages and forwards
//! them to the engine task. Each connection gets a bounded outbound queue
//! drained by its own sender task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::game::player::PlayerId;
use crate::network::engine::Command;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// Engine task is gone.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Decrements the live connection count when a connection task ends.
struct ConnectionSlot(Arc<AtomicUsize>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Engine command queue.
    commands: mpsc::Sender<Command>,
    /// Live connections.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server feeding `commands`.
    pub fn new(config: ServerConfig, commands: mpsc::Sender<Command>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            commands,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind to the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = self.admit(stream, addr) {
                                warn!("Rejecting {}: {}", addr, e);
                            }
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    fn admit(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), GameServerError> {
        if self.commands.is_closed() {
            return Err(GameServerError::Internal("engine stopped".to_string()));
        }
        let previous = self.connections.fetch_add(1, Ordering::SeqCst);
        let slot = ConnectionSlot(self.connections.clone());
        if previous >= self.config.max_connections {
            tokio::spawn(async move {
                let _slot = slot;
                if let Err(e) = reject_connection(stream).await {
                    debug!("Rejected connection {} errored: {}", addr, e);
                }
            });
            return Err(GameServerError::ConnectionLimitReached);
        }

        debug!("New connection from {}", addr);
        let commands = self.commands.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let capacity = self.config.channel_capacity;

        tokio::spawn(async move {
            let _slot = slot;
            if let Err(e) = handle_connection(stream, addr, commands, shutdown_rx, capacity).await {
                debug!("Connection {} ended with error: {}", addr, e);
            }
        });
        Ok(())
    }

    /// Signal the server to shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get current connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Tell a client the server is full, then close.
async fn reject_connection(stream: TcpStream) -> Result<(), GameServerError> {
    let mut ws_stream = accept_async(stream).await?;
    let error = ServerMessage::error(ErrorCode::ServerFull, "Server is full");
    let text = error
        .to_json()
        .map_err(|e| GameServerError::Internal(e.to_string()))?;
    ws_stream.send(Message::Text(text)).await?;
    ws_stream.close(None).await?;
    Ok(())
}

/// Drive one WebSocket connection until it closes.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: mpsc::Sender<Command>,
    mut shutdown_rx: broadcast::Receiver<()>,
    capacity: usize,
) -> Result<(), GameServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(capacity);

    let player = PlayerId::generate();
    commands
        .send(Command::Connect { player, tx: msg_tx.clone() })
        .await
        .map_err(|_| GameServerError::Internal("engine stopped".to_string()))?;
    info!(player = %player.short(), %addr, "Client connected");

    // Spawn message sender task
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let message = match ClientMessage::from_json(&text) {
                            Ok(m) => m,
                            Err(e) => {
                                debug!("Invalid message from {}: {}", addr, e);
                                let _ = msg_tx.try_send(ServerMessage::error(
                                    ErrorCode::InvalidMessage,
                                    "Invalid message format",
                                ));
                                continue;
                            }
                        };
                        if commands.send(Command::Client { player, message }).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let _ = msg_tx.try_send(ServerMessage::error(
                            ErrorCode::InvalidMessage,
                            "Binary frames are not supported",
                        ));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", addr, e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    let _ = commands.send(Command::Disconnect { player }).await;
    drop(msg_tx);
    // Flushes whatever the engine queued before it dropped our sender
    let _ = sender_task.await;

    info!(player = %player.short(), %addr, "Client cleaned up");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::game::mode::ModeCatalog;
    use crate::network::engine::{Engine, EngineConfig};
    use crate::network::limits::RateLimiter;
    use crate::storage::PersistenceHandle;

    fn start_engine() -> mpsc::Sender<Command> {
        let (persistence, _jobs) = PersistenceHandle::channel();
        let engine = Engine::new(EngineConfig {
            catalog: ModeCatalog::builtin(),
            tick_rate: 60,
            version: "test".to_string(),
            gate: Box::new(RateLimiter::default()),
            persistence,
            high_score: None,
        });
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(engine.run(rx));
        tx
    }

    async fn next_message<S>(ws: &mut S) -> ServerMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out")
                .expect("stream closed")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let server = Arc::new(GameServer::new(ServerConfig::default(), start_engine()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let running = server.clone();
        let task = tokio::spawn(async move { running.serve(listener).await });
        // Let the accept loop subscribe before signalling
        tokio::time::sleep(Duration::from_millis(100)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let config = ServerConfig { max_connections: 0, ..Default::default() };
        let server = Arc::new(GameServer::new(config, start_engine()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let running = server.clone();
        tokio::spawn(async move { running.serve(listener).await });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        match next_message(&mut ws).await {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::ServerFull),
            other => panic!("unexpected {:?}", other),
        }
        server.shutdown();
    }

    #[tokio::test]
    async fn test_client_flow() {
        let server = Arc::new(GameServer::new(ServerConfig::default(), start_engine()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let running = server.clone();
        tokio::spawn(async move { running.serve(listener).await });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();

        match next_message(&mut ws).await {
            ServerMessage::Welcome { modes, .. } => assert!(modes.contains(&"speedrun".to_string())),
            other => panic!("unexpected {:?}", other),
        }

        ws.send(Message::Text("not json".into())).await.unwrap();
        match next_message(&mut ws).await {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::InvalidMessage),
            other => panic!("unexpected {:?}", other),
        }

        ws.send(Message::Text(r#"{"type":"selectMode","mode":"speedrun"}"#.into()))
            .await
            .unwrap();
        loop {
            if let ServerMessage::ModeSelected { solo, max_levels, .. } = next_message(&mut ws).await {
                assert!(solo);
                assert_eq!(max_levels, Some(10));
                break;
            }
        }

        let _ = ws.close(None).await;
        server.shutdown();
    }
}
