//! WebSocket Game Server
//!
//! Async WebSocket server for four-seat chess.
//! Decodes client frames and routes them to the game actors.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::core::ids::ClientId;
use crate::game::piece::MoveRequest;
use crate::game::player::Profile;
use crate::game::state::GameSettings;
use crate::network::broadcast::{
    CREATE_FAILED, JOIN_FAILED, LEAVE_FAILED, MOVE_FAILED, SEAT_CHANGE_FAILED, START_FAILED,
};
use crate::network::client::ClientHandle;
use crate::network::protocol::{
    ClientMessage, ErrorCode, ServerError, ServerMessage, WelcomeInfo,
};
use crate::network::session::{SessionError, SessionManager, DEFAULT_COMMAND_QUEUE};

/// How long a closing connection may spend flushing queued messages.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

const INVALID_MESSAGE: &str = "Invalid message";
const SET_NICK_FAILED: &str = "Failed to set nick";
const SHUTDOWN_REASON: &str = "Server shutting down";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Messages buffered per connection before it is dropped as too slow.
    pub outbound_buffer: usize,
    /// Commands buffered per game.
    pub command_queue: usize,
    /// Whether owners may start games with empty seats.
    pub can_start_before_full: bool,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            outbound_buffer: 64,
            command_queue: DEFAULT_COMMAND_QUEUE,
            can_start_before_full: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("CHESS4_BIND_ADDR", defaults.bind_addr),
            max_connections: env_or("CHESS4_MAX_CONNECTIONS", defaults.max_connections),
            outbound_buffer: env_or("CHESS4_OUTBOUND_BUFFER", defaults.outbound_buffer),
            command_queue: env_or("CHESS4_COMMAND_QUEUE", defaults.command_queue),
            can_start_before_full: std::env::var("CHESS4_START_BEFORE_FULL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.can_start_before_full),
            version: defaults.version,
        }
    }

    /// Settings applied to each new game.
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            can_start_before_full: self.can_start_before_full,
            ..GameSettings::default()
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

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
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Running games.
    sessions: Arc<SessionManager>,
    /// Open connections.
    connections: Arc<AtomicUsize>,
    /// Next connection id.
    next_client: AtomicU64,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let sessions = SessionManager::new(config.game_settings(), config.command_queue);

        Self {
            config,
            sessions: Arc::new(sessions),
            connections: Arc::new(AtomicUsize::new(0)),
            next_client: AtomicU64::new(1),
            shutdown_tx,
        }
    }

    /// Bind and run the server until [`GameServer::shutdown`].
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Accept connections from `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = self.admit() {
                                warn!("{}, rejecting {}", e, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
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

        self.sessions.shutdown(SHUTDOWN_REASON).await;
        Ok(())
    }

    fn admit(&self) -> Result<(), GameServerError> {
        if self.connections.load(Ordering::SeqCst) >= self.config.max_connections {
            return Err(GameServerError::ConnectionLimitReached);
        }
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let client_id = ClientId(self.next_client.fetch_add(1, Ordering::SeqCst));
        let sessions = self.sessions.clone();
        let config = self.config.clone();
        let connections = self.connections.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            if let Err(e) = Self::serve_connection(stream, client_id, sessions, config, shutdown_rx).await {
                error!("Connection {} ({}) failed: {}", client_id, addr, e);
            }
            connections.fetch_sub(1, Ordering::SeqCst);
            info!("Client {} ({}) cleaned up", client_id, addr);
        });
    }

    async fn serve_connection(
        stream: TcpStream,
        client_id: ClientId,
        sessions: Arc<SessionManager>,
        config: ServerConfig,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (client, mut outbound) = ClientHandle::channel(client_id, config.outbound_buffer);
        let mut profile = Profile::new(client.clone());

        // Spawn message sender task
        let mut sender_task = tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
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
        });

        client.deliver(ServerMessage::Welcome(WelcomeInfo {
            profile_id: profile.id.clone(),
            secret: profile.secret.clone(),
            server_version: config.version.clone(),
        }));

        let mut flush = true;
        let mut shutting_down = false;
        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match ClientMessage::from_json(&text) {
                                Ok(client_msg) => {
                                    Self::handle_client_message(client_msg, &mut profile, &sessions).await;
                                }
                                Err(e) => {
                                    debug!("Invalid message from {}: {}", client_id, e);
                                    reject_input(&client, "Invalid message format");
                                }
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            match MoveRequest::from_bytes(&data) {
                                Ok(request) => {
                                    Self::handle_client_message(
                                        ClientMessage::Move(request),
                                        &mut profile,
                                        &sessions,
                                    ).await;
                                }
                                Err(e) => {
                                    debug!("Invalid binary frame from {}: {}", client_id, e);
                                    reject_input(&client, "Invalid binary move");
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", client_id);
                            break;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error for {}: {}", client_id, e);
                            break;
                        }
                        _ => {}
                    }
                }
                _ = client.evicted() => {
                    warn!("Client {} evicted for falling behind", client_id);
                    flush = false;
                    break;
                }
                _ = shutdown_rx.recv() => {
                    // Seated players hear about shutdown from their game
                    if matches!(sessions.game_for_client(client_id).await, Err(SessionError::NotInGame)) {
                        client.deliver(ServerMessage::Shutdown {
                            reason: SHUTDOWN_REASON.to_string(),
                        });
                    }
                    shutting_down = true;
                    break;
                }
            }
        }

        if !shutting_down {
            match sessions.leave(client_id).await {
                Ok(removal) => debug!("{} left seat {} on disconnect", client_id, removal.seat),
                Err(SessionError::NotInGame) => {}
                Err(e) => warn!("Cleanup for {} failed: {}", client_id, e),
            }
        }

        // The sender task ends once every handle to the outbound buffer is gone
        drop(profile);
        drop(client);
        if !flush || tokio::time::timeout(FLUSH_TIMEOUT, &mut sender_task).await.is_err() {
            sender_task.abort();
        }

        Ok(())
    }

    /// Handle a client message.
    async fn handle_client_message(
        msg: ClientMessage,
        profile: &mut Profile,
        sessions: &SessionManager,
    ) {
        let client_id = profile.client_id();

        let (title, result) = match msg {
            ClientMessage::SetNick { nick } => {
                let nick = nick.trim();
                if nick.is_empty() {
                    profile.client.deliver(ServerMessage::Error(ServerError::new(
                        ErrorCode::InvalidInput,
                        SET_NICK_FAILED,
                        "Nick cannot be empty",
                    )));
                } else {
                    debug!("{} is now known as {}", client_id, nick);
                    profile.nick = nick.to_string();
                }
                return;
            }
            ClientMessage::ListGames => {
                let games = sessions.list_games().await;
                profile.client.deliver(ServerMessage::GameList { games });
                return;
            }
            ClientMessage::Ping { timestamp } => {
                profile.client.deliver(ServerMessage::Pong {
                    timestamp,
                    server_time: now_millis(),
                });
                return;
            }
            ClientMessage::CreateGame => (
                CREATE_FAILED,
                sessions.create_game(profile.clone()).await.map(|_| ()),
            ),
            ClientMessage::JoinGame { game_id } => (
                JOIN_FAILED,
                sessions.join_game(&game_id, profile.clone()).await.map(|_| ()),
            ),
            ClientMessage::StartGame => (
                START_FAILED,
                async {
                    sessions.game_for_client(client_id).await?.start(client_id).await?;
                    Ok::<(), SessionError>(())
                }
                .await,
            ),
            ClientMessage::Move(request) => (
                MOVE_FAILED,
                async {
                    let game = sessions.game_for_client(client_id).await?;
                    game.make_move(client_id, request).await?;
                    Ok::<(), SessionError>(())
                }
                .await,
            ),
            ClientMessage::ChangeSeat { seat } => (
                SEAT_CHANGE_FAILED,
                async {
                    let game = sessions.game_for_client(client_id).await?;
                    game.change_seat(client_id, seat).await?;
                    Ok::<(), SessionError>(())
                }
                .await,
            ),
            ClientMessage::LeaveGame => {
                let result = sessions.leave(client_id).await.map(|_| ());
                if result.is_ok() {
                    let games = sessions.list_games().await;
                    profile.client.deliver(ServerMessage::GameList { games });
                }
                (LEAVE_FAILED, result)
            }
        };

        if let Err(e) = result {
            debug!("{} for {}: {}", title, client_id, e);
            if let Some(payload) = e.payload(title) {
                profile.client.deliver(ServerMessage::Error(payload));
            }
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Get running game count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }
}

fn reject_input(client: &ClientHandle, message: &str) {
    client.deliver(ServerMessage::Error(ServerError::new(
        ErrorCode::InvalidInput,
        INVALID_MESSAGE,
        message,
    )));
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
