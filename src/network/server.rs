//! WebSocket Duel Server
//!
//! Async transport in front of the shared engine. Each connection
//! authenticates once, then sends one JSON request per frame and gets one
//! reply per request. Engine events are fanned out to every authenticated
//! connection.
//!
//! ```text
//!   TcpListener ──accept──▶ connection task ──▶ Dispatcher ──▶ SharedEngine
//!                               ▲    │                │
//!                               │    └── reply ◀──────┘
//!                               └──── broadcast<DuelEvent> ◀── drain_events
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::ids::AccountId;
use crate::engine::config::{env_number, ConfigError};
use crate::engine::SharedEngine;
use crate::game::error::ErrorCode;
use crate::game::events::DuelEvent;
use crate::network::auth::{authenticate, AuthConfig};
use crate::network::protocol::{AuthResult, ClientMessage, ErrorInfo, ServerMessage};

/// Capacity of the event fan-out channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Idle connections are closed after this long without a frame.
    pub idle_timeout: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            version: crate::VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from `DUEL_BIND_ADDR`, `DUEL_MAX_CONNECTIONS` and
    /// `DUEL_IDLE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match std::env::var("DUEL_BIND_ADDR") {
            Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                var: "DUEL_BIND_ADDR",
                value: raw,
            })?,
            Err(_) => defaults.bind_addr,
        };

        Ok(Self {
            bind_addr,
            max_connections: env_number("DUEL_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
            idle_timeout: env_number("DUEL_IDLE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            version: defaults.version,
        })
    }
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Bad configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Per-connection state.
#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    /// Account proven by the auth token.
    pub account: Option<AccountId>,
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Routes requests to the engine and publishes the resulting events.
#[derive(Clone)]
pub struct Dispatcher {
    engine: SharedEngine,
    auth: AuthConfig,
    version: String,
    events_tx: broadcast::Sender<DuelEvent>,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(engine: SharedEngine, auth: AuthConfig, version: String) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { engine, auth, version, events_tx }
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<DuelEvent> {
        self.events_tx.subscribe()
    }

    /// Engine handle.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Handle one request and produce its reply.
    pub async fn handle(&self, session: &mut ClientSession, msg: ClientMessage) -> ServerMessage {
        let msg = match msg {
            ClientMessage::Auth { token, client_version } => {
                return self.handle_auth(session, &token, &client_version);
            }
            ClientMessage::Ping { timestamp } => {
                return ServerMessage::Pong { timestamp, server_time: now_millis() };
            }
            other => other,
        };

        let Some(caller) = session.account else {
            return ServerMessage::Error(ErrorInfo::new(
                ErrorCode::NotAuthenticated,
                "must authenticate first",
            ));
        };

        let reply = self.route(caller, msg).await;
        self.publish().await;
        reply
    }

    fn handle_auth(&self, session: &mut ClientSession, token: &str, client_version: &str) -> ServerMessage {
        match authenticate(token, &self.auth) {
            Ok(account) => {
                session.account = Some(account);
                info!(account = %account.short(), client_version, "client authenticated");
                ServerMessage::AuthResult(AuthResult {
                    success: true,
                    account: Some(account),
                    error: None,
                    server_version: self.version.clone(),
                })
            }
            Err(e) => {
                warn!(error = %e, "authentication failed");
                ServerMessage::AuthResult(AuthResult {
                    success: false,
                    account: None,
                    error: Some(e.to_string()),
                    server_version: self.version.clone(),
                })
            }
        }
    }

    async fn route(&self, caller: AccountId, msg: ClientMessage) -> ServerMessage {
        let engine = &self.engine;
        let result = match msg {
            ClientMessage::StartGame { pieces } => engine
                .start_game(caller, pieces)
                .await
                .map(|game_id| ServerMessage::GameStarted { game_id }),

            ClientMessage::AgentCommit { game_id, commit_hash } => engine
                .agent_commit(caller, game_id, commit_hash)
                .await
                .map(|round| ServerMessage::Committed { game_id, round }),

            ClientMessage::PlayerMove { game_id, action, piece_index } => engine
                .player_move(caller, game_id, action, piece_index)
                .await
                .map(|result| ServerMessage::Moved { game_id, result }),

            ClientMessage::AgentReveal { game_id, action, secret } => engine
                .agent_reveal(caller, game_id, action, secret)
                .await
                .map(|result| ServerMessage::Resolved { game_id, result }),

            ClientMessage::ClaimRefund { game_id } => engine
                .claim_refund(caller, game_id)
                .await
                .map(|amount| ServerMessage::RefundClaimed { game_id, amount }),

            ClientMessage::WhoseTurn { game_id } => engine
                .whose_turn(game_id)
                .await
                .map(|view| ServerMessage::turn(game_id, view)),

            ClientMessage::GetGame { game_id } => engine
                .get_game(game_id)
                .await
                .map(|game| ServerMessage::Game { game }),

            ClientMessage::GetGameActions { game_id } => engine
                .game_actions(game_id)
                .await
                .map(|actions| ServerMessage::Actions { game_id, actions }),

            ClientMessage::GetTurnStatus { game_id } => engine
                .turn_details(game_id)
                .await
                .map(|details| ServerMessage::TurnStatus { game_id, details }),

            ClientMessage::GetActiveGame { player } => {
                let player = player.unwrap_or(caller);
                let game_id = engine.active_game(player).await;
                Ok(ServerMessage::ActiveGame { player, game_id })
            }

            ClientMessage::GetPlayerGames { player } => {
                let player = player.unwrap_or(caller);
                let games = engine.games_of(player).await;
                Ok(ServerMessage::PlayerGames { player, games })
            }

            ClientMessage::SetAgent { agent, authorized } => engine
                .set_agent_whitelist(caller, agent, authorized)
                .await
                .map(|()| ServerMessage::Ack),

            ClientMessage::CancelGame { game_id } => engine
                .cancel_game(caller, game_id)
                .await
                .map(|()| ServerMessage::Ack),

            // Handled before routing.
            ClientMessage::Auth { .. } | ClientMessage::Ping { .. } => Ok(ServerMessage::Ack),
        };

        result.unwrap_or_else(|e| {
            debug!(caller = %caller.short(), error = %e, "request rejected");
            ServerMessage::from_error(&e)
        })
    }

    /// Move pending engine events onto the broadcast channel.
    async fn publish(&self) {
        for event in self.engine.drain_events().await {
            // No subscribers is fine.
            let _ = self.events_tx.send(event);
        }
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// Connected client bookkeeping.
struct ConnectedClient {
    account: Option<AccountId>,
    last_activity: Instant,
}

/// The duel server.
pub struct DuelServer {
    config: ServerConfig,
    dispatcher: Dispatcher,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DuelServer {
    /// Create a server over a shared engine.
    pub fn new(config: ServerConfig, auth: AuthConfig, engine: SharedEngine) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let dispatcher = Dispatcher::new(engine, auth, config.version.clone());

        Self {
            config,
            dispatcher,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Request dispatcher (shared with every connection).
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run the accept loop until shutdown.
    #[instrument(skip(self), fields(addr = %self.config.bind_addr))]
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("duel server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.clients.read().await.len() >= self.config.max_connections {
                                warn!("connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            debug!("new connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => error!("accept error: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let dispatcher = self.dispatcher.clone();
        let idle_timeout = self.config.idle_timeout;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut events_rx = dispatcher.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("websocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            clients.write().await.insert(addr, ConnectedClient {
                account: None,
                last_activity: Instant::now(),
            });

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut session = ClientSession::default();

            loop {
                tokio::select! {
                    frame = tokio::time::timeout(idle_timeout, ws_receiver.next()) => {
                        let text = match frame {
                            Err(_) => {
                                debug!("closing idle connection {}", addr);
                                break;
                            }
                            Ok(Some(Ok(Message::Text(text)))) => text,
                            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                                debug!("client {} disconnected", addr);
                                break;
                            }
                            Ok(Some(Err(e))) => {
                                warn!("websocket error for {}: {}", addr, e);
                                break;
                            }
                            Ok(Some(Ok(_))) => continue,
                        };

                        let reply = match ClientMessage::from_json(&text) {
                            Ok(msg) => {
                                debug!(client = %addr, kind = msg.kind(), "request");
                                dispatcher.handle(&mut session, msg).await
                            }
                            Err(e) => {
                                debug!("invalid message from {}: {}", addr, e);
                                ServerMessage::Error(ErrorInfo::new(
                                    ErrorCode::InvalidInput,
                                    format!("invalid message: {}", e),
                                ))
                            }
                        };

                        if let Some(client) = clients.write().await.get_mut(&addr) {
                            client.account = session.account;
                            client.last_activity = Instant::now();
                        }
                        if msg_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                    event = events_rx.recv() => {
                        match event {
                            Ok(event) if session.account.is_some() => {
                                if msg_tx.send(ServerMessage::Event(event)).await.is_err() {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("client {} lagged, {} events dropped", addr, skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued replies flush before tearing down the socket.
            drop(msg_tx);
            let _ = sender_task.await;

            clients.write().await.remove(&addr);
            debug!("client {} cleaned up", addr);
        });
    }

    /// Signal the accept loop and every connection to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Number of authenticated connections.
    pub async fn authenticated_count(&self) -> usize {
        self.clients.read().await.values().filter(|c| c.account.is_some()).count()
    }

    /// Seconds since the least recently active connection last sent a frame.
    pub async fn max_idle_secs(&self) -> u64 {
        self.clients
            .read()
            .await
            .values()
            .map(|c| c.last_activity.elapsed().as_secs())
            .max()
            .unwrap_or(0)
    }
}
