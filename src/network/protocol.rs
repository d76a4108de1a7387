//! Protocol Messages
//!
//! Wire format between clients (players, agents, admin tools) and the duel
//! server. Every frame is a JSON object with a `type` field.
//!
//! ```text
//!   client                                 server
//!     │ ── auth {token} ─────────────────────▶ │
//!     │ ◀──────────────────── auth_result ──── │
//!     │ ── start_game / agent_commit / ... ──▶ │
//!     │ ◀──────── reply (or error) ─────────── │
//!     │ ◀──────── event (broadcast) ────────── │
//! ```
//!
//! Hashes and secrets travel as `0x`-prefixed hex strings.

use serde::{Serialize, Deserialize};

use crate::core::hash::Digest32;
use crate::core::ids::{AccountId, GameId, PieceId};
use crate::game::action::{AgentAction, PlayerAction};
use crate::game::error::{DuelError, ErrorCode};
use crate::game::events::DuelEvent;
use crate::game::state::{Game, GameActions};
use crate::game::turn::{PlayerMove, RoundResolution, TurnDetails, TurnView};

/// Serde adapter for 32-byte values as hex strings.
pub mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::core::ids::decode_hex_array;

    /// Serialize as `0x…`.
    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    /// Parse with or without the `0x` prefix.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex_array(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate. Must be the first message.
    Auth {
        /// JWT whose `sub` names the caller.
        token: String,
        /// Client version string.
        #[serde(default)]
        client_version: String,
    },

    /// Stake three pieces and open a game.
    StartGame {
        /// Piece ids, in stake order.
        pieces: Vec<PieceId>,
    },

    /// Agent commit for the current round.
    AgentCommit {
        game_id: GameId,
        #[serde(with = "hex32")]
        commit_hash: Digest32,
    },

    /// Player move for the current round.
    PlayerMove {
        game_id: GameId,
        action: PlayerAction,
        piece_index: u8,
    },

    /// Agent reveal for the current round.
    AgentReveal {
        game_id: GameId,
        action: AgentAction,
        #[serde(with = "hex32")]
        secret: [u8; 32],
    },

    /// Collect the refund of a completed game.
    ClaimRefund { game_id: GameId },

    /// `(round, status)` of a game.
    WhoseTurn { game_id: GameId },

    /// Full game record.
    GetGame { game_id: GameId },

    /// Per-round moves of a game.
    GetGameActions { game_id: GameId },

    /// Flag-style turn breakdown of a game.
    GetTurnStatus { game_id: GameId },

    /// Active game of a player (the caller if omitted).
    GetActiveGame {
        #[serde(default)]
        player: Option<AccountId>,
    },

    /// Every game of a player (the caller if omitted).
    GetPlayerGames {
        #[serde(default)]
        player: Option<AccountId>,
    },

    /// Owner: add or remove an agent.
    SetAgent { agent: AccountId, authorized: bool },

    /// Owner: cancel an active game.
    CancelGame { game_id: GameId },

    /// Latency probe.
    Ping { timestamp: u64 },
}

impl ClientMessage {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::StartGame { .. } => "start_game",
            Self::AgentCommit { .. } => "agent_commit",
            Self::PlayerMove { .. } => "player_move",
            Self::AgentReveal { .. } => "agent_reveal",
            Self::ClaimRefund { .. } => "claim_refund",
            Self::WhoseTurn { .. } => "whose_turn",
            Self::GetGame { .. } => "get_game",
            Self::GetGameActions { .. } => "get_game_actions",
            Self::GetTurnStatus { .. } => "get_turn_status",
            Self::GetActiveGame { .. } => "get_active_game",
            Self::GetPlayerGames { .. } => "get_player_games",
            Self::SetAgent { .. } => "set_agent",
            Self::CancelGame { .. } => "cancel_game",
            Self::Ping { .. } => "ping",
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Reply to `start_game`.
    GameStarted { game_id: GameId },

    /// Reply to `agent_commit`.
    Committed { game_id: GameId, round: u8 },

    /// Reply to `player_move`.
    Moved { game_id: GameId, result: PlayerMove },

    /// Reply to `agent_reveal`.
    Resolved { game_id: GameId, result: RoundResolution },

    /// Reply to `claim_refund`.
    RefundClaimed { game_id: GameId, amount: u64 },

    /// Reply to `whose_turn`.
    Turn {
        game_id: GameId,
        /// Round, or 4/5 for completed/claimed.
        round: u8,
        /// Turn status code, 255 when nobody is to move.
        status: u8,
        view: TurnView,
    },

    /// Reply to `get_game`.
    Game { game: Game },

    /// Reply to `get_game_actions`.
    Actions { game_id: GameId, actions: GameActions },

    /// Reply to `get_turn_status`.
    TurnStatus { game_id: GameId, details: TurnDetails },

    /// Reply to `get_active_game`.
    ActiveGame { player: AccountId, game_id: Option<GameId> },

    /// Reply to `get_player_games`.
    PlayerGames { player: AccountId, games: Vec<GameId> },

    /// Reply to admin calls with no payload.
    Ack,

    /// Engine event, pushed to every authenticated client.
    Event(DuelEvent),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Request failed.
    Error(ErrorInfo),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Account the connection acts as.
    pub account: Option<AccountId>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ErrorInfo {
    /// Build from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<&DuelError> for ErrorInfo {
    fn from(err: &DuelError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl ServerMessage {
    /// Error reply for an engine failure.
    pub fn from_error(err: &DuelError) -> Self {
        Self::Error(err.into())
    }

    /// Turn reply for a game.
    pub fn turn(game_id: GameId, view: TurnView) -> Self {
        let (round, status) = view.wire();
        Self::Turn { game_id, round, status, view }
    }
}

// =============================================================================
// SERIALIZATION
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::turn::TurnStatus;

    #[test]
    fn test_commit_hash_travels_as_hex() {
        let msg = ClientMessage::AgentCommit { game_id: GameId(2), commit_hash: [0xAB; 32] };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"agent_commit\""));
        assert!(json.contains(&format!("0x{}", "ab".repeat(32))));

        match ClientMessage::from_json(&json).unwrap() {
            ClientMessage::AgentCommit { game_id, commit_hash } => {
                assert_eq!(game_id, GameId(2));
                assert_eq!(commit_hash, [0xAB; 32]);
            }
            other => panic!("wrong message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_handwritten_client_json() {
        let json = r#"{"type":"player_move","game_id":7,"action":"CHARGE","piece_index":1}"#;
        match ClientMessage::from_json(json).unwrap() {
            ClientMessage::PlayerMove { game_id, action, piece_index } => {
                assert_eq!(game_id, GameId(7));
                assert_eq!(action, PlayerAction::Charge);
                assert_eq!(piece_index, 1);
            }
            other => panic!("wrong message: {:?}", other),
        }

        let json = r#"{"type":"get_active_game"}"#;
        assert!(matches!(
            ClientMessage::from_json(json).unwrap(),
            ClientMessage::GetActiveGame { player: None }
        ));
    }

    #[test]
    fn test_bad_secret_rejected() {
        let json = r#"{"type":"agent_reveal","game_id":1,"action":"DEFEND","secret":"0x1234"}"#;
        assert!(ClientMessage::from_json(json).is_err());
    }

    #[test]
    fn test_turn_reply_carries_wire_pair() {
        let msg = ServerMessage::turn(
            GameId(1),
            TurnView::InRound { round: 2, status: TurnStatus::AwaitingAgentReveal },
        );
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"round\":2"));
        assert!(json.contains("\"status\":2"));

        let msg = ServerMessage::turn(GameId(1), TurnView::Claimed);
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"round\":5"));
        assert!(json.contains("\"status\":255"));
    }

    #[test]
    fn test_error_reply() {
        let msg = ServerMessage::from_error(&DuelError::PieceAlreadyUsed(1));
        let json = msg.to_json().unwrap();
        assert!(json.contains("piece_already_used"));
        assert!(ServerMessage::from_json(&json).is_ok());
    }
}
