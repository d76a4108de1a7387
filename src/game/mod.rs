//! Duel Logic Module
//!
//! Everything that decides the outcome of a duel. Synchronous and
//! deterministic: no clocks, no randomness, no I/O.
//!
//! ## Module Structure
//!
//! - `action`: Player and agent move enums
//! - `state`: Game record and per-round bookkeeping
//! - `turn`: Turn state machine (commit, move, reveal)
//! - `resolve`: Round resolution arithmetic
//! - `stake`: Piece validation and refunds
//! - `registry`: Game storage and per-player indexes
//! - `events`: Event outbox
//! - `error`: Error taxonomy

pub mod action;
pub mod error;
pub mod events;
pub mod registry;
pub mod resolve;
pub mod stake;
pub mod state;
pub mod turn;

// Re-export key types
pub use action::{AgentAction, PlayerAction};
pub use error::{DuelError, ErrorCode, StakeViolation};
pub use events::{DuelEvent, DuelEventData, EventLog};
pub use registry::{GameRegistry, SnapshotError};
pub use resolve::RoundOutcome;
pub use state::{Game, GameActions, GameState, RoundRecord, StakedPiece};
pub use turn::{RoundResolution, TurnDetails, TurnStatus, TurnView};
