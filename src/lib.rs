//! # OTOM Duel Engine
//!
//! Three-round duel between a player and an automated agent. The player
//! stakes three pieces; the agent hides each move behind a commit-reveal
//! hash; damage dealt to the agent becomes a refund on the player's mint.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    OTOM DUEL ENGINE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Identifiers and hashing                  │
//! │  ├── ids.rs      - AccountId, PieceId, GameId               │
//! │  └── hash.rs     - SHA-256 state hashing                    │
//! │                                                             │
//! │  game/           - Duel rules (deterministic)               │
//! │  ├── action.rs   - Player / agent moves                     │
//! │  ├── state.rs    - Game record                              │
//! │  ├── turn.rs     - Turn state machine                       │
//! │  ├── resolve.rs  - Round resolution                         │
//! │  ├── stake.rs    - Stake validation and refunds             │
//! │  ├── registry.rs - Game storage, per-player index           │
//! │  ├── events.rs   - Event outbox                             │
//! │  └── error.rs    - Error taxonomy                           │
//! │                                                             │
//! │  proof/          - Verifiable pieces                        │
//! │  ├── commitment.rs - Commit-reveal encoding                 │
//! │  └── replay.rs   - Replay audit                             │
//! │                                                             │
//! │  engine/         - Composition root + collaborators         │
//! │                                                             │
//! │  network/        - Transport (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                         │
//! │  ├── protocol.rs - Message types                            │
//! │  └── auth.rs     - JWT caller authentication                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! `core/`, `game/` and `proof/` are deterministic:
//! - Integer arithmetic only, health clamped into `[0, 100]`
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time, no randomness
//!
//! The same sequence of calls produces the same games and the same
//! `Game::compute_hash` on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod engine;
pub mod game;
pub mod network;
pub mod proof;

// Re-export commonly used types
pub use core::ids::{AccountId, GameId, PieceId};
pub use engine::{DuelEngine, EngineConfig, SharedEngine};
pub use game::action::{AgentAction, PlayerAction};
pub use game::error::DuelError;
pub use game::state::{Game, GameState};
pub use game::turn::{TurnStatus, TurnView};
pub use proof::commitment::AgentCommitment;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Agent health at the start of every game.
pub const STARTING_HEALTH: u8 = 100;

/// Upper clamp for agent health.
pub const MAX_HEALTH: u8 = 100;

/// Rounds in a game.
pub const ROUNDS_PER_GAME: usize = 3;

/// Pieces staked per game.
pub const PIECES_PER_GAME: usize = 3;

/// Default cap on the summed mass of the staked pieces.
pub const MAX_TOTAL_MASS: u64 = 100;

/// Health restored by a RECOVER.
pub const RECOVER_HEAL: u8 = 10;

/// Piece index reported for a round that used no piece.
pub const UNUSED_PIECE_INDEX: u8 = 255;
