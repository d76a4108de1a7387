//! Proof Module
//!
//! Verifiable pieces of a duel:
//! - Agent commit-reveal encoding and checks
//! - Replay audit of recorded games
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF                                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  commitment.rs   - Commit hash, reveal verification         │
//! │  replay.rs       - Recompute a game from its rounds         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod replay;

// Re-export key types
pub use commitment::{commit_hash, commit_preimage, AgentCommitment, Secret, PREIMAGE_LEN};
pub use replay::{verify_game, verify_reveals, ReplayError, ReplayReport};
