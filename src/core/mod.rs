//! Core primitives.
//!
//! Identifiers and hashing shared by the game, proof and network layers.
//! Nothing in here depends on time, randomness or I/O.

pub mod hash;
pub mod ids;

// Re-export core types
pub use hash::{Digest32, StateHasher, hash_bytes};
pub use ids::{AccountId, GameId, IdParseError, PieceId};
