//! Hashing for Commitments and State Verification
//!
//! Provides deterministic SHA-256 hashing for:
//! - Agent commit hashes (see `proof::commitment`)
//! - Game record digests for snapshot/replay integrity

use sha2::{Sha256, Digest};

use super::ids::{AccountId, PieceId};

/// Hash output type (256 bits / 32 bytes)
pub type Digest32 = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256 with helpers for the duel's field types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a game record.
    pub fn for_game_state() -> Self {
        Self::new(b"OTOM_DUEL_GAME_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with an account id (20 bytes).
    #[inline]
    pub fn update_account(&mut self, account: &AccountId) {
        self.hasher.update(account.as_bytes());
    }

    /// Update with a piece id (32 bytes).
    #[inline]
    pub fn update_piece(&mut self, piece: &PieceId) {
        self.hasher.update(piece.as_bytes());
    }

    /// Update with an optional digest. Absence hashes as a zero tag byte.
    pub fn update_opt_digest(&mut self, digest: Option<&Digest32>) {
        match digest {
            Some(d) => {
                self.update_u8(1);
                self.hasher.update(d);
            }
            None => self.update_u8(0),
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Digest32 {
        self.hasher.finalize().into()
    }
}

/// Compute a plain SHA-256 of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
