//! Identifiers
//!
//! Account addresses, staked piece ids and game ids.
//! All of them implement `Ord` so they can key `BTreeMap`s.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Error parsing an identifier from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// Not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Hex decoded to the wrong number of bytes.
    #[error("expected {expected} bytes, got {got}")]
    WrongLength {
        /// Expected byte length.
        expected: usize,
        /// Decoded byte length.
        got: usize,
    },
}

/// Decode an optionally `0x`-prefixed hex string into a fixed-size array.
pub fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N], IdParseError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| IdParseError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(IdParseError::WrongLength { expected: N, got: bytes.len() });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// =============================================================================
// ACCOUNT ID
// =============================================================================

/// A wallet identity (player, agent or owner).
///
/// 20 bytes, rendered as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse from hex (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
        decode_hex_array::<20>(s).map(Self)
    }

    /// Derive a stable account id from an opaque subject string.
    ///
    /// Used for identities that are not wallet addresses (e.g. auth provider user ids).
    pub fn derive(subject: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"otom-duel-account:");
        hasher.update(subject.as_bytes());
        let hash = hasher.finalize();

        let mut id = [0u8; 20];
        id.copy_from_slice(&hash[..20]);
        Self(id)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Short form for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl FromStr for AccountId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// PIECE ID
// =============================================================================

/// External id of a staked piece (a 256-bit token id in the asset registry).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PieceId(pub [u8; 32]);

impl PieceId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build an id whose low 8 bytes hold `value` (big-endian).
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Parse from hex (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
        decode_hex_array::<32>(s).map(Self)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PieceId({})", self)
    }
}

impl FromStr for PieceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PieceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PieceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// GAME ID
// =============================================================================

/// Game handle. Allocated sequentially from 1; 0 is never a valid game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl GameId {
    /// First id handed out by a fresh registry.
    pub const FIRST: GameId = GameId(1);

    /// Next id in sequence.
    pub fn next(self) -> GameId {
        GameId(self.0 + 1)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_hex_roundtrip() {
        let id = AccountId::new([0xab; 20]);
        let text = id.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(AccountId::from_hex(&text).unwrap(), id);
        assert_eq!(AccountId::from_hex(&text[2..]).unwrap(), id);
    }

    #[test]
    fn test_account_wrong_length() {
        let result = AccountId::from_hex("0xabcd");
        assert!(matches!(result, Err(IdParseError::WrongLength { expected: 20, got: 2 })));
    }

    #[test]
    fn test_account_derivation_is_stable() {
        assert_eq!(AccountId::derive("user123"), AccountId::derive("user123"));
        assert_ne!(AccountId::derive("user123"), AccountId::derive("user456"));
    }

    #[test]
    fn test_piece_from_u64() {
        let id = PieceId::from_u64(0x0102);
        assert_eq!(id.0[30], 0x01);
        assert_eq!(id.0[31], 0x02);
        assert!(id.0[..24].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_ids_serialize_as_hex_strings() {
        let json = serde_json::to_string(&AccountId::new([1; 20])).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(20)));

        let parsed: PieceId = serde_json::from_str(&format!("\"{}\"", "ff".repeat(32))).unwrap();
        assert_eq!(parsed, PieceId::new([0xff; 32]));

        assert_eq!(serde_json::to_string(&GameId(7)).unwrap(), "7");
    }
}
