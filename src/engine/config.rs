//! Engine configuration.

use crate::core::ids::{AccountId, IdParseError};
use crate::MAX_TOTAL_MASS;

/// Default mint price in native units (0.0001 ETH in wei).
pub const DEFAULT_MINT_PRICE: u64 = 100_000_000_000_000;

/// Largest accepted `max_total_mass`. Charge carried across three rounds is
/// bounded by the total mass, which keeps it well inside `i64`.
pub const MASS_CAP_LIMIT: u64 = u32::MAX as u64;

/// Environment parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Variable is set but not a number.
    #[error("{var} must be an unsigned integer, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// Number parses but is above the accepted bound.
    #[error("{var} is {value}, above the limit of {max}")]
    OutOfRange {
        /// Variable name.
        var: &'static str,
        /// Parsed value.
        value: u64,
        /// Largest accepted value.
        max: u64,
    },

    /// Variable is set but not an address.
    #[error("{var} is not a valid address: {source}")]
    InvalidAddress {
        /// Variable name.
        var: &'static str,
        /// Parse failure.
        source: IdParseError,
    },
}

/// Read an optional unsigned integer from the environment.
pub(crate) fn env_number<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(None),
    }
}

/// Engine parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Stake recorded for every game; the refund is a share of it.
    pub mint_price: u64,
    /// Cap on the summed mass of the three staked pieces.
    pub max_total_mass: u64,
    /// Account allowed to manage the agent whitelist and cancel games.
    pub owner: AccountId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mint_price: DEFAULT_MINT_PRICE,
            max_total_mass: MAX_TOTAL_MASS,
            owner: AccountId::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `DUEL_MINT_PRICE`, `DUEL_MAX_TOTAL_MASS` and `DUEL_OWNER`,
    /// falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let owner = match std::env::var("DUEL_OWNER") {
            Ok(raw) => AccountId::from_hex(raw.trim())
                .map_err(|source| ConfigError::InvalidAddress { var: "DUEL_OWNER", source })?,
            Err(_) => defaults.owner,
        };

        Self {
            mint_price: env_number("DUEL_MINT_PRICE")?.unwrap_or(defaults.mint_price),
            max_total_mass: env_number("DUEL_MAX_TOTAL_MASS")?.unwrap_or(defaults.max_total_mass),
            owner,
        }
        .validated()
    }

    /// Reject values the engine cannot play with.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.max_total_mass > MASS_CAP_LIMIT {
            return Err(ConfigError::OutOfRange {
                var: "DUEL_MAX_TOTAL_MASS",
                value: self.max_total_mass,
                max: MASS_CAP_LIMIT,
            });
        }
        Ok(self)
    }

    /// Builder-style owner override.
    pub fn with_owner(mut self, owner: AccountId) -> Self {
        self.owner = owner;
        self
    }
}
