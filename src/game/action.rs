//! Player and agent actions.
//!
//! Discriminants match the values exchanged with clients and fed into the
//! commit hash, so they must never be renumbered.

use serde::{Serialize, Deserialize};

/// Action chosen by the player for a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PlayerAction {
    /// Not played yet.
    #[default]
    None = 0,
    /// Deal the chosen piece's mass as damage now.
    Attack = 1,
    /// Store the chosen piece's mass as charge for later rounds.
    Charge = 2,
}

impl PlayerAction {
    /// Wire discriminant.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode from the wire discriminant.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Attack),
            2 => Some(Self::Charge),
            _ => None,
        }
    }

    /// Whether this is a real move (not the `None` placeholder).
    #[inline]
    pub fn is_played(self) -> bool {
        self != Self::None
    }
}

/// Action revealed by the agent for a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum AgentAction {
    /// Not revealed yet.
    #[default]
    None = 0,
    /// Block a direct attack; halves built-up charge pressure.
    Defend = 1,
    /// Negate the player's accumulated charge.
    FlipCharge = 2,
    /// Heal a fixed amount this round.
    Recover = 3,
}

impl AgentAction {
    /// Wire discriminant (also the first byte of the commit preimage).
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode from the wire discriminant.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Defend),
            2 => Some(Self::FlipCharge),
            3 => Some(Self::Recover),
            _ => None,
        }
    }

    /// Whether this is a real move (not the `None` placeholder).
    #[inline]
    pub fn is_played(self) -> bool {
        self != Self::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PlayerAction::Attack.code(), 1);
        assert_eq!(PlayerAction::Charge.code(), 2);
        assert_eq!(AgentAction::Defend.code(), 1);
        assert_eq!(AgentAction::FlipCharge.code(), 2);
        assert_eq!(AgentAction::Recover.code(), 3);
    }

    #[test]
    fn test_from_code() {
        for action in [AgentAction::None, AgentAction::Defend, AgentAction::FlipCharge, AgentAction::Recover] {
            assert_eq!(AgentAction::from_code(action.code()), Some(action));
        }
        assert_eq!(AgentAction::from_code(4), None);
        assert_eq!(PlayerAction::from_code(3), None);
    }

    #[test]
    fn test_json_names() {
        assert_eq!(serde_json::to_string(&AgentAction::FlipCharge).unwrap(), "\"FLIP_CHARGE\"");
        let parsed: PlayerAction = serde_json::from_str("\"ATTACK\"").unwrap();
        assert_eq!(parsed, PlayerAction::Attack);
    }
}
