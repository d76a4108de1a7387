//! Round Resolution
//!
//! Pure arithmetic that turns one round's paired actions into a health delta
//! and the charge carried into the next round. No state, no I/O.
//!
//! | player          | agent      | health delta            | charge out          |
//! |-----------------|------------|-------------------------|---------------------|
//! | Attack(m)       | Defend     | 0, or `-(m + abs(c))` if c < 0 | 0            |
//! | Attack(m)       | FlipCharge | `-(m + abs(c))`         | 0                   |
//! | Attack(m)       | Recover    | `10 - (m + abs(c))`     | 0                   |
//! | Charge(m)       | Defend     | `-(max(0, c) / 2)`      | `c + m`             |
//! | Charge(m)       | FlipCharge | 0                       | `-(c + m)`          |
//! | Charge(m)       | Recover    | `+10`                   | `c + m`             |
//!
//! `c` is the accumulated charge coming into the round. A positive charge is
//! the player's stored bonus; a negative one is a flipped charge, and either
//! sign adds its magnitude to the next attack.
//!
//! Sums saturate at the `i64` bounds, so an oversized mass or charge can only
//! pin health to 0; it never wraps.

use serde::{Serialize, Deserialize};

use crate::game::action::{AgentAction, PlayerAction};
use crate::{MAX_HEALTH, RECOVER_HEAL};

/// Result of resolving one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Change to agent health before clamping (negative = damage).
    pub health_delta: i64,
    /// Accumulated charge carried into the next round.
    pub charge_out: i64,
}

impl RoundOutcome {
    /// Apply the delta to `health`, clamped into `[0, MAX_HEALTH]`.
    #[inline]
    pub fn apply(&self, health: u8) -> u8 {
        clamp_health((health as i64).saturating_add(self.health_delta))
    }
}

/// Clamp an intermediate health value into `[0, MAX_HEALTH]`.
#[inline]
pub fn clamp_health(value: i64) -> u8 {
    value.clamp(0, MAX_HEALTH as i64) as u8
}

/// Resolve a round.
///
/// Returns `None` if either side has not played (`PlayerAction::None` or
/// `AgentAction::None`); those pairs are never resolvable.
pub fn resolve(
    player: PlayerAction,
    mass: u64,
    agent: AgentAction,
    charge_in: i64,
) -> Option<RoundOutcome> {
    let mass = i64::try_from(mass).unwrap_or(i64::MAX);
    let heal = RECOVER_HEAL as i64;

    let outcome = match player {
        PlayerAction::None => return None,

        PlayerAction::Attack => {
            // Carried charge is spent on the attack whatever its sign.
            let hit = mass.saturating_add(charge_in.saturating_abs());
            let health_delta = match agent {
                AgentAction::None => return None,
                AgentAction::Defend if charge_in < 0 => -hit,
                AgentAction::Defend => 0,
                AgentAction::FlipCharge => -hit,
                AgentAction::Recover => heal - hit,
            };
            RoundOutcome { health_delta, charge_out: 0 }
        }

        PlayerAction::Charge => {
            let built = charge_in.saturating_add(mass);
            match agent {
                AgentAction::None => return None,
                AgentAction::Defend => RoundOutcome {
                    health_delta: -(charge_in.max(0) / 2),
                    charge_out: built,
                },
                AgentAction::FlipCharge => RoundOutcome {
                    health_delta: 0,
                    charge_out: built.saturating_neg(),
                },
                AgentAction::Recover => RoundOutcome {
                    health_delta: heal,
                    charge_out: built,
                },
            }
        }
    };

    Some(outcome)
}
