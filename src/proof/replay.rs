//! Replay Audit
//!
//! Recompute a game from its recorded rounds and compare against what the
//! engine stored.
//!
//! ```text
//!   Game (stored) ──▶ fresh Game::new(same id, player, pieces, stake)
//!                          │
//!                          ▼  for each resolved round: resolve(...)
//!                     recomputed health / charge / round / refund
//!                          │
//!                          ▼
//!                     compare field by field, first mismatch wins
//! ```
//!
//! Agent secrets are not stored, so commit bindings are checked separately
//! with [`verify_reveals`] when the agent publishes its commitments.

use serde::{Serialize, Deserialize};

use crate::core::hash::Digest32;
use crate::game::resolve::resolve;
use crate::game::stake::compute_refund;
use crate::game::state::{Game, GameState};
use crate::proof::commitment::AgentCommitment;
use crate::{PIECES_PER_GAME, ROUNDS_PER_GAME};

/// Audit failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// A resolved round follows an unresolved one.
    #[error("round {round} resolved out of order")]
    RoundGap {
        /// First round found after a gap.
        round: u8,
    },

    /// A resolved round has no commit hash.
    #[error("round {round} resolved without a commit")]
    MissingCommit {
        /// Offending round.
        round: u8,
    },

    /// A piece index is out of range or reused.
    #[error("round {round} uses invalid piece {piece}")]
    BadPiece {
        /// Offending round.
        round: u8,
        /// Recorded piece index.
        piece: u8,
    },

    /// Recomputed value differs from the stored one.
    #[error("{field} mismatch: stored {stored}, replayed {replayed}")]
    Mismatch {
        /// Field name.
        field: &'static str,
        /// Stored value.
        stored: i128,
        /// Recomputed value.
        replayed: i128,
    },

    /// A published commitment does not open the stored hash.
    #[error("commitment for round {round} does not match")]
    CommitMismatch {
        /// Offending round.
        round: u8,
    },
}

/// Summary of a successful replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Rounds replayed.
    pub rounds_replayed: u8,
    /// Recomputed agent health.
    pub agent_health: u8,
    /// Recomputed charge.
    pub accumulated_charge: i64,
    /// Recomputed refund (0 unless completed).
    pub refund_amount: u64,
    /// Hash of the stored game.
    pub state_hash: Digest32,
}

fn check(field: &'static str, stored: i128, replayed: i128) -> Result<(), ReplayError> {
    if stored != replayed {
        return Err(ReplayError::Mismatch { field, stored, replayed });
    }
    Ok(())
}

/// Replay a game's resolved rounds and check the stored outcome.
pub fn verify_game(game: &Game) -> Result<ReplayReport, ReplayError> {
    let fresh = Game::new(game.id, game.player, game.staked_pieces, game.stake_amount);
    let mut health = fresh.agent_health;
    let mut charge = fresh.accumulated_charge;
    let mut used = [false; PIECES_PER_GAME];
    let mut replayed = 0u8;

    for (i, record) in game.rounds.iter().enumerate() {
        let round = i as u8;
        if !record.is_resolved() {
            continue;
        }
        if replayed != round {
            return Err(ReplayError::RoundGap { round });
        }
        if record.agent_commit.is_none() {
            return Err(ReplayError::MissingCommit { round });
        }

        let piece = record.used_piece.unwrap_or(u8::MAX);
        let slot = used.get_mut(piece as usize);
        match slot {
            Some(flag) if !*flag => *flag = true,
            _ => return Err(ReplayError::BadPiece { round, piece }),
        }

        let mass = game.staked_pieces[piece as usize].mass;
        let Some(outcome) = resolve(record.player_action, mass, record.agent_action, charge) else {
            return Err(ReplayError::RoundGap { round });
        };
        health = outcome.apply(health);
        charge = outcome.charge_out;
        replayed += 1;
    }

    check("current_round", game.current_round as i128, replayed as i128)?;
    check("agent_health", game.agent_health as i128, health as i128)?;
    check("accumulated_charge", game.accumulated_charge as i128, charge as i128)?;

    let completed = replayed as usize == ROUNDS_PER_GAME;
    let refund = if completed { compute_refund(game.stake_amount, health) } else { 0 };
    if completed {
        check("state", game.state.code() as i128, GameState::Completed.code() as i128)?;
    }
    check("refund_amount", game.refund_amount as i128, refund as i128)?;

    Ok(ReplayReport {
        rounds_replayed: replayed,
        agent_health: health,
        accumulated_charge: charge,
        refund_amount: refund,
        state_hash: game.compute_hash(),
    })
}

/// Check the agent's published commitments against the stored hashes.
///
/// Each commitment must open the commit of its round and name the action
/// that was revealed there.
pub fn verify_reveals(game: &Game, reveals: &[AgentCommitment]) -> Result<(), ReplayError> {
    for c in reveals {
        let record = game
            .rounds
            .get(c.round as usize)
            .ok_or(ReplayError::CommitMismatch { round: c.round })?;
        let stored = record.agent_commit.ok_or(ReplayError::MissingCommit { round: c.round })?;

        if !c.verify(&stored) || record.agent_action != c.action {
            return Err(ReplayError::CommitMismatch { round: c.round });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::action::{AgentAction, PlayerAction};
    use crate::game::state::tests::test_game;
    use crate::game::turn;

    fn played_game() -> (Game, Vec<AgentCommitment>) {
        let mut game = test_game([30, 20, 15]);
        let plan = [
            (PlayerAction::Charge, 0, AgentAction::Defend),
            (PlayerAction::Attack, 1, AgentAction::FlipCharge),
            (PlayerAction::Attack, 2, AgentAction::Recover),
        ];
        let mut reveals = Vec::new();
        for (round, (p, piece, a)) in plan.into_iter().enumerate() {
            let c = AgentCommitment::new(a, [round as u8 + 1; 32], round as u8);
            turn::agent_commit(&mut game, c.hash).unwrap();
            turn::player_move(&mut game, p, piece).unwrap();
            turn::agent_reveal(&mut game, a, &c.secret).unwrap();
            reveals.push(c);
        }
        (game, reveals)
    }

    #[test]
    fn test_honest_game_replays() {
        let (game, reveals) = played_game();
        let report = verify_game(&game).unwrap();
        assert_eq!(report.rounds_replayed, 3);
        assert_eq!(report.agent_health, game.agent_health);
        assert_eq!(report.refund_amount, game.refund_amount);
        verify_reveals(&game, &reveals).unwrap();
    }

    #[test]
    fn test_partial_game_replays() {
        let mut game = test_game([30, 20, 15]);
        let c = AgentCommitment::new(AgentAction::FlipCharge, [9; 32], 0);
        turn::agent_commit(&mut game, c.hash).unwrap();
        turn::player_move(&mut game, PlayerAction::Attack, 0).unwrap();
        turn::agent_reveal(&mut game, AgentAction::FlipCharge, &c.secret).unwrap();

        let report = verify_game(&game).unwrap();
        assert_eq!(report.rounds_replayed, 1);
        assert_eq!(report.agent_health, 70);
        assert_eq!(report.refund_amount, 0);
    }

    #[test]
    fn test_tampered_health_detected() {
        let (mut game, _) = played_game();
        game.agent_health = 100;
        assert!(matches!(
            verify_game(&game),
            Err(ReplayError::Mismatch { field: "agent_health", .. })
        ));
    }

    #[test]
    fn test_tampered_refund_detected() {
        let (mut game, _) = played_game();
        game.refund_amount += 1;
        assert!(matches!(
            verify_game(&game),
            Err(ReplayError::Mismatch { field: "refund_amount", .. })
        ));
    }

    #[test]
    fn test_reused_piece_detected() {
        let (mut game, _) = played_game();
        game.rounds[2].used_piece = Some(0);
        assert_eq!(verify_game(&game), Err(ReplayError::BadPiece { round: 2, piece: 0 }));
    }

    #[test]
    fn test_wrong_reveal_detected() {
        let (game, mut reveals) = played_game();
        reveals[1].secret[0] ^= 0xFF;
        assert_eq!(
            verify_reveals(&game, &reveals),
            Err(ReplayError::CommitMismatch { round: 1 })
        );
    }
}
