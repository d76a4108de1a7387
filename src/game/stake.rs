//! Stake Accounting
//!
//! Piece validation at start, refund computation at completion and the
//! one-shot refund claim.

use std::collections::BTreeSet;

use crate::core::ids::PieceId;
use crate::game::error::{DuelError, StakeViolation};
use crate::game::state::{Game, GameState, StakedPiece};
use crate::{MAX_HEALTH, PIECES_PER_GAME};

/// Check piece count and uniqueness before anything is looked up.
pub fn check_piece_ids(pieces: &[PieceId]) -> Result<(), StakeViolation> {
    if pieces.len() != PIECES_PER_GAME {
        return Err(StakeViolation::PieceCount {
            expected: PIECES_PER_GAME,
            got: pieces.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for piece in pieces {
        if !seen.insert(*piece) {
            return Err(StakeViolation::DuplicatePiece(*piece));
        }
    }

    Ok(())
}

/// Build the staked set from registry-resolved masses, enforcing the mass cap.
pub fn build_stake(
    resolved: &[(PieceId, u64)],
    max_total_mass: u64,
) -> Result<[StakedPiece; PIECES_PER_GAME], StakeViolation> {
    let ids: Vec<PieceId> = resolved.iter().map(|(id, _)| *id).collect();
    check_piece_ids(&ids)?;

    let total = resolved
        .iter()
        .try_fold(0u64, |acc, (_, mass)| acc.checked_add(*mass))
        .unwrap_or(u64::MAX);
    if total > max_total_mass {
        return Err(StakeViolation::MassExceeded { total, max: max_total_mass });
    }

    let mut pieces = [StakedPiece { external_id: PieceId::default(), mass: 0 }; PIECES_PER_GAME];
    for (slot, (id, mass)) in pieces.iter_mut().zip(resolved) {
        *slot = StakedPiece { external_id: *id, mass: *mass };
    }
    Ok(pieces)
}

/// Refund owed for a finished game.
///
/// `stake * (100 - health) / 100`, rounded down. Health above 100 is
/// treated as 100.
pub fn compute_refund(stake_amount: u64, final_agent_health: u8) -> u64 {
    let damage = (MAX_HEALTH - final_agent_health.min(MAX_HEALTH)) as u128;
    (stake_amount as u128 * damage / MAX_HEALTH as u128) as u64
}

/// Validate a refund claim without applying it.
pub fn check_claim(game: &Game) -> Result<u64, DuelError> {
    if game.state != GameState::Completed {
        return Err(DuelError::GameNotCompleted);
    }
    if game.refund_claimed {
        return Err(DuelError::AlreadyClaimed);
    }
    if game.refund_amount == 0 {
        return Err(DuelError::NothingToClaim);
    }
    Ok(game.refund_amount)
}

/// Mark the refund as paid and return the amount to transfer.
pub fn claim_refund(game: &mut Game) -> Result<u64, DuelError> {
    let amount = check_claim(game)?;
    game.refund_claimed = true;
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::tests::test_game;
    use proptest::prelude::*;

    fn ids(n: u64) -> Vec<(PieceId, u64)> {
        (1..=n).map(|i| (PieceId::from_u64(i), 10)).collect()
    }

    #[test]
    fn test_piece_count_enforced() {
        assert!(matches!(
            build_stake(&ids(2), 100),
            Err(StakeViolation::PieceCount { expected: 3, got: 2 })
        ));
        assert!(matches!(
            build_stake(&ids(4), 100),
            Err(StakeViolation::PieceCount { expected: 3, got: 4 })
        ));
    }

    #[test]
    fn test_duplicate_piece_rejected() {
        let p = PieceId::from_u64(5);
        let result = check_piece_ids(&[p, PieceId::from_u64(6), p]);
        assert_eq!(result, Err(StakeViolation::DuplicatePiece(p)));
    }

    #[test]
    fn test_mass_cap() {
        let at_cap = [
            (PieceId::from_u64(1), 50),
            (PieceId::from_u64(2), 30),
            (PieceId::from_u64(3), 20),
        ];
        let pieces = build_stake(&at_cap, 100).unwrap();
        assert_eq!(pieces[0].mass, 50);
        assert_eq!(pieces[2].external_id, PieceId::from_u64(3));

        let over = [
            (PieceId::from_u64(1), 50),
            (PieceId::from_u64(2), 30),
            (PieceId::from_u64(3), 21),
        ];
        assert_eq!(
            build_stake(&over, 100),
            Err(StakeViolation::MassExceeded { total: 101, max: 100 })
        );
    }

    #[test]
    fn test_mass_overflow_is_rejected_not_wrapped() {
        let huge = [
            (PieceId::from_u64(1), u64::MAX),
            (PieceId::from_u64(2), 1),
            (PieceId::from_u64(3), 0),
        ];
        assert!(matches!(build_stake(&huge, 100), Err(StakeViolation::MassExceeded { .. })));
    }

    #[test]
    fn test_refund_endpoints() {
        assert_eq!(compute_refund(1_000, 100), 0);
        assert_eq!(compute_refund(1_000, 0), 1_000);
        assert_eq!(compute_refund(1_000, 40), 600);
    }

    #[test]
    fn test_refund_rounds_down() {
        // 999 * 33 / 100 = 329.67
        assert_eq!(compute_refund(999, 67), 329);
        assert_eq!(compute_refund(1, 1), 0);
        assert_eq!(compute_refund(u64::MAX, 0), u64::MAX);
    }

    #[test]
    fn test_claim_flow() {
        let mut game = test_game([30, 20, 15]);
        assert_eq!(claim_refund(&mut game), Err(DuelError::GameNotCompleted));

        game.state = GameState::Completed;
        game.refund_amount = 0;
        assert_eq!(claim_refund(&mut game), Err(DuelError::NothingToClaim));

        game.refund_amount = 600;
        assert_eq!(claim_refund(&mut game), Ok(600));
        assert!(game.refund_claimed);
        assert_eq!(claim_refund(&mut game), Err(DuelError::AlreadyClaimed));
        assert_eq!(game.refund_amount, 600);
    }

    proptest! {
        #[test]
        fn prop_refund_monotonic_and_bounded(stake in any::<u64>(), h in 0u8..100) {
            let here = compute_refund(stake, h);
            let next = compute_refund(stake, h + 1);
            prop_assert!(next <= here);
            prop_assert!(here <= stake);
        }
    }
}
