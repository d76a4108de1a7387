//! Agent Commit-Reveal Protocol
//!
//! The agent commits to a hash of its move before the player acts and
//! reveals the move afterwards. The reveal is a pre-image check: the engine
//! rehashes `(action, secret, round)` and compares bytes.
//!
//! ## Preimage layout (65 bytes)
//!
//! ```text
//! ┌────────┬──────────────────────┬──────────────────────────────┐
//! │ action │ secret               │ round                        │
//! │ 1 byte │ 32 bytes             │ 32 bytes, big-endian         │
//! └────────┴──────────────────────┴──────────────────────────────┘
//! ```
//!
//! Digest: SHA-256 of the preimage, no domain prefix.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::core::hash::Digest32;
use crate::game::action::AgentAction;
use crate::game::error::DuelError;
use crate::game::state::RoundRecord;

/// Agent's secret salt.
pub type Secret = [u8; 32];

/// Preimage length in bytes.
pub const PREIMAGE_LEN: usize = 1 + 32 + 32;

/// Encode the commit preimage.
pub fn commit_preimage(action: AgentAction, secret: &Secret, round: u8) -> [u8; PREIMAGE_LEN] {
    let mut buf = [0u8; PREIMAGE_LEN];
    buf[0] = action.code();
    buf[1..33].copy_from_slice(secret);
    // Round occupies the last byte of a 32-byte big-endian word.
    buf[PREIMAGE_LEN - 1] = round;
    buf
}

/// Compute the commit hash for a move.
pub fn commit_hash(action: AgentAction, secret: &Secret, round: u8) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(commit_preimage(action, secret, round));
    hasher.finalize().into()
}

/// A move the agent intends to play, with its commit hash.
///
/// Agents keep this between commit and reveal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCommitment {
    /// Action to reveal later.
    pub action: AgentAction,
    /// Secret salt.
    pub secret: Secret,
    /// Round the commitment is bound to.
    pub round: u8,
    /// Hash to publish.
    pub hash: Digest32,
}

impl AgentCommitment {
    /// Prepare a commitment.
    pub fn new(action: AgentAction, secret: Secret, round: u8) -> Self {
        let hash = commit_hash(action, &secret, round);
        Self { action, secret, round, hash }
    }

    /// Check this commitment against a published hash.
    pub fn verify(&self, hash: &Digest32) -> bool {
        commit_hash(self.action, &self.secret, self.round) == *hash
    }
}

// =============================================================================
// ROUND OPERATIONS
// =============================================================================

/// Validate a commit without applying it.
pub fn check_commit(record: &RoundRecord, round: u8) -> Result<(), DuelError> {
    if record.agent_commit.is_some() {
        return Err(DuelError::AlreadyCommitted(round));
    }
    Ok(())
}

/// Store the agent's commit for a round.
pub fn commit(record: &mut RoundRecord, round: u8, hash: Digest32) -> Result<(), DuelError> {
    check_commit(record, round)?;
    record.agent_commit = Some(hash);
    Ok(())
}

/// Validate a reveal without applying it.
pub fn check_reveal(
    record: &RoundRecord,
    round: u8,
    action: AgentAction,
    secret: &Secret,
) -> Result<(), DuelError> {
    let stored = record.agent_commit.ok_or(DuelError::NoCommit(round))?;

    if record.agent_action.is_played() {
        return Err(DuelError::AlreadyRevealed(round));
    }

    if !action.is_played() {
        return Err(DuelError::InvalidAction("agent must reveal DEFEND, FLIP_CHARGE or RECOVER"));
    }

    if commit_hash(action, secret, round) != stored {
        return Err(DuelError::InvalidReveal(round));
    }

    Ok(())
}

/// Verify and store the agent's revealed action for a round.
pub fn reveal(
    record: &mut RoundRecord,
    round: u8,
    action: AgentAction,
    secret: &Secret,
) -> Result<(), DuelError> {
    check_reveal(record, round, action, secret)?;
    record.agent_action = action;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: Secret = [0x12; 32];

    #[test]
    fn test_preimage_layout() {
        let pre = commit_preimage(AgentAction::FlipCharge, &SECRET, 2);
        assert_eq!(pre[0], 2);
        assert_eq!(&pre[1..33], &SECRET);
        assert!(pre[33..64].iter().all(|b| *b == 0));
        assert_eq!(pre[64], 2);
    }

    #[test]
    fn test_commitment_determinism() {
        let a = AgentCommitment::new(AgentAction::Defend, SECRET, 0);
        let b = AgentCommitment::new(AgentAction::Defend, SECRET, 0);
        assert_eq!(a.hash, b.hash);
        assert!(a.verify(&b.hash));
    }

    #[test]
    fn test_commit_then_reveal() {
        let c = AgentCommitment::new(AgentAction::Recover, SECRET, 1);
        let mut record = RoundRecord::default();

        commit(&mut record, 1, c.hash).unwrap();
        assert_eq!(record.agent_commit, Some(c.hash));

        reveal(&mut record, 1, AgentAction::Recover, &SECRET).unwrap();
        assert_eq!(record.agent_action, AgentAction::Recover);
    }

    #[test]
    fn test_double_commit_rejected() {
        let mut record = RoundRecord::default();
        commit(&mut record, 0, [1; 32]).unwrap();
        assert_eq!(commit(&mut record, 0, [2; 32]), Err(DuelError::AlreadyCommitted(0)));
        assert_eq!(record.agent_commit, Some([1; 32]));
    }

    #[test]
    fn test_reveal_without_commit() {
        let mut record = RoundRecord::default();
        let result = reveal(&mut record, 0, AgentAction::Defend, &SECRET);
        assert_eq!(result, Err(DuelError::NoCommit(0)));
    }

    #[test]
    fn test_double_reveal_rejected() {
        let c = AgentCommitment::new(AgentAction::Defend, SECRET, 0);
        let mut record = RoundRecord::default();
        commit(&mut record, 0, c.hash).unwrap();
        reveal(&mut record, 0, AgentAction::Defend, &SECRET).unwrap();

        let again = reveal(&mut record, 0, AgentAction::Defend, &SECRET);
        assert_eq!(again, Err(DuelError::AlreadyRevealed(0)));
    }

    #[test]
    fn test_wrong_action_rejected() {
        let c = AgentCommitment::new(AgentAction::Defend, SECRET, 0);
        let mut record = RoundRecord::default();
        commit(&mut record, 0, c.hash).unwrap();

        let result = reveal(&mut record, 0, AgentAction::Recover, &SECRET);
        assert_eq!(result, Err(DuelError::InvalidReveal(0)));
        assert_eq!(record.agent_action, AgentAction::None);
    }

    #[test]
    fn test_none_action_rejected() {
        let c = AgentCommitment::new(AgentAction::None, SECRET, 0);
        let mut record = RoundRecord::default();
        commit(&mut record, 0, c.hash).unwrap();

        let result = reveal(&mut record, 0, AgentAction::None, &SECRET);
        assert!(matches!(result, Err(DuelError::InvalidAction(_))));
    }

    fn agent_action() -> impl Strategy<Value = AgentAction> {
        prop_oneof![
            Just(AgentAction::Defend),
            Just(AgentAction::FlipCharge),
            Just(AgentAction::Recover),
        ]
    }

    proptest! {
        #[test]
        fn prop_reveal_binds_all_three_inputs(
            action in agent_action(),
            other_action in agent_action(),
            secret in any::<[u8; 32]>(),
            flip_byte in 0usize..32,
            round in 0u8..3,
            other_round in 0u8..3,
        ) {
            let c = AgentCommitment::new(action, secret, round);

            let record = RoundRecord { agent_commit: Some(c.hash), ..Default::default() };
            let honest = check_reveal(&record, round, action, &secret);
            prop_assert_eq!(honest, Ok(()));

            if other_action != action {
                prop_assert_eq!(
                    check_reveal(&record, round, other_action, &secret),
                    Err(DuelError::InvalidReveal(round))
                );
            }

            let mut bad_secret = secret;
            bad_secret[flip_byte] ^= 0x01;
            prop_assert_eq!(
                check_reveal(&record, round, action, &bad_secret),
                Err(DuelError::InvalidReveal(round))
            );

            if other_round != round {
                prop_assert_eq!(
                    check_reveal(&record, other_round, action, &secret),
                    Err(DuelError::InvalidReveal(other_round))
                );
            }
        }
    }
}
