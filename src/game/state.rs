//! Game State Definitions
//!
//! The per-player duel record and its per-round bookkeeping.
//! Only the turn state machine (`game::turn`) and stake accounting
//! (`game::stake`) mutate a `Game`.

use std::cmp::Ordering;

use serde::{Serialize, Deserialize};

use crate::core::hash::{Digest32, StateHasher};
use crate::core::ids::{AccountId, GameId, PieceId};
use crate::game::action::{AgentAction, PlayerAction};
use crate::game::turn::TurnStatus;
use crate::{MAX_HEALTH, PIECES_PER_GAME, ROUNDS_PER_GAME, STARTING_HEALTH, UNUSED_PIECE_INDEX};

// =============================================================================
// GAME STATE
// =============================================================================

/// Game-level lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum GameState {
    /// Not started. New games open directly in `Active`.
    #[default]
    Waiting = 0,
    /// Rounds in progress.
    Active = 1,
    /// All rounds resolved, refund fixed.
    Completed = 2,
    /// Aborted by the owner.
    Cancelled = 3,
}

impl GameState {
    /// Wire discriminant.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// STAKED PIECE
// =============================================================================

/// One staked piece with the mass reported by the asset registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakedPiece {
    /// Registry id.
    pub external_id: PieceId,
    /// Mass in game units.
    pub mass: u64,
}

// =============================================================================
// ROUND RECORD
// =============================================================================

/// Bookkeeping for one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RoundRecord {
    /// Player's move.
    pub player_action: PlayerAction,
    /// Agent's commit hash.
    pub agent_commit: Option<Digest32>,
    /// Agent's revealed move.
    pub agent_action: AgentAction,
    /// Index into the staked pieces used by the player.
    pub used_piece: Option<u8>,
}

impl RoundRecord {
    /// Player and agent have both acted and the agent revealed.
    pub fn is_resolved(&self) -> bool {
        self.player_action.is_played() && self.agent_action.is_played()
    }
}

// =============================================================================
// GAME
// =============================================================================

/// A duel between one player and the agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Unique handle.
    pub id: GameId,
    /// Owning player.
    pub player: AccountId,
    /// The three staked pieces, in stake order.
    pub staked_pieces: [StakedPiece; PIECES_PER_GAME],
    /// Agent health in `[0, 100]`.
    pub agent_health: u8,
    /// Round being played (3 once completed).
    pub current_round: u8,
    /// Charge carried into the current round (negative after a flip).
    pub accumulated_charge: i64,
    /// Lifecycle state.
    pub state: GameState,
    /// Step the current round is waiting for. Meaningful while `Active`.
    pub turn: TurnStatus,
    /// Amount staked at start (the mint price).
    pub stake_amount: u64,
    /// Refund fixed when the last round resolves.
    pub refund_amount: u64,
    /// Whether the refund was paid out.
    pub refund_claimed: bool,
    /// Per-round bookkeeping.
    pub rounds: [RoundRecord; ROUNDS_PER_GAME],
}

impl Game {
    /// Create a game that is ready for the agent's first commit.
    pub fn new(
        id: GameId,
        player: AccountId,
        staked_pieces: [StakedPiece; PIECES_PER_GAME],
        stake_amount: u64,
    ) -> Self {
        Self {
            id,
            player,
            staked_pieces,
            agent_health: STARTING_HEALTH,
            current_round: 0,
            accumulated_charge: 0,
            state: GameState::Active,
            turn: TurnStatus::AwaitingAgentCommit,
            stake_amount,
            refund_amount: 0,
            refund_claimed: false,
            rounds: [RoundRecord::default(); ROUNDS_PER_GAME],
        }
    }

    /// Is the game accepting round moves?
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == GameState::Active
    }

    /// Does the game still occupy the player's active slot?
    ///
    /// A completed game holds the slot until its refund is claimed, unless
    /// there is nothing to claim.
    pub fn holds_active_slot(&self) -> bool {
        match self.state {
            GameState::Waiting | GameState::Active => true,
            GameState::Completed => !self.refund_claimed && self.refund_amount > 0,
            GameState::Cancelled => false,
        }
    }

    /// Record for the round being played, if any.
    pub fn current_record(&self) -> Option<&RoundRecord> {
        self.rounds.get(self.current_round as usize)
    }

    /// Has this piece index been used in any round?
    pub fn is_piece_used(&self, index: u8) -> bool {
        self.rounds.iter().any(|r| r.used_piece == Some(index))
    }

    /// Sum of staked masses.
    pub fn total_mass(&self) -> u64 {
        self.staked_pieces.iter().fold(0u64, |acc, p| acc.saturating_add(p.mass))
    }

    /// Check the invariants every transition preserves.
    ///
    /// Engine-built games always pass. Records decoded from outside the
    /// engine (snapshots) must pass before any transition touches them.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if self.agent_health > MAX_HEALTH {
            return Err("agent health above maximum");
        }

        let played = self.current_round as usize;
        if played > ROUNDS_PER_GAME {
            return Err("round index past the last round");
        }
        match self.state {
            GameState::Completed if played != ROUNDS_PER_GAME => {
                return Err("completed game has rounds left");
            }
            GameState::Waiting | GameState::Active | GameState::Cancelled if played == ROUNDS_PER_GAME => {
                return Err("unfinished game has no round left");
            }
            _ => {}
        }
        if self.refund_claimed && self.state != GameState::Completed {
            return Err("refund claimed on an unfinished game");
        }
        if self.refund_amount > self.stake_amount {
            return Err("refund above stake");
        }

        let mut used = [false; PIECES_PER_GAME];
        for record in &self.rounds {
            if record.used_piece.is_some() != record.player_action.is_played() {
                return Err("player action and used piece disagree");
            }
            if let Some(index) = record.used_piece {
                let Some(seen) = used.get_mut(index as usize) else {
                    return Err("used piece index out of range");
                };
                if *seen {
                    return Err("piece used twice");
                }
                *seen = true;
            }
        }

        for (i, record) in self.rounds.iter().enumerate() {
            let progress = (
                record.agent_commit.is_some(),
                record.player_action.is_played(),
                record.agent_action.is_played(),
            );
            let expected = match i.cmp(&played) {
                Ordering::Less => (true, true, true),
                Ordering::Greater => (false, false, false),
                Ordering::Equal => match self.turn {
                    TurnStatus::AwaitingAgentCommit => (false, false, false),
                    TurnStatus::AwaitingPlayerMove => (true, false, false),
                    TurnStatus::AwaitingAgentReveal => (true, true, false),
                },
            };
            if progress != expected {
                return Err("round record does not match the turn");
            }
        }

        Ok(())
    }

    /// Per-round action summary.
    pub fn actions(&self) -> GameActions {
        let mut out = GameActions {
            player_actions: [PlayerAction::None; ROUNDS_PER_GAME],
            agent_actions: [AgentAction::None; ROUNDS_PER_GAME],
            piece_indices: [UNUSED_PIECE_INDEX; ROUNDS_PER_GAME],
            piece_masses: [0; PIECES_PER_GAME],
        };

        for (i, round) in self.rounds.iter().enumerate() {
            out.player_actions[i] = round.player_action;
            out.agent_actions[i] = round.agent_action;
            out.piece_indices[i] = round.used_piece.unwrap_or(UNUSED_PIECE_INDEX);
        }
        for (i, piece) in self.staked_pieces.iter().enumerate() {
            out.piece_masses[i] = piece.mass;
        }

        out
    }

    /// Deterministic digest of the full record.
    ///
    /// Two games hash equal iff every field is equal.
    pub fn compute_hash(&self) -> Digest32 {
        let mut hasher = StateHasher::for_game_state();

        hasher.update_u64(self.id.0);
        hasher.update_account(&self.player);
        for piece in &self.staked_pieces {
            hasher.update_piece(&piece.external_id);
            hasher.update_u64(piece.mass);
        }
        hasher.update_u8(self.agent_health);
        hasher.update_u8(self.current_round);
        hasher.update_i64(self.accumulated_charge);
        hasher.update_u8(self.state.code());
        hasher.update_u8(self.turn.code());
        hasher.update_u64(self.stake_amount);
        hasher.update_u64(self.refund_amount);
        hasher.update_bool(self.refund_claimed);

        for round in &self.rounds {
            hasher.update_u8(round.player_action.code());
            hasher.update_opt_digest(round.agent_commit.as_ref());
            hasher.update_u8(round.agent_action.code());
            hasher.update_u8(round.used_piece.unwrap_or(UNUSED_PIECE_INDEX));
        }

        hasher.finalize()
    }
}

/// Per-round view of a game's moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameActions {
    /// Player action per round.
    pub player_actions: [PlayerAction; ROUNDS_PER_GAME],
    /// Agent action per round.
    pub agent_actions: [AgentAction; ROUNDS_PER_GAME],
    /// Piece index used per round (`UNUSED_PIECE_INDEX` if none).
    pub piece_indices: [u8; ROUNDS_PER_GAME],
    /// Mass of each staked piece.
    pub piece_masses: [u64; PIECES_PER_GAME],
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_pieces(masses: [u64; 3]) -> [StakedPiece; 3] {
        [
            StakedPiece { external_id: PieceId::from_u64(1), mass: masses[0] },
            StakedPiece { external_id: PieceId::from_u64(2), mass: masses[1] },
            StakedPiece { external_id: PieceId::from_u64(3), mass: masses[2] },
        ]
    }

    pub(crate) fn test_game(masses: [u64; 3]) -> Game {
        Game::new(GameId(1), AccountId::new([7; 20]), test_pieces(masses), 1_000)
    }

    #[test]
    fn test_new_game_defaults() {
        let game = test_game([30, 20, 15]);
        assert_eq!(game.agent_health, 100);
        assert_eq!(game.current_round, 0);
        assert_eq!(game.accumulated_charge, 0);
        assert_eq!(game.state, GameState::Active);
        assert_eq!(game.turn, TurnStatus::AwaitingAgentCommit);
        assert_eq!(game.total_mass(), 65);
        assert!(game.holds_active_slot());
    }

    #[test]
    fn test_actions_view_uses_unused_sentinel() {
        let mut game = test_game([30, 20, 15]);
        game.rounds[0].player_action = PlayerAction::Attack;
        game.rounds[0].used_piece = Some(2);

        let actions = game.actions();
        assert_eq!(actions.player_actions[0], PlayerAction::Attack);
        assert_eq!(actions.piece_indices, [2, UNUSED_PIECE_INDEX, UNUSED_PIECE_INDEX]);
        assert_eq!(actions.piece_masses, [30, 20, 15]);
    }

    #[test]
    fn test_slot_release_rules() {
        let mut game = test_game([30, 20, 15]);
        game.state = GameState::Completed;
        game.refund_amount = 0;
        assert!(!game.holds_active_slot());

        game.refund_amount = 400;
        assert!(game.holds_active_slot());

        game.refund_claimed = true;
        assert!(!game.holds_active_slot());

        game.state = GameState::Cancelled;
        assert!(!game.holds_active_slot());
    }

    #[test]
    fn test_invariants_catch_impossible_records() {
        let game = test_game([30, 20, 15]);
        assert_eq!(game.check_invariants(), Ok(()));

        let mut bad = game.clone();
        bad.current_round = 3;
        assert!(bad.check_invariants().is_err());

        let mut bad = game.clone();
        bad.agent_health = 101;
        assert!(bad.check_invariants().is_err());

        let mut bad = game.clone();
        bad.turn = TurnStatus::AwaitingAgentReveal;
        bad.rounds[0].agent_commit = Some([1; 32]);
        bad.rounds[0].player_action = PlayerAction::Attack;
        bad.rounds[0].used_piece = Some(3);
        assert_eq!(bad.check_invariants(), Err("used piece index out of range"));

        // A reveal-ready round with no move behind it.
        let mut bad = game.clone();
        bad.turn = TurnStatus::AwaitingAgentReveal;
        bad.rounds[0].agent_commit = Some([1; 32]);
        assert_eq!(bad.check_invariants(), Err("round record does not match the turn"));

        let mut bad = game.clone();
        bad.current_round = 1;
        bad.rounds[0].player_action = PlayerAction::Attack;
        bad.rounds[0].used_piece = Some(0);
        bad.rounds[1].player_action = PlayerAction::Charge;
        bad.rounds[1].used_piece = Some(0);
        assert_eq!(bad.check_invariants(), Err("piece used twice"));
    }

    #[test]
    fn test_compute_hash_tracks_every_change() {
        let game = test_game([30, 20, 15]);
        let base = game.compute_hash();
        assert_eq!(base, game.clone().compute_hash());

        let mut changed = game.clone();
        changed.accumulated_charge = -20;
        assert_ne!(base, changed.compute_hash());

        let mut changed = game.clone();
        changed.rounds[1].agent_commit = Some([0; 32]);
        assert_ne!(base, changed.compute_hash());
    }
}
