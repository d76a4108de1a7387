//! Turn State Machine
//!
//! Each round runs three steps in strict order:
//!
//! ```text
//!   AwaitingAgentCommit ──commit──▶ AwaitingPlayerMove ──move──▶ AwaitingAgentReveal
//!          ▲                                                            │
//!          └──────────────── reveal + resolve (round += 1) ─────────────┘
//!                                   │ round == 3
//!                                   ▼
//!                               Completed
//! ```
//!
//! Every transition validates first and mutates only once all checks pass.

use serde::{Serialize, Deserialize};

use crate::game::action::{AgentAction, PlayerAction};
use crate::game::error::DuelError;
use crate::game::resolve::{resolve, RoundOutcome};
use crate::game::stake::compute_refund;
use crate::game::state::{Game, GameState};
use crate::core::hash::Digest32;
use crate::proof::commitment::{self, Secret};
use crate::{PIECES_PER_GAME, ROUNDS_PER_GAME};

/// Presentation round for a completed game with an unclaimed refund.
pub const COMPLETED_ROUND: u8 = 4;

/// Presentation round for a completed game whose refund was claimed.
pub const CLAIMED_ROUND: u8 = 5;

/// Status code used when nobody is expected to move.
pub const NO_TURN: u8 = 255;

/// Step the current round is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TurnStatus {
    /// Agent must publish its commit hash.
    #[default]
    AwaitingAgentCommit = 0,
    /// Player must choose an action and a piece.
    AwaitingPlayerMove = 1,
    /// Agent must reveal the committed action.
    AwaitingAgentReveal = 2,
}

impl TurnStatus {
    /// Wire discriminant.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Answer to "whose turn is it?".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TurnView {
    /// Game has not started.
    Waiting,
    /// A round is in progress.
    InRound {
        /// Round index (0..3).
        round: u8,
        /// Expected next step.
        status: TurnStatus,
    },
    /// All rounds played, refund not claimed.
    Completed,
    /// All rounds played, refund claimed.
    Claimed,
    /// Game was cancelled.
    Cancelled {
        /// Round the game stopped in.
        round: u8,
    },
}

impl TurnView {
    /// `(round, status)` pair as exposed to clients.
    ///
    /// Rounds 4 and 5 are presentation sentinels for completed games.
    pub fn wire(&self) -> (u8, u8) {
        match *self {
            Self::Waiting => (0, NO_TURN),
            Self::InRound { round, status } => (round, status.code()),
            Self::Completed => (COMPLETED_ROUND, NO_TURN),
            Self::Claimed => (CLAIMED_ROUND, NO_TURN),
            Self::Cancelled { round } => (round, NO_TURN),
        }
    }

    /// Is the agent expected to act?
    pub fn is_agent_turn(&self) -> bool {
        matches!(
            self,
            Self::InRound { status: TurnStatus::AwaitingAgentCommit, .. }
                | Self::InRound { status: TurnStatus::AwaitingAgentReveal, .. }
        )
    }

    /// Is the player expected to act?
    pub fn is_player_turn(&self) -> bool {
        matches!(self, Self::InRound { status: TurnStatus::AwaitingPlayerMove, .. })
    }
}

/// Turn query for a game.
pub fn whose_turn(game: &Game) -> TurnView {
    match game.state {
        GameState::Waiting => TurnView::Waiting,
        GameState::Active => TurnView::InRound { round: game.current_round, status: game.turn },
        GameState::Completed if game.refund_claimed => TurnView::Claimed,
        GameState::Completed => TurnView::Completed,
        GameState::Cancelled => TurnView::Cancelled { round: game.current_round },
    }
}

/// Flag-style breakdown of the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDetails {
    /// Round counter (3 once completed).
    pub current_round: u8,
    /// Agent is expected to act.
    pub is_agent_turn: bool,
    /// Agent committed for the shown round.
    pub agent_committed: bool,
    /// Player moved in the shown round.
    pub player_played: bool,
    /// Shown round is resolved.
    pub round_completed: bool,
    /// Lifecycle state.
    pub game_state: GameState,
}

/// Detailed turn status. For a completed game the last round is shown.
pub fn turn_details(game: &Game) -> TurnDetails {
    let shown = (game.current_round as usize).min(ROUNDS_PER_GAME - 1);
    let record = &game.rounds[shown];

    TurnDetails {
        current_round: game.current_round,
        is_agent_turn: whose_turn(game).is_agent_turn(),
        agent_committed: record.agent_commit.is_some(),
        player_played: record.player_action.is_played(),
        round_completed: record.is_resolved(),
        game_state: game.state,
    }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

fn expect_turn(game: &Game, expected: TurnStatus) -> Result<(), DuelError> {
    if !game.is_active() {
        return Err(DuelError::GameNotActive(game.state));
    }
    if game.turn != expected {
        return Err(DuelError::WrongTurn { round: game.current_round, status: game.turn });
    }
    Ok(())
}

/// Accept the agent's commit for the current round. Returns the round index.
pub fn agent_commit(game: &mut Game, hash: Digest32) -> Result<u8, DuelError> {
    if !game.is_active() {
        return Err(DuelError::GameNotActive(game.state));
    }

    let round = game.current_round;
    let idx = round as usize;
    // A retried commit reports the duplicate rather than the turn.
    commitment::check_commit(&game.rounds[idx], round)?;
    expect_turn(game, TurnStatus::AwaitingAgentCommit)?;

    commitment::commit(&mut game.rounds[idx], round, hash)?;
    game.turn = TurnStatus::AwaitingPlayerMove;
    Ok(round)
}

/// An accepted player move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMove {
    /// Round index.
    pub round: u8,
    /// Chosen action.
    pub action: PlayerAction,
    /// Chosen piece.
    pub piece_index: u8,
    /// Mass of that piece.
    pub mass: u64,
}

/// Accept the player's move for the current round.
pub fn player_move(game: &mut Game, action: PlayerAction, piece_index: u8) -> Result<PlayerMove, DuelError> {
    expect_turn(game, TurnStatus::AwaitingPlayerMove)?;

    if !action.is_played() {
        return Err(DuelError::InvalidAction("player must ATTACK or CHARGE"));
    }
    if piece_index as usize >= PIECES_PER_GAME {
        return Err(DuelError::InvalidAction("piece index out of range"));
    }
    if game.is_piece_used(piece_index) {
        return Err(DuelError::PieceAlreadyUsed(piece_index));
    }

    let round = game.current_round;
    let record = &mut game.rounds[round as usize];
    record.player_action = action;
    record.used_piece = Some(piece_index);
    game.turn = TurnStatus::AwaitingAgentReveal;

    Ok(PlayerMove {
        round,
        action,
        piece_index,
        mass: game.staked_pieces[piece_index as usize].mass,
    })
}

/// A resolved round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResolution {
    /// Round index that was resolved.
    pub round: u8,
    /// Player's action.
    pub player_action: PlayerAction,
    /// Agent's revealed action.
    pub agent_action: AgentAction,
    /// Piece the player used.
    pub piece_index: u8,
    /// That piece's mass.
    pub mass: u64,
    /// Charge coming into the round.
    pub charge_in: i64,
    /// Resolver output.
    pub outcome: RoundOutcome,
    /// Agent health before the round.
    pub health_before: u8,
    /// Agent health after clamping.
    pub health_after: u8,
    /// Refund fixed by this round, if it was the last one.
    pub refund: Option<u64>,
}

impl RoundResolution {
    /// Did this round finish the game?
    pub fn completed(&self) -> bool {
        self.refund.is_some()
    }
}

/// Verify the agent's reveal, resolve the round and advance.
pub fn agent_reveal(game: &mut Game, action: AgentAction, secret: &Secret) -> Result<RoundResolution, DuelError> {
    expect_turn(game, TurnStatus::AwaitingAgentReveal)?;

    let round = game.current_round;
    let idx = round as usize;
    commitment::check_reveal(&game.rounds[idx], round, action, secret)?;

    let record = game.rounds[idx];
    let Some(piece_index) = record.used_piece else {
        unreachable!("round {} awaiting reveal without a player move", round);
    };
    let mass = game.staked_pieces[piece_index as usize].mass;
    let charge_in = game.accumulated_charge;
    let Some(outcome) = resolve(record.player_action, mass, action, charge_in) else {
        unreachable!("round {} has an unplayable action pair", round);
    };

    // Validation complete; apply.
    commitment::reveal(&mut game.rounds[idx], round, action, secret)?;

    let health_before = game.agent_health;
    game.agent_health = outcome.apply(health_before);
    game.accumulated_charge = outcome.charge_out;
    game.current_round += 1;
    game.turn = TurnStatus::AwaitingAgentCommit;

    let refund = if game.current_round as usize == ROUNDS_PER_GAME {
        game.state = GameState::Completed;
        game.refund_amount = compute_refund(game.stake_amount, game.agent_health);
        Some(game.refund_amount)
    } else {
        None
    };

    Ok(RoundResolution {
        round,
        player_action: record.player_action,
        agent_action: action,
        piece_index,
        mass,
        charge_in,
        outcome,
        health_before,
        health_after: game.agent_health,
        refund,
    })
}

/// Abort an active game.
pub fn cancel(game: &mut Game) -> Result<(), DuelError> {
    if !game.is_active() {
        return Err(DuelError::GameNotActive(game.state));
    }
    game.state = GameState::Cancelled;
    Ok(())
}
