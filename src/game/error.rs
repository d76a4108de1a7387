//! Duel errors.
//!
//! Every engine operation either applies its whole transition or returns
//! exactly one of these. Nothing is mutated on the error path.

use serde::{Serialize, Deserialize};

use crate::core::ids::{AccountId, GameId, PieceId};
use crate::game::state::GameState;
use crate::game::turn::TurnStatus;

/// Why a stake was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakeViolation {
    /// Wrong number of pieces.
    #[error("expected {expected} pieces, got {got}")]
    PieceCount {
        /// Required piece count.
        expected: usize,
        /// Supplied piece count.
        got: usize,
    },

    /// Same piece staked more than once.
    #[error("piece {0} staked more than once")]
    DuplicatePiece(PieceId),

    /// Sum of masses above the cap.
    #[error("total mass {total} exceeds {max}")]
    MassExceeded {
        /// Sum of the staked masses.
        total: u64,
        /// Configured cap.
        max: u64,
    },

    /// The asset registry refused the piece.
    #[error("piece {piece} rejected: {reason}")]
    Rejected {
        /// Offending piece.
        piece: PieceId,
        /// Registry's reason.
        reason: String,
    },
}

/// Errors returned by duel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DuelError {
    /// Player already owns a game that is not finished.
    #[error("player already has active game {0}")]
    AlreadyHasActiveGame(GameId),

    /// Piece count, duplicate, mass sum or provenance check failed.
    #[error("invalid stake: {0}")]
    InvalidStake(StakeViolation),

    /// No game with this id.
    #[error("game {0} not found")]
    NotFound(GameId),

    /// Operation is not legal in the current turn.
    #[error("wrong turn: round {round} is {status:?}")]
    WrongTurn {
        /// Round the game is in.
        round: u8,
        /// Step the round is waiting for.
        status: TurnStatus,
    },

    /// Game is not in the `Active` state.
    #[error("game not active ({0:?})")]
    GameNotActive(GameState),

    /// Round already has an agent commit.
    #[error("agent already committed for round {0}")]
    AlreadyCommitted(u8),

    /// Reveal attempted with no commit for the round.
    #[error("no commit for round {0}")]
    NoCommit(u8),

    /// Revealed action/secret do not hash to the commit.
    #[error("reveal does not match commit for round {0}")]
    InvalidReveal(u8),

    /// Round's agent action is already set.
    #[error("agent already revealed for round {0}")]
    AlreadyRevealed(u8),

    /// Staked piece already used in an earlier round.
    #[error("piece index {0} already used")]
    PieceAlreadyUsed(u8),

    /// Action or piece index not acceptable for this call.
    #[error("invalid action: {0}")]
    InvalidAction(&'static str),

    /// Refund requested before the game completed.
    #[error("game not completed")]
    GameNotCompleted,

    /// Refund already paid.
    #[error("refund already claimed")]
    AlreadyClaimed,

    /// Refund is zero.
    #[error("nothing to claim")]
    NothingToClaim,

    /// Caller is not allowed to perform this operation.
    #[error("unauthorized caller {0}")]
    Unauthorized(AccountId),
}

/// Stable error codes for clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// See [`DuelError::AlreadyHasActiveGame`].
    AlreadyHasActiveGame,
    /// See [`DuelError::InvalidStake`].
    InvalidStake,
    /// See [`DuelError::NotFound`].
    NotFound,
    /// See [`DuelError::WrongTurn`].
    WrongTurn,
    /// See [`DuelError::GameNotActive`].
    GameNotActive,
    /// See [`DuelError::AlreadyCommitted`].
    AlreadyCommitted,
    /// See [`DuelError::NoCommit`].
    NoCommit,
    /// See [`DuelError::InvalidReveal`].
    InvalidReveal,
    /// See [`DuelError::AlreadyRevealed`].
    AlreadyRevealed,
    /// See [`DuelError::PieceAlreadyUsed`].
    PieceAlreadyUsed,
    /// See [`DuelError::InvalidAction`].
    InvalidAction,
    /// See [`DuelError::GameNotCompleted`].
    GameNotCompleted,
    /// See [`DuelError::AlreadyClaimed`].
    AlreadyClaimed,
    /// See [`DuelError::NothingToClaim`].
    NothingToClaim,
    /// See [`DuelError::Unauthorized`].
    Unauthorized,
    /// Malformed request (transport level).
    InvalidInput,
    /// Caller has not authenticated (transport level).
    NotAuthenticated,
}

impl DuelError {
    /// Client-facing code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyHasActiveGame(_) => ErrorCode::AlreadyHasActiveGame,
            Self::InvalidStake(_) => ErrorCode::InvalidStake,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::WrongTurn { .. } => ErrorCode::WrongTurn,
            Self::GameNotActive(_) => ErrorCode::GameNotActive,
            Self::AlreadyCommitted(_) => ErrorCode::AlreadyCommitted,
            Self::NoCommit(_) => ErrorCode::NoCommit,
            Self::InvalidReveal(_) => ErrorCode::InvalidReveal,
            Self::AlreadyRevealed(_) => ErrorCode::AlreadyRevealed,
            Self::PieceAlreadyUsed(_) => ErrorCode::PieceAlreadyUsed,
            Self::InvalidAction(_) => ErrorCode::InvalidAction,
            Self::GameNotCompleted => ErrorCode::GameNotCompleted,
            Self::AlreadyClaimed => ErrorCode::AlreadyClaimed,
            Self::NothingToClaim => ErrorCode::NothingToClaim,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
        }
    }
}

impl From<StakeViolation> for DuelError {
    fn from(v: StakeViolation) -> Self {
        Self::InvalidStake(v)
    }
}
