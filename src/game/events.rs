//! Duel Events
//!
//! Every state change the engine commits also appends an event to its outbox.
//! Transports drain the outbox and fan events out to subscribers.
//!
//! The outbox is bounded. An embedder that never drains it loses the oldest
//! events, never memory; sequence numbers keep counting so the gap shows.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::ids::{AccountId, GameId};
use crate::game::action::{AgentAction, PlayerAction};
use crate::core::hash::Digest32;

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuelEventData {
    /// A game was created and is waiting for the agent's first commit.
    GameStarted {
        game_id: GameId,
        player: AccountId,
        stake_amount: u64,
        total_mass: u64,
    },

    /// The agent published a commit hash.
    AgentCommitted {
        game_id: GameId,
        round: u8,
        commit_hash: Digest32,
    },

    /// The player chose an action and a piece.
    PlayerMoved {
        game_id: GameId,
        round: u8,
        action: PlayerAction,
        piece_index: u8,
    },

    /// The agent revealed and the round resolved.
    RoundResolved {
        game_id: GameId,
        round: u8,
        player_action: PlayerAction,
        agent_action: AgentAction,
        agent_health: u8,
        accumulated_charge: i64,
    },

    /// The last round resolved and the refund is fixed.
    GameCompleted {
        game_id: GameId,
        final_agent_health: u8,
        refund_amount: u64,
    },

    /// The player collected the refund.
    RefundClaimed {
        game_id: GameId,
        player: AccountId,
        amount: u64,
    },

    /// The owner aborted a game.
    GameCancelled {
        game_id: GameId,
        player: AccountId,
    },

    /// An account was added to or removed from the agent whitelist.
    AgentWhitelistChanged {
        agent: AccountId,
        authorized: bool,
    },
}

/// An event with its position in the outbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelEvent {
    /// Monotonic sequence number, starting at 0.
    pub seq: u64,
    /// Event payload.
    pub data: DuelEventData,
}

impl DuelEvent {
    /// Game the event belongs to, if any.
    pub fn game_id(&self) -> Option<GameId> {
        match &self.data {
            DuelEventData::GameStarted { game_id, .. }
            | DuelEventData::AgentCommitted { game_id, .. }
            | DuelEventData::PlayerMoved { game_id, .. }
            | DuelEventData::RoundResolved { game_id, .. }
            | DuelEventData::GameCompleted { game_id, .. }
            | DuelEventData::RefundClaimed { game_id, .. }
            | DuelEventData::GameCancelled { game_id, .. } => Some(*game_id),
            DuelEventData::AgentWhitelistChanged { .. } => None,
        }
    }
}

impl PartialOrd for DuelEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DuelEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq.cmp(&other.seq)
    }
}

/// Undrained events kept before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

/// Bounded event buffer with sequence numbering.
#[derive(Clone, Debug)]
pub struct EventLog {
    next_seq: u64,
    capacity: usize,
    dropped: u64,
    pending: VecDeque<DuelEvent>,
}

impl EventLog {
    /// Create an empty log holding up to `DEFAULT_EVENT_CAPACITY` events.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty log holding up to `capacity` events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_seq: 0,
            capacity: capacity.max(1),
            dropped: 0,
            pending: VecDeque::new(),
        }
    }

    /// Append an event, returning its sequence number.
    ///
    /// When the log is full the oldest undrained event is discarded.
    pub fn push(&mut self, data: DuelEventData) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.pending.len() >= self.capacity {
            if let Some(lost) = self.pending.pop_front() {
                self.dropped += 1;
                warn!(seq = lost.seq, dropped = self.dropped, "event outbox full, dropping oldest event");
            }
        }
        self.pending.push_back(DuelEvent { seq, data });
        seq
    }

    /// Take every pending event in sequence order.
    pub fn drain(&mut self) -> Vec<DuelEvent> {
        self.pending.drain(..).collect()
    }

    /// Events discarded because the log was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Maximum number of undrained events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of undrained events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// No undrained events?
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
