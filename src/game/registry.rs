//! Game Registry
//!
//! Owns every game, the per-player active-slot index and per-player history.
//!
//! ```text
//!   games   : GameId    -> Game            (all games ever created)
//!   active  : AccountId -> GameId          (at most one slot-holding game)
//!   history : AccountId -> [GameId, ...]   (creation order, never pruned)
//! ```
//!
//! Game ids are sequential from `GameId::FIRST` and never reused.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::core::ids::{AccountId, GameId};
use crate::game::error::DuelError;
use crate::game::state::{Game, StakedPiece};
use crate::PIECES_PER_GAME;

/// Snapshot decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Bytes are not a valid snapshot.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Two games claim the same player's active slot.
    #[error("player {player} holds more than one active game")]
    ConflictingActiveGames {
        /// Offending player.
        player: AccountId,
    },

    /// A game record breaks an invariant the engine relies on.
    #[error("game {id} is inconsistent: {reason}")]
    InvalidGame {
        /// Offending game.
        id: GameId,
        /// Broken invariant.
        reason: &'static str,
    },

    /// A game id is at or beyond the recorded next id.
    #[error("game {id} is not below next id {next}")]
    IdOutOfRange {
        /// Offending id.
        id: GameId,
        /// Recorded next id.
        next: GameId,
    },
}

/// Serialized form of a registry.
#[derive(Serialize, Deserialize)]
struct RegistrySnapshot {
    next_id: GameId,
    games: Vec<Game>,
}

/// All games, indexed by id and by player.
#[derive(Debug, Clone)]
pub struct GameRegistry {
    games: BTreeMap<GameId, Game>,
    active: BTreeMap<AccountId, GameId>,
    history: BTreeMap<AccountId, Vec<GameId>>,
    next_id: GameId,
}

impl GameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            games: BTreeMap::new(),
            active: BTreeMap::new(),
            history: BTreeMap::new(),
            next_id: GameId::FIRST,
        }
    }

    /// Create a game for `player`, who must not hold an active slot.
    pub fn create_game(
        &mut self,
        player: AccountId,
        pieces: [StakedPiece; PIECES_PER_GAME],
        stake_amount: u64,
    ) -> Result<&Game, DuelError> {
        if let Some(existing) = self.active_game(&player) {
            return Err(DuelError::AlreadyHasActiveGame(existing));
        }

        let id = self.next_id;
        self.next_id = id.next();

        self.active.insert(player, id);
        self.history.entry(player).or_default().push(id);
        Ok(self.games.entry(id).or_insert(Game::new(id, player, pieces, stake_amount)))
    }

    /// The game currently holding `player`'s slot.
    pub fn active_game(&self, player: &AccountId) -> Option<GameId> {
        self.active
            .get(player)
            .copied()
            .filter(|id| self.games.get(id).is_some_and(Game::holds_active_slot))
    }

    /// Drop the slot index entry if the game no longer holds it.
    ///
    /// Returns true if the slot was released by this call.
    pub fn refresh_slot(&mut self, id: GameId) -> bool {
        let Some(game) = self.games.get(&id) else {
            return false;
        };
        if game.holds_active_slot() || self.active.get(&game.player) != Some(&id) {
            return false;
        }
        self.active.remove(&game.player);
        true
    }

    /// Look up a game.
    pub fn get(&self, id: GameId) -> Result<&Game, DuelError> {
        self.games.get(&id).ok_or(DuelError::NotFound(id))
    }

    /// Look up a game for mutation.
    pub fn get_mut(&mut self, id: GameId) -> Result<&mut Game, DuelError> {
        self.games.get_mut(&id).ok_or(DuelError::NotFound(id))
    }

    /// Every game `player` has started, oldest first.
    pub fn games_of(&self, player: &AccountId) -> &[GameId] {
        self.history.get(player).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of games ever created.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// No games yet?
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Id the next game will get.
    pub fn next_id(&self) -> GameId {
        self.next_id
    }

    /// Games in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Encode every game with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let snapshot = RegistrySnapshot {
            next_id: self.next_id,
            games: self.games.values().cloned().collect(),
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Decode a snapshot, check every game and rebuild the player indexes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: RegistrySnapshot = bincode::deserialize(data)?;

        let mut registry = Self::new();
        registry.next_id = snapshot.next_id;

        for game in snapshot.games {
            if game.id >= snapshot.next_id {
                return Err(SnapshotError::IdOutOfRange { id: game.id, next: snapshot.next_id });
            }
            game.check_invariants()
                .map_err(|reason| SnapshotError::InvalidGame { id: game.id, reason })?;
            if game.holds_active_slot() {
                if registry.active.insert(game.player, game.id).is_some() {
                    return Err(SnapshotError::ConflictingActiveGames { player: game.player });
                }
            }
            registry.history.entry(game.player).or_default().push(game.id);
            registry.games.insert(game.id, game);
        }

        Ok(registry)
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}
