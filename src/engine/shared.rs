//! Shared engine handle for async callers.
//!
//! Every operation takes the write lock for its whole transaction, so two
//! callers can never interleave inside one game. Queries share the read lock
//! and return owned copies.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::hash::Digest32;
use crate::core::ids::{AccountId, GameId, PieceId};
use crate::engine::DuelEngine;
use crate::game::action::{AgentAction, PlayerAction};
use crate::game::error::DuelError;
use crate::game::events::DuelEvent;
use crate::game::state::{Game, GameActions};
use crate::game::turn::{PlayerMove, RoundResolution, TurnDetails, TurnView};
use crate::proof::commitment::Secret;

/// Cloneable, lock-protected engine.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<DuelEngine>>,
}

impl SharedEngine {
    /// Wrap an engine.
    pub fn new(engine: DuelEngine) -> Self {
        Self { inner: Arc::new(RwLock::new(engine)) }
    }

    /// Run a closure with exclusive access.
    pub async fn with_mut<R>(&self, f: impl FnOnce(&mut DuelEngine) -> R) -> R {
        let mut engine = self.inner.write().await;
        f(&mut engine)
    }

    /// Run a closure with shared access.
    pub async fn with<R>(&self, f: impl FnOnce(&DuelEngine) -> R) -> R {
        let engine = self.inner.read().await;
        f(&engine)
    }

    /// See [`DuelEngine::start_game`].
    pub async fn start_game(&self, player: AccountId, pieces: Vec<PieceId>) -> Result<GameId, DuelError> {
        self.with_mut(|e| e.start_game(player, &pieces)).await
    }

    /// See [`DuelEngine::agent_commit`].
    pub async fn agent_commit(&self, caller: AccountId, game_id: GameId, hash: Digest32) -> Result<u8, DuelError> {
        self.with_mut(|e| e.agent_commit(&caller, game_id, hash)).await
    }

    /// See [`DuelEngine::player_move`].
    pub async fn player_move(
        &self,
        caller: AccountId,
        game_id: GameId,
        action: PlayerAction,
        piece_index: u8,
    ) -> Result<PlayerMove, DuelError> {
        self.with_mut(|e| e.player_move(&caller, game_id, action, piece_index)).await
    }

    /// See [`DuelEngine::agent_reveal`].
    pub async fn agent_reveal(
        &self,
        caller: AccountId,
        game_id: GameId,
        action: AgentAction,
        secret: Secret,
    ) -> Result<RoundResolution, DuelError> {
        self.with_mut(|e| e.agent_reveal(&caller, game_id, action, &secret)).await
    }

    /// See [`DuelEngine::claim_refund`].
    pub async fn claim_refund(&self, caller: AccountId, game_id: GameId) -> Result<u64, DuelError> {
        self.with_mut(|e| e.claim_refund(&caller, game_id)).await
    }

    /// See [`DuelEngine::set_agent_whitelist`].
    pub async fn set_agent_whitelist(&self, caller: AccountId, agent: AccountId, authorized: bool) -> Result<(), DuelError> {
        self.with_mut(|e| e.set_agent_whitelist(&caller, agent, authorized)).await
    }

    /// See [`DuelEngine::cancel_game`].
    pub async fn cancel_game(&self, caller: AccountId, game_id: GameId) -> Result<(), DuelError> {
        self.with_mut(|e| e.cancel_game(&caller, game_id)).await
    }

    /// See [`DuelEngine::whose_turn`].
    pub async fn whose_turn(&self, game_id: GameId) -> Result<TurnView, DuelError> {
        self.with(|e| e.whose_turn(game_id)).await
    }

    /// Owned copy of a game.
    pub async fn get_game(&self, game_id: GameId) -> Result<Game, DuelError> {
        self.with(|e| e.get_game(game_id).cloned()).await
    }

    /// See [`DuelEngine::game_actions`].
    pub async fn game_actions(&self, game_id: GameId) -> Result<GameActions, DuelError> {
        self.with(|e| e.game_actions(game_id)).await
    }

    /// See [`DuelEngine::turn_details`].
    pub async fn turn_details(&self, game_id: GameId) -> Result<TurnDetails, DuelError> {
        self.with(|e| e.turn_details(game_id)).await
    }

    /// See [`DuelEngine::active_game`].
    pub async fn active_game(&self, player: AccountId) -> Option<GameId> {
        self.with(|e| e.active_game(&player)).await
    }

    /// Owned copy of the player's history.
    pub async fn games_of(&self, player: AccountId) -> Vec<GameId> {
        self.with(|e| e.games_of(&player).to_vec()).await
    }

    /// See [`DuelEngine::drain_events`].
    pub async fn drain_events(&self) -> Vec<DuelEvent> {
        self.with_mut(DuelEngine::drain_events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{alice_pieces, test_engine, AGENT, ALICE};
    use crate::proof::commitment::AgentCommitment;

    #[tokio::test]
    async fn test_concurrent_starts_allow_one_game() {
        let (engine, _) = test_engine();
        let shared = SharedEngine::new(engine);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = shared.clone();
            handles.push(tokio::spawn(async move { s.start_game(ALICE, alice_pieces()).await }));
        }

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert!(matches!(e, DuelError::AlreadyHasActiveGame(_))),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(shared.games_of(ALICE).await.len(), 1);
    }

    #[tokio::test]
    async fn test_round_through_shared_handle() {
        let (engine, _) = test_engine();
        let shared = SharedEngine::new(engine);
        let id = shared.start_game(ALICE, alice_pieces()).await.unwrap();

        let c = AgentCommitment::new(AgentAction::Recover, [3; 32], 0);
        shared.agent_commit(AGENT, id, c.hash).await.unwrap();
        shared.player_move(ALICE, id, PlayerAction::Charge, 1).await.unwrap();
        let res = shared.agent_reveal(AGENT, id, AgentAction::Recover, c.secret).await.unwrap();

        assert_eq!(res.health_after, 100);
        assert_eq!(shared.get_game(id).await.unwrap().accumulated_charge, 20);
        assert_eq!(shared.drain_events().await.len(), 4);
    }
}
