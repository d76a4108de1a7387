//! Duel Engine
//!
//! Composition root: the registry, the turn state machine and the external
//! collaborators behind one transactional API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DUEL ENGINE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  start_game ──▶ AssetRegistry ──▶ stake ──▶ GameRegistry     │
//! │  agent_commit / agent_reveal ──▶ AgentAuthorization          │
//! │        └──▶ turn (commit / move / reveal ──▶ resolve)        │
//! │  claim_refund ──▶ stake ──▶ Minting (one-way)                │
//! │  every success ──▶ EventLog                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each operation takes `&mut self` and validates fully before mutating, so
//! a failed call leaves the engine untouched. [`SharedEngine`] serializes
//! concurrent callers with an async lock.

pub mod collaborators;
pub mod config;
pub mod shared;

use tracing::{debug, info, warn};

use crate::core::hash::Digest32;
use crate::core::ids::{AccountId, GameId, PieceId};
use crate::game::action::{AgentAction, PlayerAction};
use crate::game::error::{DuelError, StakeViolation};
use crate::game::events::{DuelEvent, DuelEventData, EventLog};
use crate::game::registry::{GameRegistry, SnapshotError};
use crate::game::stake;
use crate::game::state::{Game, GameActions};
use crate::game::turn::{self, PlayerMove, RoundResolution, TurnDetails, TurnView};
use crate::proof::commitment::Secret;

pub use collaborators::{
    AgentAuthorization, AgentWhitelist, AssetRegistry, Collaborators, InMemoryAssetRegistry,
    InMemoryCollaborators, MintNotice, Minting, PieceRejection, RecordingMinter,
};
pub use config::{ConfigError, EngineConfig};
pub use shared::SharedEngine;

/// The duel engine.
pub struct DuelEngine {
    config: EngineConfig,
    registry: GameRegistry,
    collaborators: Collaborators,
    events: EventLog,
}

impl DuelEngine {
    /// Create an engine with no games.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self::with_registry(config, collaborators, GameRegistry::new())
    }

    /// Create an engine over an existing registry (e.g. a restored snapshot).
    pub fn with_registry(
        config: EngineConfig,
        collaborators: Collaborators,
        registry: GameRegistry,
    ) -> Self {
        Self {
            config,
            registry,
            collaborators,
            events: EventLog::new(),
        }
    }

    /// Restore from a registry snapshot.
    pub fn restore(
        config: EngineConfig,
        collaborators: Collaborators,
        snapshot: &[u8],
    ) -> Result<Self, SnapshotError> {
        let registry = GameRegistry::from_bytes(snapshot)?;
        info!(games = registry.len(), "engine restored from snapshot");
        Ok(Self::with_registry(config, collaborators, registry))
    }

    /// Serialize every game.
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        self.registry.to_bytes()
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to every game.
    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    // =========================================================================
    // PLAYER / AGENT OPERATIONS
    // =========================================================================

    /// Stake three pieces and open a game against the agent.
    pub fn start_game(&mut self, player: AccountId, pieces: &[PieceId]) -> Result<GameId, DuelError> {
        if let Some(existing) = self.registry.active_game(&player) {
            return Err(DuelError::AlreadyHasActiveGame(existing));
        }

        stake::check_piece_ids(pieces)?;

        let mut resolved = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let mass = self
                .collaborators
                .assets
                .resolve_piece(&player, piece)
                .map_err(|reason| StakeViolation::Rejected {
                    piece: *piece,
                    reason: reason.to_string(),
                })?;
            resolved.push((*piece, mass));
        }
        let staked = stake::build_stake(&resolved, self.config.max_total_mass)?;

        let game = self.registry.create_game(player, staked, self.config.mint_price)?;
        let game_id = game.id;
        let total_mass = game.total_mass();

        info!(
            game = %game_id,
            player = %player.short(),
            total_mass,
            stake = game.stake_amount,
            "game started"
        );
        self.events.push(DuelEventData::GameStarted {
            game_id,
            player,
            stake_amount: self.config.mint_price,
            total_mass,
        });
        Ok(game_id)
    }

    fn require_agent(&self, caller: &AccountId) -> Result<(), DuelError> {
        if !self.collaborators.agents.is_authorized_agent(caller) {
            warn!(caller = %caller.short(), "rejected call from non-whitelisted agent");
            return Err(DuelError::Unauthorized(*caller));
        }
        Ok(())
    }

    fn require_player(game: &Game, caller: &AccountId) -> Result<(), DuelError> {
        if game.player != *caller {
            warn!(game = %game.id, caller = %caller.short(), "rejected call from non-owner of game");
            return Err(DuelError::Unauthorized(*caller));
        }
        Ok(())
    }

    /// Agent publishes its commit hash for the current round.
    pub fn agent_commit(
        &mut self,
        caller: &AccountId,
        game_id: GameId,
        commit_hash: Digest32,
    ) -> Result<u8, DuelError> {
        self.require_agent(caller)?;
        let game = self.registry.get_mut(game_id)?;
        let round = turn::agent_commit(game, commit_hash)?;

        debug!(game = %game_id, round, hash = %hex::encode(&commit_hash[..4]), "agent committed");
        self.events.push(DuelEventData::AgentCommitted { game_id, round, commit_hash });
        Ok(round)
    }

    /// Player picks an action and one of their unused pieces.
    pub fn player_move(
        &mut self,
        caller: &AccountId,
        game_id: GameId,
        action: PlayerAction,
        piece_index: u8,
    ) -> Result<PlayerMove, DuelError> {
        let game = self.registry.get_mut(game_id)?;
        Self::require_player(game, caller)?;
        let mv = turn::player_move(game, action, piece_index)?;

        debug!(game = %game_id, round = mv.round, ?action, piece_index, mass = mv.mass, "player moved");
        self.events.push(DuelEventData::PlayerMoved {
            game_id,
            round: mv.round,
            action,
            piece_index,
        });
        Ok(mv)
    }

    /// Agent reveals its move; the round resolves immediately.
    pub fn agent_reveal(
        &mut self,
        caller: &AccountId,
        game_id: GameId,
        action: AgentAction,
        secret: &Secret,
    ) -> Result<RoundResolution, DuelError> {
        self.require_agent(caller)?;
        let game = self.registry.get_mut(game_id)?;
        let res = turn::agent_reveal(game, action, secret)?;
        let charge = game.accumulated_charge;

        #[cfg(feature = "debug-tracing")]
        debug!(
            game = %game_id,
            round = res.round,
            mass = res.mass,
            charge_in = res.charge_in,
            delta = res.outcome.health_delta,
            charge_out = res.outcome.charge_out,
            "resolution detail"
        );

        info!(
            game = %game_id,
            round = res.round,
            player_action = ?res.player_action,
            agent_action = ?res.agent_action,
            health = res.health_after,
            "round resolved"
        );
        self.events.push(DuelEventData::RoundResolved {
            game_id,
            round: res.round,
            player_action: res.player_action,
            agent_action: res.agent_action,
            agent_health: res.health_after,
            accumulated_charge: charge,
        });

        if let Some(refund_amount) = res.refund {
            info!(game = %game_id, health = res.health_after, refund = refund_amount, "game completed");
            self.events.push(DuelEventData::GameCompleted {
                game_id,
                final_agent_health: res.health_after,
                refund_amount,
            });
            // A zero refund leaves nothing to claim, so the slot frees now.
            self.registry.refresh_slot(game_id);
        }
        Ok(res)
    }

    /// Pay out the refund of a completed game and notify minting.
    pub fn claim_refund(&mut self, caller: &AccountId, game_id: GameId) -> Result<u64, DuelError> {
        let game = self.registry.get_mut(game_id)?;
        Self::require_player(game, caller)?;
        let amount = stake::claim_refund(game)?;
        let player = game.player;
        self.registry.refresh_slot(game_id);

        info!(game = %game_id, player = %player.short(), amount, "refund claimed");
        self.collaborators.minter.notify_discount(MintNotice {
            game_id,
            player,
            discount: amount,
            mint_price: self.config.mint_price,
        });
        self.events.push(DuelEventData::RefundClaimed { game_id, player, amount });
        Ok(amount)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Whose turn it is in a game.
    pub fn whose_turn(&self, game_id: GameId) -> Result<TurnView, DuelError> {
        Ok(turn::whose_turn(self.registry.get(game_id)?))
    }

    /// Full game record.
    pub fn get_game(&self, game_id: GameId) -> Result<&Game, DuelError> {
        self.registry.get(game_id)
    }

    /// Per-round moves and piece masses.
    pub fn game_actions(&self, game_id: GameId) -> Result<GameActions, DuelError> {
        Ok(self.registry.get(game_id)?.actions())
    }

    /// Flag-style turn breakdown.
    pub fn turn_details(&self, game_id: GameId) -> Result<TurnDetails, DuelError> {
        Ok(turn::turn_details(self.registry.get(game_id)?))
    }

    /// Game holding the player's active slot.
    pub fn active_game(&self, player: &AccountId) -> Option<GameId> {
        self.registry.active_game(player)
    }

    /// Every game the player has started.
    pub fn games_of(&self, player: &AccountId) -> &[GameId] {
        self.registry.games_of(player)
    }

    /// Is `account` a whitelisted agent?
    pub fn is_agent(&self, account: &AccountId) -> bool {
        self.collaborators.agents.is_authorized_agent(account)
    }

    // =========================================================================
    // ADMINISTRATION
    // =========================================================================

    fn require_owner(&self, caller: &AccountId) -> Result<(), DuelError> {
        if *caller != self.config.owner {
            warn!(caller = %caller.short(), "rejected administrative call");
            return Err(DuelError::Unauthorized(*caller));
        }
        Ok(())
    }

    /// Add or remove an agent. Owner only.
    pub fn set_agent_whitelist(
        &mut self,
        caller: &AccountId,
        agent: AccountId,
        authorized: bool,
    ) -> Result<(), DuelError> {
        self.require_owner(caller)?;
        if self.collaborators.agents.set_authorized(agent, authorized) {
            info!(agent = %agent.short(), authorized, "agent whitelist changed");
            self.events.push(DuelEventData::AgentWhitelistChanged { agent, authorized });
        }
        Ok(())
    }

    /// Abort an active game and free its player's slot. Owner only.
    pub fn cancel_game(&mut self, caller: &AccountId, game_id: GameId) -> Result<(), DuelError> {
        self.require_owner(caller)?;
        let game = self.registry.get_mut(game_id)?;
        turn::cancel(game)?;
        let player = game.player;
        self.registry.refresh_slot(game_id);

        info!(game = %game_id, player = %player.short(), "game cancelled");
        self.events.push(DuelEventData::GameCancelled { game_id, player });
        Ok(())
    }

    /// Take every event emitted since the last drain.
    ///
    /// Embedders should drain regularly: the outbox keeps at most
    /// `DEFAULT_EVENT_CAPACITY` events and drops the oldest beyond that.
    pub fn drain_events(&mut self) -> Vec<DuelEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::state::GameState;
    use crate::game::turn::{TurnStatus, CLAIMED_ROUND, COMPLETED_ROUND, NO_TURN};
    use crate::proof::commitment::AgentCommitment;

    pub(crate) const OWNER: AccountId = AccountId::new([0x0E; 20]);
    pub(crate) const AGENT: AccountId = AccountId::new([0xA6; 20]);
    pub(crate) const ALICE: AccountId = AccountId::new([0xA1; 20]);
    pub(crate) const BOB: AccountId = AccountId::new([0xB0; 20]);

    pub(crate) fn alice_pieces() -> Vec<PieceId> {
        (1..=3).map(PieceId::from_u64).collect()
    }

    /// Engine with ALICE owning pieces 1..=3 (masses 30, 20, 15), BOB owning
    /// pieces 11..=13 (masses 50, 40, 10), AGENT whitelisted, stake 1_000.
    pub(crate) fn test_engine() -> (DuelEngine, InMemoryCollaborators) {
        let collab = InMemoryCollaborators::new();
        for (i, mass) in [30, 20, 15].into_iter().enumerate() {
            collab.assets.insert(PieceId::from_u64(i as u64 + 1), ALICE, mass);
        }
        for (i, mass) in [50, 40, 10].into_iter().enumerate() {
            collab.assets.insert(PieceId::from_u64(i as u64 + 11), BOB, mass);
        }
        collab.agents.set_authorized(AGENT, true);

        let config = EngineConfig { mint_price: 1_000, ..EngineConfig::default() }.with_owner(OWNER);
        (DuelEngine::new(config, collab.bundle()), collab)
    }

    fn play(
        engine: &mut DuelEngine,
        id: GameId,
        player: PlayerAction,
        piece: u8,
        agent: AgentAction,
    ) -> RoundResolution {
        let round = engine.get_game(id).unwrap().current_round;
        let c = AgentCommitment::new(agent, [round + 7; 32], round);
        engine.agent_commit(&AGENT, id, c.hash).unwrap();
        engine.player_move(&ALICE, id, player, piece).unwrap();
        engine.agent_reveal(&AGENT, id, agent, &c.secret).unwrap()
    }

    #[test]
    fn test_start_game_records_stake() {
        let (mut engine, _) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();

        let game = engine.get_game(id).unwrap();
        assert_eq!(id, GameId(1));
        assert_eq!(game.stake_amount, 1_000);
        assert_eq!(game.state, GameState::Active);
        assert_eq!(game.staked_pieces[1].mass, 20);
        assert_eq!(engine.active_game(&ALICE), Some(id));
        assert_eq!(engine.whose_turn(id).unwrap().wire(), (0, TurnStatus::AwaitingAgentCommit.code()));
    }

    #[test]
    fn test_start_game_validation() {
        let (mut engine, collab) = test_engine();

        // Bob's pieces are not Alice's.
        let err = engine.start_game(ALICE, &[PieceId::from_u64(1), PieceId::from_u64(2), PieceId::from_u64(11)]);
        assert!(matches!(
            err,
            Err(DuelError::InvalidStake(StakeViolation::Rejected { .. }))
        ));

        // Too heavy: 50 + 40 + 20.
        collab.assets.insert(PieceId::from_u64(14), BOB, 20);
        let err = engine.start_game(BOB, &[PieceId::from_u64(11), PieceId::from_u64(12), PieceId::from_u64(14)]);
        assert!(matches!(
            err,
            Err(DuelError::InvalidStake(StakeViolation::MassExceeded { total: 110, max: 100 }))
        ));

        let err = engine.start_game(ALICE, &alice_pieces()[..2]);
        assert!(matches!(err, Err(DuelError::InvalidStake(StakeViolation::PieceCount { .. }))));

        // Nothing was created by the failures.
        assert!(engine.registry().is_empty());
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_second_game_rejected_while_active() {
        let (mut engine, _) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();
        assert_eq!(
            engine.start_game(ALICE, &alice_pieces()),
            Err(DuelError::AlreadyHasActiveGame(id))
        );
    }

    #[test]
    fn test_authorization() {
        let (mut engine, _) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();

        assert_eq!(engine.agent_commit(&BOB, id, [1; 32]), Err(DuelError::Unauthorized(BOB)));
        engine.agent_commit(&AGENT, id, [1; 32]).unwrap();
        assert_eq!(
            engine.player_move(&BOB, id, PlayerAction::Attack, 0).map(|_| ()),
            Err(DuelError::Unauthorized(BOB))
        );
        assert_eq!(
            engine.agent_commit(&AGENT, GameId(99), [1; 32]),
            Err(DuelError::NotFound(GameId(99)))
        );
    }

    #[test]
    fn test_full_game_claim_and_mint_notice() {
        let (mut engine, collab) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();

        play(&mut engine, id, PlayerAction::Attack, 0, AgentAction::Defend); // 100
        play(&mut engine, id, PlayerAction::Attack, 1, AgentAction::FlipCharge); // 80
        let last = play(&mut engine, id, PlayerAction::Attack, 2, AgentAction::FlipCharge); // 65
        assert_eq!(last.refund, Some(350));

        assert_eq!(engine.whose_turn(id).unwrap().wire(), (COMPLETED_ROUND, NO_TURN));
        // Slot is held until the refund is claimed.
        assert_eq!(engine.active_game(&ALICE), Some(id));

        assert_eq!(engine.claim_refund(&BOB, id), Err(DuelError::Unauthorized(BOB)));
        assert_eq!(engine.claim_refund(&ALICE, id), Ok(350));
        assert_eq!(engine.claim_refund(&ALICE, id), Err(DuelError::AlreadyClaimed));

        assert_eq!(engine.whose_turn(id).unwrap().wire(), (CLAIMED_ROUND, NO_TURN));
        assert_eq!(engine.active_game(&ALICE), None);

        let notices = collab.minter.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].discount, 350);
        assert_eq!(notices[0].discounted_price(), 650);

        // Free to play again; history keeps both.
        let next = engine.start_game(ALICE, &alice_pieces()).unwrap();
        assert_eq!(engine.games_of(&ALICE), &[id, next]);
    }

    #[test]
    fn test_zero_refund_releases_slot() {
        let (mut engine, _) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();
        for piece in 0..3 {
            play(&mut engine, id, PlayerAction::Attack, piece, AgentAction::Defend);
        }

        assert_eq!(engine.get_game(id).unwrap().refund_amount, 0);
        assert_eq!(engine.claim_refund(&ALICE, id), Err(DuelError::NothingToClaim));
        assert_eq!(engine.active_game(&ALICE), None);
    }

    #[test]
    fn test_events_follow_transitions() {
        let (mut engine, _) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();
        play(&mut engine, id, PlayerAction::Charge, 0, AgentAction::Recover);

        let kinds: Vec<_> = engine
            .drain_events()
            .into_iter()
            .map(|e| match e.data {
                DuelEventData::GameStarted { .. } => "started",
                DuelEventData::AgentCommitted { .. } => "committed",
                DuelEventData::PlayerMoved { .. } => "moved",
                DuelEventData::RoundResolved { .. } => "resolved",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["started", "committed", "moved", "resolved"]);
    }

    #[test]
    fn test_actions_and_details() {
        let (mut engine, _) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();
        play(&mut engine, id, PlayerAction::Charge, 2, AgentAction::FlipCharge);

        let actions = engine.game_actions(id).unwrap();
        assert_eq!(actions.player_actions[0], PlayerAction::Charge);
        assert_eq!(actions.agent_actions[0], AgentAction::FlipCharge);
        assert_eq!(actions.piece_indices[0], 2);
        assert_eq!(actions.piece_masses, [30, 20, 15]);
        assert_eq!(engine.get_game(id).unwrap().accumulated_charge, -15);

        let details = engine.turn_details(id).unwrap();
        assert_eq!(details.current_round, 1);
        assert!(details.is_agent_turn);
        assert!(!details.agent_committed);
    }

    #[test]
    fn test_whitelist_admin() {
        let (mut engine, _) = test_engine();
        let new_agent = AccountId::new([0x55; 20]);

        assert_eq!(
            engine.set_agent_whitelist(&ALICE, new_agent, true),
            Err(DuelError::Unauthorized(ALICE))
        );
        engine.set_agent_whitelist(&OWNER, new_agent, true).unwrap();
        assert!(engine.is_agent(&new_agent));
        engine.set_agent_whitelist(&OWNER, AGENT, false).unwrap();
        assert!(!engine.is_agent(&AGENT));
    }

    #[test]
    fn test_cancel_frees_slot() {
        let (mut engine, _) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();

        assert_eq!(engine.cancel_game(&ALICE, id), Err(DuelError::Unauthorized(ALICE)));
        engine.cancel_game(&OWNER, id).unwrap();

        assert_eq!(engine.active_game(&ALICE), None);
        assert_eq!(engine.claim_refund(&ALICE, id), Err(DuelError::GameNotCompleted));
        assert_eq!(
            engine.agent_commit(&AGENT, id, [0; 32]),
            Err(DuelError::GameNotActive(GameState::Cancelled))
        );
        assert!(engine.start_game(ALICE, &alice_pieces()).is_ok());
    }

    #[test]
    fn test_snapshot_restore() {
        let (mut engine, collab) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();
        play(&mut engine, id, PlayerAction::Attack, 1, AgentAction::FlipCharge);

        let bytes = engine.snapshot().unwrap();
        let restored = DuelEngine::restore(engine.config().clone(), collab.bundle(), &bytes).unwrap();

        assert_eq!(restored.get_game(id).unwrap(), engine.get_game(id).unwrap());
        assert_eq!(restored.active_game(&ALICE), Some(id));
    }

    #[test]
    fn test_restore_rejects_corrupt_game() {
        let (mut engine, collab) = test_engine();
        let id = engine.start_game(ALICE, &alice_pieces()).unwrap();
        engine.registry.get_mut(id).unwrap().current_round = 3;

        let bytes = engine.snapshot().unwrap();
        let restored = DuelEngine::restore(engine.config().clone(), collab.bundle(), &bytes);
        assert!(matches!(restored, Err(SnapshotError::InvalidGame { id: bad, .. }) if bad == id));
    }
}
