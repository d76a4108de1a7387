//! External Collaborators
//!
//! The engine consults three outside services. Each is a trait so a
//! deployment can plug in a chain-backed implementation; the in-memory
//! versions here back the binary and the tests.
//!
//! ```text
//!   AssetRegistry       ── piece ownership + mass      (consulted on start)
//!   AgentAuthorization  ── agent whitelist             (consulted on commit/reveal)
//!   Minting             ── discount notification       (signalled on claim)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Serialize, Deserialize};

use crate::core::ids::{AccountId, GameId, PieceId};

// =============================================================================
// ASSET REGISTRY
// =============================================================================

/// Why the asset registry refused a piece.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PieceRejection {
    /// Registry has never heard of it.
    #[error("unknown piece")]
    Unknown,
    /// Owned by someone else.
    #[error("not owned by the staking player")]
    NotOwned,
    /// Revoked by the issuer.
    #[error("piece has been revoked")]
    Revoked,
    /// Fungible or multi-copy asset.
    #[error("piece is not a singleton")]
    NotSingleton,
}

/// Source of truth for piece ownership and mass.
pub trait AssetRegistry: Send + Sync {
    /// Mass of `piece` if `owner` may stake it.
    fn resolve_piece(&self, owner: &AccountId, piece: &PieceId) -> Result<u64, PieceRejection>;
}

#[derive(Debug, Clone, Copy)]
struct AssetRecord {
    owner: AccountId,
    mass: u64,
    revoked: bool,
    singleton: bool,
}

/// Asset registry held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAssetRegistry {
    assets: RwLock<BTreeMap<PieceId, AssetRecord>>,
}

impl InMemoryAssetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a singleton piece.
    pub fn insert(&self, piece: PieceId, owner: AccountId, mass: u64) {
        let record = AssetRecord { owner, mass, revoked: false, singleton: true };
        self.write().insert(piece, record);
    }

    /// Register a non-singleton asset. It can never be staked.
    pub fn insert_fungible(&self, piece: PieceId, owner: AccountId, mass: u64) {
        let record = AssetRecord { owner, mass, revoked: false, singleton: false };
        self.write().insert(piece, record);
    }

    /// Revoke a piece. Returns false if unknown.
    pub fn revoke(&self, piece: &PieceId) -> bool {
        match self.write().get_mut(piece) {
            Some(record) => {
                record.revoked = true;
                true
            }
            None => false,
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<PieceId, AssetRecord>> {
        self.assets.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AssetRegistry for InMemoryAssetRegistry {
    fn resolve_piece(&self, owner: &AccountId, piece: &PieceId) -> Result<u64, PieceRejection> {
        let assets = self.assets.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = assets.get(piece).ok_or(PieceRejection::Unknown)?;

        if record.revoked {
            return Err(PieceRejection::Revoked);
        }
        if !record.singleton {
            return Err(PieceRejection::NotSingleton);
        }
        if record.owner != *owner {
            return Err(PieceRejection::NotOwned);
        }
        Ok(record.mass)
    }
}

// =============================================================================
// AGENT AUTHORIZATION
// =============================================================================

/// Whitelist of accounts allowed to act as the agent.
pub trait AgentAuthorization: Send + Sync {
    /// May `account` commit and reveal?
    fn is_authorized_agent(&self, account: &AccountId) -> bool;

    /// Add or remove an agent. Returns true if the set changed.
    fn set_authorized(&self, account: AccountId, authorized: bool) -> bool;
}

/// Agent whitelist held in memory.
#[derive(Debug, Default)]
pub struct AgentWhitelist {
    agents: RwLock<BTreeSet<AccountId>>,
}

impl AgentWhitelist {
    /// Empty whitelist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist seeded with `agents`.
    pub fn with_agents(agents: impl IntoIterator<Item = AccountId>) -> Self {
        Self { agents: RwLock::new(agents.into_iter().collect()) }
    }

    /// Number of whitelisted agents.
    pub fn len(&self) -> usize {
        self.agents.read().map(|a| a.len()).unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    /// No agents?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AgentAuthorization for AgentWhitelist {
    fn is_authorized_agent(&self, account: &AccountId) -> bool {
        self.agents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(account)
    }

    fn set_authorized(&self, account: AccountId, authorized: bool) -> bool {
        let mut agents = self.agents.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if authorized {
            agents.insert(account)
        } else {
            agents.remove(&account)
        }
    }
}

// =============================================================================
// MINTING
// =============================================================================

/// Discount earned by a finished duel, sent when the refund is claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintNotice {
    /// Game that earned the discount.
    pub game_id: GameId,
    /// Player receiving the mint.
    pub player: AccountId,
    /// Refund paid out (the discount).
    pub discount: u64,
    /// Price before discount.
    pub mint_price: u64,
}

impl MintNotice {
    /// Price the player still pays.
    pub fn discounted_price(&self) -> u64 {
        self.mint_price.saturating_sub(self.discount)
    }
}

/// One-way signal to the minting service. The engine never waits on it.
pub trait Minting: Send + Sync {
    /// Record that `notice.player` earned a discount.
    fn notify_discount(&self, notice: MintNotice);
}

/// Minting sink that keeps every notice.
#[derive(Debug, Default)]
pub struct RecordingMinter {
    notices: Mutex<Vec<MintNotice>>,
}

impl RecordingMinter {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far.
    pub fn notices(&self) -> Vec<MintNotice> {
        self.notices.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

impl Minting for RecordingMinter {
    fn notify_discount(&self, notice: MintNotice) {
        tracing::info!(
            game = %notice.game_id,
            player = %notice.player.short(),
            discount = notice.discount,
            price = notice.discounted_price(),
            "mint discount issued"
        );
        self.notices.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(notice);
    }
}

// =============================================================================
// BUNDLE
// =============================================================================

/// The three collaborators an engine is wired to.
#[derive(Clone)]
pub struct Collaborators {
    /// Piece ownership oracle.
    pub assets: Arc<dyn AssetRegistry>,
    /// Agent whitelist.
    pub agents: Arc<dyn AgentAuthorization>,
    /// Mint discount sink.
    pub minter: Arc<dyn Minting>,
}

/// Concrete handles to in-memory collaborators, for seeding and inspection.
#[derive(Clone, Default)]
pub struct InMemoryCollaborators {
    /// Asset registry.
    pub assets: Arc<InMemoryAssetRegistry>,
    /// Agent whitelist.
    pub agents: Arc<AgentWhitelist>,
    /// Mint sink.
    pub minter: Arc<RecordingMinter>,
}

impl InMemoryCollaborators {
    /// Fresh, empty collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Type-erased bundle for the engine.
    pub fn bundle(&self) -> Collaborators {
        Collaborators {
            assets: self.assets.clone(),
            agents: self.agents.clone(),
            minter: self.minter.clone(),
        }
    }
}
