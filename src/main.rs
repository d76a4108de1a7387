//! OTOM Duel Server
//!
//! Runs the duel engine behind the WebSocket transport, or plays one local
//! game with `--demo`.
//!
//! Environment:
//! - `RUST_LOG`: log filter (default `info`)
//! - `DUEL_MINT_PRICE`, `DUEL_MAX_TOTAL_MASS`, `DUEL_OWNER`: engine settings
//! - `DUEL_BIND_ADDR`, `DUEL_MAX_CONNECTIONS`, `DUEL_IDLE_TIMEOUT_SECS`: transport
//! - `AUTH_*`: token validation
//! - `DUEL_AGENTS`: comma-separated agent addresses to whitelist at boot
//! - `DUEL_ASSETS_FILE`: JSON list of `{piece, owner, mass}` to seed the asset registry
//! - `DUEL_SNAPSHOT`: file the registry is restored from and saved to

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use otom_duel::{
    core::hash::hash_bytes,
    engine::{DuelEngine, EngineConfig, InMemoryCollaborators, SharedEngine},
    network::{AuthConfig, DuelServer, ServerConfig},
    proof::replay::verify_game,
    AccountId, AgentAction, AgentCommitment, PieceId, PlayerAction, VERSION,
};

#[derive(Deserialize)]
struct AssetSeed {
    piece: PieceId,
    owner: AccountId,
    mass: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("OTOM Duel v{}", VERSION);

    let config = EngineConfig::from_env().context("engine configuration")?;
    info!(
        mint_price = config.mint_price,
        max_total_mass = config.max_total_mass,
        owner = %config.owner,
        "engine configured"
    );

    if std::env::args().any(|a| a == "--demo") {
        return demo_duel(config);
    }

    run_server(config).await
}

fn seed_collaborators(collab: &InMemoryCollaborators) -> Result<()> {
    use otom_duel::engine::AgentAuthorization;

    if let Ok(list) = std::env::var("DUEL_AGENTS") {
        for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let agent = AccountId::from_hex(raw).with_context(|| format!("DUEL_AGENTS entry {raw:?}"))?;
            collab.agents.set_authorized(agent, true);
        }
        info!(agents = collab.agents.len(), "agent whitelist seeded");
    }

    if let Ok(path) = std::env::var("DUEL_ASSETS_FILE") {
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        let seeds: Vec<AssetSeed> = serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
        for seed in &seeds {
            collab.assets.insert(seed.piece, seed.owner, seed.mass);
        }
        info!(pieces = seeds.len(), "asset registry seeded from {}", path);
    }

    Ok(())
}

async fn run_server(config: EngineConfig) -> Result<()> {
    let server_config = ServerConfig::from_env().context("server configuration")?;
    let auth = AuthConfig::from_env();
    if !auth.is_configured() {
        warn!("no AUTH_SECRET or AUTH_PUBLIC_KEY_PEM set; every login will be refused");
    }

    let collab = InMemoryCollaborators::new();
    seed_collaborators(&collab)?;

    let snapshot_path = std::env::var("DUEL_SNAPSHOT").ok().map(PathBuf::from);
    let engine = match &snapshot_path {
        Some(path) if path.exists() => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            DuelEngine::restore(config, collab.bundle(), &bytes).context("restoring snapshot")?
        }
        _ => DuelEngine::new(config, collab.bundle()),
    };
    let engine = SharedEngine::new(engine);

    let server = Arc::new(DuelServer::new(server_config, auth, engine.clone()));
    let runner = server.clone();
    let server_task = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("ctrl-c received, shutting down");
    server.shutdown();
    server_task.await.context("server task panicked")??;

    if let Some(path) = snapshot_path {
        let bytes = engine.with(|e| e.snapshot()).await.context("encoding snapshot")?;
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        info!("snapshot saved to {}", path.display());
    }

    Ok(())
}

/// Play one game locally and log every step.
fn demo_duel(config: EngineConfig) -> Result<()> {
    info!("=== Starting Demo Duel ===");

    let owner = AccountId::derive("demo-owner");
    let agent = AccountId::derive("demo-agent");
    let player = AccountId::derive("demo-player");

    let collab = InMemoryCollaborators::new();
    let pieces: Vec<PieceId> = [(1, 30), (2, 20), (3, 15)]
        .into_iter()
        .map(|(id, mass)| {
            let piece = PieceId::from_u64(id);
            collab.assets.insert(piece, player, mass);
            piece
        })
        .collect();

    let mut engine = DuelEngine::new(config.with_owner(owner), collab.bundle());
    engine.set_agent_whitelist(&owner, agent, true)?;

    let game_id = engine.start_game(player, &pieces)?;
    info!("Game {} started by {}", game_id, player);

    let plan = [
        (PlayerAction::Charge, 0u8, AgentAction::FlipCharge),
        (PlayerAction::Attack, 1, AgentAction::Defend),
        (PlayerAction::Attack, 2, AgentAction::Recover),
    ];

    for (round, (player_action, piece, agent_action)) in plan.into_iter().enumerate() {
        let round = round as u8;
        let secret = hash_bytes(&[b"demo-secret".as_slice(), &[round]].concat());
        let commitment = AgentCommitment::new(agent_action, secret, round);

        engine.agent_commit(&agent, game_id, commitment.hash)?;
        info!("Round {}: agent committed {}", round, hex::encode(&commitment.hash[..8]));

        engine.player_move(&player, game_id, player_action, piece)?;
        let res = engine.agent_reveal(&agent, game_id, agent_action, &commitment.secret)?;
        info!(
            "Round {}: {:?} (mass {}) vs {:?} -> health {} -> {}, charge {}",
            round,
            res.player_action,
            res.mass,
            res.agent_action,
            res.health_before,
            res.health_after,
            res.outcome.charge_out,
        );
    }

    let (round, status) = engine.whose_turn(game_id)?.wire();
    info!("Turn after last round: ({}, {})", round, status);

    let refund = engine.claim_refund(&player, game_id)?;
    let game = engine.get_game(game_id)?;
    info!("=== Duel Results ===");
    info!("Final agent health: {}", game.agent_health);
    info!("Refund: {} of {}", refund, game.stake_amount);
    for notice in collab.minter.notices() {
        info!("Mint price after discount: {}", notice.discounted_price());
    }

    let report = verify_game(game).context("replay audit")?;
    info!("Replay audit passed, state hash {}", hex::encode(report.state_hash));

    for event in engine.drain_events() {
        info!("event #{}: {:?}", event.seq, event.data);
    }

    Ok(())
}
