//! Node wiring: owns the game state and the transport, with unidirectional
//! data flow between them.
//!
//! The mesh posts [`NetEvent`]s to a queue; the coordinator task drains it
//! and is, together with the HTTP handlers, the only writer of the game
//! state. Outbound broadcasts flow the other way, through a channel the
//! mesh drains. Neither side holds a reference to the other.

use anyhow::Result;
use log::{error, info};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use holdem_core::game::GameCore;
use holdem_core::message::GameVariant;
use holdem_net::{MeshConfig, MeshHandle, NetEvent};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub version: String,
    pub listen_addr: String,
    pub max_players: usize,
    pub snapshot_path: PathBuf,
}

pub struct Node {
    game: Arc<RwLock<GameCore>>,
    mesh: MeshHandle,
    snapshot_path: PathBuf,
}

impl Node {
    /// Bind the p2p listener and spawn the coordinator and heartbeat tasks.
    pub async fn start(cfg: NodeConfig) -> Result<Self> {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(100);
        let (events_tx, events_rx) = mpsc::channel(100);

        let mesh = holdem_net::start(
            MeshConfig {
                version: cfg.version,
                variant: GameVariant::TexasHoldem,
                listen_addr: cfg.listen_addr,
                max_players: cfg.max_players,
            },
            events_tx,
            broadcast_rx,
        )
        .await?;

        // The mesh resolved the final listen address (port 0 in tests); the
        // game identity must match what peers will see.
        let game = Arc::new(RwLock::new(GameCore::new(
            mesh.listen_addr().to_string(),
            broadcast_tx,
        )));

        tokio::spawn(coordinator(Arc::clone(&game), events_rx));
        tokio::spawn(heartbeat(Arc::clone(&game)));

        Ok(Self {
            game,
            mesh,
            snapshot_path: cfg.snapshot_path,
        })
    }

    #[must_use]
    pub fn game(&self) -> Arc<RwLock<GameCore>> {
        Arc::clone(&self.game)
    }

    #[must_use]
    pub fn listen_addr(&self) -> &str {
        self.mesh.listen_addr()
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &PathBuf {
        &self.snapshot_path
    }

    pub async fn connect(&self, addr: &str) -> Result<()> {
        self.mesh.connect(addr).await
    }
}

/// Single writer for all network-driven state changes.
async fn coordinator(game: Arc<RwLock<GameCore>>, mut events_rx: mpsc::Receiver<NetEvent>) {
    while let Some(event) = events_rx.recv().await {
        match event {
            NetEvent::PeerJoined { addr } => game.write().add_player(&addr),
            NetEvent::PeerLeft { addr } => game.write().remove_player(&addr),
            NetEvent::Message { from, payload } => game.write().handle_message(&from, payload),
        }
    }
}

async fn heartbeat(game: Arc<RwLock<GameCore>>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let game = game.read();
        info!(
            "heartbeat: status={} dealer={} turn={} pot={} hand_size={}",
            game.status(),
            game.dealer_id(),
            game.turn_id(),
            game.pot(),
            game.my_hand().len()
        );
    }
}

/// Best-effort crash-recovery dump after a successful local action.
pub fn save_snapshot(game: &Arc<RwLock<GameCore>>, path: &PathBuf) {
    if let Err(err) = game.read().save_snapshot(path) {
        error!("failed to save snapshot: {err}");
    }
}
