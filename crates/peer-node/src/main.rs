use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;

use holdem_node::api::{self, ApiContext};
use holdem_node::{Node, NodeConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decentralized Texas Hold'em peer.
#[derive(Debug, Parser)]
#[command(name = "holdem-node", version)]
struct Options {
    /// P2P network port
    #[arg(long = "p2p-port", default_value_t = 3000)]
    p2p_port: u16,

    /// HTTP API port
    #[arg(long = "api-port", default_value_t = 8080)]
    api_port: u16,

    /// Connect to an existing peer (host:port)
    #[arg(long)]
    connect: Option<String>,

    /// Maximum number of players
    #[arg(long = "max-players", default_value_t = holdem_net::DEFAULT_MAX_PLAYERS)]
    max_players: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// Where to write the crash-recovery snapshot
    #[arg(long = "snapshot-file", default_value = "game_snapshot.json")]
    snapshot_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Options::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&opt.log_level)).init();

    let p2p_addr = format!("127.0.0.1:{}", opt.p2p_port);
    let api_addr = format!("127.0.0.1:{}", opt.api_port);

    let node = Node::start(NodeConfig {
        version: VERSION.to_string(),
        listen_addr: p2p_addr.clone(),
        max_players: opt.max_players,
        snapshot_path: opt.snapshot_file,
    })
    .await?;

    info!("===========================================");
    info!("  Decentralized Poker Engine v{VERSION}");
    info!("===========================================");
    info!("P2P address:  {p2p_addr}");
    info!("API address:  http://{api_addr}");
    info!("Max players:  {}", opt.max_players);
    info!("API endpoints:");
    info!("  GET  http://{api_addr}/api/health");
    info!("  GET  http://{api_addr}/api/table");
    info!("  GET  http://{api_addr}/api/players");
    info!("  POST http://{api_addr}/api/ready");
    info!("  POST http://{api_addr}/api/fold | check | call");
    info!("  POST http://{api_addr}/api/bet | raise  {{\"value\": N}}");
    info!("===========================================");

    match &opt.connect {
        Some(addr) => {
            info!("connecting to peer {addr}");
            node.connect(addr).await?;
        }
        None => {
            info!("starting as the initial node; join with:");
            info!("  holdem-node --p2p-port 3001 --api-port 8081 --connect {p2p_addr}");
        }
    }

    let ctx = ApiContext::new(&node);
    tokio::select! {
        result = api::serve(ctx, &api_addr) => {
            if let Err(err) = result {
                error!("API server failed: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    info!("server stopped");
    Ok(())
}
