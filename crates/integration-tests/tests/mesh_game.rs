//! End-to-end tests over real TCP: nodes discover each other through gossip
//! and deal a hand with the full mental-poker relay.

use std::time::Duration;

use anyhow::Result;
use env_logger::Env;
use holdem_core::phase::{HandPhase, PlayerAction};
use holdem_core::Chips;
use holdem_node::{Node, NodeConfig};
use tokio::time::sleep;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

fn init_logger() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("warn")).try_init();
}

async fn start_node(dir: &tempfile::TempDir, name: &str) -> Result<Node> {
    Node::start(NodeConfig {
        version: "1.0.0".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        max_players: 6,
        snapshot_path: dir.path().join(format!("{name}.json")),
    })
    .await
}

/// Poll until `pred` holds on every node or the settle timeout expires.
async fn wait_for(nodes: &[&Node], pred: impl Fn(&Node) -> bool, what: &str) {
    let start = tokio::time::Instant::now();
    loop {
        if nodes.iter().all(|n| pred(n)) {
            return;
        }
        assert!(
            start.elapsed() < SETTLE_TIMEOUT,
            "timed out waiting for: {what}"
        );
        sleep(POLL_INTERVAL).await;
    }
}

#[tokio::test]
async fn peer_list_gossip_converges_to_full_mesh() -> Result<()> {
    init_logger();
    let dir = tempfile::tempdir()?;

    let a = start_node(&dir, "a").await?;
    let b = start_node(&dir, "b").await?;
    let c = start_node(&dir, "c").await?;

    // B and C only know A; the peer-list gossip must introduce them.
    b.connect(a.listen_addr()).await?;
    c.connect(a.listen_addr()).await?;

    let nodes = [&a, &b, &c];
    wait_for(&nodes, |n| n.game().read().players().len() == 3, "full mesh").await;

    let mut expected: Vec<String> = nodes.iter().map(|n| n.listen_addr().to_string()).collect();
    expected.sort();
    for node in nodes {
        let addrs: Vec<String> = node
            .game()
            .read()
            .players()
            .into_iter()
            .map(|p| p.addr)
            .collect();
        assert_eq!(addrs, expected);
    }
    Ok(())
}

#[tokio::test]
async fn two_nodes_shuffle_deal_and_reach_the_flop() -> Result<()> {
    init_logger();
    let dir = tempfile::tempdir()?;

    let a = start_node(&dir, "a").await?;
    let b = start_node(&dir, "b").await?;
    b.connect(a.listen_addr()).await?;

    let nodes = [&a, &b];
    wait_for(&nodes, |n| n.game().read().players().len() == 2, "handshake").await;

    a.game().write().ready_up();
    b.game().write().ready_up();

    // Shuffle relay plus hole-card reveal must settle into pre-flop.
    wait_for(
        &nodes,
        |n| {
            let binding = n.game();
            let game = binding.read();
            game.status() == HandPhase::PreFlop && game.my_hand().len() == 2
        },
        "pre-flop deal",
    )
    .await;

    for node in &nodes {
        let binding = node.game();
        let game = binding.read();
        assert_eq!(game.pot(), Chips::new(30));
        assert_eq!(game.dealer_id(), 0);
        assert_eq!(game.turn_id(), 0);
        assert!(game.community_cards().is_empty());
    }

    // Both views agree on the public records.
    assert_eq!(a.game().read().players(), b.game().read().players());

    // The dealer (rotation 0) completes the call. The big blind keeps its
    // option, so both peers stay in pre-flop with the turn on seat 1.
    let actor = if a.game().read().is_my_turn() { &a } else { &b };
    actor
        .game()
        .write()
        .take_action(PlayerAction::Call, Chips::ZERO)?;

    wait_for(
        &nodes,
        |n| {
            let binding = n.game();
            let game = binding.read();
            game.status() == HandPhase::PreFlop
                && game.pot() == Chips::new(40)
                && game.turn_id() == 1
        },
        "call applied",
    )
    .await;

    // The big blind checks its option; the round closes and the flop is
    // revealed on both peers.
    let big_blind = if a.game().read().is_my_turn() { &a } else { &b };
    big_blind
        .game()
        .write()
        .take_action(PlayerAction::Check, Chips::ZERO)?;

    wait_for(
        &nodes,
        |n| {
            let binding = n.game();
            let game = binding.read();
            game.status() == HandPhase::Flop && game.community_cards().len() == 3
        },
        "flop reveal",
    )
    .await;

    assert_eq!(
        a.game().read().community_cards(),
        b.game().read().community_cards()
    );
    for node in &nodes {
        assert_eq!(node.game().read().pot(), Chips::new(40));
    }
    Ok(())
}
