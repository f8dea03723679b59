//! Peer registry, versioned handshake and peer-list gossip.
//!
//! One round of gossip produces a fully connected mesh: an accepted peer is
//! sent every other known address, and the receiver of a peer list dials
//! every address it does not yet know. `Connect` is a no-op for addresses
//! already in the table.

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use holdem_core::message::{Directed, Envelope, GameVariant, Payload};

use crate::transport::{
    dial, frame, read_envelope_timeout, send_envelope, Peer, PeerStream, HANDSHAKE_TIMEOUT,
};

pub const DEFAULT_MAX_PLAYERS: usize = 6;

#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub version: String,
    pub variant: GameVariant,
    pub listen_addr: String,
    pub max_players: usize,
}

/// What the mesh reports to the coordinator.
#[derive(Debug)]
pub enum NetEvent {
    PeerJoined { addr: String },
    PeerLeft { addr: String },
    Message { from: String, payload: Payload },
}

enum Command {
    Connect(String),
    Register {
        stream: PeerStream,
        listen_addr: String,
        outbound: bool,
    },
}

/// Cheap handle for talking to a running mesh.
#[derive(Clone)]
pub struct MeshHandle {
    cmd_tx: mpsc::Sender<Command>,
    listen_addr: String,
}

impl MeshHandle {
    /// The address this mesh actually listens on (resolved if the config
    /// asked for port 0).
    #[must_use]
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Dial a peer. Duplicate connects are suppressed by the mesh loop.
    pub async fn connect(&self, addr: &str) -> Result<()> {
        self.cmd_tx
            .send(Command::Connect(addr.to_string()))
            .await
            .context("mesh is gone")
    }
}

/// Bind the listener and spawn the mesh tasks.
pub async fn start(
    mut cfg: MeshConfig,
    events_tx: mpsc::Sender<NetEvent>,
    broadcast_rx: mpsc::Receiver<Directed>,
) -> Result<MeshHandle> {
    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;

    // With port 0 the kernel picked one; the advertised identity must match.
    if cfg.listen_addr.ends_with(":0") {
        let host = cfg
            .listen_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        cfg.listen_addr = format!("{host}:{}", listener.local_addr()?.port());
    }
    let listen_addr = cfg.listen_addr.clone();

    let (cmd_tx, cmd_rx) = mpsc::channel(32);

    let accept_cfg = cfg.clone();
    let accept_cmd_tx = cmd_tx.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, remote)) => {
                    debug!("inbound connection from {remote}");
                    let cfg = accept_cfg.clone();
                    let cmd_tx = accept_cmd_tx.clone();
                    tokio::spawn(async move {
                        let mut stream = frame(socket);
                        match expect_handshake(&mut stream, &cfg).await {
                            Ok(listen_addr) => {
                                let _ = cmd_tx
                                    .send(Command::Register {
                                        stream,
                                        listen_addr,
                                        outbound: false,
                                    })
                                    .await;
                            }
                            // Dropping the stream closes the socket, which
                            // is the rejection.
                            Err(err) => warn!("handshake with inbound peer failed: {err}"),
                        }
                    });
                }
                Err(err) => warn!("accept failed: {err}"),
            }
        }
    });

    let loop_cmd_tx = cmd_tx.clone();
    tokio::spawn(run(cfg, cmd_rx, loop_cmd_tx, events_tx, broadcast_rx));

    info!("p2p mesh listening on {listen_addr}");
    Ok(MeshHandle {
        cmd_tx,
        listen_addr,
    })
}

fn handshake_envelope(cfg: &MeshConfig) -> Envelope {
    Envelope::new(
        cfg.listen_addr.clone(),
        Payload::Handshake {
            version: cfg.version.clone(),
            variant: cfg.variant,
            listen_addr: cfg.listen_addr.clone(),
        },
    )
}

/// Read and validate the first frame of a new connection.
async fn expect_handshake(stream: &mut PeerStream, cfg: &MeshConfig) -> Result<String> {
    let envelope = read_envelope_timeout(stream, HANDSHAKE_TIMEOUT).await?;
    let Payload::Handshake {
        version,
        variant,
        listen_addr,
    } = envelope.payload
    else {
        bail!("expected handshake, got {}", envelope.payload.label());
    };
    if version != cfg.version {
        bail!("invalid version: want {} got {version}", cfg.version);
    }
    if variant != cfg.variant {
        bail!("game variant mismatch: want {} got {variant}", cfg.variant);
    }
    Ok(listen_addr)
}

async fn connect_outbound(addr: String, cfg: MeshConfig, cmd_tx: mpsc::Sender<Command>) {
    let attempt = async {
        let socket = dial(&addr).await?;
        let mut stream = frame(socket);
        send_envelope(&mut stream, &handshake_envelope(&cfg)).await?;
        let listen_addr = expect_handshake(&mut stream, &cfg).await?;
        Ok::<_, anyhow::Error>((stream, listen_addr))
    };
    match attempt.await {
        Ok((stream, listen_addr)) => {
            let _ = cmd_tx
                .send(Command::Register {
                    stream,
                    listen_addr,
                    outbound: true,
                })
                .await;
        }
        Err(err) => warn!("failed to dial peer {addr}: {err}"),
    }
}

async fn run(
    cfg: MeshConfig,
    mut cmd_rx: mpsc::Receiver<Command>,
    cmd_tx: mpsc::Sender<Command>,
    events_tx: mpsc::Sender<NetEvent>,
    mut broadcast_rx: mpsc::Receiver<Directed>,
) {
    let mut peers: AHashMap<String, Peer> = AHashMap::new();
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<(String, Payload)>(100);
    let (closed_tx, mut closed_rx) = mpsc::channel::<String>(32);

    loop {
        tokio::select! {
            Some(command) = cmd_rx.recv() => match command {
                Command::Connect(addr) => {
                    if addr == cfg.listen_addr || peers.contains_key(&addr) {
                        debug!("already connected to peer {addr}");
                    } else {
                        tokio::spawn(connect_outbound(addr, cfg.clone(), cmd_tx.clone()));
                    }
                }
                Command::Register { stream, listen_addr, outbound } => {
                    register_peer(
                        &cfg,
                        &mut peers,
                        stream,
                        listen_addr,
                        outbound,
                        &inbound_tx,
                        &closed_tx,
                        &events_tx,
                    )
                    .await;
                }
            },
            Some(addr) = closed_rx.recv() => {
                if peers.remove(&addr).is_some() {
                    info!("peer {addr} disconnected and removed");
                    let _ = events_tx.send(NetEvent::PeerLeft { addr }).await;
                }
            }
            Some((from, payload)) = inbound_rx.recv() => {
                handle_inbound(&cfg, &peers, &cmd_tx, &events_tx, from, payload).await;
            }
            Some(directed) = broadcast_rx.recv() => {
                let envelope = Envelope::new(cfg.listen_addr.clone(), directed.payload);
                for to in directed.to {
                    match peers.get(&to) {
                        Some(peer) => peer.send(envelope.clone()),
                        None => debug!("no connection to {to}, dropping broadcast"),
                    }
                }
            }
            else => break,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn register_peer(
    cfg: &MeshConfig,
    peers: &mut AHashMap<String, Peer>,
    mut stream: PeerStream,
    listen_addr: String,
    outbound: bool,
    inbound_tx: &mpsc::Sender<(String, Payload)>,
    closed_tx: &mpsc::Sender<String>,
    events_tx: &mpsc::Sender<NetEvent>,
) {
    if peers.len() >= cfg.max_players {
        warn!("max players exceeded ({}), rejecting {listen_addr}", cfg.max_players);
        return;
    }
    if peers.contains_key(&listen_addr) {
        debug!("duplicate connection from {listen_addr}, dropping");
        return;
    }

    if !outbound {
        // Answer the handshake, then gossip every other known address.
        if let Err(err) = send_envelope(&mut stream, &handshake_envelope(cfg)).await {
            warn!("failed to send handshake to {listen_addr}: {err}");
            return;
        }
        let others: Vec<String> = peers.keys().cloned().collect();
        if !others.is_empty() {
            let gossip = Envelope::new(cfg.listen_addr.clone(), Payload::PeerList { peers: others });
            if let Err(err) = send_envelope(&mut stream, &gossip).await {
                warn!("failed to send peer list to {listen_addr}: {err}");
                return;
            }
        }
    }

    info!("registered peer {listen_addr} (outbound={outbound})");
    let peer = Peer::spawn(
        listen_addr.clone(),
        outbound,
        stream,
        inbound_tx.clone(),
        closed_tx.clone(),
    );
    peers.insert(listen_addr.clone(), peer);
    let _ = events_tx
        .send(NetEvent::PeerJoined { addr: listen_addr })
        .await;
}

async fn handle_inbound(
    cfg: &MeshConfig,
    peers: &AHashMap<String, Peer>,
    cmd_tx: &mpsc::Sender<Command>,
    events_tx: &mpsc::Sender<NetEvent>,
    from: String,
    payload: Payload,
) {
    match payload {
        Payload::PeerList { peers: list } => {
            info!("received peer list from {from} ({} entries)", list.len());
            for addr in list {
                if addr != cfg.listen_addr && !peers.contains_key(&addr) {
                    tokio::spawn(connect_outbound(addr, cfg.clone(), cmd_tx.clone()));
                }
            }
        }
        Payload::Handshake { .. } => {
            warn!("unexpected handshake from already-registered peer {from}");
        }
        payload => {
            let _ = events_tx.send(NetEvent::Message { from, payload }).await;
        }
    }
}
