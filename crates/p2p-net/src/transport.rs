//! Framed byte streams between peers.
//!
//! Each connection carries length-delimited frames, one bincode envelope per
//! frame. A registered peer gets a writer task that serializes all sends to
//! that socket and a reader task that decodes envelopes until the stream
//! dies, then reports the closure.

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use holdem_core::message::{Envelope, Payload};

/// How long a new connection may take to produce its handshake frame.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long an outbound dial may take.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

// A full shuffle relay frame is ~2 KiB; anything near this limit is garbage.
const MAX_FRAME_SIZE: usize = 1 << 20;

pub type PeerStream = Framed<TcpStream, LengthDelimitedCodec>;

#[must_use]
pub fn frame(stream: TcpStream) -> PeerStream {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_SIZE)
        .new_framed(stream)
}

pub async fn dial(addr: &str) -> Result<TcpStream> {
    let stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .with_context(|| format!("dial {addr} timed out"))?
        .with_context(|| format!("dial {addr}"))?;
    Ok(stream)
}

pub async fn send_envelope(stream: &mut PeerStream, envelope: &Envelope) -> Result<()> {
    let bytes = envelope.encode()?;
    stream.send(bytes.into()).await.context("send frame")
}

/// Read one envelope with a deadline; used only during the handshake.
pub async fn read_envelope_timeout(
    stream: &mut PeerStream,
    deadline: Duration,
) -> Result<Envelope> {
    let frame = match tokio::time::timeout(deadline, stream.next()).await {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(err))) => return Err(err).context("read handshake frame"),
        Ok(None) => bail!("connection closed before handshake"),
        Err(_) => bail!("handshake read timed out"),
    };
    Envelope::decode(&frame)
}

/// A registered peer link. Sends are serialized through the writer task's
/// queue; dropping the `Peer` tears both tasks down.
pub struct Peer {
    pub listen_addr: String,
    pub outbound: bool,
    tx: mpsc::Sender<Envelope>,
}

impl Peer {
    /// Spawn the writer and reader tasks for an established connection.
    /// Inbound payloads are tagged with the handshake-declared address, not
    /// whatever the envelope claims.
    pub fn spawn(
        listen_addr: String,
        outbound: bool,
        stream: PeerStream,
        inbound_tx: mpsc::Sender<(String, Payload)>,
        closed_tx: mpsc::Sender<String>,
    ) -> Self {
        let (tx, mut outbox) = mpsc::channel::<Envelope>(64);
        let (mut sink, mut source) = stream.split();

        let writer_addr = listen_addr.clone();
        tokio::spawn(async move {
            while let Some(envelope) = outbox.recv().await {
                let bytes = match envelope.encode() {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("dropping unencodable message for {writer_addr}: {err}");
                        continue;
                    }
                };
                if let Err(err) = sink.send(bytes.into()).await {
                    warn!("write to {writer_addr} failed: {err}");
                    break;
                }
            }
        });

        let reader_addr = listen_addr.clone();
        tokio::spawn(async move {
            loop {
                match source.next().await {
                    Some(Ok(bytes)) => match Envelope::decode(&bytes) {
                        Ok(envelope) => {
                            if envelope.from != reader_addr {
                                warn!(
                                    "peer {reader_addr} sent envelope claiming from={}",
                                    envelope.from
                                );
                            }
                            if inbound_tx
                                .send((reader_addr.clone(), envelope.payload))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!("decode error from {reader_addr}: {err}");
                            break;
                        }
                    },
                    Some(Err(err)) => {
                        warn!("read error from {reader_addr}: {err}");
                        break;
                    }
                    None => {
                        debug!("peer {reader_addr} closed the connection");
                        break;
                    }
                }
            }
            let _ = closed_tx.send(reader_addr).await;
        });

        Self {
            listen_addr,
            outbound,
            tx,
        }
    }

    /// Queue an envelope for this peer. A full queue means the peer is not
    /// draining its socket; the message is dropped rather than stalling the
    /// mesh loop.
    pub fn send(&self, envelope: Envelope) {
        if self.tx.try_send(envelope).is_err() {
            warn!("send queue full for {}, dropping message", self.listen_addr);
        }
    }
}
