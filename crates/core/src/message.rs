//! Typed peer-to-peer messages and the self-describing envelope codec.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chips::Chips;
use crate::crypto::CardCipher;
use crate::phase::{HandPhase, PlayerAction};

/// The poker variant a node speaks; checked for equality during the
/// handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameVariant {
    #[default]
    TexasHoldem,
    Other,
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TexasHoldem => "TEXAS-HOLDEM",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Every frame on a peer link carries exactly one envelope: the sender's
/// stable listen address plus one typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub from: String,
    pub payload: Payload,
}

impl Envelope {
    #[must_use]
    pub fn new(from: impl Into<String>, payload: Payload) -> Self {
        Self {
            from: from.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("encode envelope")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("decode envelope")
    }
}

/// All message types exchanged between peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    /// First frame on every new connection.
    Handshake {
        version: String,
        variant: GameVariant,
        listen_addr: String,
    },
    /// Gossip: the addresses one peer knows, minus the receiver.
    PeerList { peers: Vec<String> },
    /// The sender is ready to be dealt into the next hand.
    Ready,
    /// One hop of the blind-shuffle relay: the deck with the sender's
    /// encryption layer applied and its order re-shuffled.
    ShuffleStatus { deck: Vec<Vec<u8>> },
    /// Dealer's broadcast of the fully sealed deck once the shuffle relay
    /// has closed. The sealed deck is public; every peer needs it to index
    /// its own hole-card slots and to unseal hands at showdown.
    FinalDeck { deck: Vec<Vec<u8>> },
    /// Dealer-announced phase transition, with the deck slots holding any
    /// newly visible community cards.
    GameState {
        status: HandPhase,
        community_indices: Vec<usize>,
    },
    /// One hop of the encryption-peeling reveal relay.
    GetRpc {
        indices: Vec<usize>,
        encrypted: Vec<Vec<u8>>,
        original_owner: String,
    },
    /// Terminal hop of the reveal relay, addressed to the slot owner. One
    /// layer (the owner's) remains on the data.
    RpcResponse {
        indices: Vec<usize>,
        decrypted: Vec<Vec<u8>>,
    },
    /// Key disclosure on fold or at showdown.
    RevealKeys { keys: CardCipher },
    /// A betting action taken by the sender.
    PlayerAction {
        action: PlayerAction,
        value: Chips,
        status: HandPhase,
    },
}

impl Payload {
    /// Short tag for log lines.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "handshake",
            Self::PeerList { .. } => "peer-list",
            Self::Ready => "ready",
            Self::ShuffleStatus { .. } => "shuffle-status",
            Self::FinalDeck { .. } => "final-deck",
            Self::GameState { .. } => "game-state",
            Self::GetRpc { .. } => "get-rpc",
            Self::RpcResponse { .. } => "rpc-response",
            Self::RevealKeys { .. } => "reveal-keys",
            Self::PlayerAction { .. } => "player-action",
        }
    }
}

/// A broadcast request from the game engine to the transport: deliver one
/// payload to an explicit set of peers.
#[derive(Debug, Clone)]
pub struct Directed {
    pub to: Vec<String>,
    pub payload: Payload,
}
