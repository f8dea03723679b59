//! Peer-to-peer mesh: framed TCP transport, versioned handshake, peer-list
//! gossip and directed broadcast.
//!
//! The mesh owns the sockets and nothing else. Inbound game messages are
//! posted as [`NetEvent`]s to a queue the node's coordinator reads; outbound
//! broadcasts arrive on a channel the mesh drains. No component holds a
//! back-pointer into the game state.

pub mod mesh;
pub mod transport;

pub use mesh::{start, MeshConfig, MeshHandle, NetEvent, DEFAULT_MAX_PLAYERS};
