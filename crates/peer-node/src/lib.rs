//! A complete peer: game core + p2p mesh + HTTP read/command surface.

pub mod api;
pub mod node;

pub use node::{Node, NodeConfig};
