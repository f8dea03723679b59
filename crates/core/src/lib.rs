//! Core game engine for the decentralized Texas Hold'em mesh.
//!
//! Every peer runs the same [`game::GameCore`] and advances it in lock-step
//! from the typed messages defined in [`message`]. The mental-poker dealing
//! protocol lives in [`dealing`], chip accounting in [`betting`], and the
//! SRA-style commutative cipher in [`crypto`].

pub mod betting;
pub mod chips;
pub mod crypto;
pub mod dealing;
pub mod game;
pub mod message;
pub mod phase;
pub mod player;
pub mod snapshot;

pub use chips::Chips;

/// Small blind posted at the start of every hand.
pub const SMALL_BLIND: Chips = Chips::new(10);

/// Big blind posted at the start of every hand; also the minimum bet.
pub const BIG_BLIND: Chips = Chips::new(20);

/// Stack handed to every player the first time it is seen.
pub const STARTING_STACK: Chips = Chips::new(1_000);
