//! Card and deck definitions shared by every peer.
//!
//! Cards travel on the wire as single bytes `0..52`: the suit is `byte / 13`
//! and the rank is `(byte % 13) + 1` with 1 = Ace and 11/12/13 = J/Q/K. The
//! cipher layer treats slot contents as opaque byte strings, so this crate is
//! the only place that knows the byte encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of cards in a deck.
pub const DECK_SIZE: usize = 52;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("byte {0} is not a card index (expected 0..52)")]
pub struct InvalidCardByte(pub u8);

/// Card suit, ordered as encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    #[must_use]
    pub fn suits() -> impl DoubleEndedIterator<Item = Self> {
        [Self::Spades, Self::Hearts, Self::Diamonds, Self::Clubs].into_iter()
    }

    /// Unicode symbol used in log output and the UI.
    #[must_use]
    pub const fn symbol(&self) -> char {
        match self {
            Self::Spades => '♠',
            Self::Hearts => '♥',
            Self::Diamonds => '♦',
            Self::Clubs => '♣',
        }
    }

    const fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Spades,
            1 => Self::Hearts,
            2 => Self::Diamonds,
            _ => Self::Clubs,
        }
    }

    const fn index(&self) -> u8 {
        match self {
            Self::Spades => 0,
            Self::Hearts => 1,
            Self::Diamonds => 2,
            Self::Clubs => 3,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A poker card as dealt by the mental-poker protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    suit: Suit,
    rank: u8,
}

impl Card {
    /// Create a card from a suit and a rank in `1..=13` (1 = Ace).
    ///
    /// Panics if the rank is out of range.
    #[must_use]
    pub fn new(suit: Suit, rank: u8) -> Self {
        assert!((1..=13).contains(&rank), "rank {rank} out of range");
        Self { suit, rank }
    }

    /// Decode a wire byte into a card.
    pub fn from_byte(byte: u8) -> Result<Self, InvalidCardByte> {
        if usize::from(byte) >= DECK_SIZE {
            return Err(InvalidCardByte(byte));
        }
        Ok(Self {
            suit: Suit::from_index(byte / 13),
            rank: (byte % 13) + 1,
        })
    }

    /// The wire byte for this card.
    #[must_use]
    pub const fn to_byte(&self) -> u8 {
        self.suit.index() * 13 + (self.rank - 1)
    }

    #[must_use]
    pub const fn suit(&self) -> Suit {
        self.suit
    }

    /// Rank in `1..=13` with 1 = Ace.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        self.rank
    }

    /// Rank for hand comparison, with the Ace promoted above the King.
    #[must_use]
    pub const fn rank_high(&self) -> u8 {
        if self.rank == 1 { 14 } else { self.rank }
    }

    fn rank_label(&self) -> &'static str {
        match self.rank {
            1 => "A",
            2 => "2",
            3 => "3",
            4 => "4",
            5 => "5",
            6 => "6",
            7 => "7",
            8 => "8",
            9 => "9",
            10 => "10",
            11 => "J",
            12 => "Q",
            _ => "K",
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank_label(), self.suit)
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// The plaintext deck every shuffle round starts from: slot `i` holds the
/// single byte `i`.
#[must_use]
pub fn placeholder_deck() -> Vec<Vec<u8>> {
    (0..DECK_SIZE).map(|i| vec![i as u8]).collect()
}
