//! Seven-card hand evaluator.
//!
//! The game engine treats this crate as an oracle: give it the hole cards
//! plus the board and it answers with an integer rank and a readable hand
//! name. Lower rank wins, so ranks can be compared directly when splitting
//! pots.

use holdem_cards::Card;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hand classes from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandClass {
    HighCard = 0,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandClass {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HighCard => "High Card",
            Self::Pair => "Pair",
            Self::TwoPair => "Two Pair",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "Full House",
            Self::FourOfAKind => "Four of a Kind",
            Self::StraightFlush => "Straight Flush",
            Self::RoyalFlush => "Royal Flush",
        }
    }
}

impl fmt::Display for HandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of evaluating a hand. Lower `rank` beats higher `rank`; equal
/// ranks split the pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandValue {
    rank: u32,
    class: HandClass,
}

// A 5-card hand scores as `class << 20 | five 4-bit tiebreak ranks`, so the
// strongest possible score stays below 1 << 24.
const RANK_CEILING: u32 = 1 << 24;

impl HandValue {
    #[must_use]
    pub const fn rank(&self) -> u32 {
        self.rank
    }

    #[must_use]
    pub const fn class(&self) -> HandClass {
        self.class
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.class.name()
    }
}

impl fmt::Display for HandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rank {})", self.class, self.rank)
    }
}

/// Evaluate the best five-card hand from 5 to 7 cards.
///
/// Panics if fewer than 5 or more than 7 cards are supplied.
#[must_use]
pub fn evaluate_best(cards: &[Card]) -> HandValue {
    assert!(
        (5..=7).contains(&cards.len()),
        "evaluator needs 5..=7 cards, got {}",
        cards.len()
    );

    let n = cards.len() as u32;
    let mut best_strength = 0u32;
    let mut best_class = HandClass::HighCard;

    for mask in 0u32..(1u32 << n) {
        if mask.count_ones() != 5 {
            continue;
        }
        let mut hand = [cards[0]; 5];
        let mut k = 0;
        for (i, card) in cards.iter().enumerate() {
            if mask & (1u32 << i) != 0 {
                hand[k] = *card;
                k += 1;
            }
        }
        let (class, tiebreak) = evaluate_five(&hand);
        let strength = pack(class, tiebreak);
        if strength > best_strength {
            best_strength = strength;
            best_class = class;
        }
    }

    HandValue {
        rank: RANK_CEILING - best_strength,
        class: best_class,
    }
}

fn pack(class: HandClass, tiebreak: [u8; 5]) -> u32 {
    let mut strength = (class as u32) << 20;
    for (i, rank) in tiebreak.iter().enumerate() {
        strength |= u32::from(*rank) << (16 - 4 * i);
    }
    strength
}

/// Classify one five-card hand and produce its tiebreak ranks in order of
/// significance (pair/trip ranks before kickers).
fn evaluate_five(cards: &[Card; 5]) -> (HandClass, [u8; 5]) {
    let mut ranks = [0u8; 5];
    for (i, card) in cards.iter().enumerate() {
        ranks[i] = card.rank_high();
    }
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = cards.iter().all(|c| c.suit() == cards[0].suit());
    let distinct = ranks.windows(2).all(|w| w[0] != w[1]);

    let straight_high = if distinct {
        if ranks[0] - ranks[4] == 4 {
            Some(ranks[0])
        } else if ranks == [14, 5, 4, 3, 2] {
            // The wheel: the ace plays low.
            Some(5)
        } else {
            None
        }
    } else {
        None
    };

    if let Some(high) = straight_high {
        let mut tiebreak = [0u8; 5];
        for (i, slot) in tiebreak.iter_mut().enumerate() {
            // 5-4-3-2-A encodes as 5,4,3,2,1.
            *slot = high - i as u8;
        }
        let class = match (is_flush, high) {
            (true, 14) => HandClass::RoyalFlush,
            (true, _) => HandClass::StraightFlush,
            (false, _) => HandClass::Straight,
        };
        return (class, tiebreak);
    }

    // Group ranks by multiplicity, most copies first, then highest rank.
    let mut counts = [0u8; 15];
    for r in ranks {
        counts[usize::from(r)] += 1;
    }
    let mut groups: Vec<(u8, u8)> = counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .map(|(rank, &c)| (c, rank as u8))
        .collect();
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let mut tiebreak = [0u8; 5];
    let mut k = 0;
    for (count, rank) in &groups {
        for _ in 0..*count {
            tiebreak[k] = *rank;
            k += 1;
        }
    }

    let shape: Vec<u8> = groups.iter().map(|(c, _)| *c).collect();
    let class = match shape.as_slice() {
        [4, 1] => HandClass::FourOfAKind,
        [3, 2] => HandClass::FullHouse,
        [3, 1, 1] => HandClass::ThreeOfAKind,
        [2, 2, 1] => HandClass::TwoPair,
        [2, 1, 1, 1] => HandClass::Pair,
        _ if is_flush => HandClass::Flush,
        _ => HandClass::HighCard,
    };
    (class, tiebreak)
}
