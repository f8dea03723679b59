//! Hand lifecycle and player action enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single hand. Every peer walks the same sequence in
/// lock-step; the dealer is merely the peer that initiates each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandPhase {
    Waiting,
    PlayerReady,
    Dealing,
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
    HandComplete,
}

impl HandPhase {
    /// The phase that follows this one when a betting round closes.
    #[must_use]
    pub const fn next_street(&self) -> HandPhase {
        match self {
            Self::PreFlop => Self::Flop,
            Self::Flop => Self::Turn,
            Self::Turn => Self::River,
            Self::River => Self::Showdown,
            _ => Self::HandComplete,
        }
    }

    /// Whether players may act in this phase.
    #[must_use]
    pub const fn is_betting(&self) -> bool {
        matches!(self, Self::PreFlop | Self::Flop | Self::Turn | Self::River)
    }
}

impl fmt::Display for HandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "WAITING",
            Self::PlayerReady => "PLAYER-READY",
            Self::Dealing => "DEALING",
            Self::PreFlop => "PREFLOP",
            Self::Flop => "FLOP",
            Self::Turn => "TURN",
            Self::River => "RIVER",
            Self::Showdown => "SHOWDOWN",
            Self::HandComplete => "HAND-COMPLETE",
        };
        write!(f, "{s}")
    }
}

/// An action a player can take on its turn. Going all-in is not its own
/// action: any call, bet or raise for the whole stack marks the player
/// all-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fold => "FOLD",
            Self::Check => "CHECK",
            Self::Call => "CALL",
            Self::Bet => "BET",
            Self::Raise => "RAISE",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn street_sequence() {
        assert_eq!(HandPhase::PreFlop.next_street(), HandPhase::Flop);
        assert_eq!(HandPhase::Flop.next_street(), HandPhase::Turn);
        assert_eq!(HandPhase::Turn.next_street(), HandPhase::River);
        assert_eq!(HandPhase::River.next_street(), HandPhase::Showdown);
        assert_eq!(HandPhase::Showdown.next_street(), HandPhase::HandComplete);
    }

    #[test]
    fn betting_phases() {
        assert!(HandPhase::PreFlop.is_betting());
        assert!(HandPhase::River.is_betting());
        assert!(!HandPhase::Dealing.is_betting());
        assert!(!HandPhase::Showdown.is_betting());
    }
}
