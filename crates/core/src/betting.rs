//! Betting legality, side-pot construction and pot distribution.
//!
//! These are the only routines that decide where chips go. They are kept as
//! plain functions over the player records so the boundary cases (all-ins,
//! ties, odd chips) are testable without a network or a deck.

use holdem_eval::HandValue;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::chips::Chips;
use crate::phase::{HandPhase, PlayerAction};
use crate::BIG_BLIND;

/// Why a local action was refused. Remote out-of-turn actions are logged and
/// dropped instead; the UI is expected to re-submit, the protocol never
/// retries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("player is not seated in the current hand")]
    NotSeated,
    #[error("it is not this player's turn to act")]
    NotYourTurn,
    #[error("no actions allowed during {0}")]
    WrongPhase(HandPhase),
    #[error("{0} is not a valid action right now")]
    Illegal(PlayerAction),
    #[error("bet must be at least the big blind ({min})")]
    BetBelowMinimum { min: Chips },
    #[error("raise must be at least {min}")]
    RaiseBelowMinimum { min: Chips },
    #[error("{value} exceeds the stack ({stack})")]
    ExceedsStack { value: Chips, stack: Chips },
}

/// The actions open to a player facing `highest` with `round_bet` already
/// committed this round.
#[must_use]
pub fn valid_actions(
    highest: Chips,
    last_raise: Chips,
    round_bet: Chips,
    stack: Chips,
) -> Vec<PlayerAction> {
    let mut actions = vec![PlayerAction::Fold];
    if highest.is_zero() || round_bet == highest {
        actions.push(PlayerAction::Check);
    }
    if highest > round_bet && !stack.is_zero() {
        actions.push(PlayerAction::Call);
    }
    if highest.is_zero() && stack >= BIG_BLIND {
        actions.push(PlayerAction::Bet);
    }
    if !highest.is_zero() && stack > (highest + last_raise) - round_bet {
        actions.push(PlayerAction::Raise);
    }
    actions
}

/// Value bounds for bet and raise. `value` is the total round bet the player
/// is moving to, not the increment.
pub fn check_value(
    action: PlayerAction,
    value: Chips,
    highest: Chips,
    last_raise: Chips,
    stack: Chips,
) -> Result<(), ActionError> {
    match action {
        PlayerAction::Bet => {
            if value < BIG_BLIND {
                return Err(ActionError::BetBelowMinimum { min: BIG_BLIND });
            }
            if value > stack {
                return Err(ActionError::ExceedsStack { value, stack });
            }
        }
        PlayerAction::Raise => {
            let min = highest + last_raise;
            if value < min {
                return Err(ActionError::RaiseBelowMinimum { min });
            }
            if value > stack {
                return Err(ActionError::ExceedsStack { value, stack });
            }
        }
        PlayerAction::Fold | PlayerAction::Check | PlayerAction::Call => {}
    }
    Ok(())
}

/// One pot with its eligibility set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: Vec<String>,
}

/// Carve the hand's contributions into a main pot and side pots.
///
/// Contributions are banded at each distinct level: everyone who put in at
/// least that much is eligible for that band. The band amounts always sum to
/// the total pot.
#[must_use]
pub fn build_side_pots(contributions: &[(String, Chips)]) -> Vec<SidePot> {
    let mut sorted: Vec<&(String, Chips)> =
        contributions.iter().filter(|(_, c)| !c.is_zero()).collect();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut pots = Vec::new();
    let mut prev = Chips::ZERO;
    for (i, (_, level)) in sorted.iter().enumerate() {
        if *level > prev {
            let amount = (*level - prev) * (sorted.len() - i) as u32;
            let mut eligible: Vec<String> =
                sorted[i..].iter().map(|(addr, _)| addr.clone()).collect();
            eligible.sort();
            pots.push(SidePot { amount, eligible });
            prev = *level;
        }
    }
    pots
}

/// Distribute every pot among the non-folded players it is eligible to.
///
/// Lower evaluator rank wins; ties split equally with the odd chip going to
/// the first winner in address order. A pot whose eligible players all
/// folded falls back to the remaining field so no chips are lost.
#[must_use]
pub fn award_pots(
    pots: &[SidePot],
    values: &BTreeMap<String, HandValue>,
    non_folded: &[String],
) -> BTreeMap<String, Chips> {
    let mut awards: BTreeMap<String, Chips> = BTreeMap::new();

    for pot in pots {
        let mut contenders: Vec<&String> = pot
            .eligible
            .iter()
            .filter(|addr| non_folded.contains(addr))
            .collect();
        if contenders.is_empty() {
            contenders = non_folded.iter().collect();
        }
        let Some(best) = contenders
            .iter()
            .filter_map(|addr| values.get(*addr))
            .map(HandValue::rank)
            .min()
        else {
            continue;
        };

        let winners: Vec<&String> = contenders
            .into_iter()
            .filter(|addr| values.get(*addr).is_some_and(|v| v.rank() == best))
            .collect();

        let share = pot.amount / winners.len() as u32;
        let remainder = pot.amount % winners.len() as u32;
        for (i, winner) in winners.into_iter().enumerate() {
            let mut payout = share;
            if i == 0 {
                payout += remainder;
            }
            *awards.entry(winner.clone()).or_insert(Chips::ZERO) += payout;
        }
    }
    awards
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_cards::{Card, Suit};
    use holdem_eval::evaluate_best;

    fn chips(n: u32) -> Chips {
        Chips::new(n)
    }

    #[test]
    fn action_validity_table() {
        // Nothing bet yet: check or open.
        let open = valid_actions(chips(0), chips(0), chips(0), chips(500));
        assert_eq!(
            open,
            vec![PlayerAction::Fold, PlayerAction::Check, PlayerAction::Bet]
        );

        // Facing a bet of 100 with 20 last raise: call or raise.
        let facing = valid_actions(chips(100), chips(20), chips(0), chips(500));
        assert_eq!(
            facing,
            vec![PlayerAction::Fold, PlayerAction::Call, PlayerAction::Raise]
        );

        // Already matched: check or raise.
        let matched = valid_actions(chips(100), chips(20), chips(100), chips(500));
        assert_eq!(
            matched,
            vec![PlayerAction::Fold, PlayerAction::Check, PlayerAction::Raise]
        );

        // Short stack cannot meet the minimum raise.
        let short = valid_actions(chips(100), chips(50), chips(0), chips(120));
        assert_eq!(short, vec![PlayerAction::Fold, PlayerAction::Call]);

        // A stack too small to open cannot bet.
        let tiny = valid_actions(chips(0), chips(0), chips(0), chips(15));
        assert_eq!(tiny, vec![PlayerAction::Fold, PlayerAction::Check]);
    }

    #[test]
    fn value_bounds() {
        assert_eq!(
            check_value(PlayerAction::Bet, chips(10), chips(0), chips(0), chips(500)),
            Err(ActionError::BetBelowMinimum { min: BIG_BLIND })
        );
        assert_eq!(
            check_value(PlayerAction::Raise, chips(110), chips(100), chips(20), chips(500)),
            Err(ActionError::RaiseBelowMinimum { min: chips(120) })
        );
        assert_eq!(
            check_value(PlayerAction::Raise, chips(600), chips(100), chips(20), chips(500)),
            Err(ActionError::ExceedsStack {
                value: chips(600),
                stack: chips(500)
            })
        );
        assert!(check_value(PlayerAction::Raise, chips(120), chips(100), chips(20), chips(500)).is_ok());
        assert!(check_value(PlayerAction::Call, chips(0), chips(100), chips(20), chips(5)).is_ok());
    }

    #[test]
    fn side_pots_from_all_in() {
        // A all-in for 100, B and C at 300 each.
        let pots = build_side_pots(&[
            ("a:1".into(), chips(100)),
            ("b:1".into(), chips(300)),
            ("c:1".into(), chips(300)),
        ]);
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, chips(300));
        assert_eq!(pots[0].eligible, vec!["a:1", "b:1", "c:1"]);
        assert_eq!(pots[1].amount, chips(400));
        assert_eq!(pots[1].eligible, vec!["b:1", "c:1"]);
        assert_eq!(pots.iter().map(|p| p.amount).sum::<Chips>(), chips(700));
    }

    #[test]
    fn side_pots_skip_zero_contributions() {
        let pots = build_side_pots(&[
            ("a:1".into(), chips(50)),
            ("b:1".into(), chips(50)),
            ("c:1".into(), Chips::ZERO),
        ]);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, chips(100));
        assert_eq!(pots[0].eligible, vec!["a:1", "b:1"]);
    }

    fn value_of(cards: &[(Suit, u8)]) -> HandValue {
        let cards: Vec<Card> = cards.iter().map(|(s, r)| Card::new(*s, *r)).collect();
        evaluate_best(&cards)
    }

    #[test]
    fn tie_splits_with_odd_chip_to_first_address() {
        use Suit::{Clubs, Diamonds, Hearts, Spades};
        // Both players play the board: identical ranks.
        let board = [
            (Spades, 10),
            (Hearts, 11),
            (Diamonds, 12),
            (Clubs, 13),
            (Spades, 2),
        ];
        let mut a_cards = vec![(Hearts, 3), (Hearts, 4)];
        a_cards.extend_from_slice(&board);
        let mut b_cards = vec![(Clubs, 3), (Clubs, 4)];
        b_cards.extend_from_slice(&board);

        let mut values = BTreeMap::new();
        values.insert("a:1".to_string(), value_of(&a_cards));
        values.insert("b:1".to_string(), value_of(&b_cards));

        let pots = vec![SidePot {
            amount: chips(101),
            eligible: vec!["a:1".into(), "b:1".into()],
        }];
        let non_folded = vec!["a:1".to_string(), "b:1".to_string()];
        let awards = award_pots(&pots, &values, &non_folded);

        assert_eq!(awards["a:1"], chips(51));
        assert_eq!(awards["b:1"], chips(50));
    }

    #[test]
    fn orphaned_pot_falls_back_to_field() {
        use Suit::{Hearts, Spades};
        let mut values = BTreeMap::new();
        values.insert(
            "a:1".to_string(),
            value_of(&[
                (Spades, 1),
                (Hearts, 1),
                (Spades, 5),
                (Hearts, 9),
                (Spades, 12),
            ]),
        );

        // The only eligible player folded; the band goes to the field.
        let pots = vec![SidePot {
            amount: chips(200),
            eligible: vec!["b:1".into()],
        }];
        let non_folded = vec!["a:1".to_string()];
        let awards = award_pots(&pots, &values, &non_folded);
        assert_eq!(awards["a:1"], chips(200));
    }
}
