//! Mental-poker dealing: the blind-shuffle relay, the encryption-peeling
//! reveal relay, and key disclosure at fold and showdown.
//!
//! The deck circulates the rotation ring exactly once, gathering one
//! encryption layer and one shuffle per peer. Reveals walk the same ring:
//! each hop peels one layer, and the slot owner peels the last one. Relay
//! hops visit every seated peer, folded or not, since every seat holds a
//! layer.

use log::{error, info, warn};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use holdem_cards::{placeholder_deck, Card, DECK_SIZE};

use crate::chips::Chips;
use crate::crypto::CardCipher;
use crate::game::GameCore;
use crate::message::Payload;
use crate::phase::HandPhase;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DealError {
    #[error("no deck has been dealt")]
    DeckMissing,
    #[error("deck slot {0} is out of range")]
    SlotOutOfRange(usize),
    #[error("slot does not decode to a card")]
    BadSlot,
}

/// Apply one peer's encryption to every slot, then shuffle the order.
pub(crate) fn shuffle_encrypted(
    deck: &[Vec<u8>],
    cipher: &CardCipher,
    rng: &mut StdRng,
) -> Vec<Vec<u8>> {
    let mut sealed: Vec<Vec<u8>> = deck.iter().map(|slot| cipher.encrypt(slot)).collect();
    sealed.shuffle(rng);
    sealed
}

/// Decode a fully peeled slot back into a card. An empty byte string is the
/// big-integer zero, which is card index 0.
fn card_from_slot(bytes: &[u8]) -> Result<Card, DealError> {
    let byte = BigUint::from_bytes_be(bytes)
        .to_u8()
        .ok_or(DealError::BadSlot)?;
    Card::from_byte(byte).map_err(|_| DealError::BadSlot)
}

impl GameCore {
    /// Dealer only: build the placeholder deck, apply our layer, shuffle and
    /// send it around the ring.
    pub(crate) fn initiate_shuffle(&mut self) {
        info!("dealer: starting the shuffle relay");
        let sealed = shuffle_encrypted(&placeholder_deck(), &self.cipher, &mut self.rng);
        let next = self.roster.next_id(self.dealer_id);
        let Some(next_addr) = self.roster.addr_of(next).map(str::to_string) else {
            return;
        };
        self.send_to(vec![next_addr], Payload::ShuffleStatus { deck: sealed });
    }

    /// One hop of the shuffle relay. When the deck returns to the dealer it
    /// carries every peer's layer and the hand moves to pre-flop.
    pub(crate) fn handle_shuffle(&mut self, from: &str, deck: Vec<Vec<u8>>) {
        if self.status != HandPhase::Dealing {
            warn!("shuffle relay from {from} during {}", self.status);
            return;
        }
        if deck.len() != DECK_SIZE || !deck.iter().all(|slot| self.cipher.accepts(slot)) {
            self.abort_hand("malformed deck in shuffle relay");
            return;
        }

        if self.is_dealer() {
            info!("deck encrypted by all players, entering pre-flop");
            // The sealed deck is public: every peer must hold it to index
            // its own slots and to peel layers at showdown.
            self.deck = deck.clone();
            self.send_to_others(Payload::FinalDeck { deck });
            self.status = HandPhase::PreFlop;
            self.send_to_others(Payload::GameState {
                status: HandPhase::PreFlop,
                community_indices: Vec::new(),
            });
            self.sync_state(HandPhase::PreFlop, &[]);
            return;
        }

        let Some(my_id) = self.roster.id_of(&self.listen_addr) else {
            warn!("shuffle relay reached a peer outside the rotation");
            return;
        };
        let sealed = shuffle_encrypted(&deck, &self.cipher, &mut self.rng);
        let next = self.roster.next_id(my_id);
        let Some(next_addr) = self.roster.addr_of(next).map(str::to_string) else {
            return;
        };
        self.send_to(vec![next_addr], Payload::ShuffleStatus { deck: sealed });
    }

    /// Adopt the sealed deck the dealer published at the end of the
    /// shuffle relay. Arrives on the dealer's connection ahead of the
    /// pre-flop announcement, so the reveal relays always find it.
    pub(crate) fn handle_final_deck(&mut self, from: &str, deck: Vec<Vec<u8>>) {
        if self.status != HandPhase::Dealing {
            warn!("final deck from {from} during {}", self.status);
            return;
        }
        if self.roster.addr_of(self.dealer_id) != Some(from) {
            warn!("final deck from non-dealer {from}, ignoring");
            return;
        }
        if deck.len() != DECK_SIZE || !deck.iter().all(|slot| self.cipher.accepts(slot)) {
            self.abort_hand("malformed final deck");
            return;
        }
        info!("received the sealed deck from the dealer");
        self.deck = deck;
    }

    /// Start the reveal relay for our own hole-card slots.
    pub(crate) fn reveal_my_hole_cards(&mut self) {
        if !self.my_hand.is_empty() {
            return;
        }
        if self.deck.len() != DECK_SIZE {
            warn!("cannot reveal hole cards without a dealt deck");
            return;
        }
        let Some(my_id) = self.roster.id_of(&self.listen_addr) else {
            return;
        };
        let indices = vec![2 * my_id, 2 * my_id + 1];
        let encrypted = vec![self.deck[indices[0]].clone(), self.deck[indices[1]].clone()];
        let next = self.roster.next_id(my_id);
        let Some(next_addr) = self.roster.addr_of(next).map(str::to_string) else {
            return;
        };
        self.send_to(
            vec![next_addr],
            Payload::GetRpc {
                indices,
                encrypted,
                original_owner: self.listen_addr.clone(),
            },
        );
    }

    /// Start the reveal relay for community slots the dealer just announced.
    pub(crate) fn reveal_community(&mut self, indices: &[usize]) {
        if self.deck.len() != DECK_SIZE {
            warn!("cannot reveal community cards without a dealt deck");
            return;
        }
        if indices.iter().any(|&i| i >= self.deck.len()) {
            warn!("community indices out of range: {indices:?}");
            return;
        }
        let Some(my_id) = self.roster.id_of(&self.listen_addr) else {
            return;
        };
        let encrypted: Vec<Vec<u8>> = indices.iter().map(|&i| self.deck[i].clone()).collect();
        let next = self.roster.next_id(my_id);
        let Some(next_addr) = self.roster.addr_of(next).map(str::to_string) else {
            return;
        };
        self.send_to(
            vec![next_addr],
            Payload::GetRpc {
                indices: indices.to_vec(),
                encrypted,
                original_owner: self.listen_addr.clone(),
            },
        );
    }

    /// One hop of the reveal relay: peel our layer, then either answer the
    /// owner or pass the thinner ciphertexts along.
    pub(crate) fn handle_reveal_request(
        &mut self,
        indices: &[usize],
        encrypted: &[Vec<u8>],
        original_owner: &str,
    ) {
        let Some(my_id) = self.roster.id_of(&self.listen_addr) else {
            warn!("reveal relay reached a peer outside the rotation");
            return;
        };
        let decrypted: Vec<Vec<u8>> = encrypted.iter().map(|d| self.cipher.decrypt(d)).collect();
        let next = self.roster.next_id(my_id);
        let Some(next_addr) = self.roster.addr_of(next).map(str::to_string) else {
            return;
        };

        if next_addr == original_owner {
            self.send_to(
                vec![next_addr],
                Payload::RpcResponse {
                    indices: indices.to_vec(),
                    decrypted,
                },
            );
        } else {
            self.send_to(
                vec![next_addr],
                Payload::GetRpc {
                    indices: indices.to_vec(),
                    encrypted: decrypted,
                    original_owner: original_owner.to_string(),
                },
            );
        }
    }

    /// Terminal hop: peel our own layer off the answered slots and file the
    /// plaintext cards as hole or community cards.
    pub(crate) fn handle_reveal_response(&mut self, indices: &[usize], decrypted: &[Vec<u8>]) {
        let Some(my_id) = self.roster.id_of(&self.listen_addr) else {
            return;
        };
        let hole = [2 * my_id, 2 * my_id + 1];
        for (idx, data) in indices.iter().zip(decrypted) {
            let plain = self.cipher.decrypt(data);
            match card_from_slot(&plain) {
                Ok(card) if hole.contains(idx) => {
                    if self.my_hand.len() < 2 {
                        info!("hole card revealed: {card}");
                        self.my_hand.push(card);
                    }
                }
                Ok(card) => {
                    if self.community.len() < 5 {
                        info!("community card revealed: {card}");
                        self.community.push(card);
                    }
                }
                Err(err) => warn!("reveal response slot {idx} unusable: {err}"),
            }
        }
        // An all-in runout can reach showdown with the board still in
        // flight; retry resolution as the cards land.
        self.try_resolve();
    }

    /// Broadcast our exponents so the table can finish the hand without us,
    /// and keep a copy for our own showdown arithmetic.
    pub(crate) fn disclose_fold_keys(&mut self) {
        self.send_to_others(Payload::RevealKeys {
            keys: self.cipher.clone(),
        });
        self.folded_keys
            .insert(self.listen_addr.clone(), self.cipher.clone());
    }

    /// Entering showdown: disclose our keys and see whether everyone else's
    /// have already arrived.
    pub(crate) fn initiate_showdown(&mut self) {
        info!("showdown: broadcasting deck keys");
        self.send_to_others(Payload::RevealKeys {
            keys: self.cipher.clone(),
        });
        self.revealed_keys
            .insert(self.listen_addr.clone(), self.cipher.clone());
        self.try_resolve();
    }

    /// Peel every disclosed layer off a player's hole-card slots. Fails when
    /// a layer is still missing, which stalls resolution until it arrives.
    pub(crate) fn unseal_hole_cards(&self, id: usize) -> Result<Vec<Card>, DealError> {
        if self.deck.len() != DECK_SIZE {
            return Err(DealError::DeckMissing);
        }
        let mut cards = Vec::with_capacity(2);
        for slot in [2 * id, 2 * id + 1] {
            let sealed = self.deck.get(slot).ok_or(DealError::SlotOutOfRange(slot))?;
            let mut data = sealed.clone();
            for keys in self.revealed_keys.values().chain(self.folded_keys.values()) {
                data = keys.decrypt(&data);
            }
            cards.push(card_from_slot(&data)?);
        }
        Ok(cards)
    }

    /// A malformed deck cannot be recovered from: refund the bets, void the
    /// hand and fall back to waiting.
    fn abort_hand(&mut self, reason: &str) {
        error!("aborting hand: {reason}");
        for player in self.roster.iter_mut() {
            if player.rotation_id.is_some() {
                player.stack += player.total_hand_bet;
                player.total_hand_bet = Chips::ZERO;
                player.current_round_bet = Chips::ZERO;
            }
        }
        self.pot = Chips::ZERO;
        self.deck.clear();
        self.my_hand.clear();
        self.community.clear();
        self.folded_keys.clear();
        self.revealed_keys.clear();
        self.status = HandPhase::Waiting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tokio::sync::mpsc;

    #[test]
    fn final_deck_is_accepted_only_from_the_dealer() {
        let (tx, _rx) = mpsc::channel(100);
        // The lexicographically smaller peer is the first-hand dealer, so
        // this game is the non-dealer seat.
        let mut game = GameCore::new("127.0.0.1:2222".to_string(), tx);
        game.roster.add("127.0.0.1:1111");
        for addr in ["127.0.0.1:1111", "127.0.0.1:2222"] {
            game.roster.get_mut(addr).unwrap().is_ready = true;
        }
        game.start_new_hand();
        assert_eq!(game.status, HandPhase::Dealing);
        assert!(!game.is_dealer());

        // Only the dealer may publish the sealed deck.
        game.handle_final_deck("127.0.0.1:3333", placeholder_deck());
        assert!(game.deck.is_empty());

        game.handle_final_deck("127.0.0.1:1111", placeholder_deck());
        assert_eq!(game.deck.len(), DECK_SIZE);
        assert_eq!(game.status, HandPhase::Dealing);

        // A late duplicate outside the dealing phase is ignored.
        game.status = HandPhase::PreFlop;
        game.handle_final_deck("127.0.0.1:1111", Vec::new());
        assert_eq!(game.deck.len(), DECK_SIZE);
    }

    #[test]
    fn card_from_slot_handles_zero_and_garbage() {
        // Big-integer zero serializes to an empty byte string; it is card 0.
        let zero = card_from_slot(&[]).unwrap();
        assert_eq!(zero.to_byte(), 0);
        assert_eq!(card_from_slot(&[0]).unwrap().to_byte(), 0);
        assert_eq!(card_from_slot(&[51]).unwrap().to_byte(), 51);

        assert_eq!(card_from_slot(&[52]), Err(DealError::BadSlot));
        assert_eq!(card_from_slot(&[1, 0]), Err(DealError::BadSlot));
    }

    #[test]
    fn shuffle_ring_closure() {
        // Four peers each add a layer and a shuffle; peeling all layers in
        // any order must give back the original 52 bytes as a multiset.
        let mut rng = StdRng::seed_from_u64(42);
        let ciphers: Vec<CardCipher> =
            (0..4).map(|_| CardCipher::generate(&mut rng)).collect();

        let mut deck = placeholder_deck();
        for cipher in &ciphers {
            deck = shuffle_encrypted(&deck, cipher, &mut rng);
        }

        // Peel in an order unrelated to the encryption order.
        let mut bytes: Vec<u8> = deck
            .iter()
            .map(|slot| {
                let mut data = slot.clone();
                for cipher in ciphers.iter().rev() {
                    data = cipher.decrypt(&data);
                }
                card_from_slot(&data).unwrap().to_byte()
            })
            .collect();
        bytes.sort_unstable();
        let expected: Vec<u8> = (0..DECK_SIZE as u8).collect();
        assert_eq!(bytes, expected);

        // A second, interleaved peeling order agrees.
        let slot = &deck[17];
        let mut data = slot.clone();
        for i in [2usize, 0, 3, 1] {
            data = ciphers[i].decrypt(&data);
        }
        assert!(card_from_slot(&data).is_ok());
    }
}
