//! The authoritative per-peer game state.
//!
//! Every peer owns one `GameCore` and advances it in lock-step by applying
//! the same messages in the same order. There is no coordinator on the
//! network; agreement on dealer, blinds and turn order falls out of the
//! deterministic rotation (sorted addresses) that every peer computes
//! independently.

use ahash::AHashMap;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use holdem_cards::Card;
use holdem_eval::evaluate_best;

use crate::betting::{self, ActionError};
use crate::chips::Chips;
use crate::crypto::CardCipher;
use crate::message::{Directed, Payload};
use crate::phase::{HandPhase, PlayerAction};
use crate::player::{PlayerState, Roster};
use crate::{BIG_BLIND, SMALL_BLIND};

pub struct GameCore {
    pub(crate) listen_addr: String,
    broadcast_tx: mpsc::Sender<Directed>,

    pub(crate) status: HandPhase,
    pub(crate) roster: Roster,
    pub(crate) pot: Chips,
    pub(crate) highest_bet: Chips,
    pub(crate) last_raise_amount: Chips,
    pub(crate) dealer_id: usize,
    dealer_assigned: bool,
    pub(crate) turn_id: usize,
    pub(crate) last_raiser_id: usize,
    sb_id: usize,
    bb_id: usize,

    pub(crate) cipher: CardCipher,
    pub(crate) folded_keys: AHashMap<String, CardCipher>,
    pub(crate) revealed_keys: AHashMap<String, CardCipher>,
    pub(crate) deck: Vec<Vec<u8>>,
    pub(crate) my_hand: Vec<Card>,
    pub(crate) community: Vec<Card>,

    pub(crate) rng: StdRng,
}

impl GameCore {
    /// Create the local peer's game state. The peer itself is the first
    /// player in the roster.
    #[must_use]
    pub fn new(listen_addr: String, broadcast_tx: mpsc::Sender<Directed>) -> Self {
        let mut rng = StdRng::from_os_rng();
        let cipher = CardCipher::generate(&mut rng);
        let mut roster = Roster::default();
        roster.add(&listen_addr);
        Self {
            listen_addr,
            broadcast_tx,
            status: HandPhase::Waiting,
            roster,
            pot: Chips::ZERO,
            highest_bet: Chips::ZERO,
            last_raise_amount: Chips::ZERO,
            dealer_id: 0,
            dealer_assigned: false,
            turn_id: 0,
            last_raiser_id: 0,
            sb_id: 0,
            bb_id: 0,
            cipher,
            folded_keys: AHashMap::new(),
            revealed_keys: AHashMap::new(),
            deck: Vec::new(),
            my_hand: Vec::new(),
            community: Vec::new(),
            rng,
        }
    }

    // ------------------------------------------------------------------
    // Read-only surface for the HTTP API and the node.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    #[must_use]
    pub const fn status(&self) -> HandPhase {
        self.status
    }

    #[must_use]
    pub const fn pot(&self) -> Chips {
        self.pot
    }

    #[must_use]
    pub const fn highest_bet(&self) -> Chips {
        self.highest_bet
    }

    /// Minimum total a bet or raise must reach right now.
    #[must_use]
    pub fn min_raise(&self) -> Chips {
        if self.highest_bet.is_zero() {
            BIG_BLIND
        } else {
            self.highest_bet + self.last_raise_amount
        }
    }

    #[must_use]
    pub fn my_hand(&self) -> &[Card] {
        &self.my_hand
    }

    #[must_use]
    pub fn community_cards(&self) -> &[Card] {
        &self.community
    }

    #[must_use]
    pub const fn dealer_id(&self) -> usize {
        self.dealer_id
    }

    #[must_use]
    pub const fn turn_id(&self) -> usize {
        self.turn_id
    }

    /// Small-blind and big-blind rotation IDs for the current hand.
    #[must_use]
    pub const fn blind_ids(&self) -> (usize, usize) {
        (self.sb_id, self.bb_id)
    }

    #[must_use]
    pub fn my_stack(&self) -> Chips {
        self.roster
            .get(&self.listen_addr)
            .map_or(Chips::ZERO, |p| p.stack)
    }

    #[must_use]
    pub fn is_my_turn(&self) -> bool {
        self.status.is_betting()
            && self
                .roster
                .id_of(&self.listen_addr)
                .is_some_and(|id| id == self.turn_id)
    }

    /// Actions the local player could take on its turn.
    #[must_use]
    pub fn valid_actions(&self) -> Vec<PlayerAction> {
        if !self.status.is_betting() {
            return Vec::new();
        }
        match self.roster.get(&self.listen_addr) {
            Some(me) if me.rotation_id.is_some() => betting::valid_actions(
                self.highest_bet,
                self.last_raise_amount,
                me.current_round_bet,
                me.stack,
            ),
            _ => Vec::new(),
        }
    }

    /// Point-in-time copy of every player record, in address order.
    #[must_use]
    pub fn players(&self) -> Vec<PlayerState> {
        self.roster.iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Roster maintenance, driven by transport events.
    // ------------------------------------------------------------------

    pub fn add_player(&mut self, addr: &str) {
        info!("seating player {addr}");
        self.roster.add(addr);
    }

    /// A peer disconnected: its record goes inactive and folded. If it held
    /// the turn the hand moves on without it.
    pub fn remove_player(&mut self, addr: &str) {
        let seat = self.roster.id_of(addr);
        let in_hand = self
            .roster
            .get(addr)
            .is_some_and(|p| p.is_active && !p.is_folded);
        self.roster.deactivate(addr);
        info!("player {addr} left the table");

        if let Some(id) = seat {
            if self.status.is_betting() && in_hand {
                if self.roster.non_folded_count() <= 1 {
                    self.hand_won_by_default();
                } else if id == self.turn_id {
                    self.after_action(id);
                } else if self.round_complete() {
                    self.advance_round();
                }
            } else if self.status == HandPhase::Showdown {
                self.try_resolve();
            }
        }
    }

    // ------------------------------------------------------------------
    // Readiness and hand start.
    // ------------------------------------------------------------------

    /// Local player signals readiness; gossiped to every peer.
    pub fn ready_up(&mut self) {
        self.send_to_others(Payload::Ready);
        let addr = self.listen_addr.clone();
        self.set_ready(&addr);
    }

    fn set_ready(&mut self, from: &str) {
        let Some(player) = self.roster.get_mut(from) else {
            warn!("ready from unknown player {from}");
            return;
        };
        player.is_ready = true;

        if self.status == HandPhase::Waiting {
            self.status = HandPhase::PlayerReady;
        }
        if self.roster.ready_active().len() >= 2
            && matches!(self.status, HandPhase::Waiting | HandPhase::PlayerReady)
        {
            self.start_new_hand();
        }
    }

    pub(crate) fn start_new_hand(&mut self) {
        if self.roster.ready_active().len() < 2 {
            warn!("not enough ready players to start a hand");
            self.status = HandPhase::Waiting;
            return;
        }

        self.my_hand.clear();
        self.community.clear();
        self.deck.clear();
        self.folded_keys.clear();
        self.revealed_keys.clear();
        // Fresh exponents every deal; reusing them would let observers
        // correlate cards across hands.
        self.cipher = CardCipher::generate(&mut self.rng);

        self.roster.rebuild_rotation();
        for player in self.roster.iter_mut() {
            player.reset_for_hand();
        }
        self.pot = Chips::ZERO;
        self.highest_bet = Chips::ZERO;
        self.last_raise_amount = Chips::ZERO;

        self.advance_dealer();
        self.post_blinds();
        self.status = HandPhase::Dealing;
        info!(
            "new hand: {} seats, dealer={}, turn={}",
            self.roster.rotation_len(),
            self.dealer_id,
            self.turn_id
        );

        if self.is_dealer() {
            self.initiate_shuffle();
        }
    }

    fn advance_dealer(&mut self) {
        let n = self.roster.rotation_len();
        if !self.dealer_assigned {
            self.dealer_id = 0;
            self.dealer_assigned = true;
            return;
        }
        self.dealer_id = self.roster.next_non_folded(self.dealer_id % n);
    }

    fn post_blinds(&mut self) {
        let n = self.roster.rotation_len();
        let sb = if n == 2 {
            self.dealer_id
        } else {
            self.roster.next_non_folded(self.dealer_id)
        };
        let bb = self.roster.next_non_folded(sb);

        self.post_blind(sb, SMALL_BLIND);
        self.post_blind(bb, BIG_BLIND);

        self.sb_id = sb;
        self.bb_id = bb;
        self.turn_id = self.roster.next_eligible(bb);
        self.last_raiser_id = bb;
        self.last_raise_amount = BIG_BLIND;
        info!("blinds posted: sb={sb} bb={bb}");
    }

    fn post_blind(&mut self, id: usize, amount: Chips) {
        let Some(addr) = self.roster.addr_of(id).map(str::to_string) else {
            return;
        };
        let Some(player) = self.roster.get_mut(&addr) else {
            return;
        };
        let add = amount.min(player.stack);
        player.current_round_bet += add;
        player.total_hand_bet += add;
        player.stack -= add;
        // A forced post is not an action: the big blind keeps its right to
        // check or raise even when everyone merely calls.
        if player.stack.is_zero() {
            player.is_all_in = true;
        }
        let level = player.current_round_bet;
        self.pot += add;
        if level > self.highest_bet {
            self.highest_bet = level;
        }
    }

    pub(crate) fn is_dealer(&self) -> bool {
        self.roster.addr_of(self.dealer_id) == Some(self.listen_addr.as_str())
    }

    // ------------------------------------------------------------------
    // Betting.
    // ------------------------------------------------------------------

    /// Take an action as the local player. Enforces turn ownership and the
    /// full legality predicate; a rejected action changes nothing.
    pub fn take_action(&mut self, action: PlayerAction, value: Chips) -> Result<(), ActionError> {
        if !self.status.is_betting() {
            return Err(ActionError::WrongPhase(self.status));
        }
        let me = self
            .roster
            .get(&self.listen_addr)
            .ok_or(ActionError::NotSeated)?;
        let my_id = me.rotation_id.ok_or(ActionError::NotSeated)?;
        if my_id != self.turn_id {
            return Err(ActionError::NotYourTurn);
        }
        let allowed = betting::valid_actions(
            self.highest_bet,
            self.last_raise_amount,
            me.current_round_bet,
            me.stack,
        );
        if !allowed.contains(&action) {
            return Err(ActionError::Illegal(action));
        }
        betting::check_value(
            action,
            value,
            self.highest_bet,
            self.last_raise_amount,
            me.stack,
        )?;

        if action == PlayerAction::Fold {
            // Remaining peers need this layer to finish the hand.
            self.disclose_fold_keys();
        }
        let addr = self.listen_addr.clone();
        self.apply_action(&addr, action, value);
        self.send_to_others(Payload::PlayerAction {
            action,
            value,
            status: self.status,
        });
        self.after_action(my_id);
        Ok(())
    }

    /// Apply a remote player's action. Out-of-turn messages are logged and
    /// dropped, never applied.
    fn handle_player_action(&mut self, from: &str, action: PlayerAction, value: Chips) {
        let Some(id) = self.roster.id_of(from) else {
            warn!("action from unseated player {from}");
            return;
        };
        if !self.status.is_betting() {
            warn!("dropping {action} from {from} during {}", self.status);
            return;
        }
        if id != self.turn_id {
            warn!("player {from} acting out of turn");
            return;
        }
        self.apply_action(from, action, value);
        self.after_action(id);
    }

    fn apply_action(&mut self, addr: &str, action: PlayerAction, value: Chips) {
        let Some(id) = self.roster.id_of(addr) else {
            return;
        };
        info!("{addr} ({}): {action} {value}", self.status);
        match action {
            PlayerAction::Fold => {
                if let Some(player) = self.roster.get_mut(addr) {
                    player.is_folded = true;
                    player.has_acted = true;
                }
            }
            PlayerAction::Check => {
                if let Some(player) = self.roster.get_mut(addr) {
                    player.has_acted = true;
                }
            }
            PlayerAction::Call => {
                let highest = self.highest_bet;
                let Some(player) = self.roster.get_mut(addr) else {
                    return;
                };
                let add = (highest - player.current_round_bet).min(player.stack);
                player.current_round_bet += add;
                player.total_hand_bet += add;
                player.stack -= add;
                player.has_acted = true;
                if player.stack.is_zero() {
                    player.is_all_in = true;
                    info!("{addr} is all-in");
                }
                self.pot += add;
            }
            PlayerAction::Bet | PlayerAction::Raise => {
                let Some(player) = self.roster.get_mut(addr) else {
                    return;
                };
                let add = (value - player.current_round_bet).min(player.stack);
                player.current_round_bet += add;
                player.total_hand_bet += add;
                player.stack -= add;
                player.has_acted = true;
                if player.stack.is_zero() {
                    player.is_all_in = true;
                    info!("{addr} is all-in");
                }
                let level = player.current_round_bet;
                self.pot += add;
                if level > self.highest_bet {
                    self.last_raise_amount = level - self.highest_bet;
                    self.highest_bet = level;
                    self.last_raiser_id = id;
                    // An aggressive action reopens the round for everyone
                    // still able to act.
                    for other in self.roster.iter_mut() {
                        if other.addr != addr && other.can_act() {
                            other.has_acted = false;
                        }
                    }
                }
            }
        }
    }

    fn after_action(&mut self, actor: usize) {
        if self.roster.non_folded_count() <= 1 {
            self.hand_won_by_default();
            return;
        }
        if self.round_complete() {
            self.advance_round();
        } else {
            self.turn_id = self.roster.next_eligible(actor);
        }
    }

    /// A betting round is over once nobody can act any more, or every player
    /// who can act has voluntarily acted this round and matched the highest
    /// bet. Blind posts are not actions, so action always returns to the
    /// big blind pre-flop before the round can close.
    fn round_complete(&self) -> bool {
        if self.roster.actionable_count() == 0 {
            return true;
        }
        self.roster
            .iter()
            .filter(|p| p.rotation_id.is_some() && p.can_act())
            .all(|p| p.has_acted && p.current_round_bet == self.highest_bet)
    }

    fn advance_round(&mut self) {
        let next = self.status.next_street();
        self.status = next;
        self.highest_bet = Chips::ZERO;
        self.last_raise_amount = Chips::ZERO;
        for player in self.roster.iter_mut() {
            player.current_round_bet = Chips::ZERO;
            player.has_acted = false;
        }
        info!("round complete, advancing to {next}");

        if next == HandPhase::Showdown {
            self.initiate_showdown();
            return;
        }

        if self.is_dealer() {
            let indices = self.community_indices(next);
            self.send_to_others(Payload::GameState {
                status: next,
                community_indices: indices.clone(),
            });
            self.sync_state(next, &indices);
        }
        self.turn_id = self.roster.next_eligible(self.dealer_id);

        // Everyone left is all-in: run the remaining streets out.
        if self.roster.actionable_count() == 0 && self.status.is_betting() {
            self.advance_round();
        }
    }

    /// Deck slots that become visible when `status` begins. Hole cards
    /// occupy slots `0..2N`; community cards follow.
    fn community_indices(&self, status: HandPhase) -> Vec<usize> {
        let n = self.roster.rotation_len();
        match status {
            HandPhase::Flop => vec![2 * n, 2 * n + 1, 2 * n + 2],
            HandPhase::Turn => vec![2 * n + 3],
            HandPhase::River => vec![2 * n + 4],
            _ => Vec::new(),
        }
    }

    /// Adopt a phase announced by the dealer. Betting state is reset only on
    /// an actual transition so a duplicate announcement cannot wipe bets
    /// already placed in the new round.
    pub(crate) fn sync_state(&mut self, status: HandPhase, community_indices: &[usize]) {
        debug!("syncing game state: {status}");
        if status != self.status {
            self.status = status;
            if matches!(
                status,
                HandPhase::Flop | HandPhase::Turn | HandPhase::River | HandPhase::Showdown
            ) {
                self.highest_bet = Chips::ZERO;
                self.last_raise_amount = Chips::ZERO;
                for player in self.roster.iter_mut() {
                    player.current_round_bet = Chips::ZERO;
                    player.has_acted = false;
                }
                self.turn_id = self.roster.next_eligible(self.dealer_id);
            }
        }
        if status == HandPhase::PreFlop {
            self.reveal_my_hole_cards();
        }
        if !community_indices.is_empty() {
            self.reveal_community(community_indices);
        }
    }

    // ------------------------------------------------------------------
    // Showdown and pot distribution.
    // ------------------------------------------------------------------

    fn hand_won_by_default(&mut self) {
        let winners = self.roster.non_folded_addrs();
        if let Some(addr) = winners.first() {
            info!("{addr} wins {} by default", self.pot);
            let pot = self.pot;
            if let Some(player) = self.roster.get_mut(addr) {
                player.stack += pot;
            }
        }
        self.finish_hand();
    }

    pub(crate) fn try_resolve(&mut self) {
        if self.status != HandPhase::Showdown {
            return;
        }
        if self.revealed_keys.len() >= self.roster.non_folded_count() {
            self.resolve_winner();
        }
    }

    fn resolve_winner(&mut self) {
        let non_folded = self.roster.non_folded_addrs();
        info!("resolving winner among {} players", non_folded.len());

        if non_folded.len() <= 1 {
            self.hand_won_by_default();
            return;
        }

        let mut values = BTreeMap::new();
        for addr in &non_folded {
            let Some(id) = self.roster.id_of(addr) else {
                continue;
            };
            let hole = match self.unseal_hole_cards(id) {
                Ok(cards) => cards,
                Err(err) => {
                    error!("cannot unseal cards for {addr}: {err}; showdown stalled");
                    return;
                }
            };
            let mut cards = hole.clone();
            cards.extend_from_slice(&self.community);
            if cards.len() < 5 {
                warn!(
                    "only {} cards revealed for {addr}; waiting for the board",
                    cards.len()
                );
                return;
            }
            let value = evaluate_best(&cards);
            info!("{addr}: {hole:?} {value}");
            values.insert(addr.clone(), value);
        }

        let contributions: Vec<(String, Chips)> = self
            .roster
            .iter()
            .filter(|p| p.rotation_id.is_some())
            .map(|p| (p.addr.clone(), p.total_hand_bet))
            .collect();
        let pots = betting::build_side_pots(&contributions);
        debug_assert_eq!(pots.iter().map(|p| p.amount).sum::<Chips>(), self.pot);

        let awards = betting::award_pots(&pots, &values, &non_folded);
        for (addr, amount) in &awards {
            info!("{addr} wins {amount} ({})", values[addr].name());
            if let Some(player) = self.roster.get_mut(addr) {
                player.stack += *amount;
            }
        }
        self.finish_hand();
    }

    fn finish_hand(&mut self) {
        self.pot = Chips::ZERO;
        self.highest_bet = Chips::ZERO;
        self.last_raise_amount = Chips::ZERO;
        self.folded_keys.clear();
        self.revealed_keys.clear();
        self.status = HandPhase::HandComplete;
        info!("hand complete");
        self.start_new_hand();
    }

    // ------------------------------------------------------------------
    // Inbound dispatch and outbound broadcast.
    // ------------------------------------------------------------------

    /// Route one inbound message to the dealing, betting or sync logic.
    pub fn handle_message(&mut self, from: &str, payload: Payload) {
        debug!("{} <- {} [{}]", self.listen_addr, from, payload.label());
        match payload {
            Payload::Ready => self.set_ready(from),
            Payload::ShuffleStatus { deck } => self.handle_shuffle(from, deck),
            Payload::FinalDeck { deck } => self.handle_final_deck(from, deck),
            Payload::GameState {
                status,
                community_indices,
            } => self.sync_state(status, &community_indices),
            Payload::GetRpc {
                indices,
                encrypted,
                original_owner,
            } => self.handle_reveal_request(&indices, &encrypted, &original_owner),
            Payload::RpcResponse { indices, decrypted } => {
                self.handle_reveal_response(&indices, &decrypted);
            }
            Payload::RevealKeys { keys } => self.handle_reveal_keys(from, keys),
            Payload::PlayerAction { action, value, .. } => {
                self.handle_player_action(from, action, value);
            }
            Payload::Handshake { .. } | Payload::PeerList { .. } => {
                warn!("unexpected {} from {from} at game layer", payload.label());
            }
        }
    }

    fn handle_reveal_keys(&mut self, from: &str, keys: CardCipher) {
        if self.status == HandPhase::Showdown {
            info!("received showdown keys from {from}");
            self.revealed_keys.insert(from.to_string(), keys);
            self.try_resolve();
        } else {
            info!("received keys from folded player {from}");
            self.folded_keys.insert(from.to_string(), keys);
        }
    }

    pub(crate) fn send_to(&self, to: Vec<String>, payload: Payload) {
        if to.is_empty() {
            return;
        }
        if let Err(err) = self.broadcast_tx.try_send(Directed { to, payload }) {
            error!("broadcast channel saturated, dropping message: {err}");
        }
    }

    pub(crate) fn send_to_others(&self, payload: Payload) {
        let others: Vec<String> = self
            .roster
            .addrs()
            .into_iter()
            .filter(|a| *a != self.listen_addr)
            .collect();
        self.send_to(others, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::STARTING_STACK;

    fn new_game(addr: &str, peers: &[&str]) -> (GameCore, mpsc::Receiver<Directed>) {
        let (tx, rx) = mpsc::channel(100);
        let mut game = GameCore::new(addr.to_string(), tx);
        for peer in peers {
            game.add_player(peer);
        }
        (game, rx)
    }

    fn ready_all(game: &mut GameCore) {
        for addr in game.roster.addrs() {
            game.roster.get_mut(&addr).unwrap().is_ready = true;
        }
    }

    fn total_bets(game: &GameCore) -> Chips {
        game.roster
            .iter()
            .filter(|p| p.rotation_id.is_some())
            .map(|p| p.total_hand_bet)
            .sum()
    }

    #[test]
    fn heads_up_blinds() {
        let (mut game, _rx) = new_game("127.0.0.1:1111", &["127.0.0.1:2222"]);
        ready_all(&mut game);
        game.start_new_hand();

        assert_eq!(game.status(), HandPhase::Dealing);
        assert_eq!(game.dealer_id(), 0);
        assert!(game.is_dealer());

        let sb = game.roster.get("127.0.0.1:1111").unwrap();
        let bb = game.roster.get("127.0.0.1:2222").unwrap();
        assert_eq!(sb.current_round_bet, Chips::new(10));
        assert_eq!(bb.current_round_bet, Chips::new(20));
        assert_eq!(sb.stack, Chips::new(990));
        assert_eq!(bb.stack, Chips::new(980));

        assert_eq!(game.pot(), Chips::new(30));
        assert_eq!(game.turn_id(), 0);
        assert_eq!(game.last_raiser_id, 1);
        assert_eq!(game.last_raise_amount, Chips::new(20));
        assert_eq!(game.blind_ids(), (0, 1));
        assert_eq!(total_bets(&game), game.pot());
    }

    #[test]
    fn three_handed_blind_positions() {
        let (mut game, _rx) =
            new_game("127.0.0.1:1111", &["127.0.0.1:2222", "127.0.0.1:3333"]);
        ready_all(&mut game);
        game.start_new_hand();

        assert_eq!(game.dealer_id(), 0);
        assert_eq!(game.blind_ids(), (1, 2));
        // With three or more seats, the player after the big blind opens.
        assert_eq!(game.turn_id(), 0);
        assert_eq!(game.pot(), Chips::new(30));
    }

    #[test]
    fn big_blind_keeps_its_preflop_option() {
        let (mut game, _rx) =
            new_game("127.0.0.1:1111", &["127.0.0.1:2222", "127.0.0.1:3333"]);
        ready_all(&mut game);
        game.start_new_hand();
        game.status = HandPhase::PreFlop;

        // Seat 0 folds and the small blind calls. All bets are matched, but
        // the big blind's forced post is not an action, so the round stays
        // open and the turn walks to it.
        game.take_action(PlayerAction::Fold, Chips::ZERO).unwrap();
        game.handle_message(
            "127.0.0.1:2222",
            Payload::PlayerAction {
                action: PlayerAction::Call,
                value: Chips::ZERO,
                status: HandPhase::PreFlop,
            },
        );
        assert_eq!(game.status(), HandPhase::PreFlop);
        assert_eq!(game.turn_id(), 2);
        assert_eq!(game.pot(), Chips::new(40));

        // The big blind checks its option; now the round closes.
        game.handle_message(
            "127.0.0.1:3333",
            Payload::PlayerAction {
                action: PlayerAction::Check,
                value: Chips::ZERO,
                status: HandPhase::PreFlop,
            },
        );
        assert_eq!(game.status(), HandPhase::Flop);
        assert_eq!(game.pot(), Chips::new(40));
        assert_eq!(total_bets(&game), game.pot());
    }

    #[test]
    fn raise_reopens_the_round() {
        let (mut game, _rx) = new_game("127.0.0.1:1111", &["127.0.0.1:2222"]);
        ready_all(&mut game);
        game.start_new_hand();
        game.status = HandPhase::PreFlop;

        // Dealer raises instead of flat-calling: the big blind must act
        // again, so the round stays open.
        game.take_action(PlayerAction::Raise, Chips::new(60)).unwrap();
        assert_eq!(game.status(), HandPhase::PreFlop);
        assert_eq!(game.turn_id(), 1);
        assert_eq!(game.highest_bet(), Chips::new(60));
        assert_eq!(game.last_raise_amount, Chips::new(40));
        assert_eq!(game.min_raise(), Chips::new(100));

        game.handle_message(
            "127.0.0.1:2222",
            Payload::PlayerAction {
                action: PlayerAction::Call,
                value: Chips::ZERO,
                status: HandPhase::PreFlop,
            },
        );
        assert_eq!(game.status(), HandPhase::Flop);
        assert_eq!(game.pot(), Chips::new(120));
    }

    #[test]
    fn all_in_contributions_build_side_pots() {
        let (mut game, _rx) =
            new_game("127.0.0.1:1111", &["127.0.0.1:2222", "127.0.0.1:3333"]);
        ready_all(&mut game);
        game.roster.get_mut("127.0.0.1:1111").unwrap().stack = Chips::new(100);
        game.roster.get_mut("127.0.0.1:2222").unwrap().stack = Chips::new(500);
        game.roster.get_mut("127.0.0.1:3333").unwrap().stack = Chips::new(500);
        game.start_new_hand();
        game.status = HandPhase::PreFlop;

        // Seat 0 jams for 100, seat 1 raises to 300, seat 2 calls.
        game.take_action(PlayerAction::Raise, Chips::new(100)).unwrap();
        assert!(game.roster.get("127.0.0.1:1111").unwrap().is_all_in);
        game.handle_message(
            "127.0.0.1:2222",
            Payload::PlayerAction {
                action: PlayerAction::Raise,
                value: Chips::new(300),
                status: HandPhase::PreFlop,
            },
        );
        game.handle_message(
            "127.0.0.1:3333",
            Payload::PlayerAction {
                action: PlayerAction::Call,
                value: Chips::ZERO,
                status: HandPhase::PreFlop,
            },
        );

        assert_eq!(game.pot(), Chips::new(700));
        assert_eq!(total_bets(&game), game.pot());
        assert_eq!(game.status(), HandPhase::Flop);

        let contributions: Vec<(String, Chips)> = game
            .roster
            .iter()
            .map(|p| (p.addr.clone(), p.total_hand_bet))
            .collect();
        let pots = betting::build_side_pots(&contributions);
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, Chips::new(300));
        assert_eq!(pots[0].eligible.len(), 3);
        assert_eq!(pots[1].amount, Chips::new(400));
        assert_eq!(
            pots[1].eligible,
            vec!["127.0.0.1:2222".to_string(), "127.0.0.1:3333".to_string()]
        );
    }

    #[test]
    fn fold_awards_pot_and_rolls_into_next_hand() {
        let (mut game, _rx) = new_game("127.0.0.1:1111", &["127.0.0.1:2222"]);
        ready_all(&mut game);
        game.start_new_hand();
        game.status = HandPhase::PreFlop;

        game.take_action(PlayerAction::Fold, Chips::ZERO).unwrap();

        // The opponent won 30 and a fresh hand started with reversed blinds.
        assert_eq!(game.status(), HandPhase::Dealing);
        assert_eq!(game.dealer_id(), 1);
        let p0 = game.roster.get("127.0.0.1:1111").unwrap();
        let p1 = game.roster.get("127.0.0.1:2222").unwrap();
        assert_eq!(p0.stack, Chips::new(970)); // 990 - 20 big blind
        assert_eq!(p1.stack, Chips::new(1000)); // 980 + 30 - 10 small blind
        assert_eq!(game.pot(), Chips::new(30));
        assert!(game.folded_keys.is_empty());
        assert!(game.revealed_keys.is_empty());

        // Chip conservation across the award.
        let stacks: Chips = game.roster.iter().map(|p| p.stack).sum();
        assert_eq!(stacks + game.pot(), STARTING_STACK * 2);
    }

    #[test]
    fn disclosed_keys_are_filed_by_phase() {
        let (mut game, _rx) =
            new_game("127.0.0.1:1111", &["127.0.0.1:2222", "127.0.0.1:3333"]);
        ready_all(&mut game);
        game.start_new_hand();
        game.status = HandPhase::PreFlop;

        // Folding broadcasts our keys and keeps a local copy.
        game.take_action(PlayerAction::Fold, Chips::ZERO).unwrap();
        assert!(game.folded_keys.contains_key("127.0.0.1:1111"));

        // Keys arriving before showdown belong to folders.
        let keys = crate::crypto::CardCipher::generate(&mut game.rng);
        game.handle_message("127.0.0.1:2222", Payload::RevealKeys { keys: keys.clone() });
        assert!(game.folded_keys.contains_key("127.0.0.1:2222"));
        assert!(game.revealed_keys.is_empty());

        // At showdown the same message counts toward resolution instead.
        game.status = HandPhase::Showdown;
        game.handle_message("127.0.0.1:3333", Payload::RevealKeys { keys });
        assert!(game.revealed_keys.contains_key("127.0.0.1:3333"));
    }

    #[test]
    fn out_of_turn_and_wrong_phase_are_rejected() {
        let (mut game, _rx) = new_game("127.0.0.1:1111", &["127.0.0.1:2222"]);
        ready_all(&mut game);
        game.start_new_hand();

        // No actions while dealing.
        assert_eq!(
            game.take_action(PlayerAction::Check, Chips::ZERO),
            Err(ActionError::WrongPhase(HandPhase::Dealing))
        );

        game.status = HandPhase::PreFlop;
        let pot_before = game.pot();

        // Remote player acting out of turn is dropped.
        game.handle_message(
            "127.0.0.1:2222",
            Payload::PlayerAction {
                action: PlayerAction::Check,
                value: Chips::ZERO,
                status: HandPhase::PreFlop,
            },
        );
        assert_eq!(game.pot(), pot_before);
        assert_eq!(game.turn_id(), 0);

        // Local action when the turn is elsewhere.
        game.turn_id = 1;
        assert_eq!(
            game.take_action(PlayerAction::Check, Chips::ZERO),
            Err(ActionError::NotYourTurn)
        );

        // Illegal action on our turn: cannot check facing a bet.
        game.turn_id = 0;
        assert_eq!(
            game.take_action(PlayerAction::Check, Chips::ZERO),
            Err(ActionError::Illegal(PlayerAction::Check))
        );
    }

    #[test]
    fn disconnect_of_turn_holder_moves_on() {
        let (mut game, _rx) =
            new_game("127.0.0.1:1111", &["127.0.0.1:2222", "127.0.0.1:3333"]);
        ready_all(&mut game);
        game.start_new_hand();
        game.status = HandPhase::PreFlop;
        assert_eq!(game.turn_id(), 0);

        game.take_action(PlayerAction::Call, Chips::ZERO).unwrap();
        assert_eq!(game.turn_id(), 1);

        // The player on turn vanishes; its seat counts as folded and play
        // moves to the big blind, which still holds its option.
        game.remove_player("127.0.0.1:2222");
        assert_eq!(game.status(), HandPhase::PreFlop);
        assert_eq!(game.turn_id(), 2);

        game.handle_message(
            "127.0.0.1:3333",
            Payload::PlayerAction {
                action: PlayerAction::Check,
                value: Chips::ZERO,
                status: HandPhase::PreFlop,
            },
        );
        assert_eq!(game.status(), HandPhase::Flop);
    }
}
