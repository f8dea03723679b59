//! Per-peer player records and the hand rotation.
//!
//! The roster is keyed by the peer's stable `host:port` listen address. The
//! rotation is rebuilt at the start of every hand from the ready-and-active
//! players in lexicographic address order, which is what lets every peer
//! independently agree on dealer, blinds and card slots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chips::Chips;
use crate::STARTING_STACK;

/// Mutable per-peer row. Created on first handshake, deactivated on
/// disconnect, never deleted: the stack survives across hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub addr: String,
    pub rotation_id: Option<usize>,
    pub is_ready: bool,
    pub is_active: bool,
    pub is_folded: bool,
    pub is_all_in: bool,
    pub has_acted: bool,
    pub stack: Chips,
    pub current_round_bet: Chips,
    pub total_hand_bet: Chips,
}

impl PlayerState {
    fn new(addr: String) -> Self {
        Self {
            addr,
            rotation_id: None,
            is_ready: false,
            is_active: true,
            is_folded: false,
            is_all_in: false,
            has_acted: false,
            stack: STARTING_STACK,
            current_round_bet: Chips::ZERO,
            total_hand_bet: Chips::ZERO,
        }
    }

    /// Eligible to act right now: seated, still in the hand, not all-in.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.is_active && !self.is_folded && !self.is_all_in
    }

    pub(crate) fn reset_for_hand(&mut self) {
        self.is_folded = false;
        self.is_all_in = false;
        self.has_acted = false;
        self.current_round_bet = Chips::ZERO;
        self.total_hand_bet = Chips::ZERO;
    }
}

/// All known players plus the current hand's rotation map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    players: BTreeMap<String, PlayerState>,
    rotation: Vec<String>,
}

impl Roster {
    /// Register a peer, or re-activate a returning one.
    pub fn add(&mut self, addr: &str) {
        self.players
            .entry(addr.to_string())
            .and_modify(|p| p.is_active = true)
            .or_insert_with(|| PlayerState::new(addr.to_string()));
    }

    /// Mark a disconnected peer inactive and folded; its record (and stack)
    /// stays.
    pub fn deactivate(&mut self, addr: &str) {
        if let Some(player) = self.players.get_mut(addr) {
            player.is_active = false;
            player.is_folded = true;
        }
    }

    #[must_use]
    pub fn get(&self, addr: &str) -> Option<&PlayerState> {
        self.players.get(addr)
    }

    pub fn get_mut(&mut self, addr: &str) -> Option<&mut PlayerState> {
        self.players.get_mut(addr)
    }

    /// All records, in address order.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerState> {
        self.players.values_mut()
    }

    #[must_use]
    pub fn addrs(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.players.values().filter(|p| p.is_ready).count()
    }

    /// Addresses of ready-and-active players, lexicographically sorted (the
    /// map's own order).
    #[must_use]
    pub fn ready_active(&self) -> Vec<String> {
        self.players
            .values()
            .filter(|p| p.is_ready && p.is_active)
            .map(|p| p.addr.clone())
            .collect()
    }

    /// Reassign contiguous rotation IDs to the ready-and-active players and
    /// clear everyone else's seat.
    pub fn rebuild_rotation(&mut self) {
        self.rotation = self.ready_active();
        for player in self.players.values_mut() {
            player.rotation_id = None;
        }
        for (id, addr) in self.rotation.clone().iter().enumerate() {
            if let Some(player) = self.players.get_mut(addr) {
                player.rotation_id = Some(id);
            }
        }
    }

    #[must_use]
    pub fn rotation_len(&self) -> usize {
        self.rotation.len()
    }

    #[must_use]
    pub fn addr_of(&self, id: usize) -> Option<&str> {
        self.rotation.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn id_of(&self, addr: &str) -> Option<usize> {
        self.players.get(addr).and_then(|p| p.rotation_id)
    }

    fn seated(&self, id: usize) -> Option<&PlayerState> {
        self.addr_of(id).and_then(|addr| self.players.get(addr))
    }

    /// Next seat in ring order, regardless of state. Relay hops visit every
    /// seated peer, folded or not.
    #[must_use]
    pub fn next_id(&self, id: usize) -> usize {
        match self.rotation.len() {
            0 => 0,
            n => (id + 1) % n,
        }
    }

    /// First non-folded seat after `from`; `from` itself when no other seat
    /// qualifies.
    #[must_use]
    pub fn next_non_folded(&self, from: usize) -> usize {
        self.walk(from, |p| p.is_active && !p.is_folded)
    }

    /// First seat after `from` that can still act (non-folded, not all-in);
    /// `from` itself when no other seat qualifies.
    #[must_use]
    pub fn next_eligible(&self, from: usize) -> usize {
        self.walk(from, PlayerState::can_act)
    }

    fn walk(&self, from: usize, keep: impl Fn(&PlayerState) -> bool) -> usize {
        let n = self.rotation.len();
        if n == 0 {
            return from;
        }
        let mut id = from;
        for _ in 0..n {
            id = (id + 1) % n;
            if let Some(player) = self.seated(id) {
                if keep(player) {
                    return id;
                }
            }
        }
        from
    }

    fn seats(&self) -> impl Iterator<Item = &PlayerState> {
        self.rotation.iter().filter_map(|addr| self.players.get(addr))
    }

    #[must_use]
    pub fn non_folded_count(&self) -> usize {
        self.seats().filter(|p| p.is_active && !p.is_folded).count()
    }

    /// Non-folded seat addresses, in rotation (= address) order.
    #[must_use]
    pub fn non_folded_addrs(&self) -> Vec<String> {
        self.seats()
            .filter(|p| p.is_active && !p.is_folded)
            .map(|p| p.addr.clone())
            .collect()
    }

    #[must_use]
    pub fn actionable_count(&self) -> usize {
        self.seats().filter(|p| p.can_act()).count()
    }

    pub(crate) fn restore(players: BTreeMap<String, PlayerState>, rotation: Vec<String>) -> Self {
        Self { players, rotation }
    }

    pub(crate) fn parts(&self) -> (&BTreeMap<String, PlayerState>, &[String]) {
        (&self.players, &self.rotation)
    }
}
