//! Structured dump of the public (non-cryptographic) game state.
//!
//! Used for crash-recovery display only: keys, the undealt deck and the
//! private hand are deliberately absent, and the file is not a consensus
//! artifact.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use holdem_cards::Card;

use crate::chips::Chips;
use crate::game::GameCore;
use crate::phase::HandPhase;
use crate::player::{PlayerState, Roster};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub status: HandPhase,
    pub pot: Chips,
    pub players: BTreeMap<String, PlayerState>,
    pub rotation: Vec<String>,
    pub dealer_id: usize,
    pub highest_bet: Chips,
    pub community_cards: Vec<Card>,
}

impl GameCore {
    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        let (players, rotation) = self.roster.parts();
        GameSnapshot {
            status: self.status,
            pot: self.pot,
            players: players.clone(),
            rotation: rotation.to_vec(),
            dealer_id: self.dealer_id,
            highest_bet: self.highest_bet,
            community_cards: self.community.clone(),
        }
    }

    /// Write the snapshot atomically: the file never holds a half-written
    /// state, even if the process dies mid-save.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.snapshot()).context("serialize snapshot")?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }

    /// Restore the public fields captured by [`GameCore::snapshot`].
    pub fn load_snapshot(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let snapshot: GameSnapshot =
            serde_json::from_slice(&bytes).context("parse snapshot")?;

        self.status = snapshot.status;
        self.pot = snapshot.pot;
        self.roster = Roster::restore(snapshot.players, snapshot.rotation);
        self.dealer_id = snapshot.dealer_id;
        self.highest_bet = snapshot.highest_bet;
        self.community = snapshot.community_cards;
        Ok(())
    }
}
