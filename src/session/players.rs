//! Players Manager
//!
//! Session table (connection slot to player), live player entities and the
//! FIFO matchmaking queue. Bots live here too but never own a slot.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info};

use crate::error::GameError;
use crate::game::player::{Player, PlayerId};
use crate::game::state::MatchMode;
use crate::network::server::SlotId;

/// A queued player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    player: PlayerId,
    mode: MatchMode,
}

/// Result of a matchmaking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// Two humans, longest-waiting first.
    Versus([PlayerId; 2]),
    /// One human who asked for a bot opponent.
    Practice(PlayerId),
}

/// Live players and sessions.
#[derive(Debug, Default)]
pub struct PlayersManager {
    players: BTreeMap<PlayerId, Player>,
    sessions: BTreeMap<SlotId, PlayerId>,
    slots: BTreeMap<PlayerId, SlotId>,
    queue: VecDeque<QueueEntry>,
}

impl PlayersManager {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Bind `player` to `slot`.
    pub fn log_in(&mut self, slot: SlotId, player: Player) -> Result<PlayerId, GameError> {
        if self.sessions.contains_key(&slot) || self.slots.contains_key(&player.id) {
            return Err(GameError::AlreadyLoggedIn);
        }
        let id = player.id;
        info!(slot, player = %id.short(), name = %player.name, "Player logged in");
        self.sessions.insert(slot, id);
        self.slots.insert(id, slot);
        self.players.insert(id, player);
        Ok(id)
    }

    /// Unbind the player on `slot` and drop them from the queue.
    ///
    /// The entity stays alive so a running match can still be concluded;
    /// call [`PlayersManager::remove`] afterwards.
    pub fn log_out(&mut self, slot: SlotId) -> Option<PlayerId> {
        let id = self.sessions.remove(&slot)?;
        self.slots.remove(&id);
        self.dequeue(id);
        info!(slot, player = %id.short(), "Player logged out");
        Some(id)
    }

    pub fn player_of(&self, slot: SlotId) -> Option<PlayerId> {
        self.sessions.get(&slot).copied()
    }

    pub fn slot_of(&self, id: &PlayerId) -> Option<SlotId> {
        self.slots.get(id).copied()
    }

    pub fn is_online(&self, id: &PlayerId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // -------------------------------------------------------------------------
    // Entities
    // -------------------------------------------------------------------------

    /// Add a server-driven player.
    pub fn insert_bot(&mut self, bot: Player) -> PlayerId {
        let id = bot.id;
        self.players.insert(id, bot);
        id
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Two distinct players borrowed mutably, in the order asked for.
    pub fn pair_mut(&mut self, ids: [PlayerId; 2]) -> Option<[&mut Player; 2]> {
        if ids[0] == ids[1] {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (id, player) in self.players.iter_mut() {
            if *id == ids[0] {
                first = Some(player);
            } else if *id == ids[1] {
                second = Some(player);
            }
        }
        Some([first?, second?])
    }

    // -------------------------------------------------------------------------
    // Queue
    // -------------------------------------------------------------------------

    pub fn enqueue(&mut self, id: PlayerId, mode: MatchMode) -> Result<(), GameError> {
        let player = self.players.get(&id).ok_or(GameError::NotLoggedIn)?;
        if player.is_in_match() {
            return Err(GameError::AlreadyInMatch);
        }
        if self.is_queued(&id) {
            return Err(GameError::AlreadyQueued);
        }
        self.queue.push_back(QueueEntry { player: id, mode });
        debug!(player = %id.short(), ?mode, queued = self.queue.len(), "Player queued");
        Ok(())
    }

    pub fn dequeue(&mut self, id: PlayerId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|e| e.player != id);
        self.queue.len() != before
    }

    pub fn is_queued(&self, id: &PlayerId) -> bool {
        self.queue.iter().any(|e| e.player == *id)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// One matchmaking pass: every practice request plus the two
    /// longest-waiting versus players, if there are two.
    pub fn take_pairings(&mut self) -> Vec<Pairing> {
        let mut pairings: Vec<Pairing> = self
            .queue
            .iter()
            .filter(|e| e.mode == MatchMode::Practice)
            .map(|e| Pairing::Practice(e.player))
            .collect();
        self.queue.retain(|e| e.mode != MatchMode::Practice);

        if self.queue.len() >= 2 {
            if let (Some(a), Some(b)) = (self.queue.pop_front(), self.queue.pop_front()) {
                pairings.push(Pairing::Versus([a.player, b.player]));
            }
        }
        pairings
    }
}
