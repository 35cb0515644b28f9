//! Bot driver.
//!
//! Each bot moves at most once per cooldown. Its move is the first legal
//! swap of a row-major scan, submitted through the same turn path as a
//! human request.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use crate::core::clock::Millis;
use crate::game::block::Cell;
use crate::game::field::{Direction, Field};
use crate::game::player::PlayerId;

#[derive(Debug)]
pub struct AiManager {
    cooldown_ms: Millis,
    next_move: BTreeMap<PlayerId, Millis>,
}

impl AiManager {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown_ms: cooldown.as_millis() as Millis,
            next_move: BTreeMap::new(),
        }
    }

    /// Start driving `bot`. Its first move comes one cooldown after `now`.
    pub fn register(&mut self, bot: PlayerId, now: Millis) {
        debug!(bot = %bot.short(), "Bot registered");
        self.next_move.insert(bot, now + self.cooldown_ms);
    }

    pub fn unregister(&mut self, bot: &PlayerId) -> bool {
        self.next_move.remove(bot).is_some()
    }

    pub fn bot_count(&self) -> usize {
        self.next_move.len()
    }

    /// Bots allowed to move at `now`. Each returned bot is rescheduled.
    pub fn due(&mut self, now: Millis) -> Vec<PlayerId> {
        let cooldown = self.cooldown_ms;
        self.next_move
            .iter_mut()
            .filter(|(_, next)| **next <= now)
            .map(|(bot, next)| {
                *next = now + cooldown;
                *bot
            })
            .collect()
    }

    /// First swap the field would accept.
    pub fn find_swap(field: &Field, now: Millis) -> Option<(Cell, Direction)> {
        (0..field.height())
            .flat_map(|y| (0..field.width()).map(move |x| Cell::new(x, y)))
            .flat_map(|cell| Direction::ALL.into_iter().map(move |dir| (cell, dir)))
            .find(|(cell, dir)| field.check_swap(*cell, *dir, now).is_ok())
    }
}
