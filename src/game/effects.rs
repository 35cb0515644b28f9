//! Field-scoped global effects.
//!
//! Shields wait to be consumed. Over-time effects decay by the wall-clock
//! time elapsed since they were last sampled.

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::game::block::BlockId;

/// Per-field global effect identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EffectId(pub u64);

/// Global effect kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalEffectKind {
    /// Absorbs the next incoming damage, consumed once.
    Shield,
    /// Restores health over time.
    HealOverTime,
    /// Restores mana over time.
    ManaOverTime,
}

/// A status attached to a field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalEffect {
    pub id: EffectId,
    pub kind: GlobalEffectKind,
    /// Amount restored per second (over-time kinds only).
    pub per_sec: f32,
    /// Time left before the effect lapses (over-time kinds only).
    pub remaining_ms: u64,
    /// Last time the effect was sampled.
    pub last_sampled: Millis,
    /// Unique block that created this effect, for removal on delete.
    pub source: Option<BlockId>,
}

/// Result of sampling an over-time effect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Amount to apply to the owner.
    pub amount: f32,
    /// The effect ran out and should be removed.
    pub expired: bool,
}

impl GlobalEffect {
    /// Create a shield.
    pub fn shield(id: EffectId, now: Millis, source: Option<BlockId>) -> Self {
        Self {
            id,
            kind: GlobalEffectKind::Shield,
            per_sec: 0.0,
            remaining_ms: 0,
            last_sampled: now,
            source,
        }
    }

    /// Create an over-time effect.
    pub fn over_time(
        id: EffectId,
        kind: GlobalEffectKind,
        per_sec: f32,
        duration_ms: u64,
        now: Millis,
        source: Option<BlockId>,
    ) -> Self {
        Self {
            id,
            kind,
            per_sec,
            remaining_ms: duration_ms,
            last_sampled: now,
            source,
        }
    }

    pub fn is_over_time(&self) -> bool {
        !matches!(self.kind, GlobalEffectKind::Shield)
    }

    /// Consume elapsed time since the last sample.
    ///
    /// Sampling twice at the same `now` yields zero the second time.
    pub fn sample(&mut self, now: Millis) -> Sample {
        if !self.is_over_time() {
            return Sample { amount: 0.0, expired: false };
        }

        let elapsed = now.saturating_sub(self.last_sampled);
        let taken = elapsed.min(self.remaining_ms);
        self.remaining_ms -= taken;
        self.last_sampled = self.last_sampled.max(now);

        Sample {
            amount: self.per_sec * taken as f32 / 1000.0,
            expired: self.remaining_ms == 0,
        }
    }
}
