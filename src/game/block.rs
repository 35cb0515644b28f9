//! Blocks and per-block timed effects.

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::game::unique::UniqueBlock;

/// Block type. `Chameleon` is the wildcard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockType {
    /// Damages the opponent.
    Sword = 0,
    /// Heals the acting player.
    Heart = 1,
    /// Restores mana.
    Crystal = 2,
    /// Restores energy.
    Bolt = 3,
    /// Raises a shield on the acting field.
    Shield = 4,
    /// Wildcard, extends any run.
    Chameleon = 5,
}

impl BlockType {
    /// Every block type, wildcard last.
    pub const ALL: [BlockType; 6] = [
        BlockType::Sword,
        BlockType::Heart,
        BlockType::Crystal,
        BlockType::Bolt,
        BlockType::Shield,
        BlockType::Chameleon,
    ];

    /// Types a freshly generated cell can take.
    pub const REGULAR: [BlockType; 5] = [
        BlockType::Sword,
        BlockType::Heart,
        BlockType::Crystal,
        BlockType::Bolt,
        BlockType::Shield,
    ];

    #[inline]
    pub fn is_wildcard(self) -> bool {
        self == BlockType::Chameleon
    }

    /// Whether a block of this type may extend a run of `other`.
    #[inline]
    pub fn can_combo_with(self, other: BlockType) -> bool {
        self == other || self.is_wildcard() || other.is_wildcard()
    }

    /// Get block type from index (0-5).
    pub fn from_index(index: u8) -> Option<BlockType> {
        Self::ALL.get(index as usize).copied()
    }
}

/// Grid coordinates. `x` is the column, `y` the row (row 0 at the top).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Offset by a signed delta, `None` when it would leave the first quadrant.
    pub fn offset(self, dx: i32, dy: i32) -> Option<Cell> {
        let x = self.x as i64 + dx as i64;
        let y = self.y as i64 + dy as i64;
        if x < 0 || y < 0 {
            return None;
        }
        Some(Cell::new(x as usize, y as usize))
    }
}

/// Per-field block identifier, assigned from a monotonically increasing
/// counter. Never reused within a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// Why a block was destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestroyCause {
    /// Hit by an opponent effect.
    ByDamage,
    /// Consumed as part of a combo.
    AsCombo,
}

/// Block lifecycle.
///
/// `Created -> Eligible -> Destroyed(..) -> removed and refilled -> Created`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// Spawned or moved this turn. Becomes eligible on normalization.
    Created,
    /// Steady state.
    Eligible,
    /// Logically destroyed, still occupying its cell until refill.
    Destroyed(DestroyCause),
}

/// One-hop animation record: what stood in this slot before, and where the
/// current block came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Block previously occupying this slot.
    pub replaced_id: BlockId,
    /// Its type.
    pub replaced_type: BlockType,
    /// Its state when it was displaced.
    pub replaced_state: BlockState,
    /// Previous cell of the current block; `None` for freshly created blocks.
    pub moved_from: Option<Cell>,
}

/// Timed per-block status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnBlockEffect {
    /// Block cannot be swapped by a player.
    Frozen {
        started_at: Millis,
        duration_ms: u64,
    },
}

impl OnBlockEffect {
    /// Time at which the effect lapses.
    pub fn expires_at(&self) -> Millis {
        match *self {
            OnBlockEffect::Frozen { started_at, duration_ms } => started_at.saturating_add(duration_ms),
        }
    }

    /// Evaluated lazily against `now`, no timer involved.
    #[inline]
    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expires_at()
    }
}

/// A single grid block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub block_type: BlockType,
    /// Always equal to the block's grid slot.
    pub cell: Cell,
    pub state: BlockState,
    pub replaces: Option<Provenance>,
    pub effects: Vec<OnBlockEffect>,
    /// Reward payload for unique blocks.
    pub unique: Option<UniqueBlock>,
    /// Tap-lock flag.
    pub locked: bool,
}

impl Block {
    /// Create a fresh block in `Created` state.
    pub fn new(id: BlockId, block_type: BlockType, cell: Cell) -> Self {
        Self {
            id,
            block_type,
            cell,
            state: BlockState::Created,
            replaces: None,
            effects: Vec::new(),
            unique: None,
            locked: false,
        }
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        matches!(self.state, BlockState::Destroyed(_))
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        !self.is_destroyed()
    }

    /// Whether any freeze on the block is still running at `now`.
    pub fn is_frozen(&self, now: Millis) -> bool {
        self.effects.iter().any(|e| matches!(e, OnBlockEffect::Frozen { .. }) && !e.is_expired(now))
    }

    /// Live and not frozen.
    pub fn can_swap(&self, now: Millis) -> bool {
        self.is_live() && !self.is_frozen(now)
    }

    /// Remaining freeze time at `now`, zero when not frozen.
    pub fn frozen_ms_left(&self, now: Millis) -> u64 {
        self.effects
            .iter()
            .filter(|e| matches!(e, OnBlockEffect::Frozen { .. }))
            .map(|e| e.expires_at().saturating_sub(now))
            .max()
            .unwrap_or(0)
    }

    pub fn freeze(&mut self, now: Millis, duration_ms: u64) {
        self.effects.push(OnBlockEffect::Frozen { started_at: now, duration_ms });
    }

    /// Drop expired effects, returning how many were removed.
    pub fn prune_effects(&mut self, now: Millis) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| !e.is_expired(now));
        before - self.effects.len()
    }
}
