//! Per-match upgrade counters.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::game::block::BlockType;

/// Upgrade level for every block type.
///
/// Always holds an entry for each type; there is no partially-populated
/// state to observe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradesInfo {
    levels: BTreeMap<BlockType, u32>,
}

impl Default for UpgradesInfo {
    fn default() -> Self {
        Self {
            levels: BlockType::ALL.iter().map(|t| (*t, 0)).collect(),
        }
    }
}

impl UpgradesInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of a type.
    pub fn level(&self, block_type: BlockType) -> u32 {
        self.levels.get(&block_type).copied().unwrap_or(0)
    }

    /// Magnitude multiplier granted by the current level.
    pub fn multiplier(&self, block_type: BlockType, step: f32) -> f32 {
        1.0 + step * self.level(block_type) as f32
    }

    /// Mana needed to buy the next level.
    pub fn next_cost(&self, block_type: BlockType, base_cost: f32) -> f32 {
        base_cost * (self.level(block_type) + 1) as f32
    }

    /// Whether another level can be bought.
    pub fn can_upgrade(&self, block_type: BlockType, max_level: u32) -> bool {
        self.level(block_type) < max_level
    }

    /// Raise a type by one level, returning the new level.
    pub fn increment(&mut self, block_type: BlockType) -> u32 {
        let level = self.levels.entry(block_type).or_insert(0);
        *level += 1;
        *level
    }

    /// Iterate `(type, level)` in type order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockType, u32)> + '_ {
        self.levels.iter().map(|(t, l)| (*t, *l))
    }
}
