//! Unique Blocks
//!
//! Leveled reward blocks spawned by long combos. Each kind carries its own
//! create, delete and apply hooks; identity is the kind itself.

use serde::{Serialize, Deserialize};

use crate::game::block::{BlockId, BlockType};
use crate::game::combo::Combo;
use crate::game::effects::GlobalEffectKind;
use crate::game::registry::EffectContext;
use crate::game::state::Side;

/// Highest level a unique block can reach.
pub const MAX_UNIQUE_LEVEL: u8 = 3;

/// Named unique block kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UniqueKind {
    /// Sword: scales its combo's multiplier.
    Blade,
    /// Shield: keeps a shield up while it stands.
    Bulwark,
    /// Heart: heals over time while it stands.
    Spring,
    /// Crystal: refills mana.
    Prism,
    /// Bolt: freezes part of the opponent's field.
    Frostbite,
}

impl UniqueKind {
    pub const ALL: [UniqueKind; 5] = [
        UniqueKind::Blade,
        UniqueKind::Bulwark,
        UniqueKind::Spring,
        UniqueKind::Prism,
        UniqueKind::Frostbite,
    ];

    /// Block type the unique block takes on the field.
    pub fn block_type(self) -> BlockType {
        match self {
            UniqueKind::Blade => BlockType::Sword,
            UniqueKind::Bulwark => BlockType::Shield,
            UniqueKind::Spring => BlockType::Heart,
            UniqueKind::Prism => BlockType::Crystal,
            UniqueKind::Frostbite => BlockType::Bolt,
        }
    }

    /// Collection granted to new players: one kind per regular block type.
    pub fn starter_collection() -> Vec<UniqueKind> {
        Self::ALL.to_vec()
    }
}

/// Level for a combo of `len` blocks, `None` when it earns no reward.
pub fn reward_level(len: usize, min_len: usize) -> Option<u8> {
    let extra = len.checked_sub(min_len).filter(|e| *e > 0)?;
    Some(extra.min(MAX_UNIQUE_LEVEL as usize) as u8)
}

/// A unique block placed on a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueBlock {
    pub kind: UniqueKind,
    /// 1 to 3.
    pub level: u8,
}

impl UniqueBlock {
    pub fn new(kind: UniqueKind, level: u8) -> Self {
        Self {
            kind,
            level: level.clamp(1, MAX_UNIQUE_LEVEL),
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.kind.block_type()
    }

    /// Runs once the block is on `side`'s field as `block`.
    pub fn on_create(&self, ctx: &mut EffectContext<'_>, side: Side, block: BlockId) {
        match self.kind {
            UniqueKind::Bulwark => {
                ctx.add_shield(side, Some(block));
            }
            UniqueKind::Spring => {
                let per_sec = ctx.rules.heal_over_time_per_sec * self.level as f32;
                let duration = ctx.rules.heal_over_time_ms;
                ctx.add_over_time(side, GlobalEffectKind::HealOverTime, per_sec, duration, Some(block));
            }
            UniqueKind::Blade | UniqueKind::Prism | UniqueKind::Frostbite => {}
        }
    }

    /// Runs when the block is destroyed, by combo or by damage.
    pub fn on_delete(&self, ctx: &mut EffectContext<'_>, side: Side, block: BlockId) {
        match self.kind {
            UniqueKind::Bulwark | UniqueKind::Spring => {
                ctx.remove_effects_from(side, block);
            }
            UniqueKind::Blade | UniqueKind::Prism | UniqueKind::Frostbite => {}
        }
    }

    /// Runs when the block takes part in the actor's combo, before the
    /// combo's behaviour is applied.
    pub fn on_apply(&self, ctx: &mut EffectContext<'_>, combo: &mut Combo) {
        match self.kind {
            UniqueKind::Blade => {
                combo.multiplier *= 1.0 + 0.5 * self.level as f32;
            }
            UniqueKind::Prism => {
                let actor = ctx.actor;
                let missing = ctx.rules.max_mana - ctx.player(actor).mana;
                ctx.change_mana(actor, missing);
            }
            UniqueKind::Frostbite => {
                let duration = ctx.rules.freeze_ms_per_level * self.level as u64;
                ctx.freeze_random_area(ctx.opponent(), 1, duration);
            }
            UniqueKind::Bulwark | UniqueKind::Spring => {}
        }
    }
}
