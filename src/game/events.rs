//! Effect Events
//!
//! Ordered records of every discrete sub-effect a turn produced. The client
//! replays them for animation; the server never reads them back.
//!
//! Fields are identified by slot number (1 or 2).

use serde::{Serialize, Deserialize};

use crate::game::block::{BlockType, Cell};
use crate::game::effects::{EffectId, GlobalEffectKind};
use crate::game::skills::SkillKind;
use crate::game::unique::UniqueBlock;

/// One effect record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EffectEvent {
    /// A combo was resolved on a field.
    ComboResolved {
        field: u8,
        block_type: BlockType,
        cells: Vec<Cell>,
        multiplier: f32,
    },

    /// Health changed by `delta`, now `value`.
    HealthChanged { field: u8, delta: f32, value: f32 },

    /// Mana changed by `delta`, now `value`.
    ManaChanged { field: u8, delta: f32, value: f32 },

    /// Energy changed by `delta`, now `value`.
    EnergyChanged { field: u8, delta: f32, value: f32 },

    /// Projectile from one field to a block on another.
    Shot {
        block_type: BlockType,
        from_field: u8,
        from: Cell,
        to_field: u8,
        to: Cell,
    },

    /// A shield absorbed a hit.
    ShieldConsumed { field: u8, effect_id: EffectId },

    GlobalEffectCreated {
        field: u8,
        effect_id: EffectId,
        kind: GlobalEffectKind,
    },

    GlobalEffectRemoved {
        field: u8,
        effect_id: EffectId,
        kind: GlobalEffectKind,
    },

    /// Blocks got frozen for `duration_ms`.
    BlocksFrozen {
        field: u8,
        cells: Vec<Cell>,
        duration_ms: u64,
    },

    /// A reward block appeared.
    UniqueBlockCreated {
        field: u8,
        cell: Cell,
        unique: UniqueBlock,
    },

    /// A reward block took part in a combo.
    UniqueBlockApplied {
        field: u8,
        cell: Cell,
        unique: UniqueBlock,
    },

    /// A block changed type in place.
    BlockTransmuted {
        field: u8,
        cell: Cell,
        from: BlockType,
        to: BlockType,
    },

    SkillUsed { field: u8, skill: SkillKind },

    /// An upgrade level was bought.
    Upgraded {
        field: u8,
        block_type: BlockType,
        level: u32,
    },
}

impl EffectEvent {
    /// Field the event is anchored to.
    pub fn field(&self) -> u8 {
        match self {
            EffectEvent::ComboResolved { field, .. }
            | EffectEvent::HealthChanged { field, .. }
            | EffectEvent::ManaChanged { field, .. }
            | EffectEvent::EnergyChanged { field, .. }
            | EffectEvent::ShieldConsumed { field, .. }
            | EffectEvent::GlobalEffectCreated { field, .. }
            | EffectEvent::GlobalEffectRemoved { field, .. }
            | EffectEvent::BlocksFrozen { field, .. }
            | EffectEvent::UniqueBlockCreated { field, .. }
            | EffectEvent::UniqueBlockApplied { field, .. }
            | EffectEvent::BlockTransmuted { field, .. }
            | EffectEvent::SkillUsed { field, .. }
            | EffectEvent::Upgraded { field, .. } => *field,
            EffectEvent::Shot { from_field, .. } => *from_field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_field() {
        let shot = EffectEvent::Shot {
            block_type: BlockType::Sword,
            from_field: 2,
            from: Cell::new(0, 0),
            to_field: 1,
            to: Cell::new(3, 3),
        };
        assert_eq!(shot.field(), 2);

        let heal = EffectEvent::HealthChanged { field: 1, delta: 8.0, value: 100.0 };
        assert_eq!(heal.field(), 1);
    }

    #[test]
    fn test_event_bincode_roundtrip() {
        let event = EffectEvent::BlocksFrozen {
            field: 1,
            cells: vec![Cell::new(1, 1), Cell::new(1, 2)],
            duration_ms: 2_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let back: EffectEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, back);
    }
}
