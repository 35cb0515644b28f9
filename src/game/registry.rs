//! Effect Registry
//!
//! Type-keyed table of combo behaviours, plus the [`EffectContext`] every
//! behaviour, skill and unique-block hook mutates through. The context is
//! the only path to resource and field changes during a turn, so every
//! change leaves an [`EffectEvent`] behind.

use std::collections::BTreeMap;

use crate::config::GameRules;
use crate::core::clock::Millis;
use crate::core::rng::DeterministicRng;
use crate::game::block::{BlockId, BlockType, Cell, DestroyCause};
use crate::game::combo::Combo;
use crate::game::effects::{EffectId, GlobalEffect, GlobalEffectKind};
use crate::game::events::EffectEvent;
use crate::game::field::Field;
use crate::game::player::Player;
use crate::game::state::{GameMatch, Side};

// =============================================================================
// CONTEXT
// =============================================================================

/// Mutable view of one match during a turn.
pub struct EffectContext<'a> {
    pub game: &'a mut GameMatch,
    players: [&'a mut Player; 2],
    pub rules: &'a GameRules,
    /// Side that initiated the turn.
    pub actor: Side,
    pub now: Millis,
    events: Vec<EffectEvent>,
}

impl<'a> EffectContext<'a> {
    /// `players` must be ordered by slot.
    pub fn new(
        game: &'a mut GameMatch,
        players: [&'a mut Player; 2],
        rules: &'a GameRules,
        actor: Side,
        now: Millis,
    ) -> Self {
        Self {
            game,
            players,
            rules,
            actor,
            now,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn opponent(&self) -> Side {
        self.actor.other()
    }

    pub fn player(&self, side: Side) -> &Player {
        &*self.players[side.index()]
    }

    pub fn player_mut(&mut self, side: Side) -> &mut Player {
        &mut *self.players[side.index()]
    }

    pub fn field(&self, side: Side) -> &Field {
        self.game.field(side)
    }

    pub fn field_mut(&mut self, side: Side) -> &mut Field {
        self.game.field_mut(side)
    }

    pub fn field_and_rng(&mut self, side: Side) -> (&mut Field, &mut DeterministicRng) {
        self.game.field_and_rng(side)
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.game.rng
    }

    pub fn push(&mut self, event: EffectEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[EffectEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<EffectEvent> {
        self.events
    }

    // -------------------------------------------------------------------------
    // Resources
    // -------------------------------------------------------------------------

    /// Returns the applied delta; no event when nothing changed.
    pub fn change_health(&mut self, side: Side, delta: f32) -> f32 {
        let max = self.rules.max_health;
        let player = self.player_mut(side);
        let applied = player.add_health(delta, max);
        let value = player.health;
        if applied != 0.0 {
            self.push(EffectEvent::HealthChanged { field: side.number(), delta: applied, value });
        }
        applied
    }

    pub fn change_mana(&mut self, side: Side, delta: f32) -> f32 {
        let max = self.rules.max_mana;
        let player = self.player_mut(side);
        let applied = player.add_mana(delta, max);
        let value = player.mana;
        if applied != 0.0 {
            self.push(EffectEvent::ManaChanged { field: side.number(), delta: applied, value });
        }
        applied
    }

    pub fn change_energy(&mut self, side: Side, delta: f32) -> f32 {
        let max = self.rules.max_energy;
        let player = self.player_mut(side);
        let applied = player.add_energy(delta, max);
        let value = player.energy;
        if applied != 0.0 {
            self.push(EffectEvent::EnergyChanged { field: side.number(), delta: applied, value });
        }
        applied
    }

    /// Deal damage, letting a shield absorb the hit instead.
    pub fn damage(&mut self, side: Side, amount: f32) {
        if let Some(effect_id) = self.consume_shield(side) {
            self.push(EffectEvent::ShieldConsumed { field: side.number(), effect_id });
        } else {
            self.change_health(side, -amount);
        }
    }

    // -------------------------------------------------------------------------
    // Global effects
    // -------------------------------------------------------------------------

    pub fn add_shield(&mut self, side: Side, source: Option<BlockId>) -> EffectId {
        let now = self.now;
        let field = self.field_mut(side);
        let id = field.alloc_effect_id();
        field.effects.push(GlobalEffect::shield(id, now, source));
        self.push(EffectEvent::GlobalEffectCreated {
            field: side.number(),
            effect_id: id,
            kind: GlobalEffectKind::Shield,
        });
        id
    }

    pub fn add_over_time(
        &mut self,
        side: Side,
        kind: GlobalEffectKind,
        per_sec: f32,
        duration_ms: u64,
        source: Option<BlockId>,
    ) -> EffectId {
        let now = self.now;
        let field = self.field_mut(side);
        let id = field.alloc_effect_id();
        field
            .effects
            .push(GlobalEffect::over_time(id, kind, per_sec, duration_ms, now, source));
        self.push(EffectEvent::GlobalEffectCreated { field: side.number(), effect_id: id, kind });
        id
    }

    pub fn remove_effect(&mut self, side: Side, id: EffectId) -> bool {
        match self.field_mut(side).remove_effect(id) {
            Some(effect) => {
                self.push(EffectEvent::GlobalEffectRemoved {
                    field: side.number(),
                    effect_id: effect.id,
                    kind: effect.kind,
                });
                true
            }
            None => false,
        }
    }

    /// Remove every effect back-referencing `source`.
    pub fn remove_effects_from(&mut self, side: Side, source: BlockId) -> usize {
        let ids: Vec<EffectId> = self
            .field(side)
            .effects
            .iter()
            .filter(|e| e.source == Some(source))
            .map(|e| e.id)
            .collect();
        ids.into_iter().filter(|id| self.remove_effect(side, *id)).count()
    }

    /// Consume the oldest shield on a field.
    pub fn consume_shield(&mut self, side: Side) -> Option<EffectId> {
        let field = self.field_mut(side);
        let pos = field
            .effects
            .iter()
            .position(|e| e.kind == GlobalEffectKind::Shield)?;
        Some(field.effects.remove(pos).id)
    }

    // -------------------------------------------------------------------------
    // Blocks
    // -------------------------------------------------------------------------

    /// Destroy blocks and run delete hooks for unique blocks among them.
    pub fn destroy(&mut self, side: Side, cells: &[Cell], cause: DestroyCause) -> usize {
        let destroyed = self.field_mut(side).destroy_blocks(cells, cause);
        for block in &destroyed {
            if let Some(unique) = block.unique {
                unique.on_delete(self, side, block.id);
            }
        }
        destroyed.len()
    }

    /// Freeze live blocks for `duration_ms`.
    pub fn freeze(&mut self, side: Side, cells: &[Cell], duration_ms: u64) {
        if cells.is_empty() {
            return;
        }
        let now = self.now;
        let field = self.field_mut(side);
        for cell in cells {
            if let Some(block) = field.get_mut(*cell) {
                block.freeze(now, duration_ms);
            }
        }
        self.push(EffectEvent::BlocksFrozen {
            field: side.number(),
            cells: cells.to_vec(),
            duration_ms,
        });
    }

    /// Freeze the square neighbourhood of a random inner block.
    pub fn freeze_random_area(&mut self, side: Side, radius: usize, duration_ms: u64) {
        let (field, rng) = self.field_and_rng(side);
        let cells = match field.random_inner_block(rng, radius) {
            Some(center) => field.neighbours(center, radius),
            None => Vec::new(),
        };
        self.freeze(side, &cells, duration_ms);
    }

    /// Destroy a random live opponent block with a shot from `from`.
    ///
    /// Returns the hit cell.
    pub fn shoot(&mut self, block_type: BlockType, from: Cell) -> Option<Cell> {
        let target_side = self.opponent();
        let (field, rng) = self.field_and_rng(target_side);
        let to = field.random_block(rng)?;
        self.push(EffectEvent::Shot {
            block_type,
            from_field: self.actor.number(),
            from,
            to_field: target_side.number(),
            to,
        });
        self.destroy(target_side, &[to], DestroyCause::ByDamage);
        Some(to)
    }

    /// Upgrade multiplier of the acting side for a type.
    pub fn upgrade_multiplier(&self, block_type: BlockType) -> f32 {
        self.game
            .side(self.actor)
            .upgrades
            .multiplier(block_type, self.rules.upgrade_step)
    }
}

// =============================================================================
// COMBO BEHAVIOURS
// =============================================================================

/// Behaviour applied for a combo's resolved type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComboEffect {
    /// Shoot the opponent's field and deal damage.
    Damage,
    /// Heal the actor.
    Heal,
    /// Grant the actor mana.
    Mana,
    /// Grant the actor energy.
    Energy,
    /// Raise a shield on the actor's field.
    Shield,
    /// Small heal plus mana.
    Wild,
}

impl ComboEffect {
    /// Base magnitude before scaling.
    pub fn base(self, rules: &GameRules) -> f32 {
        match self {
            ComboEffect::Damage => rules.sword_damage,
            ComboEffect::Heal => rules.heart_heal,
            ComboEffect::Mana => rules.crystal_mana,
            ComboEffect::Energy => rules.bolt_energy,
            ComboEffect::Shield => 0.0,
            ComboEffect::Wild => rules.chameleon_bonus,
        }
    }

    fn apply(self, combo: &Combo, magnitude: f32, ctx: &mut EffectContext<'_>) {
        let actor = ctx.actor;
        match self {
            ComboEffect::Damage => {
                let from = combo.cells[combo.len() / 2];
                ctx.shoot(combo.block_type, from);
                ctx.damage(ctx.opponent(), magnitude);
            }
            ComboEffect::Heal => {
                ctx.change_health(actor, magnitude);
            }
            ComboEffect::Mana => {
                ctx.change_mana(actor, magnitude);
            }
            ComboEffect::Energy => {
                ctx.change_energy(actor, magnitude);
            }
            ComboEffect::Shield => {
                ctx.add_shield(actor, None);
            }
            ComboEffect::Wild => {
                ctx.change_health(actor, magnitude);
                ctx.change_mana(actor, magnitude);
            }
        }
    }
}

/// Resolved type to behaviour table, built once at startup.
#[derive(Clone, Debug)]
pub struct EffectRegistry {
    effects: BTreeMap<BlockType, ComboEffect>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl EffectRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            effects: BTreeMap::new(),
        }
    }

    /// One behaviour per block type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BlockType::Sword, ComboEffect::Damage);
        registry.register(BlockType::Heart, ComboEffect::Heal);
        registry.register(BlockType::Crystal, ComboEffect::Mana);
        registry.register(BlockType::Bolt, ComboEffect::Energy);
        registry.register(BlockType::Shield, ComboEffect::Shield);
        registry.register(BlockType::Chameleon, ComboEffect::Wild);
        registry
    }

    pub fn register(&mut self, block_type: BlockType, effect: ComboEffect) {
        self.effects.insert(block_type, effect);
    }

    pub fn get(&self, block_type: BlockType) -> Option<ComboEffect> {
        self.effects.get(&block_type).copied()
    }

    /// Scaled magnitude of a combo for the acting side.
    pub fn magnitude(&self, combo: &Combo, ctx: &EffectContext<'_>) -> f32 {
        let base = self.get(combo.block_type).map(|e| e.base(ctx.rules)).unwrap_or(0.0);
        let count = 1.0 + ctx.rules.extra_block_bonus * combo.extra_blocks(ctx.rules.min_combo_len) as f32;
        base * count * ctx.upgrade_multiplier(combo.block_type) * combo.multiplier
    }

    /// Apply a combo's behaviour. Returns `false` when no behaviour is
    /// registered for its type.
    pub fn apply(&self, combo: &Combo, ctx: &mut EffectContext<'_>) -> bool {
        let effect = match self.get(combo.block_type) {
            Some(e) => e,
            None => return false,
        };
        if combo.is_empty() {
            return false;
        }
        let magnitude = self.magnitude(combo, ctx);
        effect.apply(combo, magnitude, ctx);
        true
    }
}
