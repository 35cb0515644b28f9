//! Turn Pipeline
//!
//! Every player-initiated request runs through [`execute`]:
//!
//! 1. refresh timed effects and regeneration on both sides
//! 2. validate and pay the resource cost
//! 3. mutate the board (swap, tap, skill or upgrade)
//! 4. resolve resulting combos through the registry
//! 5. refill both fields
//!
//! Normalization happens after the snapshot went out, see [`normalize`].

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::error::GameError;
use crate::game::block::{BlockType, Cell, DestroyCause};
use crate::game::combo::{check_for_combos, dedup_combos, Combo};
use crate::game::effects::{EffectId, GlobalEffectKind, Sample};
use crate::game::events::EffectEvent;
use crate::game::field::{Direction, TapOutcome};
use crate::game::registry::{EffectContext, EffectRegistry};
use crate::game::skills::SkillKind;
use crate::game::state::{GameMatch, Side};
use crate::game::unique::{reward_level, UniqueBlock};

/// A turn request after decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnAction {
    Swap { cell: Cell, dir: Direction },
    Tap { cell: Cell },
    Skill(SkillKind),
    Upgrade(BlockType),
}

/// Run one turn for `ctx.actor`.
///
/// On error the board is untouched and no cost was paid. Refresh effects
/// from step 1 still stand.
pub fn execute(ctx: &mut EffectContext<'_>, registry: &EffectRegistry, action: TurnAction) -> Result<(), GameError> {
    refresh(ctx);

    match action {
        TurnAction::Swap { cell, dir } => swap(ctx, registry, cell, dir)?,
        TurnAction::Tap { cell } => tap(ctx, registry, cell)?,
        TurnAction::Skill(skill) => cast(ctx, registry, skill)?,
        TurnAction::Upgrade(block_type) => upgrade(ctx, block_type)?,
    }

    settle(ctx.game);
    Ok(())
}

fn swap(ctx: &mut EffectContext<'_>, registry: &EffectRegistry, cell: Cell, dir: Direction) -> Result<(), GameError> {
    let actor = ctx.actor;
    let cost = ctx.rules.swap_mana_cost;
    require_mana(ctx, cost)?;

    let now = ctx.now;
    ctx.field(actor).check_swap(cell, dir, now)?;
    ctx.change_mana(actor, -cost);
    let seeds = ctx.field_mut(actor).try_swap(cell, dir, now)?;

    resolve_combos(ctx, registry, &seeds);
    Ok(())
}

fn tap(ctx: &mut EffectContext<'_>, registry: &EffectRegistry, cell: Cell) -> Result<(), GameError> {
    let actor = ctx.actor;
    let required = ctx.rules.tap_combo_size;
    let outcome = ctx.field_mut(actor).toggle_lock(cell, required)?;

    if let TapOutcome::Complete(cells) = outcome {
        let combo = Combo::from_cells(ctx.field(actor), cells);
        resolve_combo(ctx, registry, combo);
    }
    Ok(())
}

fn cast(ctx: &mut EffectContext<'_>, registry: &EffectRegistry, skill: SkillKind) -> Result<(), GameError> {
    let actor = ctx.actor;
    if !ctx.player(actor).has_skill(skill) {
        return Err(GameError::SkillUnavailable(skill));
    }
    let cost = skill.cost(ctx.rules);
    let available = ctx.player(actor).energy;
    if available < cost {
        return Err(GameError::NotEnoughEnergy { required: cost, available });
    }

    ctx.change_energy(actor, -cost);
    let seeds = skill.apply(ctx);
    resolve_combos(ctx, registry, &seeds);
    Ok(())
}

fn upgrade(ctx: &mut EffectContext<'_>, block_type: BlockType) -> Result<(), GameError> {
    let actor = ctx.actor;
    let upgrades = &ctx.game.side(actor).upgrades;
    if !upgrades.can_upgrade(block_type, ctx.rules.max_upgrade_level) {
        return Err(GameError::UpgradeMaxed(block_type));
    }
    let cost = upgrades.next_cost(block_type, ctx.rules.upgrade_base_cost);
    require_mana(ctx, cost)?;

    ctx.change_mana(actor, -cost);
    let level = ctx.game.side_mut(actor).upgrades.increment(block_type);
    ctx.push(EffectEvent::Upgraded { field: actor.number(), block_type, level });
    Ok(())
}

fn require_mana(ctx: &EffectContext<'_>, required: f32) -> Result<(), GameError> {
    let available = ctx.player(ctx.actor).mana;
    if available < required {
        return Err(GameError::NotEnoughMana { required, available });
    }
    Ok(())
}

// =============================================================================
// REFRESH
// =============================================================================

/// Decay timed effects and apply regeneration on both sides.
///
/// Calling it twice with the same `ctx.now` changes nothing the second time.
pub fn refresh(ctx: &mut EffectContext<'_>) {
    let now = ctx.now;
    for side in Side::BOTH {
        let rules = ctx.rules;
        let player = ctx.player_mut(side);
        let (mana, energy) = player.regen(rules, now);
        let (mana_value, energy_value) = (player.mana, player.energy);
        if mana != 0.0 {
            ctx.push(EffectEvent::ManaChanged { field: side.number(), delta: mana, value: mana_value });
        }
        if energy != 0.0 {
            ctx.push(EffectEvent::EnergyChanged { field: side.number(), delta: energy, value: energy_value });
        }

        let samples: Vec<(EffectId, GlobalEffectKind, Sample)> = ctx
            .field_mut(side)
            .effects
            .iter_mut()
            .filter(|e| e.is_over_time())
            .map(|e| (e.id, e.kind, e.sample(now)))
            .collect();

        for (id, kind, sample) in samples {
            if sample.amount > 0.0 {
                match kind {
                    GlobalEffectKind::HealOverTime => {
                        ctx.change_health(side, sample.amount);
                    }
                    GlobalEffectKind::ManaOverTime => {
                        ctx.change_mana(side, sample.amount);
                    }
                    GlobalEffectKind::Shield => {}
                }
            }
            if sample.expired {
                ctx.remove_effect(side, id);
            }
        }

        for block in ctx.field_mut(side).blocks_mut() {
            block.prune_effects(now);
        }
    }
}

// =============================================================================
// COMBOS
// =============================================================================

/// Scan the actor's field from `seeds` and resolve every distinct combo.
///
/// Returns the number of combos resolved.
pub fn resolve_combos(ctx: &mut EffectContext<'_>, registry: &EffectRegistry, seeds: &[Cell]) -> usize {
    if seeds.is_empty() {
        return 0;
    }
    let combos = check_for_combos(ctx.field(ctx.actor), seeds, ctx.rules.min_combo_len);
    let combos = dedup_combos(combos);
    let count = combos.len();
    for combo in combos {
        resolve_combo(ctx, registry, combo);
    }
    count
}

/// Resolve one combo on the actor's field.
///
/// Unique blocks inside the combo fire first and may scale it, then the
/// type behaviour applies, the combo is destroyed and a reward block may
/// spawn in its footprint.
pub fn resolve_combo(ctx: &mut EffectContext<'_>, registry: &EffectRegistry, mut combo: Combo) {
    let actor = ctx.actor;
    ctx.push(EffectEvent::ComboResolved {
        field: actor.number(),
        block_type: combo.block_type,
        cells: combo.cells.clone(),
        multiplier: combo.multiplier,
    });

    let uniques: Vec<(Cell, UniqueBlock)> = combo
        .cells
        .iter()
        .filter_map(|c| ctx.field(actor).get(*c))
        .filter(|b| b.is_live())
        .filter_map(|b| b.unique.map(|u| (b.cell, u)))
        .collect();
    for (cell, unique) in uniques {
        ctx.push(EffectEvent::UniqueBlockApplied { field: actor.number(), cell, unique });
        unique.on_apply(ctx, &mut combo);
    }

    registry.apply(&combo, ctx);
    ctx.destroy(actor, &combo.cells, DestroyCause::AsCombo);

    let level = match reward_level(combo.len(), ctx.rules.min_combo_len) {
        Some(level) => level,
        None => return,
    };
    if let Some(kind) = ctx.player(actor).unique_for(combo.block_type) {
        let footprint: Vec<Cell> = combo
            .cells
            .iter()
            .copied()
            .filter(|c| ctx.field(actor).get(*c).map(|b| b.is_destroyed()).unwrap_or(false))
            .collect();
        spawn_unique(ctx, UniqueBlock::new(kind, level), &footprint);
    }
}

/// Place a unique block at a random candidate on the actor's field and run
/// its create hook.
pub fn spawn_unique(ctx: &mut EffectContext<'_>, unique: UniqueBlock, candidates: &[Cell]) -> Option<Cell> {
    let actor = ctx.actor;
    let (field, rng) = ctx.field_and_rng(actor);
    let cell = field.create_block_in_range(unique.block_type(), candidates, rng)?;
    let block = field.get_mut(cell)?;
    block.unique = Some(unique);
    let block_id = block.id;

    ctx.push(EffectEvent::UniqueBlockCreated { field: actor.number(), cell, unique });
    unique.on_create(ctx, actor, block_id);
    Some(cell)
}

// =============================================================================
// SETTLE / NORMALIZE
// =============================================================================

/// Refill holes on both fields.
pub fn settle(game: &mut GameMatch) -> usize {
    Side::BOTH
        .into_iter()
        .map(|side| {
            let (field, rng) = game.field_and_rng(side);
            field.fill_holes(rng)
        })
        .sum()
}

/// Return both fields to steady state.
pub fn normalize(game: &mut GameMatch, now: Millis) {
    for side in Side::BOTH {
        game.field_mut(side).normalize(now);
    }
}
