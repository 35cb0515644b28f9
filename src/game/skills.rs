//! Energy-powered skills.

use serde::{Serialize, Deserialize};

use crate::config::GameRules;
use crate::game::block::{BlockType, Cell};
use crate::game::effects::GlobalEffectKind;
use crate::game::events::EffectEvent;
use crate::game::registry::EffectContext;

/// Castable skill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillKind {
    /// Shot at the opponent dealing fixed damage.
    Fireball,
    /// Freeze a 3x3 area of the opponent's field.
    Frost,
    /// Turn a random own block into a Chameleon.
    Transmute,
    /// Heal over time.
    Renew,
}

impl SkillKind {
    pub const ALL: [SkillKind; 4] = [
        SkillKind::Fireball,
        SkillKind::Frost,
        SkillKind::Transmute,
        SkillKind::Renew,
    ];

    /// Energy cost.
    pub fn cost(self, rules: &GameRules) -> f32 {
        match self {
            SkillKind::Fireball => rules.fireball_cost,
            SkillKind::Frost => rules.frost_cost,
            SkillKind::Transmute => rules.transmute_cost,
            SkillKind::Renew => rules.renew_cost,
        }
    }

    /// Apply the skill for the acting side. The cost is already paid.
    ///
    /// Returns the actor's cells that changed and need a combo scan.
    pub fn apply(self, ctx: &mut EffectContext<'_>) -> Vec<Cell> {
        let actor = ctx.actor;
        ctx.push(EffectEvent::SkillUsed { field: actor.number(), skill: self });

        match self {
            SkillKind::Fireball => {
                let from = {
                    let (field, rng) = ctx.field_and_rng(actor);
                    field.random_block(rng).unwrap_or(Cell::new(0, 0))
                };
                ctx.shoot(BlockType::Sword, from);
                let damage = ctx.rules.fireball_damage;
                ctx.damage(ctx.opponent(), damage);
                Vec::new()
            }
            SkillKind::Frost => {
                let duration = ctx.rules.frost_ms;
                ctx.freeze_random_area(ctx.opponent(), 1, duration);
                Vec::new()
            }
            SkillKind::Transmute => {
                let (field, rng) = ctx.field_and_rng(actor);
                let candidates: Vec<Cell> = field
                    .blocks()
                    .filter(|b| b.is_live() && !b.block_type.is_wildcard() && b.unique.is_none())
                    .map(|b| b.cell)
                    .collect();
                let cell = match rng.choose(&candidates) {
                    Some(c) => *c,
                    None => return Vec::new(),
                };
                let from = match field.get_mut(cell) {
                    Some(block) => std::mem::replace(&mut block.block_type, BlockType::Chameleon),
                    None => return Vec::new(),
                };
                ctx.push(EffectEvent::BlockTransmuted {
                    field: actor.number(),
                    cell,
                    from,
                    to: BlockType::Chameleon,
                });
                vec![cell]
            }
            SkillKind::Renew => {
                let per_sec = ctx.rules.heal_over_time_per_sec;
                let duration = ctx.rules.heal_over_time_ms;
                ctx.add_over_time(actor, GlobalEffectKind::HealOverTime, per_sec, duration, None);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::registry::tests::fixture;
    use crate::game::state::Side;

    #[test]
    fn test_fireball_damages_opponent() {
        let rules = GameRules::default();
        let (mut game, mut p1, mut p2) = fixture(&rules);

        let mut ctx = EffectContext::new(&mut game, [&mut p1, &mut p2], &rules, Side::First, 0);
        assert!(SkillKind::Fireball.apply(&mut ctx).is_empty());
        assert_eq!(ctx.player(Side::Second).health, rules.max_health - rules.fireball_damage);
        assert_eq!(ctx.field(Side::Second).destroyed_cells().len(), 1);
        assert!(matches!(ctx.events()[0], EffectEvent::SkillUsed { field: 1, skill: SkillKind::Fireball }));
    }

    #[test]
    fn test_transmute_returns_seed() {
        let rules = GameRules::default();
        let (mut game, mut p1, mut p2) = fixture(&rules);

        let mut ctx = EffectContext::new(&mut game, [&mut p1, &mut p2], &rules, Side::Second, 0);
        let seeds = SkillKind::Transmute.apply(&mut ctx);
        assert_eq!(seeds.len(), 1);
        assert_eq!(ctx.field(Side::Second).type_at(seeds[0]), Some(BlockType::Chameleon));
    }

    #[test]
    fn test_frost_and_renew() {
        let rules = GameRules::default();
        let (mut game, mut p1, mut p2) = fixture(&rules);

        let mut ctx = EffectContext::new(&mut game, [&mut p1, &mut p2], &rules, Side::First, 500);
        SkillKind::Frost.apply(&mut ctx);
        SkillKind::Renew.apply(&mut ctx);

        let frozen = ctx.field(Side::Second).blocks().filter(|b| b.is_frozen(500)).count();
        assert_eq!(frozen, 9);
        assert_eq!(ctx.field(Side::First).effects.len(), 1);
    }

    #[test]
    fn test_costs() {
        let rules = GameRules::default();
        assert_eq!(SkillKind::Fireball.cost(&rules), 30.0);
        assert_eq!(SkillKind::Renew.cost(&rules), 35.0);
    }
}
