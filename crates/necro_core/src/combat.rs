//! Per-unit targeting, attack and movement decisions.
//!
//! Every living unit other than the necromancer gets exactly one decision
//! per tick, taken in registry order against a shared [`Occupancy`]
//! snapshot:
//!
//! 1. Count the move timer down. A unit still recovering from its last
//!    step does nothing else.
//! 2. Pick the nearest living opponent. No opponent means idle.
//! 3. Count the attack timer down.
//! 4. If the timer has run out and the target is within reach, hit it and
//!    stop there. Attacking and moving never happen in the same tick.
//! 5. Otherwise move: melee units close in, ranged units back off when
//!    cornered and occasionally shuffle forward.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{CombatRules, RuleSet};
use crate::grid::{GridBounds, GridPos, Occupancy};
use crate::math::Millis;
use crate::registry::UnitRegistry;
use crate::rng::SimRng;
use crate::unit::{Corpse, Side, UnitId};

/// A single hit landed during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackEvent {
    /// Unit that attacked.
    pub attacker: UnitId,
    /// Side of the attacker.
    pub side: Side,
    /// Unit that was hit.
    pub target: UnitId,
    /// Health actually removed.
    pub damage: u32,
    /// Whether the hit was lethal.
    pub killed: bool,
}

/// What a unit did with its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    /// Dead, missing, or the necromancer.
    Skipped,
    /// Move timer still running.
    Recovering,
    /// No living opponent on the board.
    Idle,
    /// Landed a hit.
    Attacked(AttackEvent),
    /// Stepped to a new cell.
    Moved {
        /// Cell left.
        from: GridPos,
        /// Cell entered.
        to: GridPos,
    },
    /// Had a target but neither attacked nor found a free cell.
    Held,
}

/// Everything the combat phase did in one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombatReport {
    /// Hits in the order they landed.
    pub attacks: Vec<AttackEvent>,
    /// Number of successful moves.
    pub moves: u32,
}

/// Shared per-tick inputs for [`step_unit`].
#[derive(Debug, Clone, Copy)]
pub struct CombatContext<'a> {
    /// Timing and kiting rules.
    pub rules: &'a CombatRules,
    /// Board bounds.
    pub bounds: GridBounds,
    /// Simulated time elapsed this tick.
    pub dt: Millis,
}

/// Run one unit's decision for this tick.
///
/// Kills leave a corpse marker in `corpses`. Successful moves claim their
/// destination in `occupancy`.
pub fn step_unit(
    registry: &mut UnitRegistry,
    id: UnitId,
    ctx: CombatContext<'_>,
    occupancy: &mut Occupancy,
    rng: &mut SimRng,
    corpses: &mut Vec<Corpse>,
) -> UnitAction {
    let Some(unit) = registry.get_mut(id) else {
        return UnitAction::Skipped;
    };
    if !unit.is_alive() || unit.is_spawner() {
        return UnitAction::Skipped;
    }

    unit.move_timer -= ctx.dt;
    if unit.move_timer > 0 {
        return UnitAction::Recovering;
    }

    let Some((target_id, distance)) = registry.nearest_enemy(id) else {
        return UnitAction::Idle;
    };
    let Some(target_pos) = registry.get(target_id).map(|target| target.position) else {
        return UnitAction::Idle;
    };
    let Some(unit) = registry.get_mut(id) else {
        return UnitAction::Skipped;
    };

    unit.attack_timer -= ctx.dt;

    let in_melee = distance == 1;
    let in_range = unit.is_ranged() && distance <= unit.range;

    if unit.attack_timer <= 0 && (in_melee || in_range) {
        unit.attack_timer = unit.attack_cooldown;
        let attack = unit.attack;
        let side = unit.side;

        let outcome = registry.apply_damage(target_id, attack).unwrap_or_default();
        if outcome.killed {
            debug!(attacker = id, target = target_id, "Unit killed");
            corpses.push(Corpse {
                position: target_pos,
                remaining: ctx.rules.corpse_lifetime_ms,
            });
        }

        return UnitAction::Attacked(AttackEvent {
            attacker: id,
            side,
            target: target_id,
            damage: outcome.dealt,
            killed: outcome.killed,
        });
    }

    let from = unit.position;
    let destination = if unit.is_ranged() {
        ranged_step(from, distance, ctx, occupancy, rng)
    } else {
        melee_step(from, target_pos, ctx.bounds, occupancy)
    };

    match destination {
        Some(to) => {
            unit.position = to;
            unit.move_timer = ctx.rules.move_cooldown_ms;
            occupancy.claim(to, id);
            UnitAction::Moved { from, to }
        }
        None => UnitAction::Held,
    }
}

fn is_open(pos: GridPos, bounds: GridBounds, occupancy: &Occupancy) -> bool {
    bounds.contains(pos) && !occupancy.is_occupied(pos)
}

/// Back away when cornered, otherwise sometimes edge forward.
///
/// Directions are absolute columns for both sides: retreat lowers x down
/// to the retreat floor, advance raises x up to the advance ceiling.
fn ranged_step(
    from: GridPos,
    distance: u32,
    ctx: CombatContext<'_>,
    occupancy: &Occupancy,
    rng: &mut SimRng,
) -> Option<GridPos> {
    let candidate = if distance == 1 {
        GridPos::new((from.x - 1).max(ctx.rules.retreat_min_x), from.y)
    } else if rng.chance_percent(ctx.rules.ranged_advance_percent) {
        GridPos::new((from.x + 1).min(ctx.rules.advance_max_x), from.y)
    } else {
        return None;
    };

    (candidate != from && is_open(candidate, ctx.bounds, occupancy)).then_some(candidate)
}

/// Straight along x, then along y, then diagonally.
fn melee_step(
    from: GridPos,
    target: GridPos,
    bounds: GridBounds,
    occupancy: &Occupancy,
) -> Option<GridPos> {
    let (dx, dy) = from.step_toward(target);
    [from.offset(dx, 0), from.offset(0, dy), from.offset(dx, dy)]
        .into_iter()
        .find(|&pos| pos != from && is_open(pos, bounds, occupancy))
}

/// Run every unit's decision for this tick in registry order.
pub fn run_combat_phase(
    registry: &mut UnitRegistry,
    rules: &RuleSet,
    dt: Millis,
    rng: &mut SimRng,
    corpses: &mut Vec<Corpse>,
) -> CombatReport {
    let mut occupancy = Occupancy::build(registry.iter());
    let ctx = CombatContext {
        rules: &rules.combat,
        bounds: rules.bounds(),
        dt,
    };

    let mut report = CombatReport::default();
    for id in registry.ids() {
        match step_unit(registry, id, ctx, &mut occupancy, rng, corpses) {
            UnitAction::Attacked(event) => report.attacks.push(event),
            UnitAction::Moved { .. } => report.moves += 1,
            _ => {}
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Role;

    fn setup() -> (RuleSet, UnitRegistry, SimRng) {
        (RuleSet::default(), UnitRegistry::new(), SimRng::new(1))
    }

    fn spawn(registry: &mut UnitRegistry, rules: &RuleSet, side: Side, role: Role, x: i32, y: i32) -> UnitId {
        let stats = *rules.stats(role).unwrap();
        registry.spawn(side, role, GridPos::new(x, y), &stats)
    }

    fn step(
        registry: &mut UnitRegistry,
        rules: &RuleSet,
        id: UnitId,
        rng: &mut SimRng,
        corpses: &mut Vec<Corpse>,
    ) -> UnitAction {
        let mut occupancy = Occupancy::build(registry.iter());
        let ctx = CombatContext {
            rules: &rules.combat,
            bounds: rules.bounds(),
            dt: 100,
        };
        step_unit(registry, id, ctx, &mut occupancy, rng, corpses)
    }

    #[test]
    fn test_adjacent_melee_attacks_and_stays() {
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 5, 2);
        let enemy = spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 6, 2);
        let mut corpses = Vec::new();

        let action = step(&mut registry, &rules, warrior, &mut rng, &mut corpses);

        assert_eq!(
            action,
            UnitAction::Attacked(AttackEvent {
                attacker: warrior,
                side: Side::Ally,
                target: enemy,
                damage: 6,
                killed: false,
            })
        );
        assert_eq!(registry.get(enemy).unwrap().health.current, 18);
        assert_eq!(registry.get(warrior).unwrap().position, GridPos::new(5, 2));
        assert_eq!(registry.get(warrior).unwrap().attack_timer, 800);
    }

    #[test]
    fn test_cooldown_blocks_attack_then_expires() {
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 5, 2);
        let enemy = spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 6, 2);
        registry.get_mut(warrior).unwrap().attack_timer = 200;
        let mut corpses = Vec::new();

        // Every melee step toward an adjacent target is blocked by the target.
        let first = step(&mut registry, &rules, warrior, &mut rng, &mut corpses);
        assert_eq!(first, UnitAction::Held);
        assert_eq!(registry.get(enemy).unwrap().health.current, 24);
        assert_eq!(registry.get(warrior).unwrap().attack_timer, 100);

        let second = step(&mut registry, &rules, warrior, &mut rng, &mut corpses);
        assert!(matches!(second, UnitAction::Attacked(_)));
        assert_eq!(registry.get(enemy).unwrap().health.current, 18);
    }

    #[test]
    fn test_kill_leaves_corpse() {
        let (rules, mut registry, mut rng) = setup();
        let golem = spawn(&mut registry, &rules, Side::Ally, Role::Golem, 5, 2);
        let enemy = spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 5, 3);
        registry.get_mut(enemy).unwrap().health.current = 4;
        let mut corpses = Vec::new();

        let action = step(&mut registry, &rules, golem, &mut rng, &mut corpses);

        assert!(matches!(action, UnitAction::Attacked(AttackEvent { killed: true, damage: 4, .. })));
        assert_eq!(registry.get(enemy).unwrap().health.current, 0);
        assert_eq!(
            corpses,
            vec![Corpse {
                position: GridPos::new(5, 3),
                remaining: 3000
            }]
        );
    }

    #[test]
    fn test_move_timer_skips_everything() {
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 5, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 6, 2);
        registry.get_mut(warrior).unwrap().move_timer = 150;
        let mut corpses = Vec::new();

        let action = step(&mut registry, &rules, warrior, &mut rng, &mut corpses);

        assert_eq!(action, UnitAction::Recovering);
        let unit = registry.get(warrior).unwrap();
        assert_eq!(unit.move_timer, 50);
        assert_eq!(unit.attack_timer, 0);
    }

    #[test]
    fn test_no_enemy_is_idle_and_keeps_attack_timer() {
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 5, 2);
        let mut corpses = Vec::new();

        assert_eq!(
            step(&mut registry, &rules, warrior, &mut rng, &mut corpses),
            UnitAction::Idle
        );
        assert_eq!(registry.get(warrior).unwrap().attack_timer, 0);
    }

    #[test]
    fn test_melee_prefers_x_then_y_then_diagonal() {
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 4, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 9, 4);
        let mut corpses = Vec::new();

        let action = step(&mut registry, &rules, warrior, &mut rng, &mut corpses);
        assert_eq!(
            action,
            UnitAction::Moved {
                from: GridPos::new(4, 2),
                to: GridPos::new(5, 2)
            }
        );
        assert_eq!(registry.get(warrior).unwrap().move_timer, 150);

        // Block x: falls back to y.
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 4, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 9, 4);
        spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 5, 2);
        let action = step(&mut registry, &rules, warrior, &mut rng, &mut corpses);
        assert_eq!(
            action,
            UnitAction::Moved {
                from: GridPos::new(4, 2),
                to: GridPos::new(4, 3)
            }
        );

        // Block x and y: diagonal.
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 4, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 9, 4);
        spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 5, 2);
        spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 4, 3);
        let action = step(&mut registry, &rules, warrior, &mut rng, &mut corpses);
        assert_eq!(
            action,
            UnitAction::Moved {
                from: GridPos::new(4, 2),
                to: GridPos::new(5, 3)
            }
        );
    }

    #[test]
    fn test_melee_boxed_in_holds() {
        let (rules, mut registry, mut rng) = setup();
        let warrior = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 4, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 9, 4);
        for (x, y) in [(5, 2), (4, 3), (5, 3)] {
            spawn(&mut registry, &rules, Side::Ally, Role::Warrior, x, y);
        }
        let mut corpses = Vec::new();

        assert_eq!(
            step(&mut registry, &rules, warrior, &mut rng, &mut corpses),
            UnitAction::Held
        );
        assert_eq!(registry.get(warrior).unwrap().move_timer, -100);
    }

    #[test]
    fn test_cornered_ranged_retreats_toward_lower_x() {
        let (rules, mut registry, mut rng) = setup();
        let archer = spawn(&mut registry, &rules, Side::Ally, Role::Archer, 5, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 6, 2);
        registry.get_mut(archer).unwrap().attack_timer = 500;
        let mut corpses = Vec::new();

        let action = step(&mut registry, &rules, archer, &mut rng, &mut corpses);
        assert_eq!(
            action,
            UnitAction::Moved {
                from: GridPos::new(5, 2),
                to: GridPos::new(4, 2)
            }
        );
    }

    #[test]
    fn test_cornered_ranged_at_floor_holds() {
        let (rules, mut registry, mut rng) = setup();
        let archer = spawn(&mut registry, &rules, Side::Ally, Role::Archer, 2, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 3, 2);
        registry.get_mut(archer).unwrap().attack_timer = 500;
        let mut corpses = Vec::new();

        assert_eq!(
            step(&mut registry, &rules, archer, &mut rng, &mut corpses),
            UnitAction::Held
        );
    }

    #[test]
    fn test_ranged_attacks_within_range() {
        let (rules, mut registry, mut rng) = setup();
        let archer = spawn(&mut registry, &rules, Side::Ally, Role::Archer, 3, 2);
        let enemy = spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 6, 3);
        let mut corpses = Vec::new();

        let action = step(&mut registry, &rules, archer, &mut rng, &mut corpses);
        assert!(matches!(action, UnitAction::Attacked(AttackEvent { target, damage: 7, .. }) if target == enemy));
    }

    #[test]
    fn test_ranged_shuffle_respects_probability() {
        let mut rules = RuleSet::default();
        rules.combat.ranged_advance_percent = 100;
        let mut registry = UnitRegistry::new();
        let mut rng = SimRng::new(9);
        let archer = spawn(&mut registry, &rules, Side::Ally, Role::Archer, 3, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 12, 2);
        let mut corpses = Vec::new();

        let action = step(&mut registry, &rules, archer, &mut rng, &mut corpses);
        assert_eq!(
            action,
            UnitAction::Moved {
                from: GridPos::new(3, 2),
                to: GridPos::new(4, 2)
            }
        );

        rules.combat.ranged_advance_percent = 0;
        let mut registry = UnitRegistry::new();
        let archer = spawn(&mut registry, &rules, Side::Ally, Role::Archer, 3, 2);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 12, 2);
        assert_eq!(
            step(&mut registry, &rules, archer, &mut rng, &mut corpses),
            UnitAction::Held
        );
    }

    #[test]
    fn test_spawner_is_skipped_and_unharmed() {
        let (rules, mut registry, mut rng) = setup();
        let necro = spawn(&mut registry, &rules, Side::Ally, Role::Necromancer, 1, 2);
        let enemy = spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 2, 2);
        let mut corpses = Vec::new();

        assert_eq!(
            step(&mut registry, &rules, necro, &mut rng, &mut corpses),
            UnitAction::Skipped
        );

        let action = step(&mut registry, &rules, enemy, &mut rng, &mut corpses);
        assert!(matches!(action, UnitAction::Attacked(AttackEvent { damage: 0, killed: false, .. })));
        assert_eq!(registry.get(necro).unwrap().health.current, 999);
    }

    #[test]
    fn test_two_movers_never_share_a_cell() {
        let (rules, mut registry, mut rng) = setup();
        // Both allies step toward (6, 2); the first claims it and the
        // second holds.
        let first = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 5, 2);
        let second = spawn(&mut registry, &rules, Side::Ally, Role::Warrior, 6, 3);
        spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 6, 1);
        let mut corpses = Vec::new();

        let report = run_combat_phase(&mut registry, &rules, 100, &mut rng, &mut corpses);

        assert_eq!(report.moves, 1);
        assert_eq!(registry.get(first).unwrap().position, GridPos::new(6, 2));
        assert_eq!(registry.get(second).unwrap().position, GridPos::new(6, 3));
    }

    #[test]
    fn test_units_killed_earlier_in_tick_do_not_act() {
        let (rules, mut registry, mut rng) = setup();
        let golem = spawn(&mut registry, &rules, Side::Ally, Role::Golem, 5, 2);
        let enemy = spawn(&mut registry, &rules, Side::Enemy, Role::EnemyMelee, 6, 2);
        registry.get_mut(enemy).unwrap().health.current = 1;
        let mut corpses = Vec::new();

        let report = run_combat_phase(&mut registry, &rules, 100, &mut rng, &mut corpses);

        assert_eq!(report.attacks.len(), 1);
        assert_eq!(report.attacks[0].attacker, golem);
        assert_eq!(registry.get(golem).unwrap().health.current, 60);
    }
}
