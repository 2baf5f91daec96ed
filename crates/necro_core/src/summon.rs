//! Mana accrual and the priority summon loop.
//!
//! The necromancer turns a regenerating mana pool into squads, walking a
//! fixed priority list each iteration and taking the first role that is
//! both under its population ceiling and affordable. The loop re-runs
//! every tick, so deaths free capacity for replacements straight away.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{RuleSet, SummonRules};
use crate::math::{accrued_over, fixed_serde, Fixed, Millis};
use crate::registry::UnitRegistry;
use crate::staging::spawn_squad;
use crate::unit::{Role, Side, UnitId};

/// Upper bound on summon iterations per tick.
pub const MAX_SUMMON_ATTEMPTS: usize = 16;

/// Regenerating mana with a hard capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManaPool {
    #[serde(with = "fixed_serde")]
    current: Fixed,
    #[serde(with = "fixed_serde")]
    max: Fixed,
    #[serde(with = "fixed_serde")]
    regen_per_sec: Fixed,
}

impl ManaPool {
    /// An empty pool.
    #[must_use]
    pub fn new(max: u32, regen_per_sec: u32) -> Self {
        Self {
            current: Fixed::ZERO,
            max: Fixed::from_num(max),
            regen_per_sec: Fixed::from_num(regen_per_sec),
        }
    }

    /// An empty pool sized by the summon rules.
    #[must_use]
    pub fn from_rules(rules: &SummonRules) -> Self {
        Self::new(rules.mana_max, rules.mana_regen_per_sec)
    }

    /// Current mana.
    #[must_use]
    pub const fn current(&self) -> Fixed {
        self.current
    }

    /// Current mana rounded down, as shown to players.
    #[must_use]
    pub fn whole(&self) -> u32 {
        self.current.to_num::<u32>()
    }

    /// Capacity.
    #[must_use]
    pub const fn max(&self) -> Fixed {
        self.max
    }

    /// Regenerate for `dt` milliseconds, stopping at capacity.
    pub fn accrue(&mut self, dt: Millis) {
        self.current = (self.current + accrued_over(self.regen_per_sec, dt)).min(self.max);
    }

    /// Add a flat amount, stopping at capacity.
    pub fn add_capped(&mut self, amount: u32) {
        self.current = (self.current + Fixed::from_num(amount)).min(self.max);
    }

    /// Whether `cost` can be paid right now.
    #[must_use]
    pub fn can_afford(&self, cost: u32) -> bool {
        self.current >= Fixed::from_num(cost)
    }

    /// Deduct `cost` if affordable. Returns whether it was paid.
    pub fn spend(&mut self, cost: u32) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.current -= Fixed::from_num(cost);
        true
    }

    /// Drop to zero.
    pub fn empty(&mut self) {
        self.current = Fixed::ZERO;
    }
}

/// One squad produced by the summon loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonedSquad {
    /// Role summoned.
    pub role: Role,
    /// Units placed.
    pub units: Vec<UnitId>,
    /// Mana paid.
    pub cost: u32,
}

/// Pick the first priority entry under its ceiling that `mana` can pay for.
#[must_use]
pub fn pick_summon(registry: &UnitRegistry, rules: &RuleSet, mana: &ManaPool) -> Option<(Role, u32)> {
    rules.summon.priority.iter().find_map(|entry| {
        let cost = rules.summon_cost(entry.role)?;
        let under_ceiling = registry.living_count(Side::Ally, entry.role) < entry.up_to;
        (under_ceiling && mana.can_afford(cost)).then_some((entry.role, cost))
    })
}

/// Accrue mana for `dt`, then summon squads until the cap, the budget, the
/// board or [`MAX_SUMMON_ATTEMPTS`] runs out.
pub fn run_summon_phase(
    registry: &mut UnitRegistry,
    rules: &RuleSet,
    mana: &mut ManaPool,
    dt: Millis,
) -> Vec<SummonedSquad> {
    mana.accrue(dt);

    let soft_cap = rules.summon.soft_cap;
    let mut summoned = Vec::new();

    for _ in 0..MAX_SUMMON_ATTEMPTS {
        let population = registry.living_population(Side::Ally);
        if population >= soft_cap {
            break;
        }

        let Some((role, cost)) = pick_summon(registry, rules, mana) else {
            break;
        };

        let limit = rules.squad_size(role).min(soft_cap - population);
        let units = spawn_squad(registry, rules, Side::Ally, role, limit);
        if units.is_empty() {
            break;
        }

        let spent = mana.spend(cost);
        debug_assert!(spent, "pick_summon returned an unaffordable {role:?}");
        debug!(role = role.name(), count = units.len(), cost, "Squad summoned");
        summoned.push(SummonedSquad { role, units, cost });
    }

    summoned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SummonPriority;
    use crate::grid::GridPos;

    fn with_spawner(rules: &RuleSet) -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        let stats = *rules.stats(Role::Necromancer).unwrap();
        registry.spawn(Side::Ally, Role::Necromancer, rules.board.spawner_home, &stats);
        registry
    }

    #[test]
    fn test_mana_caps_at_max() {
        let mut mana = ManaPool::new(30, 5);
        mana.accrue(10_000);
        assert_eq!(mana.current(), Fixed::from_num(30));
        mana.add_capped(8);
        assert_eq!(mana.whole(), 30);
    }

    #[test]
    fn test_spend_requires_funds() {
        let mut mana = ManaPool::new(30, 5);
        mana.add_capped(3);
        assert!(!mana.spend(4));
        assert_eq!(mana.whole(), 3);
        mana.accrue(200);
        assert!(mana.spend(4));
        assert_eq!(mana.current(), Fixed::ZERO);
    }

    #[test]
    fn test_one_second_of_regen_buys_warriors() {
        let rules = RuleSet::default();
        let mut registry = with_spawner(&rules);
        let mut mana = ManaPool::from_rules(&rules.summon);

        let squads = run_summon_phase(&mut registry, &rules, &mut mana, 1000);

        assert_eq!(squads.len(), 1);
        assert_eq!(squads[0].role, Role::Warrior);
        assert_eq!(squads[0].units.len(), 3);
        assert_eq!(mana.current(), Fixed::from_num(1));
        assert_eq!(registry.living_population(Side::Ally), 3);
    }

    #[test]
    fn test_priority_order_and_ceilings() {
        let rules = RuleSet::default();
        let mut registry = with_spawner(&rules);
        let mut mana = ManaPool::from_rules(&rules.summon);
        mana.add_capped(30);

        let squads = run_summon_phase(&mut registry, &rules, &mut mana, 0);
        let roles: Vec<_> = squads.iter().map(|s| s.role).collect();

        // 30 mana: Golem (10), Wraith (6), then Warriors (4) x3 with 2 left.
        assert_eq!(
            roles,
            vec![Role::Golem, Role::Wraith, Role::Warrior, Role::Warrior, Role::Warrior]
        );
        assert_eq!(mana.whole(), 2);
        assert_eq!(registry.living_count(Side::Ally, Role::Golem), 1);
        assert_eq!(registry.living_count(Side::Ally, Role::Wraith), 2);
    }

    #[test]
    fn test_mana_drops_by_exactly_the_squad_costs() {
        let rules = RuleSet::default();
        let mut registry = with_spawner(&rules);
        let mut mana = ManaPool::from_rules(&rules.summon);
        mana.add_capped(17);
        mana.accrue(50);
        let before = mana.current();

        let squads = run_summon_phase(&mut registry, &rules, &mut mana, 0);
        let charged: u32 = squads.iter().map(|s| s.cost).sum();

        assert!(!squads.is_empty());
        assert_eq!(before - mana.current(), Fixed::from_num(charged));
        assert!(mana.current() >= Fixed::ZERO);
    }

    #[test]
    fn test_cost_charged_once_per_squad() {
        let mut rules = RuleSet::default();
        rules.summon.priority = vec![SummonPriority::new(Role::Archer, 2)];
        let mut registry = with_spawner(&rules);
        let mut mana = ManaPool::from_rules(&rules.summon);
        mana.add_capped(12);

        let squads = run_summon_phase(&mut registry, &rules, &mut mana, 0);

        assert_eq!(squads.len(), 1);
        assert_eq!(squads[0].units.len(), 2);
        assert_eq!(mana.whole(), 7);
    }

    #[test]
    fn test_soft_cap_clamps_squad() {
        let mut rules = RuleSet::default();
        rules.summon.soft_cap = 4;
        rules.summon.mana_max = 100;
        let mut registry = with_spawner(&rules);
        let mut mana = ManaPool::from_rules(&rules.summon);
        mana.add_capped(100);

        run_summon_phase(&mut registry, &rules, &mut mana, 0);

        assert_eq!(registry.living_population(Side::Ally), 4);
    }

    #[test]
    fn test_full_board_stops_without_charging() {
        let mut rules = RuleSet::default();
        rules.summon.priority = vec![SummonPriority::new(Role::Warrior, 999)];
        rules.summon.soft_cap = 200;
        let mut registry = with_spawner(&rules);
        let filler = *rules.stats(Role::EnemyMelee).unwrap();
        for x in 0..rules.board.width {
            for y in 0..rules.board.height {
                let pos = GridPos::new(x, y);
                if pos != rules.board.spawner_home {
                    registry.spawn(Side::Enemy, Role::EnemyMelee, pos, &filler);
                }
            }
        }
        let mut mana = ManaPool::from_rules(&rules.summon);
        mana.add_capped(20);

        let squads = run_summon_phase(&mut registry, &rules, &mut mana, 0);

        assert!(squads.is_empty());
        assert_eq!(mana.whole(), 20);
    }

    #[test]
    fn test_loop_is_bounded() {
        let mut rules = RuleSet::default();
        rules.summon.priority = vec![SummonPriority::new(Role::Warrior, 999)];
        rules.summon.soft_cap = 1000;
        rules.summon.mana_max = 10_000;
        for data in &mut rules.roles {
            if data.role == Role::Warrior {
                data.summon_cost = Some(0);
            }
        }
        let mut registry = with_spawner(&rules);
        let mut mana = ManaPool::from_rules(&rules.summon);

        let squads = run_summon_phase(&mut registry, &rules, &mut mana, 0);

        assert_eq!(squads.len(), MAX_SUMMON_ATTEMPTS);
    }
}
