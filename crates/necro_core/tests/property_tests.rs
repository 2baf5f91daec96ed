//! Property-based tests for simulation invariants.

use std::collections::HashSet;

use necro_core::prelude::*;
use necro_test_utils::determinism::run_schedule;
use necro_test_utils::determinism::strategies::{
    arb_command_schedule, arb_damage, arb_health, arb_placement_list, arb_seed,
};
use necro_test_utils::fixtures::{no_summon_rules, skirmish};
use proptest::prelude::*;

fn living_cells_unique(sim: &Simulation) -> bool {
    let mut cells = HashSet::new();
    sim.registry().living().all(|unit| cells.insert(unit.position))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_no_two_living_units_share_a_cell(
        seed in arb_seed(),
        schedule in arb_command_schedule(6, 300),
    ) {
        let mut sim = Simulation::new(seed);
        sim.start_wave();
        for chunk in 0..6u64 {
            let window: Vec<_> = schedule
                .iter()
                .filter(|(tick, _)| tick / 50 == chunk)
                .map(|&(tick, command)| (tick % 50, command))
                .collect();
            run_schedule(&mut sim, &window, 50);
            prop_assert!(living_cells_unique(&sim));
        }
    }

    #[test]
    fn prop_mana_and_population_stay_bounded(
        seed in arb_seed(),
        schedule in arb_command_schedule(6, 400),
    ) {
        let mut sim = Simulation::new(seed);
        let cap = sim.rules().summon.soft_cap;
        let max = Fixed::from_num(sim.rules().summon.mana_max);
        for offset in 0..400u64 {
            for &(_, command) in schedule.iter().filter(|(at, _)| *at == offset) {
                sim.apply(command);
            }
            sim.tick();
            prop_assert!(sim.mana() >= Fixed::ZERO);
            prop_assert!(sim.mana() <= max);
            prop_assert!(sim.registry().living_population(Side::Ally) <= cap);
        }
    }

    #[test]
    fn prop_hand_placed_skirmish_keeps_invariants(
        seed in arb_seed(),
        placements in arb_placement_list(12),
    ) {
        let layout: Vec<_> = placements
            .iter()
            .map(|p| (p.side, p.role, p.pos))
            .collect();
        let (mut sim, _) = skirmish(no_summon_rules(), seed, &layout);
        let bounds = sim.rules().bounds();

        for _ in 0..150 {
            sim.tick();
            prop_assert!(living_cells_unique(&sim));
            for unit in sim.registry().iter() {
                prop_assert!(bounds.contains(unit.position));
                prop_assert!(unit.health.current <= unit.health.max);
            }
        }
        let spawner = sim.registry().spawner();
        prop_assert!(spawner.is_some_and(|unit| unit.health.current == unit.health.max));
    }

    #[test]
    fn prop_health_never_exceeds_max_or_underflows(
        max in arb_health(),
        hits in proptest::collection::vec(arb_damage(), 0..20),
    ) {
        let mut health = Health::new(max);
        let mut dealt_total = 0;
        for hit in hits {
            dealt_total += health.apply_damage(hit);
            prop_assert!(health.current <= health.max);
        }
        prop_assert_eq!(dealt_total + health.current, max);
    }

    #[test]
    fn prop_mana_accrual_is_exact_across_tick_splits(
        splits in proptest::collection::vec((1i64..10).prop_map(|n| n * 100), 1..30),
    ) {
        let mut stepped = ManaPool::new(1000, 5);
        let mut once = ManaPool::new(1000, 5);
        let total: i64 = splits.iter().sum();
        for dt in &splits {
            stepped.accrue(*dt);
        }
        once.accrue(total);
        prop_assert_eq!(stepped.current(), once.current());
    }

    #[test]
    fn prop_snapshot_restores_exactly(
        seed in arb_seed(),
        ticks in 0u64..200,
    ) {
        let mut sim = Simulation::new(seed);
        sim.start_wave();
        for _ in 0..ticks {
            sim.tick();
        }
        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes).unwrap();
        prop_assert_eq!(restored.state_hash(), sim.state_hash());
    }
}
