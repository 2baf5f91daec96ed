//! Test fixtures and helpers.
//!
//! Pre-built simulations and board layouts for consistent testing.

use necro_core::data::RuleSet;
use necro_core::grid::GridPos;
use necro_core::simulation::Simulation;
use necro_core::unit::{Role, Side, UnitId};
use necro_core::wave::WaveOutcome;

/// A simulation with wave 1 already started.
#[must_use]
pub fn running_wave(seed: u64) -> Simulation {
    let mut sim = Simulation::new(seed);
    sim.start_wave();
    sim
}

/// Rules whose summon list is empty, so the necromancer never buys anything.
///
/// Useful for hand-placed skirmishes where only the listed units fight.
#[must_use]
pub fn no_summon_rules() -> RuleSet {
    let mut rules = RuleSet::default();
    rules.summon.priority.clear();
    rules
}

/// A running wave on `rules` where every wave enemy has been replaced by the
/// given placements.
///
/// Placements the simulation rejects (occupied or off-board cells) are
/// skipped. Returns the simulation and the ids actually placed.
///
/// # Panics
///
/// Panics if `rules` fail validation.
#[must_use]
pub fn skirmish(
    rules: RuleSet,
    seed: u64,
    placements: &[(Side, Role, GridPos)],
) -> (Simulation, Vec<UnitId>) {
    let mut sim = Simulation::with_rules(rules, seed).expect("fixture rules must validate");
    sim.start_wave();

    let wave_enemies: Vec<UnitId> = sim
        .registry()
        .iter()
        .filter(|unit| unit.side == Side::Enemy)
        .map(|unit| unit.id)
        .collect();
    for id in wave_enemies {
        sim.despawn_unit(id).expect("wave enemy exists");
    }

    let placed = placements
        .iter()
        .filter_map(|&(side, role, pos)| sim.spawn_unit_at(side, role, pos).ok())
        .collect();
    (sim, placed)
}

/// Tick until a wave outcome or until `max_ticks` ran.
pub fn run_until_outcome(sim: &mut Simulation, max_ticks: u64) -> Option<WaveOutcome> {
    for _ in 0..max_ticks {
        if let Some(outcome) = sim.tick().outcome {
            return Some(outcome);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use necro_core::wave::WavePhase;

    #[test]
    fn test_running_wave_has_enemies() {
        let sim = running_wave(3);
        assert_eq!(sim.phase(), WavePhase::Running);
        assert_eq!(sim.wave(), 1);
        assert!(sim.registry().living_population(Side::Enemy) > 0);
    }

    #[test]
    fn test_skirmish_places_only_requested_units() {
        let (sim, placed) = skirmish(
            no_summon_rules(),
            1,
            &[
                (Side::Ally, Role::Warrior, GridPos::new(5, 2)),
                (Side::Enemy, Role::EnemyMelee, GridPos::new(8, 2)),
                (Side::Enemy, Role::EnemyMelee, GridPos::new(8, 2)),
            ],
        );
        assert_eq!(placed.len(), 2);
        assert_eq!(sim.registry().living_population(Side::Enemy), 1);
        assert_eq!(sim.registry().living_population(Side::Ally), 1);
    }

    #[test]
    fn test_run_until_outcome_finishes_wave_one() {
        let mut sim = running_wave(11);
        let outcome = run_until_outcome(&mut sim, 3000);
        assert!(outcome.is_some());
    }
}
