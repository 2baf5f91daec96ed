//! Autoplay execution for headless testing.
//!
//! Runs complete games with no controller: whenever the director is idle the
//! next wave is started, and the run ends on defeat, on the scenario's wave
//! limit or on its tick limit.
//!
//! All loops are bounded by the tick limit.

use std::time::Instant;

use necro_core::simulation::{Simulation, TickEvents};
use necro_core::unit::Side;
use necro_core::wave::WavePhase;
use tracing::{debug, info};

use crate::metrics::{GameMetrics, MetricsCollector, RunEnd};
use crate::scenario::{Scenario, ScenarioError};

/// Progress logging interval (ticks).
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// High-level game runner for headless testing.
#[derive(Debug, Clone, Default)]
pub struct GameRunner {
    /// Tick limit used when the scenario's is zero.
    pub default_max_ticks: u64,
}

impl GameRunner {
    /// Create a new game runner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_max_ticks: 60_000,
        }
    }

    /// Run a game with the given configuration.
    pub fn run(&self, mut config: GameConfig) -> Result<GameResult, ScenarioError> {
        if config.scenario.max_ticks == 0 {
            config.scenario.max_ticks = self.default_max_ticks;
        }
        run_game(config)
    }
}

/// Configuration for a single game run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Seed for the simulation.
    pub seed: u64,
    /// Scenario to use.
    pub scenario: Scenario,
    /// Game ID for tracking.
    pub game_id: String,
}

impl GameConfig {
    /// A run of `scenario` at `seed`, named after the seed.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            seed,
            scenario,
            game_id: format!("game_{seed}"),
        }
    }
}

/// Outcome of a single run.
#[derive(Debug, Clone)]
pub struct GameResult {
    /// Collected metrics.
    pub metrics: GameMetrics,
    /// Final state hash.
    pub final_state_hash: u64,
}

/// What one autoplay step did.
#[derive(Debug, Clone)]
pub struct AutoplayTick {
    /// Wave number started before the tick, if any.
    pub started: Option<u32>,
    /// The tick's events.
    pub events: TickEvents,
}

/// Autoplay policy: start waves while idle, stop at the scenario's limits.
#[derive(Debug, Clone, Copy)]
pub struct Autoplay {
    max_waves: Option<u32>,
    max_ticks: u64,
    start_tick: u64,
}

impl Autoplay {
    /// Autoplay `sim` under `scenario`'s limits, counting ticks from now.
    #[must_use]
    pub fn new(scenario: &Scenario, sim: &Simulation) -> Self {
        Self {
            max_waves: scenario.max_waves,
            max_ticks: scenario.max_ticks,
            start_tick: sim.get_tick(),
        }
    }

    /// Why the run is over, or `None` while it continues.
    #[must_use]
    pub fn finished(&self, sim: &Simulation) -> Option<RunEnd> {
        match sim.phase() {
            WavePhase::Defeated => return Some(RunEnd::Defeat),
            WavePhase::Idle if self.max_waves.is_some_and(|max| sim.wave() >= max) => {
                return Some(RunEnd::WaveLimit);
            }
            _ => {}
        }
        if sim.get_tick() - self.start_tick >= self.max_ticks {
            return Some(RunEnd::TickLimit);
        }
        None
    }

    /// Start a wave if idle, then tick once. `None` once the run is over.
    pub fn step(&self, sim: &mut Simulation) -> Option<AutoplayTick> {
        if self.finished(sim).is_some() {
            return None;
        }
        let started = (sim.phase() == WavePhase::Idle && sim.start_wave()).then(|| sim.wave());
        let events = sim.tick();
        Some(AutoplayTick { started, events })
    }
}

/// Run one autoplay game to completion.
pub fn run_game(config: GameConfig) -> Result<GameResult, ScenarioError> {
    let started = Instant::now();
    info!(
        game_id = %config.game_id,
        seed = config.seed,
        max_ticks = config.scenario.max_ticks,
        scenario = %config.scenario.name,
        "Starting game simulation"
    );

    let mut sim = config.scenario.build_simulation(config.seed)?;
    let autoplay = Autoplay::new(&config.scenario, &sim);
    let mut collector = MetricsCollector::new(&config.game_id, &config.scenario.name, config.seed);

    while let Some(step) = autoplay.step(&mut sim) {
        if let Some(wave) = step.started {
            collector.on_wave_started(wave);
        }
        let army = sim.registry().living_population(Side::Ally);
        collector.on_tick(&step.events, army);

        if step.events.tick % PROGRESS_LOG_INTERVAL == 0 {
            debug!(
                game_id = %config.game_id,
                tick = step.events.tick,
                wave = sim.wave(),
                souls = sim.souls(),
                "Progress"
            );
        }
    }

    let end = autoplay.finished(&sim).unwrap_or_default();
    let hash = sim.state_hash();
    let metrics = collector.finalize(end, sim.wave(), sim.souls(), hash);

    info!(
        game_id = %config.game_id,
        end = end.as_str(),
        waves_cleared = metrics.waves_cleared,
        ticks = metrics.duration_ticks,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Game finished"
    );

    Ok(GameResult {
        metrics,
        final_state_hash: hash,
    })
}
