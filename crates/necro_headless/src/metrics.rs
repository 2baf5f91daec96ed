//! Run metrics collection for balance analysis.
//!
//! A [`MetricsCollector`] watches the [`TickEvents`] of one autoplay run and
//! produces [`GameMetrics`]; [`BatchSummary`] aggregates many of those.

use std::collections::HashMap;

use necro_core::simulation::TickEvents;
use necro_core::unit::Side;
use necro_core::wave::WaveOutcome;
use serde::{Deserialize, Serialize};

/// Why an autoplay run stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEnd {
    /// Every summon died while enemies remained.
    Defeat,
    /// The scenario's wave limit was reached.
    WaveLimit,
    /// The tick limit was reached first.
    #[default]
    TickLimit,
}

impl RunEnd {
    /// Name used in summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Defeat => "defeat",
            Self::WaveLimit => "wave_limit",
            Self::TickLimit => "tick_limit",
        }
    }
}

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique run identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub duration_ticks: u64,
    /// How the run ended.
    pub end: RunEnd,
    /// Waves won.
    pub waves_cleared: u32,
    /// Wave number the run ended on.
    pub final_wave: u32,
    /// Souls banked at the end.
    pub souls: u32,
    /// Squads summoned by role.
    pub squads_summoned: HashMap<String, u32>,
    /// Units summoned in total.
    pub units_summoned: u32,
    /// Mana spent on summons.
    pub mana_spent: u32,
    /// Enemy units killed.
    pub enemies_killed: u32,
    /// Summons lost.
    pub allies_lost: u32,
    /// Damage dealt by summons.
    pub damage_dealt: u64,
    /// Damage dealt by enemies.
    pub damage_taken: u64,
    /// Most summons alive at once.
    pub peak_army_size: u32,
    /// Wave outcomes in order.
    pub events: Vec<TimedEvent>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Kills per loss; losses of zero count as one.
    #[must_use]
    pub fn kd_ratio(&self) -> f64 {
        f64::from(self.enemies_killed) / f64::from(self.allies_lost.max(1))
    }
}

/// A timed event during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Tick when the event occurred.
    pub tick: u64,
    /// Type of event.
    pub event_type: EventType,
    /// Wave number.
    pub wave: u32,
}

/// Types of events that can be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A wave was started.
    WaveStarted,
    /// A wave was won.
    WaveCleared,
    /// The run was lost.
    Defeat,
}

/// Summary statistics across multiple runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total runs.
    pub total_games: u32,
    /// Runs by end reason.
    pub ends: HashMap<String, u32>,
    /// Share of runs that were defeated.
    pub defeat_rate: f64,
    /// Average waves cleared.
    pub avg_waves_cleared: f64,
    /// Fewest waves cleared.
    pub min_waves_cleared: u32,
    /// Most waves cleared.
    pub max_waves_cleared: u32,
    /// Average souls.
    pub avg_souls: f64,
    /// Average run length in ticks.
    pub avg_duration_ticks: f64,
    /// Average units summoned.
    pub avg_units_summoned: f64,
    /// Average kills per loss.
    pub avg_kd_ratio: f64,
    /// Average squads per role.
    pub avg_squads_by_role: HashMap<String, f64>,
}

impl BatchSummary {
    /// Calculate summary from a list of run metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let count = games.len() as f64;
        let mut summary = Self {
            total_games: games.len() as u32,
            min_waves_cleared: u32::MAX,
            ..Default::default()
        };

        let mut waves = 0u64;
        let mut souls = 0u64;
        let mut duration = 0u64;
        let mut summoned = 0u64;
        let mut kd = 0.0;
        let mut squads: HashMap<String, u32> = HashMap::new();

        for game in games {
            *summary.ends.entry(game.end.as_str().to_string()).or_default() += 1;
            waves += u64::from(game.waves_cleared);
            souls += u64::from(game.souls);
            duration += game.duration_ticks;
            summoned += u64::from(game.units_summoned);
            kd += game.kd_ratio();
            summary.min_waves_cleared = summary.min_waves_cleared.min(game.waves_cleared);
            summary.max_waves_cleared = summary.max_waves_cleared.max(game.waves_cleared);
            for (role, n) in &game.squads_summoned {
                *squads.entry(role.clone()).or_default() += n;
            }
        }

        let defeats = summary.ends.get(RunEnd::Defeat.as_str()).copied().unwrap_or(0);
        summary.defeat_rate = f64::from(defeats) / count;
        summary.avg_waves_cleared = waves as f64 / count;
        summary.avg_souls = souls as f64 / count;
        summary.avg_duration_ticks = duration as f64 / count;
        summary.avg_units_summoned = summoned as f64 / count;
        summary.avg_kd_ratio = kd / count;
        summary.avg_squads_by_role = squads
            .into_iter()
            .map(|(role, n)| (role, f64::from(n) / count))
            .collect();

        summary
    }
}

/// Metrics collector that tracks events during a run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: GameMetrics,
    current_tick: u64,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(game_id: &str, scenario: &str, seed: u64) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, scenario, seed),
            current_tick: 0,
        }
    }

    /// Record that a wave was started.
    pub fn on_wave_started(&mut self, wave: u32) {
        self.metrics.events.push(TimedEvent {
            tick: self.current_tick,
            event_type: EventType::WaveStarted,
            wave,
        });
    }

    /// Fold one tick's events in. `army` is the living summon count after
    /// the tick.
    pub fn on_tick(&mut self, events: &TickEvents, army: u32) {
        self.current_tick = events.tick;
        let metrics = &mut self.metrics;

        for squad in &events.summons {
            *metrics
                .squads_summoned
                .entry(squad.role.name().to_string())
                .or_default() += 1;
            metrics.units_summoned += squad.units.len() as u32;
        }
        metrics.mana_spent += events.mana_spent;

        for attack in &events.attacks {
            match attack.side {
                Side::Ally => metrics.damage_dealt += u64::from(attack.damage),
                Side::Enemy => metrics.damage_taken += u64::from(attack.damage),
            }
        }
        for dead in &events.deaths {
            match dead.side {
                Side::Ally => metrics.allies_lost += 1,
                Side::Enemy => metrics.enemies_killed += 1,
            }
        }
        metrics.peak_army_size = metrics.peak_army_size.max(army);

        match events.outcome {
            Some(WaveOutcome::Victory { wave, .. }) => {
                metrics.waves_cleared += 1;
                metrics.events.push(TimedEvent {
                    tick: events.tick,
                    event_type: EventType::WaveCleared,
                    wave,
                });
            }
            Some(WaveOutcome::Defeat { wave }) => {
                metrics.events.push(TimedEvent {
                    tick: events.tick,
                    event_type: EventType::Defeat,
                    wave,
                });
            }
            None => {}
        }
    }

    /// Finalize and return the metrics.
    #[must_use]
    pub fn finalize(mut self, end: RunEnd, final_wave: u32, souls: u32, hash: u64) -> GameMetrics {
        self.metrics.duration_ticks = self.current_tick;
        self.metrics.end = end;
        self.metrics.final_wave = final_wave;
        self.metrics.souls = souls;
        self.metrics.final_state_hash = hash;
        self.metrics
    }

    /// Get current metrics (immutable).
    #[must_use]
    pub fn current(&self) -> &GameMetrics {
        &self.metrics
    }
}
