//! Batch autoplay runner for balance testing.
//!
//! Runs one autoplay game per seed in parallel using rayon and collects the
//! metrics of all of them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::game_runner::{run_game, GameConfig};
use crate::metrics::{BatchSummary, GameMetrics, RunEnd};
use crate::scenario::{Scenario, ScenarioError};

/// Errors that stop a batch.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The scenario could not be resolved.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Results could not be written or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Results were not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The worker pool could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// A determinism check was asked for zero runs.
    #[error("At least one run is required")]
    NoRuns,
}

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Preset name or scenario file.
    pub scenario: String,
    /// Number of games to run.
    pub game_count: u32,
    /// Worker threads (0 = rayon default).
    pub parallel_games: u32,
    /// Output directory for results.
    pub output_dir: PathBuf,
    /// Seed of the first game; game `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Tick limit override (0 = the scenario's own).
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "standard".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: 0,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario.
    #[must_use]
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory.
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Override the scenario's tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Cap the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.parallel_games = threads;
        self
    }

    fn load_scenario(&self) -> Result<Scenario, ScenarioError> {
        let mut scenario = Scenario::resolve(&self.scenario)?;
        if self.max_ticks > 0 {
            scenario.max_ticks = self.max_ticks;
        }
        Ok(scenario)
    }
}

/// A game that failed inside an otherwise successful batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFailure {
    /// Game index.
    pub game_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual game metrics, in seed order.
    pub games: Vec<GameMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Games that could not be run.
    pub errors: Vec<GameFailure>,
}

impl BatchResults {
    /// Save results to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), BatchError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Progress tracking for batch runs.
#[derive(Debug)]
pub struct BatchProgress {
    total: u32,
    completed: AtomicU32,
    defeats: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker.
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            defeats: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed game.
    pub fn record_completion(&self, defeated: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if defeated {
            self.defeats.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Games completed so far.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Share of completed games that ended in defeat.
    #[must_use]
    pub fn defeat_rate(&self) -> f64 {
        let completed = self.current();
        if completed == 0 {
            return 0.0;
        }
        f64::from(self.defeats.load(Ordering::Relaxed)) / f64::from(completed)
    }

    /// Estimated time remaining.
    #[must_use]
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }
        let per_game = self.start_time.elapsed().as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_game * f64::from(remaining))
    }

    /// Log progress.
    pub fn display(&self) {
        let eta = self.eta();
        info!(
            completed = self.current(),
            total = self.total,
            percent = %format!("{:.1}", self.percentage()),
            defeat_rate = %format!("{:.2}", self.defeat_rate()),
            eta = %format!("{}m {}s", eta.as_secs() / 60, eta.as_secs() % 60),
            "Batch progress"
        );
    }
}

/// Run a batch of games.
///
/// # Errors
///
/// Fails before any game runs if the scenario cannot be resolved or the
/// worker pool cannot be built. Individual game failures are collected in
/// [`BatchResults::errors`].
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, BatchError> {
    let start = Instant::now();
    let scenario = config.load_scenario()?;
    let progress = BatchProgress::new(config.game_count);

    info!(
        games = config.game_count,
        scenario = %scenario.name,
        seed_start = config.seed_start,
        "Starting batch run"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel_games as usize)
        .build()?;

    let results: Vec<Result<GameMetrics, GameFailure>> = pool.install(|| {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                match run_game(GameConfig::new(scenario.clone(), seed)) {
                    Ok(result) => {
                        progress.record_completion(result.metrics.end == RunEnd::Defeat);
                        let completed = progress.current();
                        if completed % 10 == 0 {
                            debug!(completed, total = config.game_count, "Progress");
                        }
                        if completed % 100 == 0 {
                            progress.display();
                        }
                        Ok(result.metrics)
                    }
                    Err(e) => {
                        warn!(game = i, seed, error = %e, "Game failed");
                        Err(GameFailure {
                            game_index: i,
                            seed,
                            message: e.to_string(),
                        })
                    }
                }
            })
            .collect()
    });

    let mut games = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(metrics) => games.push(metrics),
            Err(failure) => errors.push(failure),
        }
    }

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        games = games.len(),
        failed = errors.len(),
        seconds = %format!("{duration_seconds:.1}"),
        avg_waves = %format!("{:.2}", summary.avg_waves_cleared),
        "Batch complete"
    );

    Ok(BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Run one seed `runs` times and check that every run ends identically.
///
/// # Errors
///
/// Fails if the scenario cannot be resolved or `runs` is zero.
pub fn verify_determinism(scenario: &str, seed: u64, runs: u32) -> Result<bool, BatchError> {
    if runs == 0 {
        return Err(BatchError::NoRuns);
    }
    let scenario = Scenario::resolve(scenario)?;
    let mut first: Option<GameMetrics> = None;

    for run in 0..runs {
        let metrics = run_game(GameConfig::new(scenario.clone(), seed))?.metrics;
        match &first {
            None => first = Some(metrics),
            Some(reference) => {
                let same = metrics.final_state_hash == reference.final_state_hash
                    && metrics.duration_ticks == reference.duration_ticks
                    && metrics.end == reference.end
                    && metrics.waves_cleared == reference.waves_cleared;
                if !same {
                    warn!(
                        run,
                        seed,
                        expected = reference.final_state_hash,
                        actual = metrics.final_state_hash,
                        "Run diverged"
                    );
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}
