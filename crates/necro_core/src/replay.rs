//! Replay system for recording and playing back runs.
//!
//! A replay stores the initial simulation snapshot and the commands applied
//! to it, each stamped with the tick it was applied before. Because the
//! simulation is deterministic, that is enough to rebuild every later state.

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GameError, Result};
use crate::simulation::{wire_format, SimCommand, Simulation, TickEvents};

/// A single command record for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Value of `get_tick()` when the command was applied.
    pub tick: u64,
    /// The command that was applied.
    pub command: SimCommand,
}

impl ReplayCommand {
    /// Create a new replay command record.
    #[must_use]
    pub const fn new(tick: u64, command: SimCommand) -> Self {
        Self { tick, command }
    }
}

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario name.
    pub scenario_id: String,
    /// Seed the run was created with.
    pub seed: u64,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// Commands in the order they were applied.
    pub commands: Vec<ReplayCommand>,
    /// Tick the recording stopped at.
    pub final_tick: u64,
    /// State hash at `final_tick`.
    pub final_hash: u64,
}

impl Replay {
    /// Create a replay from a simulation's current state.
    ///
    /// # Errors
    /// Returns an error if the simulation cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, initial_state: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed: initial_state.seed(),
            initial_state: initial_state.serialize()?,
            commands: Vec::new(),
            final_tick: initial_state.get_tick(),
            final_hash: initial_state.state_hash(),
        })
    }

    /// Record a command applied before `tick` ran.
    pub fn record_command(&mut self, tick: u64, command: SimCommand) {
        self.commands.push(ReplayCommand::new(tick, command));
    }

    /// Finalize the replay with the end state.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = wire_format()
            .serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or if the
    /// file was written by a different format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        let replay: Self = wire_format()
            .deserialize(&bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }

    /// Get the initial simulation state for playback.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// Commands applied before `tick` ran.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> Vec<&ReplayCommand> {
        self.commands.iter().filter(|cmd| cmd.tick == tick).collect()
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Re-run the whole replay and compare the final hash.
    ///
    /// # Errors
    /// Returns [`GameError::ReplayMismatch`] if the playback ends on a
    /// different state, or any error from restoring the initial state.
    pub fn verify(&self) -> Result<()> {
        let mut player = ReplayPlayer::new(self.clone())?;
        player.verify()
    }
}

/// A simulation that records every command applied to it.
#[derive(Debug)]
pub struct Recorder {
    simulation: Simulation,
    replay: Replay,
}

impl Recorder {
    /// Start recording from the simulation's current state.
    ///
    /// # Errors
    /// Returns an error if the simulation cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, simulation: Simulation) -> Result<Self> {
        let replay = Replay::new(scenario_id, &simulation)?;
        Ok(Self { simulation, replay })
    }

    /// Apply and record a command.
    pub fn apply(&mut self, command: SimCommand) -> bool {
        self.replay
            .record_command(self.simulation.get_tick(), command);
        self.simulation.apply(command)
    }

    /// Advance one tick.
    pub fn tick(&mut self) -> TickEvents {
        self.simulation.tick()
    }

    /// The simulation being recorded.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Stop recording and return the finished replay with the simulation.
    #[must_use]
    pub fn finish(mut self) -> (Replay, Simulation) {
        self.replay
            .finalize(self.simulation.get_tick(), self.simulation.state_hash());
        (self.replay, self.simulation)
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    simulation: Simulation,
    start_tick: u64,
    command_index: usize,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        let start_tick = simulation.get_tick();
        Ok(Self {
            replay,
            simulation,
            start_tick,
            command_index: 0,
            paused: false,
        })
    }

    fn apply_pending(&mut self) {
        let tick = self.simulation.get_tick();
        while let Some(cmd) = self.replay.commands.get(self.command_index) {
            if cmd.tick > tick {
                break;
            }
            self.simulation.apply(cmd.command);
            self.command_index += 1;
        }
    }

    /// Advance the replay by one tick.
    ///
    /// Returns true if there are more ticks to play.
    pub fn advance(&mut self) -> bool {
        if self.paused || self.is_finished() {
            return !self.is_finished();
        }

        self.apply_pending();
        self.simulation.tick();

        if self.is_finished() {
            // Commands issued after the last tick still belong to the end state.
            self.apply_pending();
        }

        !self.is_finished()
    }

    /// Seek to a specific tick by replaying from the start.
    ///
    /// # Errors
    /// Returns an error if state restoration fails.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.simulation = self.replay.restore_initial_state()?;
        self.command_index = 0;

        let target = target_tick.min(self.replay.final_tick);
        while self.simulation.get_tick() < target {
            self.apply_pending();
            self.simulation.tick();
        }
        if self.is_finished() {
            self.apply_pending();
        }

        Ok(())
    }

    /// Get the current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.simulation.get_tick()
    }

    /// Get a reference to the current simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.simulation.get_tick() >= self.replay.final_tick
    }

    /// Play to the end and compare against the recorded final hash.
    ///
    /// # Errors
    /// Returns [`GameError::ReplayMismatch`] on divergence.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_tick)?;
        let actual = self.simulation.state_hash();
        if actual == self.replay.final_hash {
            Ok(())
        } else {
            Err(GameError::ReplayMismatch {
                tick: self.simulation.get_tick(),
                expected: self.replay.final_hash,
                actual,
            })
        }
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        let total = self.replay.final_tick.saturating_sub(self.start_tick);
        if total == 0 {
            100.0
        } else {
            let done = self.current_tick().saturating_sub(self.start_tick);
            (done as f64 / total as f64) * 100.0
        }
    }
}
