//! Headless session runner.
//!
//! Reads [`Command`]s as JSON lines, applies them to a [`Simulation`] and
//! writes one or more [`Response`]s per command.

use std::io::{self, BufRead, Write};

use necro_core::grid::GridPos;
use necro_core::simulation::Simulation;
use necro_core::wave::WavePhase;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ascii_visualizer::{render_board, AsciiConfig};
use crate::protocol::{parse_role, parse_side, Command, Response};
use crate::scenario::{Scenario, ScenarioError};

/// Largest `count` a single `tick` command may ask for.
pub const MAX_TICKS_PER_COMMAND: u32 = 100_000;

/// Errors that end a session.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The scenario could not be built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Reading commands or writing responses failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Headless runner configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Answer `tick` with a full state (vs a plain ack).
    pub auto_state_output: bool,
    /// Scenario whose rules the session plays under.
    pub scenario: Scenario,
    /// Seed override; the scenario's seed is used otherwise.
    pub seed: Option<u64>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            auto_state_output: true,
            scenario: Scenario::standard(),
            seed: None,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Commands parsed and executed.
    pub commands: u64,
    /// Lines rejected as malformed.
    pub rejected: u64,
    /// Tick the session stopped at.
    pub final_tick: u64,
}

/// Headless runner for controller-driven sessions.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRunner {
    config: HeadlessConfig,
}

impl HeadlessRunner {
    /// Create a new headless runner with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration.
    #[must_use]
    pub fn with_config(config: HeadlessConfig) -> Self {
        Self { config }
    }

    /// The simulation a fresh session starts from.
    pub fn build_simulation(&self) -> Result<Simulation, ScenarioError> {
        let seed = self.config.seed.unwrap_or(self.config.scenario.seed);
        self.config.scenario.build_simulation(seed)
    }

    /// Serve a session on stdin/stdout.
    pub fn run_stdio(&self) -> Result<SessionSummary, RunnerError> {
        let mut sim = self.build_simulation()?;
        let stdin = io::stdin();
        let stdout = io::stdout();
        let summary = self.run(&mut sim, stdin.lock(), stdout.lock())?;
        Ok(summary)
    }

    /// Serve a session over arbitrary streams.
    ///
    /// Emits `ready`, then answers each line until `quit` or end of input,
    /// and always finishes with `bye`.
    pub fn run<R: BufRead, W: Write>(
        &self,
        sim: &mut Simulation,
        input: R,
        mut output: W,
    ) -> io::Result<SessionSummary> {
        info!(
            seed = sim.seed(),
            scenario = %self.config.scenario.name,
            "Headless session started"
        );
        send(&mut output, &Response::ready(sim.get_tick(), sim.seed()))?;

        let mut summary = SessionSummary {
            commands: 0,
            rejected: 0,
            final_tick: sim.get_tick(),
        };

        for line in input.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let command = match Command::from_json(trimmed) {
                Ok(command) => command,
                Err(e) => {
                    warn!(error = %e, "Malformed command");
                    summary.rejected += 1;
                    send(&mut output, &Response::error(format!("Parse error: {e}"), None))?;
                    continue;
                }
            };

            summary.commands += 1;
            debug!(cmd = command.name(), "Command received");
            if command == Command::Quit {
                break;
            }
            for response in self.execute(sim, &command) {
                send(&mut output, &response)?;
            }
        }

        send(&mut output, &Response::Bye)?;
        summary.final_tick = sim.get_tick();
        info!(
            commands = summary.commands,
            rejected = summary.rejected,
            tick = summary.final_tick,
            "Headless session ended"
        );
        Ok(summary)
    }

    /// Apply one command and collect its responses.
    pub fn execute(&self, sim: &mut Simulation, command: &Command) -> Vec<Response> {
        let name = command.name();
        match command {
            Command::Tick { count } => {
                if *count > MAX_TICKS_PER_COMMAND {
                    return vec![Response::error(
                        format!("count {count} exceeds {MAX_TICKS_PER_COMMAND}"),
                        Some(name),
                    )];
                }
                let mut responses = Vec::new();
                for _ in 0..*count {
                    let events = sim.tick();
                    if let Some(outcome) = events.outcome {
                        responses.push(Response::wave_ended(events.tick, outcome));
                    }
                }
                responses.push(if self.config.auto_state_output {
                    Response::state(sim)
                } else {
                    Response::ack(name)
                });
                responses
            }
            Command::Query => vec![Response::state(sim)],
            Command::StartWave => {
                if sim.start_wave() {
                    vec![Response::ack(name)]
                } else {
                    let reason = match sim.phase() {
                        WavePhase::Running => "a wave is already running",
                        WavePhase::Defeated => "the run was defeated; reset first",
                        WavePhase::Idle => "the wave could not be started",
                    };
                    vec![Response::error(reason, Some(name))]
                }
            }
            Command::Reset => {
                sim.reset_run();
                vec![Response::ack(name)]
            }
            Command::CycleSpeed => {
                sim.cycle_speed();
                vec![Response::ack(name)]
            }
            Command::Spawn { side, role, x, y } => {
                let Some(side) = parse_side(side) else {
                    return vec![Response::error(format!("Unknown side: {side}"), Some(name))];
                };
                let Some(role) = parse_role(role) else {
                    return vec![Response::error(format!("Unknown role: {role}"), Some(name))];
                };
                match sim.spawn_unit_at(side, role, GridPos::new(*x, *y)) {
                    Ok(unit_id) => vec![Response::Spawned {
                        unit_id,
                        role: role.name().to_string(),
                    }],
                    Err(e) => vec![Response::error(e.to_string(), Some(name))],
                }
            }
            Command::Hash => vec![Response::StateHash {
                tick: sim.get_tick(),
                hash: sim.state_hash(),
            }],
            Command::Render => vec![Response::Board {
                tick: sim.get_tick(),
                text: render_board(sim, &AsciiConfig::plain()),
            }],
            Command::Quit => vec![Response::Bye],
        }
    }
}

fn send<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()
}
