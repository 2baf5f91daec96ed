//! Headless runner for the necro auto-battler.
//!
//! This crate drives [`necro_core::simulation::Simulation`] without any
//! renderer, either from JSON commands on stdin or fully on autoplay. This
//! enables:
//!
//! - **Scripted play**: a controller can start waves and inspect the board
//! - **Balance runs**: many seeds on autoplay in parallel, with metrics
//! - **Replay verification**: check that recordings reproduce their hash
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from the controller (tick, start_wave, spawn, ...)
//! - **stdout**: State updates and responses (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See the [`protocol`] module for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! printf '{"cmd":"start_wave"}\n{"cmd":"tick","count":50}\n' | cargo run -p necro_headless
//!
//! # Autoplay 200 seeds of the standard scenario
//! cargo run -p necro_headless -- batch --count 200 --output results/
//!
//! # Verify determinism
//! cargo run -p necro_headless -- verify --seed 7 --runs 5
//! ```

pub mod ascii_visualizer;
pub mod batch;
pub mod game_runner;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use ascii_visualizer::{render_board, AsciiConfig};
pub use batch::{run_batch, BatchConfig, BatchError, BatchResults};
pub use game_runner::{run_game, GameConfig, GameResult, GameRunner};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner, RunnerError};
pub use scenario::{Scenario, ScenarioError};
