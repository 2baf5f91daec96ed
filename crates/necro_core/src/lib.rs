//! # Necro Core
//!
//! Deterministic simulation core for the Necro auto-battler.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No system randomness (a seeded [`rng::SimRng`] lives in the simulation)
//! - No floating-point math (integer milliseconds, fixed-point mana)
//!
//! This separation enables:
//! - Headless runs and batch balance testing
//! - Replay recording and verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - Board bounds, cell coordinates and the per-tick occupancy snapshot
//! - [`unit`] - Unit records, sides, roles, corpses
//! - [`registry`] - Ownership and lifecycle of every unit
//! - [`staging`] - Spawn cell allocation from ordered staging zones
//! - [`combat`] - Per-unit targeting, attack and movement decisions
//! - [`summon`] - Mana accrual and the priority summon loop
//! - [`wave`] - Wave composition, round lifecycle and rewards
//! - [`simulation`] - The tick scheduler tying the phases together
//! - [`data`] - Data-driven rule tables
//! - [`replay`] - Command recording and playback

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod data;
pub mod error;
pub mod grid;
pub mod math;
pub mod registry;
pub mod replay;
pub mod rng;
pub mod simulation;
pub mod staging;
pub mod summon;
pub mod unit;
pub mod wave;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::data::{RoleData, RoleStats, RuleSet, StagingTable, ZoneId};
    pub use crate::error::{GameError, Result};
    pub use crate::grid::{GridBounds, GridPos, Occupancy};
    pub use crate::math::{Fixed, Millis};
    pub use crate::registry::UnitRegistry;
    pub use crate::simulation::{SimCommand, Simulation, TickEvents};
    pub use crate::summon::{ManaPool, MAX_SUMMON_ATTEMPTS};
    pub use crate::unit::{Corpse, Health, Role, Side, Unit, UnitId, UnitView};
    pub use crate::wave::{PackRounding, WaveOutcome, WavePhase};
}
