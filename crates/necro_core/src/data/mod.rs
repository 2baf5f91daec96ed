//! Data structures for rule configuration.
//!
//! This module contains the data tables that drive the simulation: per-role
//! stats, staging zones for both sides, the summon economy and combat
//! timing. All structs are designed to be deserialized from RON files, and
//! every `Default` reproduces the standard game.

mod role_data;
mod rules;
mod staging_data;

pub use role_data::{RoleData, RoleStats};
pub use rules::{
    BoardRules, CombatRules, FallbackBand, RuleSet, SummonPriority, SummonRules, WaveRules,
    MAX_BOARD_CELLS,
};
pub use staging_data::{StagingTable, ZoneId};
