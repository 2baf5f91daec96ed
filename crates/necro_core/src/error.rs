//! Error types for the game simulation.
//!
//! The tick itself is total: allocation failures and illegal commands are
//! ordinary outcomes, not errors. Errors only surface at the edges, when
//! loading rule data, placing units explicitly, or moving state in and out
//! of bytes.

use thiserror::Error;

use crate::grid::GridPos;
use crate::unit::{Role, UnitId};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid unit identifier.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// A cell lies outside the board.
    #[error("Cell ({}, {}) is out of bounds", .0.x, .0.y)]
    OutOfBounds(GridPos),

    /// A cell already holds a living unit.
    #[error("Cell ({}, {}) is occupied by unit {occupant}", .pos.x, .pos.y)]
    CellOccupied {
        /// The requested cell.
        pos: GridPos,
        /// The living unit standing there.
        occupant: UnitId,
    },

    /// A role is referenced but has no entry in the rule set.
    #[error("No rules defined for role {0:?}")]
    MissingRole(Role),

    /// Rule data failed validation.
    #[error("Invalid rules: {0}")]
    InvalidRules(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Replay playback ended on a different state than was recorded.
    #[error("Replay diverged at tick {tick}: recorded hash {expected}, got {actual}")]
    ReplayMismatch {
        /// Final tick of the playback.
        tick: u64,
        /// Hash stored in the replay.
        expected: u64,
        /// Hash produced by playback.
        actual: u64,
    },
}
