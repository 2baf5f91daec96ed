//! Board geometry and the per-tick occupancy snapshot.
//!
//! The board is a fixed rectangle of integer cells with no terrain. Every
//! distance question in the simulation (targeting, kiting, spawn fallback)
//! is answered with the Manhattan metric.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::unit::{Unit, UnitId};

/// A cell coordinate on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column, growing from the allied side toward the enemy side.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Create a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance (`|dx| + |dy|`) to another cell.
    #[must_use]
    pub const fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The cell offset by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Per-axis sign of the direction from `self` toward `other`.
    #[must_use]
    pub const fn step_toward(self, other: Self) -> (i32, i32) {
        ((other.x - self.x).signum(), (other.y - self.y).signum())
    }
}

/// Fixed rectangular board bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    /// Number of columns.
    pub width: i32,
    /// Number of rows.
    pub height: i32,
}

impl GridBounds {
    /// Create bounds of `width` columns by `height` rows.
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// A cell is in-bounds iff `0 <= x < width` and `0 <= y < height`.
    #[must_use]
    pub const fn contains(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// Total number of cells.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        if self.width <= 0 || self.height <= 0 {
            0
        } else {
            (self.width as usize).saturating_mul(self.height as usize)
        }
    }
}

/// Mapping from cell to the single living unit standing on it.
///
/// Built once per tick before any unit acts. Moves made during the tick
/// [`claim`](Self::claim) their destination but never release the cell they
/// left, so the snapshot only ever grows: two movers cannot land on the same
/// cell and two neighbours cannot swap places within one tick.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    cells: HashMap<GridPos, UnitId>,
}

impl Occupancy {
    /// Build the snapshot from living units. Dead units are skipped.
    pub fn build<'a>(units: impl IntoIterator<Item = &'a Unit>) -> Self {
        let cells = units
            .into_iter()
            .filter(|unit| unit.is_alive())
            .map(|unit| (unit.position, unit.id))
            .collect();
        Self { cells }
    }

    /// Whether any living unit was (or has moved) on `pos` this tick.
    #[must_use]
    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.cells.contains_key(&pos)
    }

    /// The unit recorded on `pos`, if any.
    #[must_use]
    pub fn occupant(&self, pos: GridPos) -> Option<UnitId> {
        self.cells.get(&pos).copied()
    }

    /// Mark `pos` as taken by `unit` for the rest of the tick.
    pub fn claim(&mut self, pos: GridPos, unit: UnitId) {
        self.cells.insert(pos, unit);
    }

    /// Number of marked cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
