//! Spawn cell allocation from ordered staging zones.

use std::collections::HashSet;

use tracing::debug;

use crate::data::{RuleSet, ZoneId};
use crate::grid::GridPos;
use crate::registry::UnitRegistry;
use crate::unit::{Role, Side, UnitId};

/// Read-only view used to pick spawn cells.
///
/// The allocator never mutates the registry. Callers placing several units
/// at once thread an exclusion set through consecutive calls so the same
/// cell is not handed out twice before the units actually exist.
#[derive(Debug, Clone, Copy)]
pub struct StagingAllocator<'a> {
    registry: &'a UnitRegistry,
    rules: &'a RuleSet,
}

impl<'a> StagingAllocator<'a> {
    /// Create an allocator over the current registry state.
    #[must_use]
    pub const fn new(registry: &'a UnitRegistry, rules: &'a RuleSet) -> Self {
        Self { registry, rules }
    }

    fn is_available(&self, pos: GridPos, exclude: &HashSet<GridPos>) -> bool {
        self.rules.bounds().contains(pos)
            && !exclude.contains(&pos)
            && self.registry.is_cell_free(pos)
    }

    /// First free staging cell for `role` on `side`, or the nearest free
    /// fallback cell, or `None` when both are exhausted.
    #[must_use]
    pub fn allocate(&self, side: Side, role: Role, exclude: &HashSet<GridPos>) -> Option<GridPos> {
        let table = self.rules.staging(side);
        let zones = self
            .rules
            .role(role)
            .map_or(&[ZoneId::Mid][..], |data| data.zone_order());

        zones
            .iter()
            .flat_map(|&zone| table.cells(zone).iter().copied())
            .find(|&pos| self.is_available(pos, exclude))
            .or_else(|| self.fallback(side, exclude))
    }

    /// Nearest free cell to the side's anchor inside the fallback band.
    ///
    /// Scans columns outer, rows inner; the first cell at the minimum
    /// distance wins.
    fn fallback(&self, side: Side, exclude: &HashSet<GridPos>) -> Option<GridPos> {
        let anchor = self.rules.fallback_anchor(side);
        let band = self.rules.fallback;
        let mut best: Option<(GridPos, u32)> = None;

        for x in band.min_x..=band.max_x {
            for y in 0..self.rules.board.height {
                let pos = GridPos::new(x, y);
                if !self.is_available(pos, exclude) {
                    continue;
                }
                let distance = pos.manhattan_distance(anchor);
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((pos, distance));
                }
            }
        }

        best.map(|(pos, _)| pos)
    }
}

/// Place up to `limit` units of `role` on `side`, one allocation per member.
///
/// Stops early when no cell is left. Returns the ids placed, in order.
pub fn spawn_squad(
    registry: &mut UnitRegistry,
    rules: &RuleSet,
    side: Side,
    role: Role,
    limit: u32,
) -> Vec<UnitId> {
    let Ok(stats) = rules.stats(role).copied() else {
        return Vec::new();
    };

    let mut taken = HashSet::new();
    let mut placed = Vec::new();

    for _ in 0..limit {
        let Some(pos) = StagingAllocator::new(registry, rules).allocate(side, role, &taken) else {
            break;
        };
        taken.insert(pos);
        let id = registry.spawn(side, role, pos, &stats);
        debug!(id, side = side.as_str(), role = role.name(), x = pos.x, y = pos.y, "Unit spawned");
        placed.push(id);
    }

    placed
}
