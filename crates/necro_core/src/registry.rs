//! Ownership and lifecycle of every unit.
//!
//! Units are kept in a `BTreeMap` keyed by id, so iteration order is spawn
//! order on every platform. "Registry scan order" everywhere else in the
//! crate means this order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::RoleStats;
use crate::grid::GridPos;
use crate::unit::{Role, Side, Unit, UnitId};

/// Result of applying damage to a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Health actually removed.
    pub dealt: u32,
    /// Whether this hit brought the unit to zero.
    pub killed: bool,
}

/// Storage for all units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRegistry {
    units: BTreeMap<UnitId, Unit>,
    next_id: UnitId,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    /// Create an empty registry. The first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Create a unit at full health and return its id.
    ///
    /// Placement legality is the caller's concern.
    pub fn spawn(&mut self, side: Side, role: Role, position: GridPos, stats: &RoleStats) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;

        let mut unit = Unit::new(id, side, role, position, stats);
        if role.is_spawner() {
            unit.attack_timer = stats.attack_cooldown_ms;
            unit.move_timer = stats.attack_cooldown_ms;
        }
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit by id. The necromancer cannot be removed.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        if self.units.get(&id).is_some_and(Unit::is_spawner) {
            return None;
        }
        self.units.remove(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Number of stored units, dead ones included until the next purge.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the registry holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The id the next spawn will receive.
    #[must_use]
    pub const fn next_id(&self) -> UnitId {
        self.next_id
    }

    /// All units in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Living units in id order.
    pub fn living(&self) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(|unit| unit.is_alive())
    }

    /// Ids of every stored unit in id order.
    #[must_use]
    pub fn ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// The necromancer, if one exists.
    #[must_use]
    pub fn spawner(&self) -> Option<&Unit> {
        self.units.values().find(|unit| unit.is_spawner())
    }

    /// Living units of `role` on `side`.
    #[must_use]
    pub fn living_count(&self, side: Side, role: Role) -> u32 {
        self.living()
            .filter(|unit| unit.side == side && unit.role == role)
            .count() as u32
    }

    /// Living units on `side`, the necromancer excluded.
    #[must_use]
    pub fn living_population(&self, side: Side) -> u32 {
        self.living()
            .filter(|unit| unit.side == side && !unit.is_spawner())
            .count() as u32
    }

    /// The living unit standing on `pos`, if any.
    #[must_use]
    pub fn living_at(&self, pos: GridPos) -> Option<UnitId> {
        self.living()
            .find(|unit| unit.position == pos)
            .map(|unit| unit.id)
    }

    /// Whether no living unit stands on `pos`.
    #[must_use]
    pub fn is_cell_free(&self, pos: GridPos) -> bool {
        self.living_at(pos).is_none()
    }

    /// Nearest living opponent of `id` and its Manhattan distance.
    ///
    /// Equal distances resolve to the opponent found first in id order.
    #[must_use]
    pub fn nearest_enemy(&self, id: UnitId) -> Option<(UnitId, u32)> {
        let unit = self.units.get(&id)?;
        let mut best: Option<(UnitId, u32)> = None;

        for other in self.living() {
            if other.side == unit.side {
                continue;
            }
            let distance = unit.position.manhattan_distance(other.position);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((other.id, distance));
            }
        }

        best
    }

    /// Apply `amount` damage to `target`, flooring health at zero.
    ///
    /// The necromancer ignores damage. Returns `None` if the target does
    /// not exist.
    pub fn apply_damage(&mut self, target: UnitId, amount: u32) -> Option<DamageOutcome> {
        let unit = self.units.get_mut(&target)?;
        if unit.is_spawner() || unit.health.is_dead() {
            return Some(DamageOutcome {
                dealt: 0,
                killed: false,
            });
        }

        let dealt = unit.health.apply_damage(amount);
        Some(DamageOutcome {
            dealt,
            killed: unit.health.is_dead(),
        })
    }

    /// Remove every dead unit and return them in id order.
    ///
    /// The necromancer is never removed.
    pub fn purge_dead(&mut self) -> Vec<Unit> {
        let dead: Vec<UnitId> = self
            .units
            .values()
            .filter(|unit| !unit.is_alive() && !unit.is_spawner())
            .map(|unit| unit.id)
            .collect();

        dead.into_iter()
            .filter_map(|id| self.units.remove(&id))
            .collect()
    }

    /// Remove every unit. Ids keep counting up from where they were.
    pub fn clear(&mut self) {
        self.units.clear();
    }
}
