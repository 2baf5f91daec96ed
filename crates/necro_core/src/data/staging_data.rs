//! Staging zone tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grid::GridPos;

/// Named group of preferred spawn cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ZoneId {
    /// Line closest to the opposing side.
    Front,
    /// Middle ranks.
    Mid,
    /// Back ranks.
    Rear,
    /// Top edge.
    FlankLeft,
    /// Bottom edge.
    FlankRight,
    /// Allied tank slots.
    Elite,
    /// Enemy boss slots.
    Boss,
}

/// One side's zone-to-cells table. Cell order inside a zone is preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingTable {
    /// Cells per zone.
    pub zones: BTreeMap<ZoneId, Vec<GridPos>>,
}

fn cells(coords: &[(i32, i32)]) -> Vec<GridPos> {
    coords.iter().map(|&(x, y)| GridPos::new(x, y)).collect()
}

impl StagingTable {
    /// Cells of `zone`, empty when this side does not define it.
    #[must_use]
    pub fn cells(&self, zone: ZoneId) -> &[GridPos] {
        self.zones.get(&zone).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every cell of every zone.
    pub fn all_cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.zones.values().flatten().copied()
    }

    /// Allied staging for the standard 14 x 6 board.
    #[must_use]
    pub fn standard_ally() -> Self {
        let mut zones = BTreeMap::new();
        zones.insert(
            ZoneId::Front,
            cells(&[
                (4, 2),
                (4, 3),
                (5, 2),
                (5, 3),
                (4, 1),
                (4, 4),
                (5, 1),
                (5, 4),
                (4, 0),
                (4, 5),
            ]),
        );
        zones.insert(
            ZoneId::Mid,
            cells(&[(3, 2), (3, 3), (3, 1), (3, 4), (2, 2), (2, 3)]),
        );
        zones.insert(
            ZoneId::Rear,
            cells(&[(2, 1), (2, 4), (2, 0), (2, 5), (3, 0), (3, 5)]),
        );
        zones.insert(ZoneId::FlankLeft, cells(&[(3, 0), (4, 0), (5, 0), (6, 0)]));
        zones.insert(ZoneId::FlankRight, cells(&[(3, 5), (4, 5), (5, 5), (6, 5)]));
        zones.insert(ZoneId::Elite, cells(&[(3, 2), (3, 3), (2, 2), (2, 3)]));
        Self { zones }
    }

    /// Enemy staging for the standard 14 x 6 board.
    #[must_use]
    pub fn standard_enemy() -> Self {
        let mut zones = BTreeMap::new();
        zones.insert(
            ZoneId::Front,
            cells(&[
                (9, 2),
                (9, 3),
                (10, 2),
                (10, 3),
                (9, 1),
                (9, 4),
                (10, 1),
                (10, 4),
            ]),
        );
        zones.insert(ZoneId::Mid, cells(&[(11, 2), (11, 3), (11, 1), (11, 4)]));
        zones.insert(ZoneId::Rear, cells(&[(12, 2), (12, 3), (12, 1), (12, 4)]));
        zones.insert(ZoneId::FlankLeft, cells(&[(10, 0), (9, 0)]));
        zones.insert(ZoneId::FlankRight, cells(&[(10, 5), (9, 5)]));
        zones.insert(ZoneId::Boss, cells(&[(12, 2), (12, 3)]));
        Self { zones }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_zone_is_empty() {
        let enemy = StagingTable::standard_enemy();
        assert!(enemy.cells(ZoneId::Elite).is_empty());
        assert_eq!(enemy.cells(ZoneId::Boss).len(), 2);
    }

    #[test]
    fn test_zone_order_preserved() {
        let ally = StagingTable::standard_ally();
        assert_eq!(ally.cells(ZoneId::Front)[0], GridPos::new(4, 2));
        assert_eq!(ally.cells(ZoneId::Front)[9], GridPos::new(4, 5));
    }
}
