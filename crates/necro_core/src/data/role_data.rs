//! Role data structures for data-driven unit definitions.

use serde::{Deserialize, Serialize};

use super::ZoneId;
use crate::math::Millis;
use crate::unit::Role;

/// Base combat statistics for a role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleStats {
    /// Maximum health points.
    pub health: u32,

    /// Damage per attack.
    pub attack: u32,

    /// Attack reach in Manhattan cells. Above 1 means ranged.
    pub range: u32,

    /// Time between attacks in milliseconds.
    pub attack_cooldown_ms: Millis,
}

impl RoleStats {
    /// Create a stat block.
    #[must_use]
    pub const fn new(health: u32, attack: u32, range: u32, attack_cooldown_ms: Millis) -> Self {
        Self {
            health,
            attack,
            range,
            attack_cooldown_ms,
        }
    }
}

/// Data-driven role definition.
///
/// # Example RON
///
/// ```ron
/// RoleData(
///     role: Warrior,
///     stats: RoleStats(
///         health: 28,
///         attack: 6,
///         range: 1,
///         attack_cooldown_ms: 800,
///     ),
///     squad_size: 3,
///     summon_cost: Some(4),
///     zones: [Front, Mid],
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleData {
    /// The role described.
    pub role: Role,

    /// Base stats.
    pub stats: RoleStats,

    /// Units placed per squad spawn.
    #[serde(default = "default_squad_size")]
    pub squad_size: u32,

    /// Mana cost of one squad (None if the necromancer cannot summon it).
    #[serde(default)]
    pub summon_cost: Option<u32>,

    /// Staging zones scanned in order when placing this role.
    #[serde(default)]
    pub zones: Vec<ZoneId>,
}

/// Default squad size for roles without explicit size.
const fn default_squad_size() -> u32 {
    1
}

impl RoleData {
    /// Create role data with no cost and no zones.
    #[must_use]
    pub fn new(role: Role, stats: RoleStats, squad_size: u32) -> Self {
        Self {
            role,
            stats,
            squad_size,
            summon_cost: None,
            zones: Vec::new(),
        }
    }

    /// Builder method to set the summon cost.
    #[must_use]
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.summon_cost = Some(cost);
        self
    }

    /// Builder method to set the staging zones.
    #[must_use]
    pub fn with_zones(mut self, zones: impl Into<Vec<ZoneId>>) -> Self {
        self.zones = zones.into();
        self
    }

    /// The zones to scan, falling back to the mid zone when none are declared.
    #[must_use]
    pub fn zone_order(&self) -> &[ZoneId] {
        if self.zones.is_empty() {
            &[ZoneId::Mid]
        } else {
            &self.zones
        }
    }

    /// The standard table, one entry per role.
    #[must_use]
    pub fn standard_roles() -> Vec<Self> {
        use ZoneId::{Elite, FlankLeft, FlankRight, Front, Mid, Rear};

        vec![
            Self::new(Role::Necromancer, RoleStats::new(999, 0, 0, 999_000), 1),
            Self::new(Role::Warrior, RoleStats::new(28, 6, 1, 800), 3)
                .with_cost(4)
                .with_zones([Front, Mid]),
            Self::new(Role::Archer, RoleStats::new(18, 7, 4, 1000), 2)
                .with_cost(5)
                .with_zones([Rear, Mid]),
            Self::new(Role::Wraith, RoleStats::new(14, 9, 1, 700), 2)
                .with_cost(6)
                .with_zones([FlankLeft, FlankRight, Mid]),
            Self::new(Role::Golem, RoleStats::new(60, 10, 1, 1200), 1)
                .with_cost(10)
                .with_zones([Front, Elite]),
            Self::new(Role::EnemyMelee, RoleStats::new(24, 5, 1, 900), 3)
                .with_zones([Front, Mid]),
            Self::new(Role::EnemyArcher, RoleStats::new(16, 6, 4, 1000), 2)
                .with_zones([Rear, Mid]),
        ]
    }
}
