//! Unit records and the read-only views handed to renderers.
//!
//! Units are pure data. They carry no presentation handle: a renderer keeps
//! its own id-to-sprite map and refreshes it from [`UnitView`] snapshots.

use serde::{Deserialize, Serialize};

use crate::data::RoleStats;
use crate::grid::GridPos;
use crate::math::Millis;

/// Unique identifier for units. Assigned in increasing order, never reused.
pub type UnitId = u64;

/// Faction tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// Summons and the necromancer.
    Ally,
    /// Wave units.
    Enemy,
}

impl Side {
    /// The opposing side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Ally => Self::Enemy,
            Self::Enemy => Self::Ally,
        }
    }

    /// Lowercase name used in logs and the headless protocol.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ally => "ally",
            Self::Enemy => "enemy",
        }
    }
}

/// Unit archetype with fixed base stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// The invulnerable spawner. Never fights, never dies.
    Necromancer,
    /// Cheap allied melee, spawned in threes.
    Warrior,
    /// Allied ranged unit.
    Archer,
    /// Fast-hitting allied melee flanker.
    Wraith,
    /// Allied tank.
    Golem,
    /// Wave melee.
    EnemyMelee,
    /// Wave ranged.
    EnemyArcher,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Necromancer,
        Self::Warrior,
        Self::Archer,
        Self::Wraith,
        Self::Golem,
        Self::EnemyMelee,
        Self::EnemyArcher,
    ];

    /// Whether this is the spawner role.
    #[must_use]
    pub const fn is_spawner(self) -> bool {
        matches!(self, Self::Necromancer)
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Necromancer => "Necromancer",
            Self::Warrior => "Warrior",
            Self::Archer => "Archer",
            Self::Wraith => "Wraith",
            Self::Golem => "Golem",
            Self::EnemyMelee => "EnemyMelee",
            Self::EnemyArcher => "EnemyArcher",
        }
    }

    /// Parse a role from its display name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(name))
    }
}

/// Health of a unit. `current` never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if the unit is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction so health floors at zero.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current = self.current.saturating_sub(actual);
        actual
    }

    /// Get health as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            let percent = u64::from(self.current) * 100 / u64::from(self.max);
            u32::try_from(percent).unwrap_or(100)
        }
    }
}

/// A unit on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier.
    pub id: UnitId,
    /// Owning side.
    pub side: Side,
    /// Archetype.
    pub role: Role,
    /// Current cell.
    pub position: GridPos,
    /// Current and maximum health.
    pub health: Health,
    /// Damage dealt per attack.
    pub attack: u32,
    /// Manhattan reach. Anything above 1 makes the unit ranged.
    pub range: u32,
    /// Time between attacks.
    pub attack_cooldown: Millis,
    /// Time left before the next attack is allowed.
    pub attack_timer: Millis,
    /// Time left before the next move is allowed.
    pub move_timer: Millis,
}

impl Unit {
    /// Create a unit at full health with both timers ready.
    #[must_use]
    pub fn new(id: UnitId, side: Side, role: Role, position: GridPos, stats: &RoleStats) -> Self {
        Self {
            id,
            side,
            role,
            position,
            health: Health::new(stats.health),
            attack: stats.attack,
            range: stats.range,
            attack_cooldown: stats.attack_cooldown_ms,
            attack_timer: 0,
            move_timer: 0,
        }
    }

    /// Whether the unit still has health left.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }

    /// Whether this is the necromancer.
    #[must_use]
    pub const fn is_spawner(&self) -> bool {
        self.role.is_spawner()
    }

    /// Ranged units kite and shuffle instead of closing in.
    #[must_use]
    pub const fn is_ranged(&self) -> bool {
        self.range > 1
    }

    /// Read-only view for renderers.
    #[must_use]
    pub const fn view(&self) -> UnitView {
        UnitView {
            id: self.id,
            side: self.side,
            role: self.role,
            position: self.position,
            health: self.health.current,
            max_health: self.health.max,
        }
    }
}

/// What a renderer needs to draw a unit and its health bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    /// Unit identifier, stable for the unit's lifetime.
    pub id: UnitId,
    /// Owning side.
    pub side: Side,
    /// Archetype.
    pub role: Role,
    /// Current cell.
    pub position: GridPos,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
}

/// Cosmetic marker left where a unit died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpse {
    /// Cell of the death.
    pub position: GridPos,
    /// Display time left.
    pub remaining: Millis,
}
