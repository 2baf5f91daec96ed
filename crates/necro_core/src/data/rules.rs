//! The complete rule set driving a simulation.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{RoleData, RoleStats, StagingTable};
use crate::error::{GameError, Result};
use crate::grid::{GridBounds, GridPos};
use crate::math::Millis;
use crate::unit::{Role, Side};
use crate::wave::PackRounding;

/// Largest board, in cells, a rule set may describe.
pub const MAX_BOARD_CELLS: usize = 1 << 16;

/// Board dimensions and the necromancer's home cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRules {
    /// Number of columns.
    pub width: i32,
    /// Number of rows.
    pub height: i32,
    /// Where the necromancer stands after every reset.
    pub spawner_home: GridPos,
}

impl Default for BoardRules {
    fn default() -> Self {
        Self {
            width: 14,
            height: 6,
            spawner_home: GridPos::new(1, 2),
        }
    }
}

/// Column band searched when every staging cell is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackBand {
    /// First column searched.
    pub min_x: i32,
    /// Last column searched (inclusive).
    pub max_x: i32,
}

impl Default for FallbackBand {
    fn default() -> Self {
        Self { min_x: 2, max_x: 11 }
    }
}

/// One entry of the summon priority list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonPriority {
    /// Role to summon.
    pub role: Role,
    /// Stop summoning this role once this many are alive.
    pub up_to: u32,
}

impl SummonPriority {
    /// Create a priority entry.
    #[must_use]
    pub const fn new(role: Role, up_to: u32) -> Self {
        Self { role, up_to }
    }
}

/// Mana economy and the summon priority list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonRules {
    /// Mana capacity.
    pub mana_max: u32,
    /// Mana regenerated per simulated second.
    pub mana_regen_per_sec: u32,
    /// Living allied population (spawner excluded) the summon loop stops at.
    pub soft_cap: u32,
    /// Mana granted when a wave starts.
    pub wave_start_bonus: u32,
    /// Evaluated in order every summon iteration.
    pub priority: Vec<SummonPriority>,
}

impl Default for SummonRules {
    fn default() -> Self {
        Self {
            mana_max: 30,
            mana_regen_per_sec: 5,
            soft_cap: 18,
            wave_start_bonus: 8,
            priority: vec![
                SummonPriority::new(Role::Golem, 1),
                SummonPriority::new(Role::Wraith, 2),
                SummonPriority::new(Role::Warrior, 999),
                SummonPriority::new(Role::Archer, 2),
            ],
        }
    }
}

/// Movement and combat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatRules {
    /// Delay after a successful move before the next one.
    pub move_cooldown_ms: Millis,
    /// How long a corpse marker stays visible.
    pub corpse_lifetime_ms: Millis,
    /// Chance per tick that an out-of-reach ranged unit shuffles forward.
    pub ranged_advance_percent: u32,
    /// Lowest column a cornered ranged unit backs into.
    pub retreat_min_x: i32,
    /// Highest column a shuffling ranged unit advances to.
    pub advance_max_x: i32,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            move_cooldown_ms: 150,
            corpse_lifetime_ms: 3000,
            ranged_advance_percent: 20,
            retreat_min_x: 2,
            advance_max_x: 11,
        }
    }
}

/// Enemy wave generation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveRules {
    /// How the last squad of a pack is sized.
    #[serde(default)]
    pub pack_rounding: PackRounding,
}

/// Every table and constant the simulation reads.
///
/// `RuleSet::default()` is the standard game. Rule files only need the
/// sections they change:
///
/// ```ron
/// RuleSet(
///     summon: SummonRules(
///         mana_max: 40,
///         mana_regen_per_sec: 6,
///         soft_cap: 20,
///         wave_start_bonus: 8,
///         priority: [
///             SummonPriority(role: Warrior, up_to: 999),
///         ],
///     ),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Simulated milliseconds per tick at 1x speed.
    pub tick_ms: Millis,
    /// Board dimensions.
    pub board: BoardRules,
    /// Per-role stats, squad sizes, costs and zones.
    pub roles: Vec<RoleData>,
    /// Allied staging zones.
    pub ally_staging: StagingTable,
    /// Enemy staging zones.
    pub enemy_staging: StagingTable,
    /// Fallback search band.
    pub fallback: FallbackBand,
    /// Summon economy.
    pub summon: SummonRules,
    /// Combat timing.
    pub combat: CombatRules,
    /// Wave generation.
    pub waves: WaveRules,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            board: BoardRules::default(),
            roles: RoleData::standard_roles(),
            ally_staging: StagingTable::standard_ally(),
            enemy_staging: StagingTable::standard_enemy(),
            fallback: FallbackBand::default(),
            summon: SummonRules::default(),
            combat: CombatRules::default(),
            waves: WaveRules::default(),
        }
    }
}

impl RuleSet {
    /// Load a rule set from a RON file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let rules: Self = ron::from_str(&contents).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Parse a rule set from a RON string and validate it.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let rules: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Pretty RON rendering, suitable as a starting point for a rule file.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize rules: {e}")))
    }

    /// Board bounds.
    #[must_use]
    pub const fn bounds(&self) -> GridBounds {
        GridBounds::new(self.board.width, self.board.height)
    }

    /// Data for `role`, if defined.
    #[must_use]
    pub fn role(&self, role: Role) -> Option<&RoleData> {
        self.roles.iter().find(|data| data.role == role)
    }

    /// Stats for `role`.
    pub fn stats(&self, role: Role) -> Result<&RoleStats> {
        self.role(role)
            .map(|data| &data.stats)
            .ok_or(GameError::MissingRole(role))
    }

    /// Squad size for `role` (1 when undefined).
    #[must_use]
    pub fn squad_size(&self, role: Role) -> u32 {
        self.role(role).map_or(1, |data| data.squad_size)
    }

    /// Summon cost for `role`, if summonable.
    #[must_use]
    pub fn summon_cost(&self, role: Role) -> Option<u32> {
        self.role(role).and_then(|data| data.summon_cost)
    }

    /// The staging table for `side`.
    #[must_use]
    pub const fn staging(&self, side: Side) -> &StagingTable {
        match side {
            Side::Ally => &self.ally_staging,
            Side::Enemy => &self.enemy_staging,
        }
    }

    /// The cell the fallback search measures distance from.
    ///
    /// Allies gather around the necromancer; enemies around their backline
    /// column on the necromancer's row.
    #[must_use]
    pub const fn fallback_anchor(&self, side: Side) -> GridPos {
        match side {
            Side::Ally => self.board.spawner_home,
            Side::Enemy => GridPos::new(self.board.width - 2, self.board.spawner_home.y),
        }
    }

    /// Check the rule set for inconsistencies the simulation cannot recover from.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(GameError::InvalidRules(msg));

        if self.tick_ms <= 0 {
            return invalid(format!("tick_ms must be positive, got {}", self.tick_ms));
        }
        if self.board.width <= 0 || self.board.height <= 0 {
            return invalid(format!(
                "board must be non-empty, got {}x{}",
                self.board.width, self.board.height
            ));
        }

        let bounds = self.bounds();
        if bounds.cell_count() > MAX_BOARD_CELLS {
            return invalid(format!(
                "board of {}x{} exceeds {MAX_BOARD_CELLS} cells",
                self.board.width, self.board.height
            ));
        }
        if !bounds.contains(self.board.spawner_home) {
            return Err(GameError::OutOfBounds(self.board.spawner_home));
        }

        let mut seen = BTreeSet::new();
        for data in &self.roles {
            if !seen.insert(data.role) {
                return invalid(format!("role {:?} is defined twice", data.role));
            }
            if data.squad_size == 0 {
                return invalid(format!("role {:?} has squad_size 0", data.role));
            }
        }
        for role in Role::ALL {
            if !seen.contains(&role) {
                return Err(GameError::MissingRole(role));
            }
        }

        for entry in &self.summon.priority {
            if self.summon_cost(entry.role).is_none() {
                return invalid(format!(
                    "role {:?} is in the summon priority list but has no summon_cost",
                    entry.role
                ));
            }
            if entry.role.is_spawner() {
                return invalid("the necromancer cannot summon itself".to_string());
            }
        }

        for side in [Side::Ally, Side::Enemy] {
            if let Some(cell) = self.staging(side).all_cells().find(|c| !bounds.contains(*c)) {
                return Err(GameError::OutOfBounds(cell));
            }
        }

        if self.fallback.min_x > self.fallback.max_x {
            return invalid(format!(
                "fallback band is empty: {}..={}",
                self.fallback.min_x, self.fallback.max_x
            ));
        }
        if self.combat.ranged_advance_percent > 100 {
            return invalid(format!(
                "ranged_advance_percent must be at most 100, got {}",
                self.combat.ranged_advance_percent
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ZoneId;

    #[test]
    fn test_default_rules_are_valid() {
        RuleSet::default().validate().unwrap();
    }

    #[test]
    fn test_default_lookups() {
        let rules = RuleSet::default();
        assert_eq!(rules.squad_size(Role::Warrior), 3);
        assert_eq!(rules.squad_size(Role::EnemyArcher), 2);
        assert_eq!(rules.summon_cost(Role::Golem), Some(10));
        assert_eq!(rules.summon_cost(Role::EnemyMelee), None);
        assert_eq!(rules.stats(Role::Archer).unwrap().range, 4);
        assert_eq!(rules.fallback_anchor(Side::Ally), GridPos::new(1, 2));
        assert_eq!(rules.fallback_anchor(Side::Enemy), GridPos::new(12, 2));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let rules = RuleSet::from_ron_str("RuleSet(tick_ms: 50)").unwrap();
        assert_eq!(rules.tick_ms, 50);
        assert_eq!(rules.summon, SummonRules::default());
        assert_eq!(rules.board, BoardRules::default());
    }

    #[test]
    fn test_ron_round_trip() {
        let rules = RuleSet::default();
        let text = rules.to_ron_string().unwrap();
        let parsed = RuleSet::from_ron_str(&text).unwrap();
        assert_eq!(parsed, rules);
    }

    #[test]
    fn test_rejects_out_of_bounds_staging() {
        let mut rules = RuleSet::default();
        rules
            .enemy_staging
            .zones
            .insert(ZoneId::Boss, vec![GridPos::new(14, 2)]);
        assert!(matches!(rules.validate(), Err(GameError::OutOfBounds(_))));
    }

    #[test]
    fn test_rejects_oversized_board() {
        let mut rules = RuleSet::default();
        rules.board.width = 70_000;
        assert!(matches!(rules.validate(), Err(GameError::InvalidRules(_))));

        rules.board.width = i32::MAX;
        rules.board.height = i32::MAX;
        assert!(matches!(rules.validate(), Err(GameError::InvalidRules(_))));
    }

    #[test]
    fn test_rejects_missing_role() {
        let mut rules = RuleSet::default();
        rules.roles.retain(|data| data.role != Role::EnemyArcher);
        assert!(matches!(
            rules.validate(),
            Err(GameError::MissingRole(Role::EnemyArcher))
        ));
    }

    #[test]
    fn test_rejects_uncosted_priority() {
        let mut rules = RuleSet::default();
        rules
            .summon
            .priority
            .push(SummonPriority::new(Role::EnemyMelee, 3));
        assert!(matches!(rules.validate(), Err(GameError::InvalidRules(_))));
    }

    #[test]
    fn test_parse_error_reports_inline_path() {
        let err = RuleSet::from_ron_str("RuleSet(tick_ms: )").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { ref path, .. } if path == "<inline>"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RuleSet::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }
}
