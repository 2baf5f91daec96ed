//! Wave composition, round lifecycle and rewards.
//!
//! # State machine
//!
//! ```text
//!            start             no enemies left
//!   Idle ───────────► Running ────────────────► Idle   (souls += reward)
//!    ▲                   │
//!    │ reset             │ no allies left, enemies remain
//!    └──── Defeated ◄────┘
//! ```
//!
//! `start` is a no-op outside `Idle`, so a defeated run has to be reset
//! before the next wave.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::RuleSet;
use crate::registry::UnitRegistry;
use crate::staging::spawn_squad;
use crate::summon::ManaPool;
use crate::unit::{Role, Side, UnitId};

/// Round phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WavePhase {
    /// Waiting for a start command.
    #[default]
    Idle,
    /// Combat ticks are running.
    Running,
    /// The allies were wiped out. Only a reset leaves this phase.
    Defeated,
}

impl WavePhase {
    /// Lowercase name used in logs and the headless protocol.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Defeated => "defeated",
        }
    }
}

/// How a running wave ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveOutcome {
    /// Every enemy died.
    Victory {
        /// Wave number that was cleared.
        wave: u32,
        /// Souls awarded.
        reward: u32,
    },
    /// Every summon died while enemies remained.
    Defeat {
        /// Wave number that was lost.
        wave: u32,
    },
}

/// How the last squad of an enemy pack is sized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackRounding {
    /// The final squad is cut down to what is left of the pack, so exactly
    /// the pack count is attempted.
    #[default]
    Exact,
    /// Every squad is attempted at full size, so the pack count is rounded
    /// up to a whole number of squads.
    WholeSquads,
}

/// A group of same-role enemies requested for a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyPack {
    /// Enemy role.
    pub role: Role,
    /// Units requested.
    pub count: u32,
}

/// Enemy packs for wave `n`.
///
/// Melee grows by one every two waves; archers join from wave 2 and grow
/// by one every three waves after that.
#[must_use]
pub fn compose_wave(n: u32) -> Vec<EnemyPack> {
    let mut packs = vec![EnemyPack {
        role: Role::EnemyMelee,
        count: 2 + n / 2,
    }];
    if n >= 2 {
        packs.push(EnemyPack {
            role: Role::EnemyArcher,
            count: 1 + (n - 1) / 3,
        });
    }
    packs
}

/// Souls awarded for clearing `wave`.
#[must_use]
pub const fn victory_reward(wave: u32) -> u32 {
    2 + wave / 3
}

/// Split a pack of `count` into squad sizes.
#[must_use]
pub fn squad_sizes(count: u32, squad_size: u32, rounding: PackRounding) -> Vec<u32> {
    let size = squad_size.max(1);
    let mut left = count;
    let mut sizes = Vec::new();
    while left > 0 {
        let this = match rounding {
            PackRounding::Exact => size.min(left),
            PackRounding::WholeSquads => size,
        };
        sizes.push(this);
        left = left.saturating_sub(size);
    }
    sizes
}

/// Place every pack of wave `n` squad by squad. Returns the ids placed.
pub fn spawn_wave(registry: &mut UnitRegistry, rules: &RuleSet, n: u32) -> Vec<UnitId> {
    let mut placed = Vec::new();
    for pack in compose_wave(n) {
        let size = rules.squad_size(pack.role);
        for squad in squad_sizes(pack.count, size, rules.waves.pack_rounding) {
            placed.extend(spawn_squad(registry, rules, Side::Enemy, pack.role, squad));
        }
    }
    placed
}

/// Owner of the wave counter, the round phase, souls and mana.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveDirector {
    wave: u32,
    phase: WavePhase,
    souls: u32,
    mana: ManaPool,
}

impl WaveDirector {
    /// A fresh run: wave 0, idle, no souls, empty mana.
    #[must_use]
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            wave: 0,
            phase: WavePhase::Idle,
            souls: 0,
            mana: ManaPool::from_rules(&rules.summon),
        }
    }

    /// Number of waves started this run.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.wave
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> WavePhase {
        self.phase
    }

    /// Whether a wave is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == WavePhase::Running
    }

    /// Souls banked this run.
    #[must_use]
    pub const fn souls(&self) -> u32 {
        self.souls
    }

    /// The mana pool.
    #[must_use]
    pub const fn mana(&self) -> &ManaPool {
        &self.mana
    }

    /// Mutable access for the summon phase.
    pub fn mana_mut(&mut self) -> &mut ManaPool {
        &mut self.mana
    }

    /// Begin the next wave if idle. Returns the enemy ids placed, or `None`
    /// if the command was ignored.
    pub fn start(&mut self, registry: &mut UnitRegistry, rules: &RuleSet) -> Option<Vec<UnitId>> {
        if self.phase != WavePhase::Idle {
            return None;
        }

        self.phase = WavePhase::Running;
        self.wave += 1;
        self.mana.add_capped(rules.summon.wave_start_bonus);

        let enemies = spawn_wave(registry, rules, self.wave);
        info!(wave = self.wave, enemies = enemies.len(), "Wave started");
        Some(enemies)
    }

    /// Check a running wave for victory or defeat and apply the outcome.
    pub fn evaluate(&mut self, registry: &UnitRegistry) -> Option<WaveOutcome> {
        if self.phase != WavePhase::Running {
            return None;
        }

        let enemies = registry.living_population(Side::Enemy);
        let allies = registry.living_population(Side::Ally);

        if enemies == 0 {
            let reward = victory_reward(self.wave);
            self.souls += reward;
            self.phase = WavePhase::Idle;
            info!(wave = self.wave, reward, souls = self.souls, "Wave cleared");
            Some(WaveOutcome::Victory {
                wave: self.wave,
                reward,
            })
        } else if allies == 0 {
            self.phase = WavePhase::Defeated;
            info!(wave = self.wave, enemies, "Run defeated");
            Some(WaveOutcome::Defeat { wave: self.wave })
        } else {
            None
        }
    }

    /// Back to a fresh run.
    pub fn reset(&mut self, rules: &RuleSet) {
        *self = Self::new(rules);
    }
}
