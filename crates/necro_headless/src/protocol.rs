//! JSON protocol for headless communication.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** State updates and responses
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0",...}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner answers each command; `tick` also reports any wave that ended
//! 4. `quit` (or end of input) gets a final `bye`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0,"seed":7}
//! -> {"cmd":"start_wave"}
//! <- {"type":"ack","cmd":"start_wave"}
//! -> {"cmd":"tick","count":300}
//! <- {"type":"wave_ended","tick":212,"wave":1,"result":"victory","reward":2}
//! <- {"type":"state","tick":300,"phase":"idle",...}
//! -> {"cmd":"spawn","side":"enemy","role":"enemy_melee","x":9,"y":2}
//! <- {"type":"spawned","unit_id":31,"role":"EnemyMelee"}
//! -> {"cmd":"render"}
//! <- {"type":"board","tick":300,"text":"..."}
//! ```

use necro_core::simulation::Simulation;
use necro_core::unit::{Role, Side};
use necro_core::wave::WaveOutcome;
use serde::{Deserialize, Serialize};

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance simulation by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Query current state without advancing time.
    Query,

    /// Start the next wave.
    StartWave,

    /// Clear the board and start a fresh run.
    Reset,

    /// Rotate the speed multiplier.
    CycleSpeed,

    /// Place a unit on a specific cell.
    Spawn {
        /// `ally` or `enemy`.
        side: String,
        /// Role name, case-insensitive; `enemy_melee` style is accepted.
        role: String,
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },

    /// Report the state hash (for determinism verification).
    Hash,

    /// Draw the board as text.
    Render,

    /// Quit the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
        /// Simulation seed.
        seed: u64,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// Command that failed, if it parsed.
        cmd: Option<String>,
    },

    /// Current state.
    State(StateSnapshot),

    /// A unit was placed by `spawn`.
    Spawned {
        /// New unit id.
        unit_id: u64,
        /// Role display name.
        role: String,
    },

    /// A wave ended during a `tick` command.
    WaveEnded {
        /// Tick the wave ended on.
        tick: u64,
        /// Wave number.
        wave: u32,
        /// Outcome.
        result: WaveResult,
        /// Souls awarded (0 on defeat).
        reward: u32,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash value.
        hash: u64,
    },

    /// Text rendering of the board.
    Board {
        /// Current tick.
        tick: u64,
        /// Rows joined with newlines.
        text: String,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Everything a controller needs to follow the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Current tick.
    pub tick: u64,
    /// `idle`, `running` or `defeated`.
    pub phase: String,
    /// Waves started this run.
    pub wave: u32,
    /// Souls banked.
    pub souls: u32,
    /// Current mana (display only).
    pub mana: f64,
    /// Mana rounded down.
    pub mana_whole: u32,
    /// Speed multiplier.
    pub speed: u32,
    /// Living units in id order.
    pub units: Vec<UnitState>,
    /// Corpse markers.
    pub corpses: Vec<CorpseState>,
    /// State hash.
    pub hash: u64,
}

/// State of a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    /// Unit id.
    pub id: u64,
    /// `ally` or `enemy`.
    pub side: String,
    /// Role display name.
    pub role: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
}

/// A corpse marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpseState {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Milliseconds left.
    pub remaining_ms: i64,
}

/// Wave result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveResult {
    /// Every enemy died.
    Victory,
    /// Every summon died.
    Defeat,
}

// ============================================================================
// Helpers
// ============================================================================

impl StateSnapshot {
    /// Capture the simulation.
    #[must_use]
    pub fn capture(sim: &Simulation) -> Self {
        let units = sim
            .units()
            .into_iter()
            .map(|view| UnitState {
                id: view.id,
                side: view.side.as_str().to_string(),
                role: view.role.name().to_string(),
                x: view.position.x,
                y: view.position.y,
                health: view.health,
                max_health: view.max_health,
            })
            .collect();
        let corpses = sim
            .corpses()
            .iter()
            .map(|corpse| CorpseState {
                x: corpse.position.x,
                y: corpse.position.y,
                remaining_ms: corpse.remaining,
            })
            .collect();

        Self {
            tick: sim.get_tick(),
            phase: sim.phase().as_str().to_string(),
            wave: sim.wave(),
            souls: sim.souls(),
            mana: sim.mana().to_num::<f64>(),
            mana_whole: sim.director().mana().whole(),
            speed: sim.speed(),
            units,
            corpses,
            hash: sim.state_hash(),
        }
    }
}

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64, seed: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
            seed,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Create a state response.
    pub fn state(sim: &Simulation) -> Self {
        Self::State(StateSnapshot::capture(sim))
    }

    /// Create a wave-ended response.
    pub fn wave_ended(tick: u64, outcome: WaveOutcome) -> Self {
        match outcome {
            WaveOutcome::Victory { wave, reward } => Self::WaveEnded {
                tick,
                wave,
                result: WaveResult::Victory,
                reward,
            },
            WaveOutcome::Defeat { wave } => Self::WaveEnded {
                tick,
                wave,
                result: WaveResult::Defeat,
                reward: 0,
            },
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::StartWave => "start_wave",
            Self::Reset => "reset",
            Self::CycleSpeed => "cycle_speed",
            Self::Spawn { .. } => "spawn",
            Self::Hash => "hash",
            Self::Render => "render",
            Self::Quit => "quit",
        }
    }
}

/// Parse `ally` / `enemy` (case-insensitive).
pub fn parse_side(name: &str) -> Option<Side> {
    [Side::Ally, Side::Enemy]
        .into_iter()
        .find(|side| side.as_str().eq_ignore_ascii_case(name))
}

/// Parse a role name; underscores are ignored, so `enemy_melee` matches
/// `EnemyMelee`.
pub fn parse_role(name: &str) -> Option<Role> {
    let compact: String = name.chars().filter(|c| *c != '_').collect();
    Role::from_name(&compact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let json = r#"{"cmd":"tick","count":60}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(cmd, Command::Tick { count: 60 });
    }

    #[test]
    fn test_default_tick_count() {
        let json = r#"{"cmd":"tick"}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(cmd, Command::Tick { count: 1 });
    }

    #[test]
    fn test_parse_spawn_command() {
        let json = r#"{"cmd":"spawn","side":"enemy","role":"enemy_archer","x":9,"y":4}"#;
        let cmd = Command::from_json(json).unwrap();
        assert!(matches!(
            cmd,
            Command::Spawn { ref side, ref role, x: 9, y: 4 } if side == "enemy" && role == "enemy_archer"
        ));
        assert_eq!(cmd.name(), "spawn");
    }

    #[test]
    fn test_unit_commands_parse() {
        assert_eq!(
            Command::from_json(r#"{"cmd":"start_wave"}"#).unwrap(),
            Command::StartWave
        );
        assert_eq!(Command::from_json(r#"{"cmd":"reset"}"#).unwrap(), Command::Reset);
        assert_eq!(
            Command::from_json(r#"{"cmd":"cycle_speed"}"#).unwrap(),
            Command::CycleSpeed
        );
        assert!(Command::from_json(r#"{"cmd":"fly"}"#).is_err());
    }

    #[test]
    fn test_serialize_state_response() {
        let sim = Simulation::new(3);
        let json = Response::state(&sim).to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"state""#));
        assert!(json.contains(r#""phase":"idle""#));
        assert!(json.contains(r#""role":"Necromancer""#));
    }

    #[test]
    fn test_wave_ended_response() {
        let json = Response::wave_ended(40, WaveOutcome::Victory { wave: 3, reward: 3 }).to_json_line();
        assert!(json.contains(r#""type":"wave_ended""#));
        assert!(json.contains(r#""result":"victory""#));
        assert!(json.contains(r#""reward":3"#));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_side("ALLY"), Some(Side::Ally));
        assert_eq!(parse_side("neutral"), None);
        assert_eq!(parse_role("enemy_melee"), Some(Role::EnemyMelee));
        assert_eq!(parse_role("golem"), Some(Role::Golem));
        assert_eq!(parse_role("dragon"), None);
    }
}
