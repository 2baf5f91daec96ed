//! ASCII board visualizer.
//!
//! Renders the simulation grid as text for the protocol `render` command
//! and the CLI `watch` view.

use std::fmt::Write;

use necro_core::simulation::Simulation;
use necro_core::unit::{Role, Side};

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Print a status line above the board.
    pub show_status: bool,
    /// Print the glyph legend below the board.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_status: true,
            show_legend: true,
            use_color: true,
        }
    }
}

impl AsciiConfig {
    /// Board only, no color; what the protocol sends.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            show_status: false,
            show_legend: false,
            use_color: false,
        }
    }
}

/// Glyph for a unit.
#[must_use]
pub fn unit_char(side: Side, role: Role) -> char {
    match (side, role) {
        (_, Role::Necromancer) => 'N',
        (_, Role::Warrior) => 'W',
        (_, Role::Archer) => 'A',
        (_, Role::Wraith) => 'R',
        (_, Role::Golem) => 'G',
        (Side::Enemy, Role::EnemyArcher) => 'a',
        (Side::Enemy, _) => 'e',
        (Side::Ally, Role::EnemyMelee | Role::EnemyArcher) => '?',
    }
}

/// Glyph for a corpse on an otherwise empty cell.
pub const CORPSE_CHAR: char = 'x';

/// Glyph for an empty cell.
pub const EMPTY_CHAR: char = '.';

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";

    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const GRAY: &str = "\x1b[90m";
}

fn unit_color(side: Side, role: Role, health_percent: u32) -> &'static str {
    if role.is_spawner() {
        return colors::MAGENTA;
    }
    match side {
        Side::Ally if health_percent <= 33 => colors::YELLOW,
        Side::Ally => colors::CYAN,
        Side::Enemy => colors::RED,
    }
}

/// Render the board, one text row per grid row.
#[must_use]
pub fn render_board(sim: &Simulation, config: &AsciiConfig) -> String {
    let bounds = sim.rules().bounds();
    let width = bounds.width.max(0) as usize;
    let height = bounds.height.max(0) as usize;

    let mut grid: Vec<Vec<(char, &'static str)>> = vec![vec![(EMPTY_CHAR, ""); width]; height];

    for corpse in sim.corpses() {
        if bounds.contains(corpse.position) {
            grid[corpse.position.y as usize][corpse.position.x as usize] =
                (CORPSE_CHAR, colors::GRAY);
        }
    }
    for unit in sim.registry().living() {
        if bounds.contains(unit.position) {
            let color = unit_color(unit.side, unit.role, unit.health.percentage());
            grid[unit.position.y as usize][unit.position.x as usize] =
                (unit_char(unit.side, unit.role), color);
        }
    }

    let mut output = String::new();

    if config.show_status {
        let _ = writeln!(
            output,
            "{}tick {} | wave {} ({}) | mana {} | souls {} | speed x{}{}",
            if config.use_color { colors::BOLD } else { "" },
            sim.get_tick(),
            sim.wave(),
            sim.phase().as_str(),
            sim.director().mana().whole(),
            sim.souls(),
            sim.speed(),
            if config.use_color { colors::RESET } else { "" },
        );
    }

    for (y, row) in grid.iter().enumerate() {
        if y > 0 {
            output.push('\n');
        }
        for &(ch, color) in row {
            if config.use_color && !color.is_empty() {
                output.push_str(color);
                output.push(ch);
                output.push_str(colors::RESET);
            } else {
                output.push(ch);
            }
        }
    }

    if config.show_legend {
        output.push_str(
            "\nN=necromancer W=warrior A=archer R=wraith G=golem e=enemy a=enemy archer x=corpse",
        );
    }

    output
}
