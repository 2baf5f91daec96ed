//! Headless necro auto-battler runner.
//!
//! This binary runs the simulation without graphics, controlled via JSON on
//! stdin/stdout or on autoplay. Designed for scripted controllers, CI and
//! balance runs.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p necro_headless
//!
//! # Autoplay 500 seeds of the standard scenario
//! cargo run -p necro_headless -- batch --count 500 --output results/
//!
//! # Record an autoplay run, then check it replays to the same hash
//! cargo run -p necro_headless -- record --seed 7 --output run.replay
//! cargo run -p necro_headless -- replay --file run.replay --verify
//!
//! # Watch a run in the terminal
//! cargo run -p necro_headless -- watch --seed 3 --every 10
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use necro_core::replay::{Recorder, Replay, ReplayPlayer};
use necro_core::simulation::{SimCommand, Simulation};
use necro_core::unit::Side;
use necro_core::wave::WavePhase;
use necro_headless::{
    ascii_visualizer::{render_board, AsciiConfig},
    batch::{run_batch, verify_determinism, BatchConfig},
    game_runner::Autoplay,
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "necro_headless")]
#[command(about = "Headless necro auto-battler runner for scripted play and balance runs")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a JSON-lines session on stdin/stdout
    Run {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Seed override
        #[arg(long)]
        seed: Option<u64>,

        /// Answer `tick` with an ack instead of the full state
        #[arg(long)]
        quiet_ticks: bool,
    },

    /// Autoplay many seeds for balance testing
    Batch {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit override (0 = the scenario's own)
        #[arg(long, default_value = "0")]
        max_ticks: u64,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Record an autoplay run to a replay file
    Record {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Seed to record
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Replay file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Play back a recorded run
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify the replay reproduces its final hash
        #[arg(long)]
        verify: bool,
    },

    /// Run N autoplay ticks and report throughput
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "36000")]
        ticks: u64,

        /// Preset name or scenario file
        #[arg(short, long, default_value = "endless")]
        scenario: String,
    },

    /// Autoplay a run and draw the board in the terminal
    Watch {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Seed to play
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Draw every N ticks
        #[arg(long, default_value = "10")]
        every: u64,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print a scenario's rule set as RON
    DumpRules {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "standard")]
        scenario: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for protocol
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            seed,
            quiet_ticks,
        }) => cmd_run(&scenario, seed, quiet_ticks),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => cmd_batch(scenario, count, parallel, output, seed, max_ticks),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(&scenario, seed, runs),
        Some(Commands::Record {
            scenario,
            seed,
            output,
        }) => cmd_record(&scenario, seed, output),
        Some(Commands::Replay { file, verify }) => cmd_replay(file, verify),
        Some(Commands::Benchmark { ticks, scenario }) => cmd_benchmark(ticks, &scenario),
        Some(Commands::Watch {
            scenario,
            seed,
            every,
            no_color,
        }) => cmd_watch(&scenario, seed, every, no_color),
        Some(Commands::DumpRules { scenario }) => cmd_dump_rules(&scenario),
        None => cmd_run("standard", None, false),
    }
}

fn load_scenario(name: &str) -> Scenario {
    match Scenario::resolve(name) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, scenario = name, "Failed to load scenario");
            eprintln!("Failed to load scenario '{name}': {e}");
            process::exit(1);
        }
    }
}

/// Serve an interactive session
fn cmd_run(scenario: &str, seed: Option<u64>, quiet_ticks: bool) {
    tracing::info!("Starting interactive session");

    let runner = HeadlessRunner::with_config(HeadlessConfig {
        auto_state_output: !quiet_ticks,
        scenario: load_scenario(scenario),
        seed,
    });
    if let Err(e) = runner.run_stdio() {
        tracing::error!(error = %e, "Session failed");
        process::exit(1);
    }
}

fn cmd_batch(
    scenario: String,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    max_ticks: u64,
) {
    tracing::info!(
        scenario = %scenario,
        count,
        parallel,
        seed,
        max_ticks,
        output = %output.display(),
        "Batch configuration"
    );

    let config = BatchConfig::new(&scenario, count)
        .with_output(output.clone())
        .with_seed(seed)
        .with_max_ticks(max_ticks)
        .with_threads(parallel);

    let results = match run_batch(config) {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(error = %e, "Batch failed");
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Games FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Throughput: {:.1} games/sec",
        results.games.len() as f64 / results.duration_seconds.max(0.001)
    );
    eprintln!(
        "Waves cleared: avg {:.2} (min {}, max {})",
        summary.avg_waves_cleared, summary.min_waves_cleared, summary.max_waves_cleared
    );
    eprintln!("Defeat rate: {:.1}%", summary.defeat_rate * 100.0);
    eprintln!("Average souls: {:.1}", summary.avg_souls);
    eprintln!("Average K/D: {:.2}", summary.avg_kd_ratio);

    let mut squads: Vec<_> = summary.avg_squads_by_role.iter().collect();
    squads.sort_by(|a, b| a.0.cmp(b.0));
    eprintln!("\nSquads per run:");
    for (role, avg) in squads {
        eprintln!("  {role}: {avg:.1}");
    }

    for failure in results.errors.iter().take(10) {
        eprintln!(
            "  Game {} (seed {}): {}",
            failure.game_index, failure.seed, failure.message
        );
    }

    eprintln!("\nResults saved to: {}", results_path.display());
    if !results.errors.is_empty() {
        process::exit(1);
    }
}

fn cmd_verify(scenario: &str, seed: u64, runs: u32) {
    tracing::info!(scenario, seed, runs, "Verifying determinism");

    match verify_determinism(scenario, seed, runs) {
        Ok(true) => {
            eprintln!("PASS: {runs} runs of seed {seed} ended identically");
        }
        Ok(false) => {
            eprintln!("FAIL: runs of seed {seed} diverged");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    }
}

fn cmd_record(scenario: &str, seed: u64, output: PathBuf) {
    let scenario = load_scenario(scenario);
    let sim = match scenario.build_simulation(seed) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };
    let autoplay = Autoplay::new(&scenario, &sim);
    let mut recorder = match Recorder::new(scenario.name.clone(), sim) {
        Ok(recorder) => recorder,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };

    while autoplay.finished(recorder.simulation()).is_none() {
        if recorder.simulation().phase() == WavePhase::Idle {
            recorder.apply(SimCommand::StartWave);
        }
        recorder.tick();
    }

    let end = autoplay.finished(recorder.simulation()).unwrap_or_default();
    let (replay, sim) = recorder.finish();
    if let Err(e) = replay.save(&output) {
        eprintln!("FATAL: Failed to save replay: {e}");
        process::exit(1);
    }

    tracing::info!(
        path = %output.display(),
        ticks = replay.final_tick,
        commands = replay.command_count(),
        "Replay saved"
    );
    eprintln!(
        "Recorded {} ticks ({}, wave {}, {} souls), hash {:016x}",
        replay.final_tick,
        end.as_str(),
        sim.wave(),
        sim.souls(),
        replay.final_hash
    );
}

fn cmd_replay(file: PathBuf, verify: bool) {
    tracing::info!(path = %file.display(), verify, "Loading replay");

    let replay = match Replay::load(&file) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            process::exit(1);
        }
    };
    eprintln!(
        "Replay '{}' (seed {}, {} ticks, {} commands)",
        replay.scenario_id,
        replay.seed,
        replay.final_tick,
        replay.command_count()
    );

    let mut player = match ReplayPlayer::new(replay) {
        Ok(player) => player,
        Err(e) => {
            eprintln!("Failed to restore replay: {e}");
            process::exit(1);
        }
    };

    if verify {
        match player.verify() {
            Ok(()) => eprintln!("PASS: final hash reproduced"),
            Err(e) => {
                eprintln!("FAIL: {e}");
                process::exit(1);
            }
        }
        return;
    }

    while player.advance() {}
    let sim = player.simulation();
    eprintln!(
        "Played to tick {}: wave {} ({}), {} souls, hash {:016x}",
        sim.get_tick(),
        sim.wave(),
        sim.phase().as_str(),
        sim.souls(),
        sim.state_hash()
    );
}

fn cmd_benchmark(ticks: u64, scenario: &str) {
    let scenario = load_scenario(scenario);
    tracing::info!(ticks, scenario = %scenario.name, "Running tick benchmark");

    let mut sim = match scenario.build_simulation(scenario.seed) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };

    let step = |sim: &mut Simulation| {
        if sim.phase() != WavePhase::Running && !sim.start_wave() {
            sim.reset_run();
            sim.start_wave();
        }
        sim.tick();
    };

    // Warmup
    for _ in 0..100 {
        step(&mut sim);
    }

    let start = Instant::now();
    for _ in 0..ticks {
        step(&mut sim);
    }
    let elapsed = start.elapsed();
    let tps = ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {ticks}");
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Ticks/second: {tps:.1}");
    eprintln!(
        "ms/tick: {:.4}",
        elapsed.as_secs_f64() * 1000.0 / ticks.max(1) as f64
    );
    eprintln!("Final wave: {}", sim.wave());
    eprintln!("Living units: {}", sim.registry().living().count());
    eprintln!("State hash: {:016x}", sim.state_hash());
}

fn cmd_watch(scenario: &str, seed: u64, every: u64, no_color: bool) {
    let scenario = load_scenario(scenario);
    let mut sim = match scenario.build_simulation(seed) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };
    let config = AsciiConfig {
        use_color: !no_color,
        ..AsciiConfig::default()
    };
    let every = every.max(1);
    let autoplay = Autoplay::new(&scenario, &sim);

    while let Some(step) = autoplay.step(&mut sim) {
        if step.events.outcome.is_some() || step.events.tick % every == 0 {
            println!("{}\n", render_board(&sim, &config));
        }
        if let Some(outcome) = step.events.outcome {
            println!("== {outcome:?} ==\n");
        }
    }

    let end = autoplay.finished(&sim).unwrap_or_default();
    println!(
        "Run over ({}): wave {}, {} souls, {} summons alive",
        end.as_str(),
        sim.wave(),
        sim.souls(),
        sim.registry().living_population(Side::Ally)
    );
}

fn cmd_dump_rules(scenario: &str) {
    let scenario = load_scenario(scenario);
    match scenario.rules.to_ron_string() {
        Ok(ron) => println!("{ron}"),
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    }
}
