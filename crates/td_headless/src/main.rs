//! Headless tower-defense runner.
//!
//! Plays matches without graphics for balance testing, CI verification and
//! content inspection. Logs go to stderr; reports go to stdout or files.
//!
//! # Usage
//!
//! ```bash
//! # Run a single match
//! cargo run -p td_headless -- run --scenario standard --seed 7
//!
//! # Run batch balance test
//! cargo run -p td_headless -- batch --scenario small --count 500 --output results/
//!
//! # Check that one seed always ends in the same state
//! cargo run -p td_headless -- verify --scenario standard --seed 12345
//!
//! # Print a generated map and its waves
//! cargo run -p td_headless -- map --seed 3
//! cargo run -p td_headless -- waves --seed 3 --count 20
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use td_core::config::MapConfig;
use td_core::grid::GameMap;
use td_core::replay::{Replay, ReplayPlayer};
use td_core::wave_generator::WaveGenerator;
use td_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::run_match,
    scenario::{Scenario, SCENARIO_NAMES},
    strategies::{Strategy, STRATEGY_NAMES},
};

#[derive(Parser)]
#[command(name = "td_headless")]
#[command(about = "Headless tower-defense runner for balance testing and CI")]
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
    /// Run a single match
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Strategy override
        #[arg(long)]
        strategy: Option<String>,

        /// Match seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Tick limit (0 = the scenario's own limit)
        #[arg(short, long, default_value = "0")]
        ticks: u64,

        /// Save the recording here
        #[arg(long)]
        record: Option<PathBuf>,

        /// Print metrics as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Run batch of matches for balance testing
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Strategy override
        #[arg(long)]
        strategy: Option<String>,

        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit (0 = the scenario's own limit)
        #[arg(short, long, default_value = "0")]
        ticks: u64,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "standard")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Tick limit (0 = the scenario's own limit)
        #[arg(short, long, default_value = "0")]
        ticks: u64,
    },

    /// Print a generated map
    Map {
        /// Map seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Size preset: small, default or large
        #[arg(short, long, default_value = "default")]
        preset: String,
    },

    /// Print generated waves
    Waves {
        /// Wave seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of waves
        #[arg(short, long, default_value = "10")]
        count: u32,

        /// Print full waves as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Replay a recorded match
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },

    /// List built-in scenarios and strategies
    List,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            strategy,
            seed,
            ticks,
            record,
            json,
        }) => cmd_run(&scenario, strategy.as_deref(), seed, ticks, record, json),
        Some(Commands::Batch {
            scenario,
            strategy,
            count,
            parallel,
            output,
            seed,
            ticks,
        }) => {
            let mut config = BatchConfig::new(&scenario, count)
                .with_output(output)
                .with_seed(seed)
                .with_max_ticks(ticks)
                .with_parallel(parallel);
            config.strategy = strategy;
            cmd_batch(config);
        }
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        }) => cmd_verify(&scenario, seed, runs, ticks),
        Some(Commands::Map { seed, preset }) => cmd_map(seed, &preset),
        Some(Commands::Waves { seed, count, json }) => cmd_waves(seed, count, json),
        Some(Commands::Replay { file, verify }) => cmd_replay(file, verify),
        Some(Commands::List) | None => cmd_list(),
    }
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    tracing::error!(error = %error, "{context}");
    eprintln!("FATAL: {context}: {error}");
    std::process::exit(1);
}

fn load_scenario(name: &str, strategy: Option<&str>) -> Scenario {
    let scenario = Scenario::resolve(name).unwrap_or_else(|e| fail("Failed to load scenario", e));
    match strategy {
        Some(s) => scenario
            .with_strategy(Strategy::named(s).unwrap_or_else(|e| fail("Failed to load strategy", e))),
        None => scenario,
    }
}

/// Run a single match
fn cmd_run(
    scenario: &str,
    strategy: Option<&str>,
    seed: u64,
    ticks: u64,
    record: Option<PathBuf>,
    json: bool,
) {
    let scenario = load_scenario(scenario, strategy);
    let max_ticks = if ticks == 0 { scenario.max_ticks } else { ticks };

    let result =
        run_match(&scenario, seed, max_ticks).unwrap_or_else(|e| fail("Match failed", e));

    if let Some(path) = record {
        if let Err(e) = result.replay.save(&path) {
            fail("Failed to save replay", e);
        }
        tracing::info!(path = %path.display(), commands = result.replay.command_count(), "Saved replay");
    }

    let metrics = &result.metrics;
    if json {
        match serde_json::to_string_pretty(metrics) {
            Ok(text) => println!("{text}"),
            Err(e) => fail("Failed to encode metrics", e),
        }
        return;
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("MATCH COMPLETE: {} (seed {})", scenario.name, seed);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Strategy:        {}", metrics.strategy);
    eprintln!("Duration:        {} ticks", metrics.duration_ticks);
    eprintln!(
        "Waves:           {} survived ({} clean) of {} started",
        metrics.waves_survived, metrics.waves_clean, metrics.waves_started
    );
    eprintln!("Lives left:      {}", metrics.lives_left);
    eprintln!(
        "Enemies:         {} killed, {} leaked",
        metrics.enemies_killed, metrics.enemies_leaked
    );
    eprintln!(
        "Currency:        {} earned, {} spent, {} left",
        metrics.currency_earned, metrics.currency_spent, metrics.final_balance
    );
    eprintln!(
        "Build:           {} turrets, {} upgrades, {} rejected",
        metrics.turrets_built, metrics.upgrades_bought, metrics.commands_rejected
    );
    for (kind, share) in metrics.kill_shares() {
        eprintln!("  {kind:<10} {:>5.1}% of kills", share * 100.0);
    }
    eprintln!("State hash:      {:016x}", metrics.final_state_hash);
}

/// Run batch of matches for balance testing
fn cmd_batch(config: BatchConfig) {
    let output = config.output_dir.clone();
    if let Err(e) = std::fs::create_dir_all(&output) {
        fail("Cannot create output directory", e);
    }

    let results = run_batch(config).unwrap_or_else(|e| fail("Batch failed", e));

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        fail("Failed to save results", e);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Matches played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Matches failed: {}", results.errors.len());
    }
    eprintln!(
        "Waves survived: avg {:.1}, min {}, max {}",
        summary.avg_waves_survived, summary.min_waves_survived, summary.max_waves_survived
    );
    eprintln!(
        "Game over:      {} of {}",
        summary.games_over, summary.total_games
    );
    eprintln!(
        "Per match:      {:.0} kills, {:.1} leaks, {:.0} earned",
        summary.avg_kills, summary.avg_leaks, summary.avg_earned
    );
    for (kind, share) in &summary.kill_shares {
        eprintln!("  {kind:<10} {:>5.1}% of kills", share * 100.0);
    }
    if let Some(kind) = summary.dominant_turret(0.6) {
        eprintln!("WARNING: {kind} lands over 60% of all kills");
    }
    eprintln!("Duration:       {:.1}s", results.duration_seconds);
    eprintln!("Results saved:  {}", results_path.display());
}

/// Verify determinism by running same seed multiple times
fn cmd_verify(scenario: &str, seed: u64, runs: u32, ticks: u64) {
    let scenario = load_scenario(scenario, None);
    let max_ticks = if ticks == 0 { scenario.max_ticks } else { ticks };
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    let report = verify_determinism(&scenario, seed, runs, max_ticks)
        .unwrap_or_else(|e| fail("Verification failed", e));

    if report.is_deterministic() {
        eprintln!("PASS: All {runs} runs produced identical results");
        if let Some(hash) = report.hashes.first() {
            eprintln!("  Final hash: {hash:016x}");
        }
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (run, hash) in report.hashes.iter().enumerate() {
            eprintln!("  run {run}: {hash:016x}");
        }
        if !report.replays_verified {
            eprintln!("  at least one recording did not replay to its own hash");
        }
        std::process::exit(1);
    }
}

/// Print a generated map
fn cmd_map(seed: u64, preset: &str) {
    let config = match preset {
        "small" => MapConfig::small(),
        "large" => MapConfig::large(),
        "default" => MapConfig::default(),
        other => fail("Unknown map preset", other),
    };
    let map = GameMap::generate(&config, seed).unwrap_or_else(|e| fail("Map generation failed", e));

    println!("{}", map.render_ascii());
    eprintln!(
        "{}x{} map, seed {seed}: {} path cells, {} waypoints, length {}",
        config.width,
        config.height,
        map.path_cells().len(),
        map.waypoints().len(),
        map.path_length()
    );
}

/// Print generated waves
fn cmd_waves(seed: u64, count: u32, json: bool) {
    let mut generator = WaveGenerator::new(seed, Default::default());
    let waves = generator.preview(count);

    if json {
        match serde_json::to_string_pretty(&waves) {
            Ok(text) => println!("{text}"),
            Err(e) => fail("Failed to encode waves", e),
        }
        return;
    }

    for wave in &waves {
        let boss = if generator.is_boss_wave(wave.index) {
            " (boss)"
        } else {
            ""
        };
        println!(
            "wave {:>3}{boss}: {:>4} enemies, weight {:>5}/{:<5} reward {}",
            wave.index,
            wave.enemy_count(),
            wave.total_weight(),
            generator.budget(wave.index),
            wave.reward
        );
        for group in &wave.groups {
            println!(
                "          {:>3} x {:<12} every {}s",
                group.amount,
                group.kind.blueprint().name,
                group.delay_between
            );
        }
    }
}

/// Replay a recorded match
fn cmd_replay(file: PathBuf, verify: bool) {
    let replay = Replay::load(&file).unwrap_or_else(|e| fail("Failed to load replay", e));

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Commands: {}", replay.command_count());
    eprintln!("  Duration: {} ticks", replay.final_tick);

    if verify {
        eprintln!("Verifying replay...");
        match replay.verify() {
            Ok(hash) => {
                eprintln!("PASS: Replay verification successful");
                eprintln!("  Hash: {hash:016x}");
            }
            Err(e) => {
                eprintln!("FAIL: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let mut player = ReplayPlayer::new(replay).unwrap_or_else(|e| fail("Failed to create replay player", e));
    let mut last_reported = 0;
    while player.advance() {
        let percent = player.progress_percent() as u32;
        if percent >= last_reported + 10 {
            last_reported = percent - percent % 10;
            let sim = player.simulation();
            eprintln!(
                "  {:>3}%  tick {:>6}  wave {:>3}  lives {:>3}  balance {}",
                last_reported,
                player.current_tick(),
                sim.wave(),
                sim.lives(),
                sim.balance()
            );
        }
    }
    let sim = player.simulation();
    eprintln!(
        "Replay finished at tick {}: {} waves survived, {} lives, hash {:016x}",
        player.current_tick(),
        sim.waves_survived(),
        sim.lives(),
        sim.state_hash()
    );
}

/// List built-in scenarios and strategies
fn cmd_list() {
    println!("Scenarios:");
    for name in SCENARIO_NAMES {
        if let Ok(scenario) = Scenario::named(name) {
            println!("  {name:<10} {}", scenario.description);
        }
    }
    println!("Strategies:");
    for name in STRATEGY_NAMES {
        if let Ok(strategy) = Strategy::named(name) {
            println!("  {name:<10} {}", strategy.description);
        }
    }
}
