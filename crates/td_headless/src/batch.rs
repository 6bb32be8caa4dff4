//! Batch match runner for balance testing.
//!
//! Runs many seeds of one scenario in parallel using rayon and aggregates
//! the metrics into a [`BatchSummary`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::{BatchSummary, GameMetrics};
use crate::runner::run_match;
use crate::scenario::Scenario;
use crate::strategies::Strategy;

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Built-in scenario name or path to a RON scenario
    pub scenario: String,
    /// Number of matches to run
    pub game_count: u32,
    /// Maximum parallel matches (0 = use rayon default)
    pub parallel_games: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed; match `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Maximum ticks per match (0 = the scenario's own limit)
    pub max_ticks: u64,
    /// Strategy override
    pub strategy: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "standard".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: 0,
            strategy: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    #[must_use]
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick limit
    #[must_use]
    pub const fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    /// Set the parallelism
    #[must_use]
    pub const fn with_parallel(mut self, games: u32) -> Self {
        self.parallel_games = games;
        self
    }

    /// Override the scenario's strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: &str) -> Self {
        self.strategy = Some(strategy.to_string());
        self
    }

    /// Resolve the scenario with any strategy override applied.
    pub fn load_scenario(&self) -> Result<Scenario> {
        let scenario = Scenario::resolve(&self.scenario)?;
        match &self.strategy {
            Some(name) => Ok(scenario.with_strategy(Strategy::named(name)?)),
            None => Ok(scenario),
        }
    }

    fn tick_limit(&self, scenario: &Scenario) -> u64 {
        if self.max_ticks == 0 {
            scenario.max_ticks
        } else {
            self.max_ticks
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual match metrics in seed order
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Match index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total matches
    pub total: u32,
    completed: AtomicU32,
    waves_survived: AtomicU64,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            waves_survived: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed match
    pub fn record_completion(&self, waves_survived: u32) {
        self.waves_survived
            .fetch_add(u64::from(waves_survived), Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Average waves survived so far
    pub fn average_waves(&self) -> f64 {
        let completed = self.current();
        if completed == 0 {
            return 0.0;
        }
        self.waves_survived.load(Ordering::Relaxed) as f64 / f64::from(completed)
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let per_game = self.start_time.elapsed().as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_game * f64::from(remaining))
    }

    /// Display progress to stderr
    pub fn display(&self) {
        let eta = self.eta();
        eprintln!(
            "Batch progress: {}/{} ({:.1}%), avg waves {:.1}, ETA {}m {}s",
            self.current(),
            self.total,
            self.percentage(),
            self.average_waves(),
            eta.as_secs() / 60,
            eta.as_secs() % 60
        );
    }
}

/// Run a batch of matches
pub fn run_batch(config: BatchConfig) -> Result<BatchResults> {
    let start = Instant::now();
    let scenario = config.load_scenario()?;
    let max_ticks = config.tick_limit(&scenario);
    let progress = BatchProgress::new(config.game_count);

    info!(
        games = config.game_count,
        scenario = %scenario.name,
        strategy = %scenario.strategy.name,
        max_ticks,
        "Starting batch run"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel_games as usize)
        .build()
        .map_err(std::io::Error::other)?;

    let results: Vec<std::result::Result<GameMetrics, BatchError>> = pool.install(|| {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                match run_match(&scenario, seed, max_ticks) {
                    Ok(result) => {
                        progress.record_completion(result.metrics.waves_survived);
                        let completed = progress.current();
                        if completed % 10 == 0 {
                            debug!("Progress: {}/{}", completed, config.game_count);
                        }
                        if completed % 100 == 0 {
                            progress.display();
                        }
                        Ok(result.metrics)
                    }
                    Err(e) => {
                        warn!("Match {} failed: {}", i, e);
                        Err(BatchError {
                            game_index: i,
                            seed,
                            message: e.to_string(),
                        })
                    }
                }
            })
            .collect()
    });

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    let games: Vec<GameMetrics> = games.into_iter().filter_map(|r| r.ok()).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(|r| r.err()).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} matches in {:.1}s ({:.1} matches/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    Ok(BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    /// Seed checked.
    pub seed: u64,
    /// Final state hash of every run.
    pub hashes: Vec<u64>,
    /// Whether every recording replayed to its own hash.
    pub replays_verified: bool,
}

impl DeterminismReport {
    /// Every run ended in the same state and every replay verified.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.replays_verified && self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Verify determinism by running the same seed multiple times in parallel
/// and replaying each recording.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: u64,
    runs: u32,
    max_ticks: u64,
) -> Result<DeterminismReport> {
    let results = (0..runs)
        .into_par_iter()
        .map(|_| run_match(scenario, seed, max_ticks))
        .collect::<Result<Vec<_>>>()?;

    let mut replays_verified = true;
    for result in &results {
        let replayed = result.replay.verify()?;
        replays_verified &= replayed == result.metrics.final_state_hash;
    }

    Ok(DeterminismReport {
        seed,
        hashes: results
            .iter()
            .map(|r| r.metrics.final_state_hash)
            .collect(),
        replays_verified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: u64 = 50 * 90;

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.game_count, 100);
        assert_eq!(config.scenario, "standard");
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("small", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_strategy("frugal");

        assert_eq!(config.scenario, "small");
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.load_scenario().unwrap().strategy, Strategy::frugal());
    }

    #[test]
    fn test_unknown_strategy_fails() {
        let config = BatchConfig::new("small", 1).with_strategy("turtle");
        assert!(run_batch(config).is_err());
    }

    #[test]
    fn test_progress_tracking() {
        let progress = BatchProgress::new(100);
        assert_eq!(progress.current(), 0);
        assert_eq!(progress.percentage(), 0.0);

        progress.record_completion(4);
        progress.record_completion(6);
        progress.record_completion(8);

        assert_eq!(progress.current(), 3);
        assert!((progress.average_waves() - 6.0).abs() < 1e-9);
        assert!((progress.percentage() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_batch_small() {
        let config = BatchConfig::new("small", 4)
            .with_max_ticks(SHORT)
            .with_parallel(2);
        let results = run_batch(config).unwrap();

        assert_eq!(results.games.len(), 4);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 4);
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_verify_determinism() {
        let report = verify_determinism(&Scenario::small(), 12345, 3, SHORT).unwrap();
        assert_eq!(report.hashes.len(), 3);
        assert!(report.is_deterministic());
    }

    #[test]
    fn test_batch_results_save_load() {
        let config = BatchConfig::new("idle", 2).with_max_ticks(500);
        let results = run_batch(config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games, results.games);
        assert_eq!(loaded.config, results.config);
    }
}
