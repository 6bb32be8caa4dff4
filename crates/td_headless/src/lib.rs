//! Headless match runner for balance testing and CI verification.
//!
//! This crate plays tower-defense matches without any frontend. Scripted
//! strategies issue the same commands a player would, so every match can
//! be recorded, replayed and checked for determinism:
//!
//! - **Balance testing**: run many seeds in parallel and compare outcomes
//! - **CI verification**: confirm recorded matches replay to the same hash
//! - **Content inspection**: print generated maps and wave lists
//!
//! # Example
//!
//! ```bash
//! # Run one match and save its recording
//! cargo run -p td_headless -- run --scenario standard --record match.replay
//!
//! # Run a batch of 200 seeds
//! cargo run -p td_headless -- batch --scenario small --count 200
//!
//! # Verify a recording
//! cargo run -p td_headless -- replay --file match.replay --verify
//! ```

pub mod batch;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod scenario;
pub mod strategies;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, DeterminismReport};
pub use error::{Result, RunnerError};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use runner::{run_match, MatchResult};
pub use scenario::Scenario;
pub use strategies::{Strategy, StrategyExecutor};
