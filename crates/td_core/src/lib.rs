//! # TD Core
//!
//! Deterministic simulation core for a real-time tower-defence game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No input polling
//! - No system randomness (every stream is seeded from the match seed)
//! - No floating-point math at runtime (uses fixed-point)
//!
//! This separation enables:
//! - Headless batch runs and balance sweeps
//! - Replay recording and verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - Tile grid, procedural map and path generation
//! - [`pathfinding`] - A* between cells
//! - [`visibility`] - Turret field of view over the path
//! - [`wave_generator`] - Seeded wave composition and boss scripts
//! - [`spawner`] - Concurrent wave spawning and survival accounting
//! - [`enemy`] - Movement, health and status effects
//! - [`turret`] - Targeting, firing and upgrades
//! - [`projectile`] - Bullets, lasers and melee strikes
//! - [`economy`] - Currency ledger
//! - [`clock`] - Match state and the between-wave timer
//! - [`simulation`] - The match context and its tick
//! - [`replay`] - Command recording and playback
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod clock;
pub mod config;
pub mod economy;
pub mod enemy;
pub mod enemy_data;
pub mod error;
pub mod grid;
pub mod math;
pub mod noise;
pub mod pathfinding;
pub mod pool;
pub mod projectile;
pub mod replay;
pub mod scheduler;
pub mod simulation;
pub mod spawner;
pub mod targeting;
pub mod turret;
pub mod turret_data;
pub mod visibility;
pub mod wave;
pub mod wave_generator;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{GameClock, MatchState, TimeScale};
    pub use crate::config::{GameConfig, MapConfig, WaveTuning};
    pub use crate::economy::Ledger;
    pub use crate::enemy::Enemy;
    pub use crate::enemy_data::EnemyKind;
    pub use crate::error::{GameError, Result};
    pub use crate::grid::{GameMap, GridPos, Tile, TileGrid};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pool::{Handle, Pool};
    pub use crate::replay::{Recorder, Replay, ReplayPlayer};
    pub use crate::simulation::{Command, SimEvent, Simulation, TickEvents};
    pub use crate::targeting::TargetingMode;
    pub use crate::turret::{Turret, TurretId};
    pub use crate::turret_data::{TurretBlueprint, TurretKind};
    pub use crate::wave::{EnemyGroup, Wave};
}
