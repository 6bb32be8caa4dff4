//! Error types for the tower-defence simulation.

use thiserror::Error;

use crate::grid::GridPos;
use crate::turret::TurretId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Turret type code outside the catalogue.
    #[error("Unknown turret type code: {0}")]
    UnknownTurretType(u32),

    /// Enemy type code outside the blueprint table.
    #[error("Unknown enemy type code: {0}")]
    UnknownEnemyType(u32),

    /// Upgrade tier not reachable from the turret's current tier.
    #[error("Invalid upgrade tier {requested} for {turret} at tier {current}")]
    InvalidTier {
        /// Turret type name.
        turret: String,
        /// Tier the turret is currently at.
        current: u8,
        /// Tier that was requested.
        requested: u8,
    },

    /// Not enough currency for a purchase.
    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Amount required.
        required: u64,
        /// Amount available.
        available: u64,
    },

    /// A fixed-capacity pool has no free slot.
    #[error("Pool '{pool}' exhausted at capacity {capacity}")]
    PoolExhausted {
        /// Pool name.
        pool: String,
        /// Capacity at the time of the request.
        capacity: usize,
    },

    /// Cell lies outside the grid.
    #[error("Cell {0} is out of bounds")]
    OutOfBounds(GridPos),

    /// Cell is not buildable ground.
    #[error("Cell {0} is not free ground")]
    TileOccupied(GridPos),

    /// A* could not connect two cells.
    #[error("No path from {from} to {to}")]
    NoPath {
        /// Start cell.
        from: GridPos,
        /// Goal cell.
        to: GridPos,
    },

    /// Map generation ran out of attempts.
    #[error("Map generation failed after {attempts} attempts")]
    MapGenerationFailed {
        /// Number of candidates tried.
        attempts: u32,
    },

    /// Turret handle does not refer to a live turret.
    #[error("Turret not found: {0}")]
    TurretNotFound(TurretId),

    /// Too many waves are already running.
    #[error("Cannot start wave: {running} of {max} waves already running")]
    WaveCapacityExceeded {
        /// Waves currently running.
        running: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Configuration text could not be parsed.
    #[error("Failed to parse config '{path}': {message}")]
    ConfigParse {
        /// Source of the configuration.
        path: String,
        /// Parser message.
        message: String,
    },

    /// Configuration or replay file could not be read or written.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Replay playback diverged from the recorded result.
    #[error("Replay mismatch at tick {tick}: expected hash {expected}, got {actual}")]
    ReplayMismatch {
        /// Tick where the check failed.
        tick: u64,
        /// Recorded hash.
        expected: u64,
        /// Hash produced by playback.
        actual: u64,
    },

    /// Invalid simulation state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
