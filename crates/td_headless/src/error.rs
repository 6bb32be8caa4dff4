//! Error types for the headless runner.

use thiserror::Error;

use td_core::error::GameError;

/// Errors raised while loading, running or reporting matches.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The simulation rejected something.
    #[error(transparent)]
    Game(#[from] GameError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse RON.
    #[error("Failed to parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// Failed to write RON.
    #[error("Failed to write RON: {0}")]
    RonWrite(#[from] ron::Error),

    /// Failed to read or write JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No built-in scenario or strategy has this name.
    #[error("Unknown {kind}: {name}")]
    UnknownPreset {
        /// "scenario" or "strategy".
        kind: &'static str,
        /// Requested name.
        name: String,
    },
}

/// Result alias for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
