//! Scenario loading and configuration.
//!
//! A scenario pairs a match configuration with the strategy that plays it
//! and a tick limit. Scenarios load from RON or come from the built-in set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use td_core::config::{GameConfig, MapConfig};

use crate::error::{Result, RunnerError};
use crate::strategies::Strategy;

/// Names accepted by [`Scenario::named`].
pub const SCENARIO_NAMES: [&str; 4] = ["standard", "small", "large", "idle"];

/// Ticks in ten simulated minutes at the default rate.
const TEN_MINUTES: u64 = 50 * 60 * 10;

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Match configuration. The seed is replaced per run.
    pub config: GameConfig,
    /// Strategy playing the match.
    pub strategy: Strategy,
    /// Tick limit for one match.
    pub max_ticks: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::standard()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RunnerError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    /// Serialize as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Default map, default economy, balanced play.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            description: "Default 32x18 map with the balanced strategy".to_string(),
            config: GameConfig::default(),
            strategy: Strategy::default(),
            max_ticks: TEN_MINUTES,
        }
    }

    /// Short path, frugal play.
    #[must_use]
    pub fn small() -> Self {
        Self {
            name: "small".to_string(),
            description: "16x10 map with a short path and a frugal strategy".to_string(),
            config: GameConfig::default().with_map(MapConfig::small()),
            strategy: Strategy::frugal(),
            max_ticks: TEN_MINUTES,
        }
    }

    /// Long path, upgrade-heavy play.
    #[must_use]
    pub fn large() -> Self {
        Self {
            name: "large".to_string(),
            description: "48x27 map with a long path and the upgrader strategy".to_string(),
            config: GameConfig::default().with_map(MapConfig::large()),
            strategy: Strategy::upgrader(),
            max_ticks: TEN_MINUTES * 2,
        }
    }

    /// No defence at all; measures how fast waves exhaust the lives.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            name: "idle".to_string(),
            description: "Default map with no turrets".to_string(),
            config: GameConfig::default(),
            strategy: Strategy::idle(),
            max_ticks: TEN_MINUTES,
        }
    }

    /// Look up a built-in scenario by name.
    pub fn named(name: &str) -> Result<Self> {
        match name {
            "standard" => Ok(Self::standard()),
            "small" => Ok(Self::small()),
            "large" => Ok(Self::large()),
            "idle" => Ok(Self::idle()),
            _ => Err(RunnerError::UnknownPreset {
                kind: "scenario",
                name: name.to_string(),
            }),
        }
    }

    /// Resolve a built-in name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if SCENARIO_NAMES.contains(&name_or_path) {
            Self::named(name_or_path)
        } else {
            Self::load(name_or_path)
        }
    }

    /// Replace the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}
