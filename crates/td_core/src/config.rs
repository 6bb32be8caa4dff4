//! Match configuration.
//!
//! Every tunable of the simulation lives here. Values are stored as plain
//! numbers so configuration files stay human-editable; they are converted to
//! [`Fixed`] once, when the simulation is built.
//!
//! Configurations can be loaded from RON:
//!
//! ```
//! use td_core::config::GameConfig;
//!
//! let config = GameConfig::from_ron_str("(seed: 7, starting_lives: 10)").unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.starting_lives, 10);
//! assert_eq!(config.starting_currency, 2000);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::Fixed;

/// Top-level configuration for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seed for every random stream in the match.
    pub seed: u64,
    /// Fixed simulation steps per second.
    pub tick_rate: u32,
    /// Lives at the start of the match.
    pub starting_lives: u32,
    /// Currency at the start of the match.
    pub starting_currency: u64,
    /// Seconds between the last spawn of a wave and the automatic next wave.
    pub time_between_waves: f32,
    /// Maximum number of waves spawning or alive at once.
    pub max_running_waves: usize,
    /// Fraction of the paid cost refunded on sale.
    pub sell_multiplier: f32,
    /// Scale applied to the early-start bonus percentage.
    pub wave_skip_multiplier: f32,
    /// Terrain and path generation.
    pub map: MapConfig,
    /// Wave budget and timing.
    pub waves: WaveTuning,
    /// Turret field-of-view computation.
    pub visibility: VisibilityConfig,
    /// Weapon and targeting constants.
    pub combat: CombatTuning,
    /// Object pool sizing.
    pub pools: PoolConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            tick_rate: 50,
            starting_lives: 50,
            starting_currency: 2000,
            time_between_waves: 30.0,
            max_running_waves: 20,
            sell_multiplier: 0.75,
            wave_skip_multiplier: 0.5,
            map: MapConfig::default(),
            waves: WaveTuning::default(),
            visibility: VisibilityConfig::default(),
            combat: CombatTuning::default(),
            pools: PoolConfig::default(),
        }
    }
}

impl GameConfig {
    /// Set the match seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the starting currency.
    #[must_use]
    pub const fn with_currency(mut self, amount: u64) -> Self {
        self.starting_currency = amount;
        self
    }

    /// Set the map configuration.
    #[must_use]
    pub fn with_map(mut self, map: MapConfig) -> Self {
        self.map = map;
        self
    }

    /// Duration of one fixed step in seconds.
    #[must_use]
    pub fn tick_duration(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Parse a configuration from RON text. Missing fields take defaults.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::ConfigParse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = ron::from_str(&text).map_err(|e| GameError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), seed = config.seed, "Loaded game config");
        Ok(config)
    }

    /// Serialize the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize config: {e}")))
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(GameError::ConfigParse {
                path: "<validation>".into(),
                message: message.into(),
            })
        };

        if self.tick_rate == 0 {
            return invalid("tick_rate must be positive");
        }
        self.map.validate()?;
        if self.waves.enemy_delay.0 > self.waves.enemy_delay.1
            || self.waves.group_delay.0 > self.waves.group_delay.1
        {
            return invalid("delay ranges must be (min, max)");
        }
        if self.visibility.ray_count == 0 || self.visibility.scan_step <= 0.0 {
            return invalid("visibility sampling must be positive");
        }
        if self.pools.enemy_capacity == 0 || self.pools.projectile_capacity == 0 {
            return invalid("pool capacities must be positive");
        }
        Ok(())
    }
}

/// Terrain and path generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map width in cells.
    pub width: u32,
    /// Map height in cells.
    pub height: u32,
    /// Number of interior waypoints between entry and exit.
    pub road_points: u32,
    /// Minimum distance of interior waypoints from the border.
    pub padding: u32,
    /// Noise sampling step per cell.
    pub noise_scale: f64,
    /// Noise height above which a cell becomes an obstacle.
    pub obstacle_threshold: f64,
    /// Shortest accepted path, in cells.
    pub min_path_length: usize,
    /// Longest accepted path, in cells.
    pub max_path_length: usize,
    /// Candidate maps tried before giving up.
    pub max_attempts: u32,
    /// Hard cap on a single A* result, in cells.
    pub max_segment_cells: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 18,
            road_points: 1,
            padding: 3,
            noise_scale: 0.2,
            obstacle_threshold: 0.6,
            min_path_length: 50,
            max_path_length: 60,
            max_attempts: 10_000,
            max_segment_cells: 300,
        }
    }
}

impl MapConfig {
    /// Reject map settings generation cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(GameError::ConfigParse {
                path: "<validation>".into(),
                message: message.into(),
            })
        };

        if self.width < 2 || self.height < 1 {
            return invalid("map must be at least 2x1 cells");
        }
        if self.min_path_length > self.max_path_length {
            return invalid("min_path_length exceeds max_path_length");
        }
        if self.padding * 2 >= self.width || self.padding * 2 >= self.height {
            return invalid("padding leaves no room for interior waypoints");
        }
        Ok(())
    }

    /// A small open map for quick tests: no obstacles, short path band.
    #[must_use]
    pub fn small() -> Self {
        Self {
            width: 16,
            height: 10,
            padding: 2,
            obstacle_threshold: 2.0,
            min_path_length: 16,
            max_path_length: 40,
            ..Default::default()
        }
    }

    /// A wider map with two interior waypoints.
    #[must_use]
    pub fn large() -> Self {
        Self {
            width: 48,
            height: 27,
            road_points: 2,
            min_path_length: 70,
            max_path_length: 90,
            ..Default::default()
        }
    }

    /// Set the accepted path length band.
    #[must_use]
    pub const fn with_path_band(mut self, min: usize, max: usize) -> Self {
        self.min_path_length = min;
        self.max_path_length = max;
        self
    }

    /// Set the obstacle threshold (values above 1.0 disable obstacles).
    #[must_use]
    pub fn with_obstacle_threshold(mut self, threshold: f64) -> Self {
        self.obstacle_threshold = threshold;
        self
    }
}

/// Wave budget and timing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveTuning {
    /// Budget of wave 1.
    pub base_budget: u32,
    /// Budget added per wave.
    pub budget_increment: u32,
    /// Budget ceiling.
    pub budget_cap: u32,
    /// Per-enemy spawn delay range in seconds, before speed scaling.
    pub enemy_delay: (f32, f32),
    /// Delay range after a group, in seconds.
    pub group_delay: (f32, f32),
    /// Waves between boss waves.
    pub boss_interval: u32,
    /// Waves per enemy-pool unlock step.
    pub unlock_interval: u32,
    /// First wave number that receives injected bosses (exclusive).
    pub boss_injection_after: u32,
    /// Wave number from which the larger injection range applies.
    pub heavy_injection_from: u32,
}

impl Default for WaveTuning {
    fn default() -> Self {
        Self {
            base_budget: 250,
            budget_increment: 50,
            budget_cap: 2200,
            enemy_delay: (0.7, 1.0),
            group_delay: (0.5, 1.0),
            boss_interval: 10,
            unlock_interval: 7,
            boss_injection_after: 60,
            heavy_injection_from: 100,
        }
    }
}

/// Turret field-of-view settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Rays in the broad-phase sweep.
    pub ray_count: u32,
    /// Step along a ray in the broad phase, in cells.
    pub ray_step: f32,
    /// Step along a path section in the narrow phase, in cells.
    pub scan_step: f32,
    /// Degrees within which adjacent angular ranges merge.
    pub merge_tolerance_deg: f32,
    /// Degrees of slack when testing a bearing against the ranges.
    pub angle_tolerance_deg: f32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            ray_count: 1000,
            ray_step: 0.1,
            scan_step: 0.1,
            merge_tolerance_deg: 1.0,
            angle_tolerance_deg: 1.0,
        }
    }
}

/// Weapon and targeting constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Seconds between target re-acquisitions.
    pub retarget_interval: f32,
    /// Projectile speed in cells per second.
    pub bullet_speed: f32,
    /// Projectile lifetime in seconds.
    pub bullet_lifetime: f32,
    /// Radius used for projectile and laser hit tests.
    pub hit_radius: f32,
    /// Turret rotation speed in degrees per second.
    pub turn_speed: f32,
    /// Minimum cosine between heading and target bearing to fire.
    pub facing_threshold: f32,
    /// Extra range tolerated before a beam disengages.
    pub beam_range_slack: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            retarget_interval: 0.5,
            bullet_speed: 10.0,
            bullet_lifetime: 10.0,
            hit_radius: 0.3,
            turn_speed: 540.0,
            facing_threshold: 0.95,
            beam_range_slack: 0.1,
        }
    }
}

/// Object pool sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Initial enemy slots.
    pub enemy_capacity: usize,
    /// Initial projectile slots.
    pub projectile_capacity: usize,
    /// Whether exhausted pools double their capacity.
    pub growable: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enemy_capacity: 32,
            projectile_capacity: 32,
            growable: true,
        }
    }
}
