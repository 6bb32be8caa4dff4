//! Match state machine, lives and the between-wave timer.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_serde, option_fixed_serde, Fixed};

/// Waves between boss waves.
pub const BOSS_WAVE_INTERVAL: u32 = 10;

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchState {
    /// Waiting for the player to start.
    #[default]
    BeforeGame,
    /// Simulation running.
    InGame,
    /// Simulation frozen.
    Paused,
    /// Lives exhausted.
    AfterGame,
}

/// Fixed steps executed per tick call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeScale {
    /// One step per tick.
    #[default]
    Normal,
    /// Five steps per tick.
    Fast,
}

impl TimeScale {
    /// Steps per tick call.
    #[must_use]
    pub const fn steps(self) -> u32 {
        match self {
            Self::Normal => 1,
            Self::Fast => 5,
        }
    }

    /// The other speed.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Normal => Self::Fast,
            Self::Fast => Self::Normal,
        }
    }
}

/// Match clock: state, lives, wave counters and the auto-start timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameClock {
    state: MatchState,
    lives: u32,
    wave: u32,
    waves_survived: u32,
    /// Seconds since the timer started; `None` while stopped.
    #[serde(with = "option_fixed_serde")]
    timer: Option<Fixed>,
    #[serde(with = "fixed_serde")]
    time_between_waves: Fixed,
    #[serde(with = "fixed_serde")]
    skip_multiplier: Fixed,
    time_scale: TimeScale,
    capacity_reported: bool,
}

impl GameClock {
    /// A clock before the match starts.
    #[must_use]
    pub fn new(lives: u32, time_between_waves: Fixed, skip_multiplier: Fixed) -> Self {
        Self {
            state: MatchState::BeforeGame,
            lives,
            wave: 0,
            waves_survived: 0,
            timer: None,
            time_between_waves,
            skip_multiplier,
            time_scale: TimeScale::Normal,
            capacity_reported: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> MatchState {
        self.state
    }

    /// Remaining lives.
    #[must_use]
    pub const fn lives(&self) -> u32 {
        self.lives
    }

    /// Number of the most recently started wave, zero before the first.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.wave
    }

    /// Waves fully resolved.
    #[must_use]
    pub const fn waves_survived(&self) -> u32 {
        self.waves_survived
    }

    /// Seconds on the between-wave timer, if running.
    #[must_use]
    pub const fn timer(&self) -> Option<Fixed> {
        self.timer
    }

    /// Current time scale.
    #[must_use]
    pub const fn time_scale(&self) -> TimeScale {
        self.time_scale
    }

    /// Whether the simulation should advance.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == MatchState::InGame
    }

    /// Number and boss flag of the next wave to start.
    #[must_use]
    pub const fn next_wave(&self) -> (u32, bool) {
        let next = self.wave + 1;
        (next, next % BOSS_WAVE_INTERVAL == 0)
    }

    /// Leave [`MatchState::BeforeGame`] and start the first countdown.
    pub fn start_game(&mut self) -> Result<()> {
        if self.state != MatchState::BeforeGame {
            return Err(GameError::InvalidState(format!(
                "Cannot start game in state {:?}",
                self.state
            )));
        }
        self.state = MatchState::InGame;
        self.timer = Some(Fixed::ZERO);
        tracing::info!(lives = self.lives, "Game started");
        Ok(())
    }

    /// Switch between running and paused. Other states are unaffected.
    pub fn toggle_pause(&mut self) -> MatchState {
        self.state = match self.state {
            MatchState::InGame => MatchState::Paused,
            MatchState::Paused => MatchState::InGame,
            other => other,
        };
        self.state
    }

    /// Set the time scale.
    pub fn set_time_scale(&mut self, scale: TimeScale) {
        self.time_scale = scale;
    }

    /// Advance the timer. Returns `true` while the next wave is due.
    pub fn tick(&mut self, dt: Fixed) -> bool {
        let Some(elapsed) = self.timer.as_mut() else {
            return false;
        };
        if *elapsed < self.time_between_waves {
            *elapsed += dt;
        }
        *elapsed >= self.time_between_waves
    }

    /// Reward bonus for starting the next wave before the timer runs out.
    ///
    /// The fraction of time left is floored to whole percent, then to tens,
    /// then scaled by the skip multiplier. Zero while the timer is stopped.
    #[must_use]
    pub fn skip_bonus_percent(&self) -> u32 {
        let Some(elapsed) = self.timer else {
            return 0;
        };
        if self.time_between_waves <= Fixed::ZERO || elapsed >= self.time_between_waves {
            return 0;
        }
        let left = self.time_between_waves - elapsed;
        let percent: u32 = (left * Fixed::from_num(100) / self.time_between_waves).to_num();
        let tens = percent / 10 * 10;
        (Fixed::from_num(tens) * self.skip_multiplier).to_num()
    }

    /// A wave was started: stop the timer and advance the counter.
    pub fn on_wave_started(&mut self) -> u32 {
        self.timer = None;
        self.wave += 1;
        self.capacity_reported = false;
        self.wave
    }

    /// Every running wave finished spawning; restart the countdown.
    pub fn on_all_spawned(&mut self) {
        if self.state == MatchState::AfterGame {
            return;
        }
        self.timer = Some(Fixed::ZERO);
    }

    /// The auto-start hit the running-wave cap. Returns `true` the first time
    /// per countdown so the rejection is reported once.
    pub fn on_capacity_reached(&mut self) -> bool {
        !std::mem::replace(&mut self.capacity_reported, true)
    }

    /// A wave was survived.
    pub fn on_wave_survived(&mut self) {
        self.waves_survived += 1;
    }

    /// An enemy leaked. Returns the waves survived if this ended the match.
    pub fn on_leak(&mut self) -> Option<u32> {
        if self.state == MatchState::AfterGame {
            return None;
        }
        self.lives = self.lives.saturating_sub(1);
        if self.lives > 0 {
            return None;
        }
        self.state = MatchState::AfterGame;
        self.timer = None;
        tracing::info!(waves_survived = self.waves_survived, "Game over");
        Some(self.waves_survived)
    }
}
