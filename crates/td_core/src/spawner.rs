//! Concurrent wave spawning and per-wave survival accounting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::WaveTuning;
use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::scheduler::{SpawnRequest, SpawnSequence};
use crate::wave::Wave;
use crate::wave_generator::WaveGenerator;

/// A wave whose every enemy has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveSurvived {
    /// Wave number.
    pub index: u32,
    /// Reward to pay out (zero after any leak).
    pub reward: u64,
}

/// Output of one [`SpawnScheduler::advance`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnTick {
    /// Enemies to place on the path this step.
    pub requests: Vec<SpawnRequest>,
    /// The last in-flight sequence finished this step.
    pub all_spawned: bool,
    /// Waves that finished spawning with nothing left alive.
    pub survived: Vec<WaveSurvived>,
}

/// Owns the wave generator, the running waves and their spawn sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnScheduler {
    generator: WaveGenerator,
    running: BTreeMap<u32, Wave>,
    sequences: Vec<SpawnSequence>,
    max_running: usize,
}

impl SpawnScheduler {
    /// Create a scheduler with a freshly seeded generator.
    #[must_use]
    pub fn new(seed: u64, tuning: WaveTuning, max_running: usize) -> Self {
        Self {
            generator: WaveGenerator::new(seed, tuning),
            running: BTreeMap::new(),
            sequences: Vec::new(),
            max_running,
        }
    }

    /// The wave generator.
    #[must_use]
    pub const fn generator(&self) -> &WaveGenerator {
        &self.generator
    }

    /// Waves spawning or with enemies alive.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Running waves by number.
    #[must_use]
    pub const fn running(&self) -> &BTreeMap<u32, Wave> {
        &self.running
    }

    /// Number of sequences still emitting.
    #[must_use]
    pub fn spawning_count(&self) -> usize {
        self.sequences.len()
    }

    /// Fail if another wave would exceed the running cap.
    pub fn ensure_capacity(&self) -> Result<()> {
        if self.running.len() >= self.max_running {
            return Err(GameError::WaveCapacityExceeded {
                running: self.running.len(),
                max: self.max_running,
            });
        }
        Ok(())
    }

    /// Generate wave `wave_number` and begin spawning it.
    ///
    /// `bonus_percent` raises the reward by `floor(reward * bonus / 100)`.
    /// Returns the number of enemies the wave will spawn.
    pub fn start_wave(&mut self, wave_number: u32, is_boss: bool, bonus_percent: u32) -> Result<u32> {
        self.ensure_capacity()?;

        let mut wave = self.generator.generate(wave_number, is_boss);
        if bonus_percent > 0 {
            wave.reward += wave.reward * u64::from(bonus_percent) / 100;
        }

        let enemies = wave.remaining;
        tracing::info!(
            wave = wave_number,
            boss = is_boss,
            enemies,
            reward = wave.reward,
            bonus_percent,
            "Wave started"
        );

        self.sequences.push(SpawnSequence::new(&wave));
        self.running.insert(wave_number, wave);
        Ok(enemies)
    }

    /// Advance every sequence by `dt`.
    pub fn advance(&mut self, dt: Fixed) -> SpawnTick {
        let mut tick = SpawnTick::default();
        if self.sequences.is_empty() {
            return tick;
        }

        let mut finished = Vec::new();
        for sequence in &mut self.sequences {
            if sequence.advance(dt, &mut tick.requests) {
                finished.push(sequence.wave());
            }
        }
        self.sequences.retain(|s| !s.is_finished());

        for index in finished {
            if let Some(wave) = self.running.get_mut(&index) {
                wave.fully_spawned = true;
            }
            if let Some(survived) = self.settle(index) {
                tick.survived.push(survived);
            }
        }
        tick.all_spawned = self.sequences.is_empty();
        tick
    }

    /// An enemy of `wave` was killed.
    pub fn on_enemy_killed(&mut self, wave: u32) -> Option<WaveSurvived> {
        self.resolve(wave, false)
    }

    /// An enemy of `wave` reached the exit; the wave's reward is forfeited.
    pub fn on_enemy_leaked(&mut self, wave: u32) -> Option<WaveSurvived> {
        self.resolve(wave, true)
    }

    fn resolve(&mut self, index: u32, leaked: bool) -> Option<WaveSurvived> {
        let Some(wave) = self.running.get_mut(&index) else {
            tracing::warn!(wave = index, "Enemy resolved for unknown wave");
            return None;
        };
        wave.remaining = wave.remaining.saturating_sub(1);
        if leaked {
            wave.reward = 0;
        }
        self.settle(index)
    }

    /// Remove the wave if it is survived, reporting it exactly once.
    fn settle(&mut self, index: u32) -> Option<WaveSurvived> {
        if !self.running.get(&index).is_some_and(Wave::survived) {
            return None;
        }
        let wave = self.running.remove(&index)?;
        tracing::info!(wave = index, reward = wave.reward, "Wave survived");
        Some(WaveSurvived {
            index,
            reward: wave.reward,
        })
    }
}
