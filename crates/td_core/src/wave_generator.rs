//! Seeded wave composition.
//!
//! Regular waves spend a budget that grows with the wave number on groups of
//! the currently unlocked enemy kinds. Every tenth wave is the next scripted
//! boss wave instead. Past wave 60, regular waves also receive single bosses
//! inserted at random positions.
//!
//! ```
//! use td_core::config::WaveTuning;
//! use td_core::wave_generator::WaveGenerator;
//!
//! let mut a = WaveGenerator::new(42, WaveTuning::default());
//! let mut b = WaveGenerator::new(42, WaveTuning::default());
//! assert_eq!(a.generate(1, false), b.generate(1, false));
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::WaveTuning;
use crate::enemy_data::EnemyKind;
use crate::math::{random_fixed, random_u32, Fixed};
use crate::wave::{EnemyGroup, Wave, BOSS_SCRIPTS};

/// Lowest boss code drawn for injected bosses.
const FIRST_BOSS_CODE: u32 = 7;
/// Exclusive ceiling of the injected boss pool.
const BOSS_POOL_CAP: u32 = 11;

/// Inclusive-exclusive bounds on a generated group's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSizeBand {
    /// Smallest size drawn.
    pub min: u32,
    /// Exclusive upper bound on the size drawn.
    pub max: u32,
}

impl GroupSizeBand {
    /// Band for a tier (number of boss waves passed).
    #[must_use]
    pub fn for_tier(tier: u32) -> Self {
        let min = (2 + 2 * tier).min(7);
        let max = (min + 2 + 2 * tier).min(12);
        Self { min, max }
    }
}

/// Deterministic generator of waves from a seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveGenerator {
    rng: ChaCha8Rng,
    boss_cursor: usize,
    tuning: WaveTuning,
}

impl WaveGenerator {
    /// Create a generator seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64, tuning: WaveTuning) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            boss_cursor: 0,
            tuning,
        }
    }

    /// Reseed the generator and rewind the boss scripts.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.boss_cursor = 0;
    }

    /// Index of the next boss script.
    #[must_use]
    pub const fn boss_cursor(&self) -> usize {
        self.boss_cursor
    }

    /// Whether `wave` is a scripted boss wave.
    #[must_use]
    pub fn is_boss_wave(&self, wave: u32) -> bool {
        self.tuning.boss_interval > 0 && wave > 0 && wave % self.tuning.boss_interval == 0
    }

    /// Produce wave `wave_number`.
    pub fn generate(&mut self, wave_number: u32, is_boss: bool) -> Wave {
        if is_boss {
            self.boss_wave(wave_number)
        } else {
            self.regular_wave(wave_number)
        }
    }

    /// Generate waves `1..=count` in order, deciding boss waves by number.
    pub fn preview(&mut self, count: u32) -> Vec<Wave> {
        (1..=count)
            .map(|n| {
                let boss = self.is_boss_wave(n);
                self.generate(n, boss)
            })
            .collect()
    }

    /// Budget available to wave `wave_number`.
    #[must_use]
    pub fn budget(&self, wave_number: u32) -> u32 {
        let grown = self
            .tuning
            .base_budget
            .saturating_add(wave_number.saturating_sub(1).saturating_mul(self.tuning.budget_increment));
        grown.min(self.tuning.budget_cap)
    }

    /// Regular kinds unlocked at `wave_number`.
    #[must_use]
    pub fn unlocked_kinds(&self, wave_number: u32) -> &'static [EnemyKind] {
        let steps = wave_number / self.tuning.unlock_interval.max(1);
        let count = steps.min(EnemyKind::REGULAR.len() as u32 - 1) as usize + 1;
        &EnemyKind::REGULAR[..count]
    }

    fn boss_wave(&mut self, wave_number: u32) -> Wave {
        let script = &BOSS_SCRIPTS[self.boss_cursor];
        if self.boss_cursor < BOSS_SCRIPTS.len() - 1 {
            self.boss_cursor += 1;
        }
        let wave = script.to_wave(wave_number);
        tracing::debug!(wave = wave_number, reward = wave.reward, "Boss wave scripted");
        wave
    }

    fn regular_wave(&mut self, wave_number: u32) -> Wave {
        let tier = wave_number / self.tuning.boss_interval.max(1);
        let budget = self.budget(wave_number);
        let pool = self.unlocked_kinds(wave_number);
        let band = GroupSizeBand::for_tier(tier);

        let (groups, _) = fill_budget(&mut self.rng, &self.tuning, budget, pool, band);
        let mut wave = Wave::new(wave_number, 0, groups);
        wave.reward = u64::from(wave.enemy_count()) * u64::from(reward_per_enemy(tier));

        if wave_number > self.tuning.boss_injection_after {
            self.inject_bosses(&mut wave, wave_number);
        }

        tracing::debug!(
            wave = wave_number,
            groups = wave.groups.len(),
            enemies = wave.remaining,
            reward = wave.reward,
            "Wave generated"
        );
        wave
    }

    fn inject_bosses(&mut self, wave: &mut Wave, wave_number: u32) {
        let amount = if wave_number >= self.tuning.heavy_injection_from {
            random_u32(&mut self.rng, 3, 6)
        } else {
            random_u32(&mut self.rng, 0, 3)
        };
        let pool_end = (wave_number / self.tuning.unlock_interval.max(1))
            .max(FIRST_BOSS_CODE)
            .min(BOSS_POOL_CAP);

        let mut max = wave.groups.len() as u32;
        for _ in 0..amount {
            let code = random_u32(&mut self.rng, FIRST_BOSS_CODE, pool_end);
            let kind = EnemyKind::from_code(code).unwrap_or(EnemyKind::NormalBoss);
            let position = random_u32(&mut self.rng, 0, max.saturating_sub(1));
            let delay = self.group_delay();
            wave.insert_group(
                position as usize,
                EnemyGroup::new(kind, Fixed::ZERO, 1, delay),
            );
            max += 1;
        }
    }

    fn group_delay(&mut self) -> Fixed {
        let (low, high) = self.tuning.group_delay;
        random_fixed(&mut self.rng, Fixed::from_num(low), Fixed::from_num(high))
    }
}

/// Per-enemy survival reward for a tier: `min(max(5, 4 + floor(2.35^tier)), 65)`.
#[must_use]
pub fn reward_per_enemy(tier: u32) -> u32 {
    let mut power = 1.0_f64;
    for _ in 0..tier {
        power *= 2.35;
        if power > 65.0 {
            break;
        }
    }
    let scaled = 4 + power.floor() as u32;
    scaled.clamp(5, 65)
}

/// Spend `budget` on random groups drawn from `pool`.
///
/// Returns the groups and the unspent budget, which is smaller than the
/// cheapest weight in `pool`.
pub fn fill_budget(
    rng: &mut ChaCha8Rng,
    tuning: &WaveTuning,
    mut budget: u32,
    pool: &[EnemyKind],
    band: GroupSizeBand,
) -> (Vec<EnemyGroup>, u32) {
    let mut groups = Vec::new();
    let (enemy_low, enemy_high) = (
        Fixed::from_num(tuning.enemy_delay.0),
        Fixed::from_num(tuning.enemy_delay.1),
    );
    let (group_low, group_high) = (
        Fixed::from_num(tuning.group_delay.0),
        Fixed::from_num(tuning.group_delay.1),
    );

    loop {
        let affordable: Vec<EnemyKind> = pool
            .iter()
            .copied()
            .filter(|k| {
                let weight = k.blueprint().weight;
                weight > 0 && weight <= budget
            })
            .collect();
        if affordable.is_empty() {
            break;
        }

        let kind = affordable[random_u32(rng, 0, affordable.len() as u32) as usize];
        let blueprint = kind.blueprint();
        let amount = (budget / blueprint.weight).min(random_u32(rng, band.min, band.max));
        let delay_between =
            Fixed::ONE / blueprint.speed_fixed() * random_fixed(rng, enemy_low, enemy_high);
        let delay_to_next = random_fixed(rng, group_low, group_high);

        groups.push(EnemyGroup::new(kind, delay_between, amount, delay_to_next));
        budget -= amount * blueprint.weight;
    }
    (groups, budget)
}
