//! Wave data and the scripted boss waves.

use serde::{Deserialize, Serialize};

use crate::enemy_data::EnemyKind;
use crate::math::{fixed_serde, Fixed};

/// A run of identical enemies inside a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnemyGroup {
    /// Enemy type.
    pub kind: EnemyKind,
    /// Seconds between consecutive spawns of this group.
    #[serde(with = "fixed_serde")]
    pub delay_between: Fixed,
    /// Number of enemies.
    pub amount: u32,
    /// Seconds to wait after the group before the next one starts.
    #[serde(with = "fixed_serde")]
    pub delay_to_next: Fixed,
}

impl EnemyGroup {
    /// Create a group.
    #[must_use]
    pub const fn new(kind: EnemyKind, delay_between: Fixed, amount: u32, delay_to_next: Fixed) -> Self {
        Self {
            kind,
            delay_between,
            amount,
            delay_to_next,
        }
    }
}

/// One wave: its groups, reward and live-enemy accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wave {
    /// 1-based wave number.
    pub index: u32,
    /// Groups in spawn order.
    pub groups: Vec<EnemyGroup>,
    /// Currency granted when the wave is survived. Zeroed by any leak.
    pub reward: u64,
    /// Enemies not yet killed or leaked, including those still to spawn.
    pub remaining: u32,
    /// Every group has been emitted.
    pub fully_spawned: bool,
}

impl Wave {
    /// Create a wave from its groups.
    #[must_use]
    pub fn new(index: u32, reward: u64, groups: Vec<EnemyGroup>) -> Self {
        let remaining = groups.iter().map(|g| g.amount).sum();
        Self {
            index,
            groups,
            reward,
            remaining,
            fully_spawned: false,
        }
    }

    /// Append a group and count its enemies.
    pub fn push_group(&mut self, group: EnemyGroup) {
        self.remaining += group.amount;
        self.groups.push(group);
    }

    /// Insert a group at `position` and count its enemies.
    pub fn insert_group(&mut self, position: usize, group: EnemyGroup) {
        self.remaining += group.amount;
        let position = position.min(self.groups.len());
        self.groups.insert(position, group);
    }

    /// Total enemies across all groups.
    #[must_use]
    pub fn enemy_count(&self) -> u32 {
        self.groups.iter().map(|g| g.amount).sum()
    }

    /// Total budget weight of the wave's enemies.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.groups
            .iter()
            .map(|g| u64::from(g.amount) * u64::from(g.kind.blueprint().weight))
            .sum()
    }

    /// Fully spawned and every enemy resolved.
    #[must_use]
    pub const fn survived(&self) -> bool {
        self.fully_spawned && self.remaining == 0
    }
}

/// A scripted boss wave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossScript {
    /// Reward for surviving it.
    pub reward: u64,
    /// `(kind, delay_between, amount, delay_to_next)` groups.
    pub groups: &'static [(EnemyKind, f32, u32, f32)],
}

impl BossScript {
    /// Instantiate the script as wave `index`.
    #[must_use]
    pub fn to_wave(&self, index: u32) -> Wave {
        let groups = self
            .groups
            .iter()
            .map(|&(kind, between, amount, next)| {
                EnemyGroup::new(kind, Fixed::from_num(between), amount, Fixed::from_num(next))
            })
            .collect();
        Wave::new(index, self.reward, groups)
    }
}

use EnemyKind::{
    Fast, FastBoss, Healer, HealerBoss, Normal, NormalBoss, Pekka, Slow, SprinterBoss, SuperFast,
    UnslowableBoss,
};

/// Boss waves in the order they appear (waves 10, 20, ...). The last entry repeats.
pub const BOSS_SCRIPTS: [BossScript; 11] = [
    BossScript {
        reward: 700,
        groups: &[(NormalBoss, 0.3, 1, 1.0), (Normal, 0.2, 8, 1.0), (Normal, 0.2, 8, 5.0)],
    },
    BossScript {
        reward: 500,
        groups: &[(Normal, 0.2, 15, 2.0), (FastBoss, 0.5, 2, 1.0), (Fast, 0.3, 15, 5.0)],
    },
    BossScript {
        reward: 3000,
        groups: &[
            (Slow, 0.2, 6, 1.5),
            (HealerBoss, 1.0, 1, 1.0),
            (HealerBoss, 1.0, 1, 0.1),
            (Normal, 0.2, 10, 1.0),
            (HealerBoss, 1.0, 1, 2.0),
            (Fast, 0.2, 5, 1.0),
            (Fast, 0.2, 5, 1.0),
            (Fast, 0.2, 5, 1.0),
            (Fast, 0.2, 5, 5.0),
        ],
    },
    BossScript {
        reward: 5500,
        groups: &[
            (Normal, 0.2, 10, 1.0),
            (SprinterBoss, 0.5, 1, 2.0),
            (Healer, 0.2, 6, 0.0),
            (SprinterBoss, 0.5, 1, 2.0),
            (Normal, 0.2, 10, 1.0),
            (SprinterBoss, 0.5, 1, 10.0),
        ],
    },
    BossScript {
        reward: 5000,
        groups: &[(UnslowableBoss, 2.0, 15, 6.0)],
    },
    BossScript {
        reward: 60_000,
        groups: &[(Pekka, 0.0, 1, 15.0)],
    },
    BossScript {
        reward: 100_000,
        groups: &[
            (UnslowableBoss, 0.5, 3, 3.0),
            (SuperFast, 0.1, 15, 0.0),
            (HealerBoss, 0.0, 1, 3.0),
            (Slow, 0.3, 7, 1.5),
            (Normal, 0.5, 7, 1.5),
            (Normal, 0.5, 7, 1.5),
            (FastBoss, 0.5, 2, 1.0),
        ],
    },
    BossScript {
        reward: 150_000,
        groups: &[
            (Slow, 0.5, 5, 2.0),
            (Normal, 0.2, 8, 2.0),
            (Healer, 0.2, 10, 1.0),
            (FastBoss, 0.2, 10, 3.0),
            (SuperFast, 0.1, 15, 0.0),
        ],
    },
    BossScript {
        reward: 250_000,
        groups: &[(NormalBoss, 0.3, 10, 1.0), (FastBoss, 0.3, 10, 5.0), (Fast, 0.3, 50, 20.0)],
    },
    BossScript {
        reward: 500_000,
        groups: &[(NormalBoss, 0.3, 10, 1.0), (FastBoss, 0.3, 10, 5.0), (Normal, 0.3, 25, 20.0)],
    },
    BossScript {
        reward: 750_000,
        groups: &[
            (NormalBoss, 1.0, 2, 2.0),
            (FastBoss, 1.0, 2, 2.0),
            (HealerBoss, 1.0, 2, 2.0),
            (UnslowableBoss, 1.0, 2, 2.0),
            (SprinterBoss, 1.0, 2, 2.0),
            (NormalBoss, 1.0, 2, 20.0),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_counts_enemies() {
        let mut wave = Wave::new(1, 100, vec![]);
        wave.push_group(EnemyGroup::new(Normal, Fixed::ONE, 4, Fixed::ONE));
        wave.insert_group(0, EnemyGroup::new(Fast, Fixed::ONE, 3, Fixed::ONE));
        assert_eq!(wave.remaining, 7);
        assert_eq!(wave.enemy_count(), 7);
        assert_eq!(wave.groups[0].kind, Fast);
        assert_eq!(wave.total_weight(), 4 * 50 + 3 * 45);
    }

    #[test]
    fn test_survived_requires_full_spawn() {
        let mut wave = Wave::new(3, 10, vec![EnemyGroup::new(Normal, Fixed::ONE, 1, Fixed::ONE)]);
        wave.remaining = 0;
        assert!(!wave.survived());
        wave.fully_spawned = true;
        assert!(wave.survived());
    }

    #[test]
    fn test_boss_scripts_instantiate() {
        let first = BOSS_SCRIPTS[0].to_wave(10);
        assert_eq!(first.index, 10);
        assert_eq!(first.reward, 700);
        assert_eq!(first.remaining, 17);
        assert_eq!(first.groups[0].kind, NormalBoss);

        let pekka = BOSS_SCRIPTS[5].to_wave(60);
        assert_eq!(pekka.enemy_count(), 1);
        assert_eq!(pekka.groups[0].delay_to_next, Fixed::from_num(15));

        let third = BOSS_SCRIPTS[2].to_wave(30);
        assert_eq!(third.groups.len(), 9);
        assert_eq!(third.enemy_count(), 6 + 3 + 10 + 20);
    }
}
