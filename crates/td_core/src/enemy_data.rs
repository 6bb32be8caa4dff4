//! Static enemy blueprints.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::Fixed;

/// Speed multiplier while sprinting.
pub const SPRINT_MULTIPLIER: i32 = 3;
/// Sprint duration in seconds.
pub const SPRINT_DURATION: f32 = 1.0;
/// Fraction of max HP restored per heal.
pub const HEAL_FRACTION: f32 = 0.05;
/// Seconds between heals.
pub const HEAL_INTERVAL: f32 = 0.5;
/// Seconds after spawn before the first heal.
pub const HEAL_DELAY: f32 = 2.0;

/// Enemy type, indexed by its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Baseline walker.
    #[default]
    Normal,
    /// Tough and slow.
    Slow,
    /// Fragile and quick.
    Fast,
    /// Regenerates health.
    Healer,
    /// Bursts forward when hit.
    Sprinter,
    /// Ignores slows.
    Unslowable,
    /// Very fast swarm unit.
    SuperFast,
    /// Boss: heavy walker.
    NormalBoss,
    /// Boss: fast.
    FastBoss,
    /// Boss: regenerates.
    HealerBoss,
    /// Boss: ignores slows.
    UnslowableBoss,
    /// Boss: sprints.
    SprinterBoss,
    /// Final boss with every trait.
    Pekka,
}

impl EnemyKind {
    /// Every kind in code order.
    pub const ALL: [Self; 13] = [
        Self::Normal,
        Self::Slow,
        Self::Fast,
        Self::Healer,
        Self::Sprinter,
        Self::Unslowable,
        Self::SuperFast,
        Self::NormalBoss,
        Self::FastBoss,
        Self::HealerBoss,
        Self::UnslowableBoss,
        Self::SprinterBoss,
        Self::Pekka,
    ];

    /// Kinds eligible for generated (non-boss) groups, in unlock order.
    pub const REGULAR: [Self; 7] = [
        Self::Normal,
        Self::Slow,
        Self::Fast,
        Self::Healer,
        Self::Sprinter,
        Self::Unslowable,
        Self::SuperFast,
    ];

    /// Integer code of this kind.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Look up a kind by integer code.
    pub fn from_code(code: u32) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(GameError::UnknownEnemyType(code))
    }

    /// Static stats of this kind.
    #[must_use]
    pub const fn blueprint(self) -> EnemyBlueprint {
        BLUEPRINTS[self as usize]
    }

    /// Whether this kind is a boss.
    #[must_use]
    pub const fn is_boss(self) -> bool {
        self as u32 >= Self::NormalBoss as u32
    }
}

/// Static stats shared by all enemies of a kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyBlueprint {
    /// Display name.
    pub name: &'static str,
    /// Hit points before the wave multiplier.
    pub hp: u32,
    /// Cells per second.
    pub speed: f32,
    /// Currency granted on kill.
    pub reward: u32,
    /// Budget cost in wave generation.
    pub weight: u32,
    /// Slows have no effect.
    pub immune_to_slow: bool,
    /// Sprints when hit.
    pub can_sprint: bool,
    /// Regenerates health.
    pub can_heal: bool,
}

impl EnemyBlueprint {
    const fn new(name: &'static str, hp: u32, speed: f32, reward: u32, weight: u32) -> Self {
        Self {
            name,
            hp,
            speed,
            reward,
            weight,
            immune_to_slow: false,
            can_sprint: false,
            can_heal: false,
        }
    }

    const fn immune(mut self) -> Self {
        self.immune_to_slow = true;
        self
    }

    const fn sprint(mut self) -> Self {
        self.can_sprint = true;
        self
    }

    const fn heal(mut self) -> Self {
        self.can_heal = true;
        self
    }

    /// Speed as a fixed-point value.
    #[must_use]
    pub fn speed_fixed(&self) -> Fixed {
        Fixed::from_num(self.speed)
    }
}

const BLUEPRINTS: [EnemyBlueprint; 13] = [
    EnemyBlueprint::new("Normal", 200, 1.75, 30, 50),
    EnemyBlueprint::new("Slow", 350, 1.25, 40, 50),
    EnemyBlueprint::new("Fast", 100, 3.0, 25, 45),
    EnemyBlueprint::new("Healer", 125, 1.45, 50, 50).heal(),
    EnemyBlueprint::new("Sprinter", 200, 1.1, 75, 55).sprint(),
    EnemyBlueprint::new("Unslowable", 250, 1.4, 125, 75).immune(),
    EnemyBlueprint::new("SuperFast", 20, 5.0, 20, 10).heal().immune(),
    EnemyBlueprint::new("NormalBoss", 1000, 1.0, 500, 0),
    EnemyBlueprint::new("FastBoss", 500, 2.25, 500, 0),
    EnemyBlueprint::new("HealerBoss", 400, 1.75, 1000, 0).heal(),
    EnemyBlueprint::new("UnslowableBoss", 1000, 1.5, 1000, 75).immune(),
    EnemyBlueprint::new("SprinterBoss", 900, 1.5, 2500, 400).sprint(),
    EnemyBlueprint::new("Pekka", 2150, 1.5, 69, 0).sprint().immune().heal(),
];

/// HP multiplier for enemies of a wave: doubles every ten waves, capped at 1024.
#[must_use]
pub fn hp_multiplier(wave: u32) -> u32 {
    let doublings = wave.saturating_sub(1) / 10;
    if doublings >= 10 {
        1024
    } else {
        1 << doublings
    }
}

/// Max HP of `kind` in `wave`.
#[must_use]
pub fn max_hp(kind: EnemyKind, wave: u32) -> Fixed {
    Fixed::from_num(u64::from(kind.blueprint().hp) * u64::from(hp_multiplier(wave)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for (code, kind) in EnemyKind::ALL.iter().enumerate() {
            assert_eq!(kind.code(), code as u32);
            assert_eq!(EnemyKind::from_code(code as u32).unwrap(), *kind);
        }
        assert!(matches!(
            EnemyKind::from_code(13),
            Err(GameError::UnknownEnemyType(13))
        ));
    }

    #[test]
    fn test_table_values() {
        let pekka = EnemyKind::Pekka.blueprint();
        assert_eq!(pekka.hp, 2150);
        assert!(pekka.can_heal && pekka.can_sprint && pekka.immune_to_slow);

        let super_fast = EnemyKind::SuperFast.blueprint();
        assert_eq!(super_fast.weight, 10);
        assert!(super_fast.can_heal && super_fast.immune_to_slow && !super_fast.can_sprint);

        assert_eq!(EnemyKind::Fast.blueprint().speed, 3.0);
        assert!(EnemyKind::NormalBoss.is_boss());
        assert!(!EnemyKind::SuperFast.is_boss());
    }

    #[test]
    fn test_hp_multiplier_curve() {
        assert_eq!(hp_multiplier(1), 1);
        assert_eq!(hp_multiplier(10), 1);
        assert_eq!(hp_multiplier(11), 2);
        assert_eq!(hp_multiplier(21), 4);
        assert_eq!(hp_multiplier(101), 1024);
        assert_eq!(hp_multiplier(500), 1024);
        assert_eq!(hp_multiplier(0), 1);
    }

    #[test]
    fn test_max_hp_scales() {
        assert_eq!(max_hp(EnemyKind::Normal, 1), Fixed::from_num(200));
        assert_eq!(max_hp(EnemyKind::Normal, 15), Fixed::from_num(400));
        assert_eq!(max_hp(EnemyKind::Pekka, 200), Fixed::from_num(2150 * 1024));
    }
}
