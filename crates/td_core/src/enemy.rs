//! Enemy instances: movement along the path, health and status effects.
//!
//! An enemy is spawned at the first waypoint and walks toward each next
//! waypoint in turn. It ends either by reaching the last waypoint (a leak)
//! or by its HP reaching zero (a kill). Both are terminal and set the
//! destroyed flag; every later effect is a no-op.
//!
//! # Effects
//!
//! - Slows are tagged by source turret. The strongest (lowest multiplier)
//!   wins. A new slow from a source replaces that source's previous one.
//! - At most one damage-over-time runs. A new DOT takes over only when its
//!   total damage exceeds what the current one has left; either way the
//!   tick schedule restarts with an immediate tick.
//! - Sprinting enemies triple their speed for a second after every hit.
//! - Healing enemies regain a share of max HP on a fixed interval.

use serde::{Deserialize, Serialize};

use crate::enemy_data::{
    max_hp, EnemyKind, HEAL_DELAY, HEAL_FRACTION, HEAL_INTERVAL, SPRINT_DURATION,
    SPRINT_MULTIPLIER,
};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::scheduler::{Countdown, Interval};
use crate::turret::TurretId;
use crate::turret_data::{DotParams, HitPayload, SlowParams};

/// Movement slow from one turret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlowEffect {
    /// Turret that applied the slow.
    pub source: TurretId,
    /// Speed multiplier.
    #[serde(with = "fixed_serde")]
    pub multiplier: Fixed,
    /// Expiry timer; `None` while the source holds it.
    pub expiry: Option<Countdown>,
}

/// Running damage-over-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageOverTime {
    /// Turret credited with DOT kills.
    pub source: TurretId,
    /// Damage per tick.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Ticks left.
    pub ticks_left: u32,
    /// Seconds between ticks.
    #[serde(with = "fixed_serde")]
    pub interval: Fixed,
    #[serde(with = "fixed_serde")]
    until_next: Fixed,
}

impl DamageOverTime {
    /// Damage the remaining ticks would deal.
    #[must_use]
    pub fn remaining_total(&self) -> Fixed {
        self.damage * Fixed::from_num(self.ticks_left)
    }
}

/// Result of moving an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Still on the path.
    Moving,
    /// Reached the final waypoint this step.
    Leaked,
    /// Already destroyed; did not move.
    Inactive,
}

/// A live enemy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    wave: u32,
    kind: EnemyKind,
    #[serde(with = "fixed_serde")]
    hp: Fixed,
    #[serde(with = "fixed_serde")]
    max_hp: Fixed,
    #[serde(with = "fixed_serde")]
    base_speed: Fixed,
    position: Vec2Fixed,
    next_waypoint: usize,
    #[serde(with = "fixed_serde")]
    distance: Fixed,
    slows: Vec<SlowEffect>,
    dot: Option<DamageOverTime>,
    sprint: Countdown,
    heal: Option<Interval>,
    destroyed: bool,
}

impl Enemy {
    /// Fresh enemy of `kind` for `wave`, standing on `start`.
    #[must_use]
    pub fn spawn(wave: u32, kind: EnemyKind, start: Vec2Fixed) -> Self {
        let blueprint = kind.blueprint();
        let max_hp = max_hp(kind, wave);
        let heal = blueprint.can_heal.then(|| {
            Interval::new(Fixed::from_num(HEAL_DELAY), Fixed::from_num(HEAL_INTERVAL))
        });
        Self {
            wave,
            kind,
            hp: max_hp,
            max_hp,
            base_speed: blueprint.speed_fixed(),
            position: start,
            next_waypoint: 1,
            distance: Fixed::ZERO,
            slows: Vec::new(),
            dot: None,
            sprint: Countdown::stopped(),
            heal,
            destroyed: false,
        }
    }

    /// Wave the enemy belongs to.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.wave
    }

    /// Enemy type.
    #[must_use]
    pub const fn kind(&self) -> EnemyKind {
        self.kind
    }

    /// Current HP.
    #[must_use]
    pub const fn hp(&self) -> Fixed {
        self.hp
    }

    /// HP at spawn.
    #[must_use]
    pub const fn max_hp(&self) -> Fixed {
        self.max_hp
    }

    /// HP as a fraction of max, in `[0, 1]`.
    #[must_use]
    pub fn hp_fraction(&self) -> Fixed {
        if self.max_hp <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        self.hp / self.max_hp
    }

    /// World position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Distance travelled along the path.
    #[must_use]
    pub const fn distance(&self) -> Fixed {
        self.distance
    }

    /// Index of the waypoint being walked to.
    #[must_use]
    pub const fn next_waypoint(&self) -> usize {
        self.next_waypoint
    }

    /// Killed or leaked.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Active slows.
    #[must_use]
    pub fn slows(&self) -> &[SlowEffect] {
        &self.slows
    }

    /// Active damage-over-time.
    #[must_use]
    pub const fn dot(&self) -> Option<&DamageOverTime> {
        self.dot.as_ref()
    }

    /// Whether the sprint burst is active.
    #[must_use]
    pub const fn is_sprinting(&self) -> bool {
        self.sprint.is_running()
    }

    /// Strongest slow multiplier, 1 with no slows.
    #[must_use]
    pub fn slow_multiplier(&self) -> Fixed {
        self.slows
            .iter()
            .map(|s| s.multiplier)
            .min()
            .unwrap_or(Fixed::ONE)
    }

    /// Speed with sprint and slows applied.
    #[must_use]
    pub fn current_speed(&self) -> Fixed {
        let sprint = if self.sprint.is_running() {
            Fixed::from_num(SPRINT_MULTIPLIER)
        } else {
            Fixed::ONE
        };
        self.base_speed * sprint * self.slow_multiplier()
    }

    /// Walk toward the remaining waypoints for `dt` seconds.
    ///
    /// `waypoints` must be the path the enemy was spawned on. Consecutive
    /// waypoints are one unit apart, so the travelled distance at waypoint
    /// `k` is exactly `k`.
    pub fn advance(&mut self, dt: Fixed, waypoints: &[Vec2Fixed]) -> Movement {
        if self.destroyed {
            return Movement::Inactive;
        }

        let mut budget = self.current_speed() * dt;
        while budget > Fixed::ZERO {
            let Some(&target) = waypoints.get(self.next_waypoint) else {
                break;
            };
            let before = self.position;
            let (position, reached) = before.move_towards(target, budget);
            budget -= before.manhattan_distance(position);
            self.position = position;
            if !reached {
                break;
            }
            self.next_waypoint += 1;
        }

        if self.next_waypoint >= waypoints.len() {
            self.position = waypoints.last().copied().unwrap_or(self.position);
            self.distance = Fixed::from_num(waypoints.len().saturating_sub(1));
            self.destroyed = true;
            return Movement::Leaked;
        }

        let previous = waypoints[self.next_waypoint - 1];
        self.distance =
            Fixed::from_num(self.next_waypoint - 1) + previous.manhattan_distance(self.position);
        Movement::Moving
    }

    /// Advance effect timers. Returns the credited turret if a DOT tick killed.
    pub fn update_effects(&mut self, dt: Fixed) -> Option<TurretId> {
        if self.destroyed {
            return None;
        }

        self.slows
            .retain_mut(|slow| !slow.expiry.as_mut().is_some_and(|timer| timer.tick(dt)));
        self.sprint.tick(dt);

        if let Some(heal) = self.heal.as_mut() {
            let fires = heal.tick(dt);
            for _ in 0..fires {
                if self.hp < self.max_hp {
                    let amount = self.max_hp * Fixed::from_num(HEAL_FRACTION);
                    self.hp = (self.hp + amount).min(self.max_hp);
                }
            }
        }

        let dot = self.dot.as_mut()?;
        dot.until_next -= dt;
        if dot.until_next > Fixed::ZERO {
            return None;
        }
        self.dot_tick()
    }

    /// Apply `amount` damage, capped to current HP.
    ///
    /// Returns `source` when this damage killed the enemy.
    pub fn apply_damage(&mut self, amount: Fixed, source: TurretId) -> Option<TurretId> {
        if self.destroyed {
            return None;
        }
        let amount = amount.max(Fixed::ZERO).min(self.hp);
        self.hp -= amount;
        if self.hp == Fixed::ZERO {
            self.destroyed = true;
            self.dot = None;
            self.slows.clear();
            return Some(source);
        }
        None
    }

    /// Apply a turret hit: damage, then sprint, DOT and slow.
    ///
    /// Returns the credited turret if the hit (or the DOT's immediate tick)
    /// killed the enemy.
    pub fn on_hit(&mut self, payload: &HitPayload, source: TurretId) -> Option<TurretId> {
        if self.destroyed {
            return None;
        }
        if payload.damage != Fixed::ZERO {
            if let Some(killer) = self.apply_damage(payload.damage, source) {
                return Some(killer);
            }
        }

        if self.kind.blueprint().can_sprint {
            self.sprint.restart(Fixed::from_num(SPRINT_DURATION));
        }

        if let Some(dot) = payload.dot {
            if let Some(killer) = self.apply_dot(dot, source) {
                return Some(killer);
            }
        }

        if let Some(slow) = payload.slow {
            self.add_slow(source, slow);
        }
        None
    }

    /// Start or refresh a DOT and tick it immediately.
    pub fn apply_dot(&mut self, params: DotParams, source: TurretId) -> Option<TurretId> {
        if self.destroyed {
            return None;
        }
        let current = self.dot.map_or(Fixed::ZERO, |d| d.remaining_total());
        if params.total() > current {
            self.dot = Some(DamageOverTime {
                source,
                damage: params.damage,
                ticks_left: params.ticks,
                interval: params.interval,
                until_next: Fixed::ZERO,
            });
        }
        self.dot_tick()
    }

    fn dot_tick(&mut self) -> Option<TurretId> {
        let dot = self.dot.as_mut()?;
        if dot.ticks_left == 0 {
            self.dot = None;
            return None;
        }
        dot.ticks_left -= 1;
        dot.until_next = dot.interval;
        let (damage, source, exhausted) = (dot.damage, dot.source, dot.ticks_left == 0);
        if exhausted {
            self.dot = None;
        }
        self.apply_damage(damage, source)
    }

    /// Add a slow from `source`, replacing its previous one. Immune kinds ignore it.
    pub fn add_slow(&mut self, source: TurretId, params: SlowParams) {
        if self.destroyed || self.kind.blueprint().immune_to_slow {
            return;
        }
        self.slows.retain(|s| s.source != source);
        self.slows.push(SlowEffect {
            source,
            multiplier: params.multiplier,
            expiry: params.duration.map(Countdown::new),
        });
    }

    /// Drop the slow held by `source`.
    pub fn remove_slow(&mut self, source: TurretId) {
        self.slows.retain(|s| s.source != source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: f64) -> Fixed {
        Fixed::from_num(n)
    }

    fn line(len: i32) -> Vec<Vec2Fixed> {
        (0..len)
            .map(|x| Vec2Fixed::new(fixed(f64::from(x) + 0.5), fixed(0.5)))
            .collect()
    }

    fn dt() -> Fixed {
        Fixed::ONE / Fixed::from_num(50)
    }

    /// Exactly representable step for timer assertions.
    fn step() -> Fixed {
        fixed(0.125)
    }

    const A: TurretId = TurretId(1);
    const B: TurretId = TurretId(2);

    fn damage(amount: f64) -> HitPayload {
        HitPayload {
            damage: fixed(amount),
            ..HitPayload::default()
        }
    }

    #[test]
    fn test_spawn_defaults() {
        let path = line(5);
        let enemy = Enemy::spawn(11, EnemyKind::Normal, path[0]);
        assert_eq!(enemy.max_hp(), fixed(400.0));
        assert_eq!(enemy.hp(), enemy.max_hp());
        assert_eq!(enemy.position(), path[0]);
        assert_eq!(enemy.next_waypoint(), 1);
        assert_eq!(enemy.slow_multiplier(), Fixed::ONE);
    }

    #[test]
    fn test_moves_and_leaks() {
        let path = line(3);
        let mut enemy = Enemy::spawn(1, EnemyKind::Fast, path[0]);
        // 3 cells/s over 0.5 s.
        for _ in 0..25 {
            assert_eq!(enemy.advance(dt(), &path), Movement::Moving);
        }
        assert!((enemy.distance() - fixed(1.5)).abs() < fixed(0.001));
        let mut leaked = false;
        for _ in 0..50 {
            if enemy.advance(dt(), &path) == Movement::Leaked {
                leaked = true;
                break;
            }
        }
        assert!(leaked);
        assert!(enemy.is_destroyed());
        assert_eq!(enemy.advance(dt(), &path), Movement::Inactive);
    }

    #[test]
    fn test_strongest_slow_wins() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Normal, Vec2Fixed::ZERO);
        enemy.add_slow(A, SlowParams::permanent(fixed(0.5)));
        enemy.add_slow(B, SlowParams::permanent(fixed(0.7)));
        assert_eq!(enemy.slow_multiplier(), fixed(0.5));
        enemy.remove_slow(A);
        assert_eq!(enemy.slow_multiplier(), fixed(0.7));
    }

    #[test]
    fn test_slow_from_same_source_replaces() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Normal, Vec2Fixed::ZERO);
        enemy.add_slow(A, SlowParams::permanent(fixed(0.3)));
        enemy.add_slow(A, SlowParams::permanent(fixed(0.8)));
        assert_eq!(enemy.slows().len(), 1);
        assert_eq!(enemy.slow_multiplier(), fixed(0.8));
    }

    #[test]
    fn test_timed_slow_expires() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Normal, Vec2Fixed::ZERO);
        enemy.add_slow(A, SlowParams::timed(0.6, 0.5));
        for _ in 0..3 {
            enemy.update_effects(step());
        }
        assert_eq!(enemy.slow_multiplier(), fixed(0.6));
        enemy.update_effects(step());
        assert_eq!(enemy.slow_multiplier(), Fixed::ONE);
    }

    #[test]
    fn test_immune_ignores_slow() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Unslowable, Vec2Fixed::ZERO);
        enemy.add_slow(A, SlowParams::timed(0.0, 1.0));
        assert!(enemy.slows().is_empty());
    }

    #[test]
    fn test_stun_stops_movement() {
        let path = line(4);
        let mut enemy = Enemy::spawn(1, EnemyKind::Normal, path[0]);
        enemy.add_slow(A, SlowParams::timed(0.0, 1.0));
        enemy.advance(dt(), &path);
        assert_eq!(enemy.position(), path[0]);
    }

    #[test]
    fn test_damage_capped_and_credited() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Fast, Vec2Fixed::ZERO);
        assert_eq!(enemy.on_hit(&damage(60.0), A), None);
        assert_eq!(enemy.hp(), fixed(40.0));
        assert_eq!(enemy.on_hit(&damage(500.0), B), Some(B));
        assert_eq!(enemy.hp(), Fixed::ZERO);
        assert!(enemy.is_destroyed());
        // Further hits are no-ops.
        assert_eq!(enemy.on_hit(&damage(10.0), A), None);
        assert_eq!(enemy.hp(), Fixed::ZERO);
    }

    #[test]
    fn test_killing_hit_applies_no_effects() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Fast, Vec2Fixed::ZERO);
        let payload = HitPayload {
            damage: fixed(100.0),
            dot: Some(DotParams::new(10.0, 3, 0.5)),
            slow: Some(SlowParams::timed(0.5, 1.0)),
        };
        assert_eq!(enemy.on_hit(&payload, A), Some(A));
        assert!(enemy.dot().is_none());
        assert!(enemy.slows().is_empty());
    }

    #[test]
    fn test_dot_ticks_immediately_then_on_interval() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Normal, Vec2Fixed::ZERO);
        enemy.apply_dot(DotParams::new(10.0, 3, 0.5), A);
        assert_eq!(enemy.hp(), fixed(190.0));
        for _ in 0..3 {
            enemy.update_effects(step());
        }
        assert_eq!(enemy.hp(), fixed(190.0));
        enemy.update_effects(step());
        assert_eq!(enemy.hp(), fixed(180.0));
        for _ in 0..4 {
            enemy.update_effects(step());
        }
        assert_eq!(enemy.hp(), fixed(170.0));
        assert!(enemy.dot().is_none());
    }

    #[test]
    fn test_weaker_dot_keeps_current() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Slow, Vec2Fixed::ZERO);
        enemy.apply_dot(DotParams::new(30.0, 5, 0.5), A);
        // 4 ticks x 30 = 120 left; 20 x 5 = 100 is weaker.
        enemy.apply_dot(DotParams::new(20.0, 5, 0.5), B);
        let dot = enemy.dot().unwrap();
        assert_eq!(dot.source, A);
        assert_eq!(dot.damage, fixed(30.0));
        assert_eq!(dot.ticks_left, 3);
        assert_eq!(enemy.hp(), fixed(350.0 - 30.0 - 30.0));

        // 50 x 5 = 250 beats the 90 left.
        enemy.apply_dot(DotParams::new(50.0, 5, 0.5), B);
        let dot = enemy.dot().unwrap();
        assert_eq!(dot.source, B);
        assert_eq!(dot.ticks_left, 4);
    }

    #[test]
    fn test_dot_kill_credits_dot_source() {
        let mut enemy = Enemy::spawn(1, EnemyKind::SuperFast, Vec2Fixed::ZERO);
        assert_eq!(enemy.apply_dot(DotParams::new(15.0, 5, 0.5), A), None);
        let mut killer = None;
        for _ in 0..100 {
            if let Some(k) = enemy.update_effects(dt()) {
                killer = Some(k);
                break;
            }
        }
        assert_eq!(killer, Some(A));
    }

    #[test]
    fn test_sprint_on_hit() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Sprinter, Vec2Fixed::ZERO);
        let base = enemy.current_speed();
        enemy.on_hit(&damage(1.0), A);
        assert!(enemy.is_sprinting());
        assert_eq!(enemy.current_speed(), base * Fixed::from_num(3));
        for _ in 0..7 {
            enemy.update_effects(step());
        }
        assert!(enemy.is_sprinting());
        enemy.update_effects(step());
        assert!(!enemy.is_sprinting());
    }

    #[test]
    fn test_heal_after_delay() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Healer, Vec2Fixed::ZERO);
        enemy.apply_damage(fixed(100.0), A);
        assert_eq!(enemy.hp(), fixed(25.0));
        for _ in 0..15 {
            enemy.update_effects(step());
        }
        assert_eq!(enemy.hp(), fixed(25.0));
        enemy.update_effects(step());
        // 5 % of 125.
        assert!((enemy.hp() - fixed(31.25)).abs() < fixed(0.001));
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut enemy = Enemy::spawn(1, EnemyKind::Healer, Vec2Fixed::ZERO);
        enemy.apply_damage(fixed(1.0), A);
        for _ in 0..200 {
            enemy.update_effects(dt());
        }
        assert_eq!(enemy.hp(), enemy.max_hp());
    }
}
