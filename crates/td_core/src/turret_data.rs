//! Turret catalogue: base blueprints and upgrade deltas.
//!
//! Every turret type has a tier-0 blueprint and six upgrade deltas. Tiers
//! 1, 3 and 5 form the left branch; tiers 2, 4 and 6 the right branch. The
//! effective blueprint of a turret is its base with the deltas of its branch
//! folded in tier order.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_serde, option_fixed_serde, Fixed};

/// Highest upgrade tier.
pub const MAX_TIER: u8 = 6;

fn fx(value: f64) -> Fixed {
    Fixed::from_num(value)
}

/// Turret type, indexed by shop code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TurretKind {
    /// Single-target gun.
    Basic,
    /// Penetrating ray, later a channelled beam.
    Laser,
    /// Slowing shots, later a freeze beam.
    Cryo,
    /// Damage over time.
    Bleed,
    /// Splash bombs, later stuns.
    Pulse,
    /// Long range, later piercing.
    Javelin,
}

impl TurretKind {
    /// Every kind in code order.
    pub const ALL: [Self; 6] = [
        Self::Basic,
        Self::Laser,
        Self::Cryo,
        Self::Bleed,
        Self::Pulse,
        Self::Javelin,
    ];

    /// Shop code of this kind.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Look up a kind by shop code.
    pub fn from_code(code: u32) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(GameError::UnknownTurretType(code))
    }

    /// Display name of the base tier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Laser => "Laser",
            Self::Cryo => "Cryo",
            Self::Bleed => "Bleed",
            Self::Pulse => "Pulse",
            Self::Javelin => "Javelin",
        }
    }

    /// Tier-0 blueprint.
    #[must_use]
    pub fn base_blueprint(self) -> TurretBlueprint {
        match self {
            Self::Basic => TurretBlueprint::new("Basic", 800, 50.0, 3.5, 1.3),
            Self::Laser => TurretBlueprint::new("Laser", 2500, 175.0, 2.5, 2.0).with_laser(1),
            Self::Cryo => TurretBlueprint::new("Cryo", 1200, 50.0, 3.0, 1.1)
                .with_slow(SlowParams::timed(0.6, 1.0)),
            Self::Bleed => TurretBlueprint::new("Bleed", 1000, 0.0, 3.0, 1.0)
                .with_dot(DotParams::new(30.0, 5, 0.5)),
            Self::Pulse => TurretBlueprint::new("Pulse", 2000, 90.0, 2.5, 0.5).with_splash(1.3),
            Self::Javelin => TurretBlueprint::new("Javelin", 5000, 500.0, 7.0, 1.0),
        }
    }

    /// Upgrade delta for `tier` in `1..=6`.
    #[must_use]
    pub fn delta(self, tier: u8) -> Option<BlueprintDelta> {
        let delta = match (self, tier) {
            (Self::Basic, 1) => BlueprintDelta::new(400).named("Fast Draw").fire_rate(2.0),
            (Self::Basic, 3) => BlueprintDelta::new(1500).damage(125.0),
            (Self::Basic, 5) => BlueprintDelta::new(6500).damage(300.0).fire_rate(3.0).range(4.0),
            (Self::Basic, 2) => BlueprintDelta::new(1200)
                .named("Radiance")
                .damage(200.0)
                .fire_rate(0.75)
                .range(4.5),
            (Self::Basic, 4) => BlueprintDelta::new(2800).damage(450.0),
            (Self::Basic, 6) => BlueprintDelta::new(7700).damage(1500.0),

            (Self::Laser, 1) => BlueprintDelta::new(2200)
                .named("Penetrator")
                .fire_rate(0.5)
                .damage(250.0)
                .laser(5),
            (Self::Laser, 3) => BlueprintDelta::new(5000).damage(350.0).laser(10),
            (Self::Laser, 5) => BlueprintDelta::new(36000).damage(3500.0).range(3.5).laser(90),
            (Self::Laser, 2) => BlueprintDelta::new(1800)
                .named("Inferno")
                .range(2.0)
                .damage(250.0)
                .fire_rate(1.0)
                .beam(BeamParams::laser(0.25)),
            (Self::Laser, 4) => BlueprintDelta::new(4500)
                .damage(350.0)
                .range(3.5)
                .fire_rate(1.5)
                .beam(BeamParams::laser(0.1)),
            (Self::Laser, 6) => BlueprintDelta::new(7500)
                .damage(450.0)
                .range(4.5)
                .fire_rate(2.0)
                .beam(BeamParams::laser(0.3)),

            (Self::Cryo, 1) => BlueprintDelta::new(1000)
                .named("Frost Beam")
                .damage(100.0)
                .range(2.2)
                .fire_rate(1.0)
                .beam(BeamParams::freeze(0.45)),
            (Self::Cryo, 3) => BlueprintDelta::new(2500)
                .damage(200.0)
                .fire_rate(1.5)
                .beam(BeamParams::freeze(0.35)),
            (Self::Cryo, 5) => BlueprintDelta::new(3500)
                .damage(300.0)
                .fire_rate(2.0)
                .beam(BeamParams::freeze(0.2)),
            (Self::Cryo, 2) => BlueprintDelta::new(2500)
                .named("Winter Is Coming")
                .damage(25.0)
                .range(3.5)
                .fire_rate(0.75)
                .splash(1.0)
                .slow(SlowParams::timed(0.7, 1.5)),
            (Self::Cryo, 4) => BlueprintDelta::new(6000).slow(SlowParams::timed(0.5, 2.5)),
            (Self::Cryo, 6) => BlueprintDelta::new(10000)
                .fire_rate(0.5)
                .splash(1.25)
                .slow(SlowParams::timed(0.3, 3.5)),

            (Self::Bleed, 1) => BlueprintDelta::new(3000)
                .named("Shuriken Storm")
                .damage(100.0)
                .range(1.6)
                .fire_rate(0.4)
                .melee()
                .dot(DotParams::new(25.0, 5, 1.0)),
            (Self::Bleed, 3) => BlueprintDelta::new(5500)
                .damage(200.0)
                .dot(DotParams::new(30.0, 8, 0.75)),
            (Self::Bleed, 5) => BlueprintDelta::new(10500)
                .damage(500.0)
                .fire_rate(0.5)
                .dot(DotParams::new(75.0, 10, 0.5)),
            (Self::Bleed, 2) => BlueprintDelta::new(800)
                .named("Rupture")
                .range(4.0)
                .dot(DotParams::new(30.0, 10, 0.75)),
            (Self::Bleed, 4) => BlueprintDelta::new(1500).dot(DotParams::new(50.0, 10, 0.6)),
            (Self::Bleed, 6) => BlueprintDelta::new(8500)
                .fire_rate(0.75)
                .dot(DotParams::new(150.0, 20, 0.4)),

            (Self::Pulse, 1) => BlueprintDelta::new(1000)
                .named("Quantum Lock")
                .damage(110.0)
                .splash(1.0)
                .slow(SlowParams::timed(0.0, 0.4)),
            (Self::Pulse, 3) => BlueprintDelta::new(3000)
                .damage(125.0)
                .splash(1.25)
                .slow(SlowParams::timed(0.0, 0.5)),
            (Self::Pulse, 5) => BlueprintDelta::new(7500)
                .damage(200.0)
                .splash(1.5)
                .slow(SlowParams::timed(0.0, 0.75)),
            (Self::Pulse, 2) => BlueprintDelta::new(3000)
                .named("Inverse Nuke")
                .damage(200.0)
                .splash(2.0)
                .fire_rate(0.4),
            (Self::Pulse, 4) => BlueprintDelta::new(7500).damage(750.0).fire_rate(0.25),
            (Self::Pulse, 6) => BlueprintDelta::new(25000).damage(2750.0).splash(2.25),

            (Self::Javelin, 1) => BlueprintDelta::new(3000)
                .named("Fragmentation")
                .fire_rate(0.5)
                .piercing(0.6),
            (Self::Javelin, 3) => BlueprintDelta::new(5500).damage(850.0).piercing(0.8),
            (Self::Javelin, 5) => BlueprintDelta::new(14000).damage(2000.0).piercing(0.9),
            (Self::Javelin, 2) => BlueprintDelta::new(3500)
                .named("All Seeing Eye")
                .damage(1500.0)
                .range(10.0)
                .fire_rate(0.5),
            (Self::Javelin, 4) => BlueprintDelta::new(5500)
                .damage(2500.0)
                .range(15.0)
                .fire_rate(0.4),
            (Self::Javelin, 6) => BlueprintDelta::new(11500)
                .damage(20000.0)
                .range(40.0)
                .fire_rate(0.25),

            _ => return None,
        };
        Some(delta)
    }

    /// Tiers folded to reach `tier`, in order.
    #[must_use]
    pub fn branch(tier: u8) -> Vec<u8> {
        if tier == 0 {
            return Vec::new();
        }
        let first = if tier % 2 == 1 { 1 } else { 2 };
        (first..=tier.min(MAX_TIER)).step_by(2).collect()
    }

    /// Effective blueprint at `tier`.
    pub fn blueprint_at(self, tier: u8) -> Result<TurretBlueprint> {
        let invalid = || GameError::InvalidTier {
            turret: self.name().to_string(),
            current: 0,
            requested: tier,
        };
        if tier > MAX_TIER {
            return Err(invalid());
        }
        let mut blueprint = self.base_blueprint();
        for step in Self::branch(tier) {
            blueprint.apply(&self.delta(step).ok_or_else(invalid)?);
        }
        Ok(blueprint)
    }
}

/// Damage-over-time payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DotParams {
    /// Damage per tick.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Number of ticks.
    pub ticks: u32,
    /// Seconds between ticks.
    #[serde(with = "fixed_serde")]
    pub interval: Fixed,
}

impl DotParams {
    /// Create a DOT payload.
    #[must_use]
    pub fn new(damage: f64, ticks: u32, interval: f64) -> Self {
        Self {
            damage: fx(damage),
            ticks,
            interval: fx(interval),
        }
    }

    /// Damage dealt over all ticks.
    #[must_use]
    pub fn total(&self) -> Fixed {
        self.damage * Fixed::from_num(self.ticks)
    }
}

/// Movement slow payload. A multiplier of zero is a stun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlowParams {
    /// Speed multiplier while slowed.
    #[serde(with = "fixed_serde")]
    pub multiplier: Fixed,
    /// Seconds the slow lasts; `None` until removed by its source.
    #[serde(with = "option_fixed_serde")]
    pub duration: Option<Fixed>,
}

impl SlowParams {
    /// Slow that expires after `duration` seconds.
    #[must_use]
    pub fn timed(multiplier: f64, duration: f64) -> Self {
        Self {
            multiplier: fx(multiplier),
            duration: Some(fx(duration)),
        }
    }

    /// Slow that lasts until its source removes it.
    #[must_use]
    pub fn permanent(multiplier: Fixed) -> Self {
        Self {
            multiplier,
            duration: None,
        }
    }
}

/// Channelled beam payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeamParams {
    /// Ramping damage beam.
    Laser {
        /// Initial growth rate and tick delay.
        #[serde(with = "fixed_serde")]
        rate: Fixed,
    },
    /// Slowing beam with steady damage.
    Freeze {
        /// Speed multiplier applied while locked.
        #[serde(with = "fixed_serde")]
        multiplier: Fixed,
    },
}

impl BeamParams {
    /// Laser beam with starting rate.
    #[must_use]
    pub fn laser(rate: f64) -> Self {
        Self::Laser { rate: fx(rate) }
    }

    /// Freeze beam with slow multiplier.
    #[must_use]
    pub fn freeze(multiplier: f64) -> Self {
        Self::Freeze {
            multiplier: fx(multiplier),
        }
    }
}

/// How a turret delivers its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FireMode {
    /// Pooled seeking projectile.
    #[default]
    Bullet,
    /// Instant penetrating ray.
    Laser,
    /// Channel locked on one target.
    Beam,
    /// Hits every enemy in range.
    Melee,
}

/// What a single hit carries to an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HitPayload {
    /// Direct damage, zero for none.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Damage over time to apply.
    pub dot: Option<DotParams>,
    /// Slow to apply.
    pub slow: Option<SlowParams>,
}

/// Effective stats of a turret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurretBlueprint {
    /// Display name.
    pub name: String,
    /// Purchase cost of the base tier.
    pub cost: u64,
    /// Damage per hit.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Shots per second.
    #[serde(with = "fixed_serde")]
    pub fire_rate: Fixed,
    /// Range in cells.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Splash radius; zero for single target.
    #[serde(with = "fixed_serde")]
    pub splash_radius: Fixed,
    /// Damage over time applied per hit.
    pub dot: Option<DotParams>,
    /// Timed slow applied per hit.
    pub slow: Option<SlowParams>,
    /// Ray penetration count when firing lasers.
    pub laser_penetration: Option<u32>,
    /// Channelled beam.
    pub beam: Option<BeamParams>,
    /// Chance to keep flying after a hit.
    #[serde(with = "option_fixed_serde")]
    pub piercing_chance: Option<Fixed>,
    /// Hits everything in range instead of firing.
    pub melee: bool,
}

impl TurretBlueprint {
    /// Blueprint with the core stats and no payload extras.
    #[must_use]
    pub fn new(name: &str, cost: u64, damage: f64, range: f64, fire_rate: f64) -> Self {
        Self {
            name: name.to_string(),
            cost,
            damage: fx(damage),
            fire_rate: fx(fire_rate),
            range: fx(range),
            splash_radius: Fixed::ZERO,
            dot: None,
            slow: None,
            laser_penetration: None,
            beam: None,
            piercing_chance: None,
            melee: false,
        }
    }

    /// Set the splash radius.
    #[must_use]
    pub fn with_splash(mut self, radius: f64) -> Self {
        self.splash_radius = fx(radius);
        self
    }

    /// Set the on-hit slow.
    #[must_use]
    pub const fn with_slow(mut self, slow: SlowParams) -> Self {
        self.slow = Some(slow);
        self
    }

    /// Set the on-hit DOT.
    #[must_use]
    pub const fn with_dot(mut self, dot: DotParams) -> Self {
        self.dot = Some(dot);
        self
    }

    /// Fire penetrating lasers.
    #[must_use]
    pub const fn with_laser(mut self, penetration: u32) -> Self {
        self.laser_penetration = Some(penetration);
        self
    }

    /// Fold an upgrade delta into the blueprint.
    pub fn apply(&mut self, delta: &BlueprintDelta) {
        if let Some(name) = delta.name {
            self.name = name.to_string();
        }
        if let Some(damage) = delta.damage {
            self.damage = damage;
        }
        if let Some(range) = delta.range {
            self.range = range;
        }
        if let Some(rate) = delta.fire_rate {
            self.fire_rate = rate;
        }
        if let Some(radius) = delta.splash_radius {
            self.splash_radius = radius;
        }
        if let Some(dot) = delta.dot {
            self.dot = Some(dot);
        }
        if let Some(slow) = delta.slow {
            self.slow = Some(slow);
        }
        if let Some(chance) = delta.piercing_chance {
            self.piercing_chance = Some(chance);
        }
        if let Some(penetration) = delta.laser_penetration {
            self.laser_penetration = Some(penetration);
        }
        if let Some(beam) = delta.beam {
            // A beam replaces the weapon payload it channels.
            match beam {
                BeamParams::Laser { .. } => self.laser_penetration = None,
                BeamParams::Freeze { .. } => self.slow = None,
            }
            self.beam = Some(beam);
        }
        if let Some(melee) = delta.melee {
            self.melee = melee;
        }
    }

    /// Delivery mode implied by the payload.
    #[must_use]
    pub const fn fire_mode(&self) -> FireMode {
        if self.beam.is_some() {
            FireMode::Beam
        } else if self.melee {
            FireMode::Melee
        } else if self.laser_penetration.is_some() {
            FireMode::Laser
        } else {
            FireMode::Bullet
        }
    }

    /// Payload delivered by one hit.
    #[must_use]
    pub const fn hit_payload(&self) -> HitPayload {
        HitPayload {
            damage: self.damage,
            dot: self.dot,
            slow: self.slow,
        }
    }

    /// Seconds between shots.
    #[must_use]
    pub fn fire_interval(&self) -> Fixed {
        if self.fire_rate <= Fixed::ZERO {
            return Fixed::MAX;
        }
        Fixed::ONE / self.fire_rate
    }
}

/// Changes an upgrade tier makes. Absent fields keep the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlueprintDelta {
    /// New display name.
    pub name: Option<&'static str>,
    /// Price of the upgrade.
    pub cost: u64,
    /// New damage.
    pub damage: Option<Fixed>,
    /// New range.
    pub range: Option<Fixed>,
    /// New fire rate.
    pub fire_rate: Option<Fixed>,
    /// New splash radius.
    pub splash_radius: Option<Fixed>,
    /// New DOT payload.
    pub dot: Option<DotParams>,
    /// New timed slow.
    pub slow: Option<SlowParams>,
    /// New laser penetration.
    pub laser_penetration: Option<u32>,
    /// Switch to or retune a beam.
    pub beam: Option<BeamParams>,
    /// New piercing chance.
    pub piercing_chance: Option<Fixed>,
    /// Toggle melee.
    pub melee: Option<bool>,
}

impl BlueprintDelta {
    /// Delta that only costs `cost`.
    #[must_use]
    pub fn new(cost: u64) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    /// Rename the turret.
    #[must_use]
    pub const fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Set damage.
    #[must_use]
    pub fn damage(mut self, value: f64) -> Self {
        self.damage = Some(fx(value));
        self
    }

    /// Set range.
    #[must_use]
    pub fn range(mut self, value: f64) -> Self {
        self.range = Some(fx(value));
        self
    }

    /// Set fire rate.
    #[must_use]
    pub fn fire_rate(mut self, value: f64) -> Self {
        self.fire_rate = Some(fx(value));
        self
    }

    /// Set splash radius.
    #[must_use]
    pub fn splash(mut self, value: f64) -> Self {
        self.splash_radius = Some(fx(value));
        self
    }

    /// Set the DOT payload.
    #[must_use]
    pub const fn dot(mut self, dot: DotParams) -> Self {
        self.dot = Some(dot);
        self
    }

    /// Set the timed slow.
    #[must_use]
    pub const fn slow(mut self, slow: SlowParams) -> Self {
        self.slow = Some(slow);
        self
    }

    /// Set laser penetration.
    #[must_use]
    pub const fn laser(mut self, penetration: u32) -> Self {
        self.laser_penetration = Some(penetration);
        self
    }

    /// Set the beam payload.
    #[must_use]
    pub const fn beam(mut self, beam: BeamParams) -> Self {
        self.beam = Some(beam);
        self
    }

    /// Set piercing chance.
    #[must_use]
    pub fn piercing(mut self, chance: f64) -> Self {
        self.piercing_chance = Some(fx(chance));
        self
    }

    /// Switch to melee.
    #[must_use]
    pub const fn melee(mut self) -> Self {
        self.melee = Some(true);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for kind in TurretKind::ALL {
            assert_eq!(TurretKind::from_code(kind.code()).unwrap(), kind);
        }
        assert!(matches!(
            TurretKind::from_code(6),
            Err(GameError::UnknownTurretType(6))
        ));
    }

    #[test]
    fn test_every_tier_has_a_delta() {
        for kind in TurretKind::ALL {
            assert!(kind.delta(0).is_none());
            for tier in 1..=MAX_TIER {
                assert!(kind.delta(tier).is_some(), "{kind:?} tier {tier}");
            }
            assert!(kind.delta(7).is_none());
        }
    }

    #[test]
    fn test_branches() {
        assert!(TurretKind::branch(0).is_empty());
        assert_eq!(TurretKind::branch(5), vec![1, 3, 5]);
        assert_eq!(TurretKind::branch(4), vec![2, 4]);
    }

    #[test]
    fn test_basic_left_branch_folds() {
        let blueprint = TurretKind::Basic.blueprint_at(5).unwrap();
        assert_eq!(blueprint.name, "Fast Draw");
        assert_eq!(blueprint.damage, fx(300.0));
        assert_eq!(blueprint.fire_rate, fx(3.0));
        assert_eq!(blueprint.range, fx(4.0));
        assert_eq!(blueprint.fire_mode(), FireMode::Bullet);
    }

    #[test]
    fn test_fire_modes() {
        assert_eq!(TurretKind::Laser.base_blueprint().fire_mode(), FireMode::Laser);
        let inferno = TurretKind::Laser.blueprint_at(2).unwrap();
        assert_eq!(inferno.fire_mode(), FireMode::Beam);
        assert_eq!(inferno.laser_penetration, None);

        let frost = TurretKind::Cryo.blueprint_at(1).unwrap();
        assert_eq!(frost.fire_mode(), FireMode::Beam);
        assert_eq!(frost.slow, None);

        let storm = TurretKind::Bleed.blueprint_at(1).unwrap();
        assert_eq!(storm.fire_mode(), FireMode::Melee);
        assert_eq!(storm.dot, Some(DotParams::new(25.0, 5, 1.0)));
    }

    #[test]
    fn test_zero_damage_is_explicit() {
        let bleed = TurretKind::Bleed.base_blueprint();
        assert_eq!(bleed.damage, Fixed::ZERO);
        // Rupture leaves damage alone rather than zeroing it.
        let rupture = TurretKind::Bleed.blueprint_at(2).unwrap();
        assert_eq!(rupture.damage, Fixed::ZERO);
        let pulse = TurretKind::Pulse.blueprint_at(3).unwrap();
        assert_eq!(pulse.slow.map(|s| s.multiplier), Some(Fixed::ZERO));
        assert_eq!(pulse.splash_radius, fx(1.25));
    }

    #[test]
    fn test_invalid_tier() {
        assert!(matches!(
            TurretKind::Basic.blueprint_at(7),
            Err(GameError::InvalidTier { requested: 7, .. })
        ));
    }

    #[test]
    fn test_dot_total() {
        assert_eq!(DotParams::new(30.0, 5, 0.5).total(), fx(150.0));
    }
}
