//! Turret instances: targeting, rotation, cooldown-gated firing and upgrades.
//!
//! Each tick a turret validates its current target, re-acquires on its
//! retarget interval, turns toward the target and fires when its cooldown
//! has elapsed, the target bearing lies inside its field of view and (for
//! everything but melee) it faces the target closely enough.
//!
//! Beam turrets do not fire discrete shots. They lock a [`BeamChannel`] on
//! the target and keep it until the target dies, leaves the field of view
//! or moves out of range.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::enemy::Enemy;
use crate::error::{GameError, Result};
use crate::grid::{GameMap, GridPos, TileGrid};
use crate::math::{angle_difference, fixed_serde, normalize_degrees, sin_cos_deg, Fixed, Vec2Fixed};
use crate::pool::{Handle, Pool};
use crate::projectile::{fire_laser, melee, Projectile, Strike};
use crate::targeting::{PathIndex, TargetingMode};
use crate::turret_data::{
    BeamParams, BlueprintDelta, FireMode, SlowParams, TurretBlueprint, TurretKind,
};
use crate::visibility::{Visibility, VisibilityParams};

/// Seconds between freeze beam ticks.
const FREEZE_BEAM_INTERVAL: f64 = 0.5;
/// Share of turret damage a freeze beam tick deals.
const FREEZE_BEAM_DAMAGE: f64 = 0.5;
/// Per-tick decay of a laser beam's rate.
const LASER_BEAM_DECAY: f64 = 0.95;

/// Unique turret identifier, assigned in placement order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TurretId(pub u32);

impl std::fmt::Display for TurretId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turret#{}", self.0)
    }
}

/// Combat constants converted to fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatParams {
    /// Seconds between target re-acquisitions.
    pub retarget_interval: Fixed,
    /// Projectile speed in cells per second.
    pub bullet_speed: Fixed,
    /// Projectile lifetime in seconds.
    pub bullet_lifetime: Fixed,
    /// Hit-test radius of projectiles.
    pub hit_radius: Fixed,
    /// Degrees per second a turret turns.
    pub turn_speed: Fixed,
    /// Cosine of the heading error required to fire.
    pub facing_threshold: Fixed,
    /// Extra distance a beam tolerates before disengaging.
    pub beam_range_slack: Fixed,
    /// Degrees of slack on the angular limits.
    pub angle_tolerance: Fixed,
    /// Step used when marching a laser toward obstacles.
    pub ray_step: Fixed,
}

impl CombatParams {
    /// Derive combat parameters from a match configuration.
    #[must_use]
    pub fn from_config(config: &GameConfig) -> Self {
        let combat = &config.combat;
        Self {
            retarget_interval: Fixed::from_num(combat.retarget_interval),
            bullet_speed: Fixed::from_num(combat.bullet_speed),
            bullet_lifetime: Fixed::from_num(combat.bullet_lifetime),
            hit_radius: Fixed::from_num(combat.hit_radius),
            turn_speed: Fixed::from_num(combat.turn_speed),
            facing_threshold: Fixed::from_num(combat.facing_threshold),
            beam_range_slack: Fixed::from_num(combat.beam_range_slack),
            angle_tolerance: Fixed::from_num(config.visibility.angle_tolerance_deg),
            ray_step: Fixed::from_num(config.visibility.ray_step),
        }
    }
}

impl Default for CombatParams {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

/// An enemy killed this tick and the turret credited with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Kill {
    /// The dead enemy.
    pub enemy: Handle,
    /// Turret whose hit (or DOT) dealt the final damage.
    pub credited: TurretId,
}

/// Shared state a turret reads and mutates during its update.
pub struct Battlefield<'a> {
    /// The static map.
    pub map: &'a GameMap,
    /// Enemies bucketed by path distance for this tick.
    pub index: &'a PathIndex,
    /// Live enemies.
    pub enemies: &'a mut Pool<Enemy>,
    /// Live projectiles.
    pub projectiles: &'a mut Pool<Projectile>,
}

/// A channelled beam locked on one enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamChannel {
    target: Handle,
    params: BeamParams,
    #[serde(with = "fixed_serde")]
    damage: Fixed,
    #[serde(with = "fixed_serde")]
    rate: Fixed,
    #[serde(with = "fixed_serde")]
    until_next: Fixed,
}

impl BeamChannel {
    /// Lock onto `target`. The first tick is due immediately.
    #[must_use]
    pub fn engage(target: Handle, params: BeamParams, damage: Fixed) -> Self {
        let rate = match params {
            BeamParams::Laser { rate } => rate,
            BeamParams::Freeze { .. } => Fixed::ZERO,
        };
        Self {
            target,
            params,
            damage,
            rate,
            until_next: Fixed::ZERO,
        }
    }

    /// Enemy the beam is locked on.
    #[must_use]
    pub const fn target(&self) -> Handle {
        self.target
    }

    /// Beam payload.
    #[must_use]
    pub const fn params(&self) -> BeamParams {
        self.params
    }

    /// Current ramped damage of a laser beam, base damage of a freeze beam.
    #[must_use]
    pub const fn damage(&self) -> Fixed {
        self.damage
    }

    /// Advance by `dt`; returns the damage of a tick that fell due.
    ///
    /// At most one tick happens per call.
    pub fn tick(&mut self, dt: Fixed) -> Option<Fixed> {
        self.until_next -= dt;
        if self.until_next > Fixed::ZERO {
            return None;
        }
        match self.params {
            BeamParams::Laser { .. } => {
                self.damage += self.rate * self.damage;
                self.rate *= Fixed::from_num(LASER_BEAM_DECAY);
                self.until_next = self.rate;
                Some(self.damage * self.rate)
            }
            BeamParams::Freeze { .. } => {
                self.until_next = Fixed::from_num(FREEZE_BEAM_INTERVAL);
                Some(self.damage * Fixed::from_num(FREEZE_BEAM_DAMAGE))
            }
        }
    }
}

/// What an upgrade changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpgradeOutcome {
    /// Range differs, so visibility was recomputed.
    pub range_changed: bool,
    /// Fire mode differs, so the beam and target were reset.
    pub mode_changed: bool,
}

/// A placed turret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turret {
    id: TurretId,
    kind: TurretKind,
    tier: u8,
    cell: GridPos,
    position: Vec2Fixed,
    blueprint: TurretBlueprint,
    fire_mode: FireMode,
    targeting: TargetingMode,
    target: Option<Handle>,
    #[serde(with = "fixed_serde")]
    cooldown: Fixed,
    #[serde(with = "fixed_serde")]
    retarget: Fixed,
    #[serde(with = "fixed_serde")]
    heading: Fixed,
    #[serde(with = "fixed_serde")]
    turn_speed: Fixed,
    sell_value: u64,
    kills: u32,
    visibility: Visibility,
    beam: Option<BeamChannel>,
}

impl Turret {
    /// Build a tier-0 turret of `kind` on `cell` and compute its field of view.
    #[must_use]
    pub fn new(
        id: TurretId,
        kind: TurretKind,
        cell: GridPos,
        map: &GameMap,
        visibility: &VisibilityParams,
        combat: &CombatParams,
    ) -> Self {
        let blueprint = kind.base_blueprint();
        let position = TileGrid::cell_center(cell);
        Self {
            id,
            kind,
            tier: 0,
            cell,
            position,
            fire_mode: blueprint.fire_mode(),
            targeting: TargetingMode::default(),
            target: None,
            cooldown: Fixed::ZERO,
            retarget: Fixed::ZERO,
            heading: Fixed::ZERO,
            turn_speed: combat.turn_speed,
            sell_value: blueprint.cost,
            kills: 0,
            visibility: Visibility::compute(map, position, blueprint.range, visibility),
            beam: None,
            blueprint,
        }
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> TurretId {
        self.id
    }

    /// Turret type.
    #[must_use]
    pub const fn kind(&self) -> TurretKind {
        self.kind
    }

    /// Current upgrade tier.
    #[must_use]
    pub const fn tier(&self) -> u8 {
        self.tier
    }

    /// Occupied cell.
    #[must_use]
    pub const fn cell(&self) -> GridPos {
        self.cell
    }

    /// World position (cell centre).
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Effective blueprint.
    #[must_use]
    pub const fn blueprint(&self) -> &TurretBlueprint {
        &self.blueprint
    }

    /// Delivery mode.
    #[must_use]
    pub const fn fire_mode(&self) -> FireMode {
        self.fire_mode
    }

    /// Targeting policy.
    #[must_use]
    pub const fn targeting(&self) -> TargetingMode {
        self.targeting
    }

    /// Current target.
    #[must_use]
    pub const fn target(&self) -> Option<Handle> {
        self.target
    }

    /// Seconds until the next shot may fire.
    #[must_use]
    pub const fn cooldown(&self) -> Fixed {
        self.cooldown
    }

    /// Facing in degrees.
    #[must_use]
    pub const fn heading(&self) -> Fixed {
        self.heading
    }

    /// Sum of every cost paid for this turret.
    #[must_use]
    pub const fn sell_value(&self) -> u64 {
        self.sell_value
    }

    /// Kills credited to this turret.
    #[must_use]
    pub const fn kills(&self) -> u32 {
        self.kills
    }

    /// Field of view.
    #[must_use]
    pub const fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Active beam channel.
    #[must_use]
    pub const fn beam(&self) -> Option<&BeamChannel> {
        self.beam.as_ref()
    }

    /// Change the targeting policy. The current target is kept until the next acquisition.
    pub fn set_targeting(&mut self, mode: TargetingMode) {
        self.targeting = mode;
    }

    /// Advance to the next targeting policy and return it.
    pub fn cycle_targeting(&mut self) -> TargetingMode {
        self.targeting = self.targeting.next();
        self.targeting
    }

    /// Tier reached by an upgrade and the delta to fold, without applying it.
    ///
    /// A choice upgrade picks a branch from tier 0 (`delta_tier` 1 or 2). A
    /// normal upgrade moves two tiers along the chosen branch from tiers 1 to 4.
    pub fn plan_upgrade(&self, delta_tier: u8, is_choice: bool) -> Result<(u8, BlueprintDelta)> {
        let invalid = || GameError::InvalidTier {
            turret: self.blueprint.name.clone(),
            current: self.tier,
            requested: self.tier.saturating_add(delta_tier),
        };
        let next = match (is_choice, self.tier, delta_tier) {
            (true, 0, 1 | 2) => delta_tier,
            (false, 1..=4, 2) => self.tier + 2,
            _ => return Err(invalid()),
        };
        let delta = self.kind.delta(next).ok_or_else(invalid)?;
        Ok((next, delta))
    }

    /// Fold a planned upgrade into the turret.
    pub fn apply_upgrade(
        &mut self,
        tier: u8,
        delta: &BlueprintDelta,
        map: &GameMap,
        visibility: &VisibilityParams,
        enemies: &mut Pool<Enemy>,
    ) -> UpgradeOutcome {
        let old_range = self.blueprint.range;
        self.blueprint.apply(delta);
        self.tier = tier;
        self.sell_value += delta.cost;

        let mode = self.blueprint.fire_mode();
        let outcome = UpgradeOutcome {
            range_changed: self.blueprint.range != old_range,
            mode_changed: mode != self.fire_mode,
        };
        if outcome.mode_changed {
            self.drop_target(enemies);
            self.fire_mode = mode;
        }
        if outcome.range_changed {
            self.visibility.rescan(map, self.blueprint.range, visibility);
        }
        tracing::debug!(
            turret = %self.id,
            tier,
            name = %self.blueprint.name,
            mode = ?self.fire_mode,
            "Turret upgraded"
        );
        outcome
    }

    /// Record a kill: the target is cleared and any beam disengaged.
    pub fn credit_kill(&mut self, enemies: &mut Pool<Enemy>) {
        self.kills += 1;
        self.drop_target(enemies);
    }

    /// Release the target, removing a freeze beam's slow from it.
    pub fn drop_target(&mut self, enemies: &mut Pool<Enemy>) {
        if let Some(channel) = self.beam.take() {
            if let Some(enemy) = enemies.get_mut(channel.target) {
                enemy.remove_slow(self.id);
            }
        }
        self.target = None;
    }

    /// Whether the heading is within the facing cone of `bearing`.
    #[must_use]
    pub fn is_facing(&self, bearing: Fixed, threshold: Fixed) -> bool {
        let (_, cos) = sin_cos_deg(angle_difference(self.heading, bearing));
        cos > threshold
    }

    /// Run one simulation step.
    ///
    /// Kills are appended to `kills`; crediting them is the caller's job.
    ///
    /// # Errors
    ///
    /// [`GameError::PoolExhausted`] when a bullet cannot be pooled. The shot
    /// is dropped and the cooldown left untouched.
    pub fn update(
        &mut self,
        dt: Fixed,
        field: &mut Battlefield<'_>,
        params: &CombatParams,
        kills: &mut Vec<Kill>,
    ) -> Result<()> {
        self.validate_target(field.enemies, params);

        self.retarget -= dt;
        if self.retarget <= Fixed::ZERO {
            self.retarget = params.retarget_interval;
            if self.beam.is_none() {
                self.target =
                    field
                        .index
                        .select(self.targeting, self.visibility.segments(), self.position);
            }
        }

        self.cooldown = (self.cooldown - dt).max(Fixed::ZERO);

        let Some(target) = self.target else {
            return Ok(());
        };
        let Some(target_position) = field.enemies.get(target).map(Enemy::position) else {
            self.target = None;
            return Ok(());
        };
        let bearing = self.position.bearing_to(target_position);
        self.rotate_towards(bearing, dt);
        let in_limits = self
            .visibility
            .is_angle_within_limits(bearing, params.angle_tolerance);

        if self.fire_mode == FireMode::Beam {
            self.update_beam(dt, target, bearing, in_limits, field.enemies, params, kills);
            return Ok(());
        }

        if self.cooldown > Fixed::ZERO || !in_limits {
            return Ok(());
        }
        if self.fire_mode != FireMode::Melee && !self.is_facing(bearing, params.facing_threshold) {
            return Ok(());
        }

        self.fire(target, target_position, field, params, kills)?;
        self.cooldown = self.blueprint.fire_interval();
        Ok(())
    }

    fn validate_target(&mut self, enemies: &mut Pool<Enemy>, params: &CombatParams) {
        let Some(target) = self.target else {
            return;
        };
        let reach = self.blueprint.range + params.beam_range_slack;
        let valid = enemies.get(target).is_some_and(|enemy| {
            !enemy.is_destroyed()
                && self.visibility.contains_distance(enemy.distance(), Fixed::ZERO)
                && (self.beam.is_none() || enemy.position().distance(self.position) <= reach)
        });
        if !valid {
            self.drop_target(enemies);
        }
    }

    fn rotate_towards(&mut self, bearing: Fixed, dt: Fixed) {
        let max_turn = self.turn_speed * dt;
        let turn = angle_difference(self.heading, bearing).clamp(-max_turn, max_turn);
        self.heading = normalize_degrees(self.heading + turn);
    }

    fn fire(
        &mut self,
        target: Handle,
        target_position: Vec2Fixed,
        field: &mut Battlefield<'_>,
        params: &CombatParams,
        kills: &mut Vec<Kill>,
    ) -> Result<()> {
        let strike = Strike {
            owner: self.id,
            origin: self.position,
            range: self.blueprint.range,
            payload: self.blueprint.hit_payload(),
        };
        match self.fire_mode {
            FireMode::Bullet => {
                let bullet = Projectile::bullet(self.id, self.position, target, &self.blueprint, params);
                field.projectiles.acquire(bullet)?;
            }
            FireMode::Laser => {
                let penetration = self.blueprint.laser_penetration.unwrap_or(1);
                fire_laser(
                    &strike,
                    target_position,
                    penetration,
                    params.ray_step,
                    field.map,
                    field.enemies,
                    kills,
                );
            }
            FireMode::Melee => melee(&strike, field.enemies, kills),
            FireMode::Beam => {}
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn update_beam(
        &mut self,
        dt: Fixed,
        target: Handle,
        bearing: Fixed,
        in_limits: bool,
        enemies: &mut Pool<Enemy>,
        params: &CombatParams,
        kills: &mut Vec<Kill>,
    ) {
        if self.beam.is_some() {
            if !in_limits {
                self.drop_target(enemies);
                return;
            }
            self.channel_tick(dt, enemies, kills);
            return;
        }

        if self.cooldown > Fixed::ZERO || !in_limits || !self.is_facing(bearing, params.facing_threshold) {
            return;
        }
        let Some(beam) = self.blueprint.beam else {
            return;
        };
        if let BeamParams::Freeze { multiplier } = beam {
            if let Some(enemy) = enemies.get_mut(target) {
                enemy.add_slow(self.id, SlowParams::permanent(multiplier));
            }
        }
        self.beam = Some(BeamChannel::engage(target, beam, self.blueprint.damage));
        self.cooldown = self.blueprint.fire_interval();
        self.channel_tick(Fixed::ZERO, enemies, kills);
    }

    fn channel_tick(&mut self, dt: Fixed, enemies: &mut Pool<Enemy>, kills: &mut Vec<Kill>) {
        let Some(channel) = self.beam.as_mut() else {
            return;
        };
        let Some(amount) = channel.tick(dt) else {
            return;
        };
        let target = channel.target;
        if let Some(credited) = enemies
            .get_mut(target)
            .and_then(|enemy| enemy.apply_damage(amount, self.id))
        {
            kills.push(Kill {
                enemy: target,
                credited,
            });
        }
    }
}
