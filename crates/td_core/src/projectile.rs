//! Weapon delivery: pooled bullets, instant lasers and melee sweeps.
//!
//! Bullets home on their target until impact. A piercing bullet hit-tests
//! the segment it covers every tick, in both phases; its first hit freezes
//! the heading and every hit rolls the pierce chance.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::enemy::Enemy;
use crate::grid::GameMap;
use crate::math::{fixed_serde, option_fixed_serde, random_unit, Fixed, Vec2Fixed};
use crate::pool::{Handle, Pool};
use crate::turret::{CombatParams, Kill, TurretId};
use crate::turret_data::{HitPayload, TurretBlueprint};

/// Half-width of a laser ray, matching the path half-width.
pub const LASER_HALF_WIDTH: f64 = 0.5;

/// An instant attack from a turret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    /// Turret credited with hits.
    pub owner: TurretId,
    /// Where the attack starts.
    pub origin: Vec2Fixed,
    /// Reach of the attack.
    pub range: Fixed,
    /// What each hit carries.
    pub payload: HitPayload,
}

fn hit(enemies: &mut Pool<Enemy>, handle: Handle, payload: &HitPayload, owner: TurretId, kills: &mut Vec<Kill>) {
    if let Some(credited) = enemies
        .get_mut(handle)
        .and_then(|enemy| enemy.on_hit(payload, owner))
    {
        kills.push(Kill {
            enemy: handle,
            credited,
        });
    }
}

/// Fire a penetrating ray from the strike origin toward `toward`.
///
/// The ray stops at the first obstacle and hits up to `penetration`
/// enemies within [`LASER_HALF_WIDTH`] of it, nearest first.
pub fn fire_laser(
    strike: &Strike,
    toward: Vec2Fixed,
    penetration: u32,
    ray_step: Fixed,
    map: &GameMap,
    enemies: &mut Pool<Enemy>,
    kills: &mut Vec<Kill>,
) {
    let direction = (toward - strike.origin).normalize();
    if direction == Vec2Fixed::ZERO || ray_step <= Fixed::ZERO {
        return;
    }

    let mut limit = strike.range;
    let mut travelled = ray_step;
    while travelled <= strike.range {
        if map.grid().blocks_sight(strike.origin + direction.scale(travelled)) {
            limit = travelled;
            break;
        }
        travelled += ray_step;
    }

    let half_width = Fixed::from_num(LASER_HALF_WIDTH);
    let mut struck: Vec<(Fixed, Handle)> = enemies
        .iter()
        .filter(|(_, enemy)| !enemy.is_destroyed())
        .filter_map(|(handle, enemy)| {
            let offset = enemy.position() - strike.origin;
            let along = offset.dot(direction);
            if along < Fixed::ZERO || along > limit {
                return None;
            }
            let across = offset - direction.scale(along);
            (across.dot(across) <= half_width * half_width).then_some((along, handle))
        })
        .collect();
    struck.sort_unstable();

    for (_, handle) in struck.into_iter().take(penetration as usize) {
        hit(enemies, handle, &strike.payload, strike.owner, kills);
    }
}

/// Hit every live enemy within range of the strike origin.
pub fn melee(strike: &Strike, enemies: &mut Pool<Enemy>, kills: &mut Vec<Kill>) {
    let reach = strike.range * strike.range;
    let struck: Vec<Handle> = enemies
        .iter()
        .filter(|(_, enemy)| {
            !enemy.is_destroyed() && enemy.position().distance_squared(strike.origin) <= reach
        })
        .map(|(handle, _)| handle)
        .collect();
    for handle in struck {
        hit(enemies, handle, &strike.payload, strike.owner, kills);
    }
}

/// A pooled bullet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    owner: TurretId,
    origin: Vec2Fixed,
    target: Option<Handle>,
    position: Vec2Fixed,
    /// Straight-line heading once piercing; `None` while homing.
    direction: Option<Vec2Fixed>,
    #[serde(with = "fixed_serde")]
    elapsed: Fixed,
    #[serde(with = "fixed_serde")]
    lifetime: Fixed,
    #[serde(with = "fixed_serde")]
    speed: Fixed,
    payload: HitPayload,
    #[serde(with = "fixed_serde")]
    splash_radius: Fixed,
    #[serde(with = "option_fixed_serde")]
    piercing: Option<Fixed>,
    previous_hits: Vec<Handle>,
}

impl Projectile {
    /// A bullet from `origin` homing on `target`, carrying the blueprint's payload.
    #[must_use]
    pub fn bullet(
        owner: TurretId,
        origin: Vec2Fixed,
        target: Handle,
        blueprint: &TurretBlueprint,
        params: &CombatParams,
    ) -> Self {
        Self {
            owner,
            origin,
            target: Some(target),
            position: origin,
            direction: None,
            elapsed: Fixed::ZERO,
            lifetime: params.bullet_lifetime,
            speed: params.bullet_speed,
            payload: blueprint.hit_payload(),
            splash_radius: blueprint.splash_radius,
            piercing: blueprint.piercing_chance,
            previous_hits: Vec::new(),
        }
    }

    /// Firing turret.
    #[must_use]
    pub const fn owner(&self) -> TurretId {
        self.owner
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Homing target.
    #[must_use]
    pub const fn target(&self) -> Option<Handle> {
        self.target
    }

    /// Whether the bullet flies straight after a piercing hit.
    #[must_use]
    pub const fn is_piercing(&self) -> bool {
        self.direction.is_some()
    }

    /// Enemies already hit by this bullet.
    #[must_use]
    pub fn previous_hits(&self) -> &[Handle] {
        &self.previous_hits
    }

    /// Fly for `dt` seconds. Returns `false` once the bullet should be released.
    pub fn advance<R: Rng>(
        &mut self,
        dt: Fixed,
        enemies: &mut Pool<Enemy>,
        map: &GameMap,
        hit_radius: Fixed,
        rng: &mut R,
        kills: &mut Vec<Kill>,
    ) -> bool {
        self.elapsed += dt;
        if self.elapsed >= self.lifetime {
            return false;
        }
        let step = self.speed * dt;
        match self.direction {
            None => self.home(step, enemies, map, hit_radius, rng, kills),
            Some(direction) => self.fly_straight(step, direction, enemies, map, hit_radius, rng, kills),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn home<R: Rng>(
        &mut self,
        step: Fixed,
        enemies: &mut Pool<Enemy>,
        map: &GameMap,
        hit_radius: Fixed,
        rng: &mut R,
        kills: &mut Vec<Kill>,
    ) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        let Some(goal) = enemies
            .get(target)
            .filter(|enemy| !enemy.is_destroyed())
            .map(Enemy::position)
        else {
            return false;
        };

        let (next, reached) = self.position.move_towards(goal, step);
        if !reached {
            if self.piercing.is_none() {
                self.position = next;
                return true;
            }
            // Piercing bullets hit whatever lies between them and the target.
            let heading = (goal - self.position).normalize();
            return self.fly_straight(step, heading, enemies, map, hit_radius, rng, kills);
        }
        self.position = goal;

        if self.splash_radius > Fixed::ZERO {
            let reach = self.splash_radius * self.splash_radius;
            let struck: Vec<Handle> = enemies
                .iter()
                .filter(|(_, e)| !e.is_destroyed() && e.position().distance_squared(goal) <= reach)
                .map(|(handle, _)| handle)
                .collect();
            for handle in struck {
                hit(enemies, handle, &self.payload, self.owner, kills);
            }
            return false;
        }

        if self.piercing.is_none() {
            hit(enemies, target, &self.payload, self.owner, kills);
            return false;
        }
        self.pierce(target, goal, enemies, rng, kills)
    }

    /// Hit `handle` and roll whether the bullet carries on.
    ///
    /// The first hit freezes the heading away from the firing turret.
    fn pierce<R: Rng>(
        &mut self,
        handle: Handle,
        at: Vec2Fixed,
        enemies: &mut Pool<Enemy>,
        rng: &mut R,
        kills: &mut Vec<Kill>,
    ) -> bool {
        hit(enemies, handle, &self.payload, self.owner, kills);
        self.previous_hits.push(handle);
        if self.direction.is_none() {
            let heading = (at - self.origin).normalize();
            if heading == Vec2Fixed::ZERO {
                return false;
            }
            self.direction = Some(heading);
            self.target = None;
        }
        random_unit(rng) < self.piercing.unwrap_or(Fixed::ZERO)
    }

    /// Move `step` along `direction`, hit-testing the covered segment.
    #[allow(clippy::too_many_arguments)]
    fn fly_straight<R: Rng>(
        &mut self,
        step: Fixed,
        direction: Vec2Fixed,
        enemies: &mut Pool<Enemy>,
        map: &GameMap,
        hit_radius: Fixed,
        rng: &mut R,
        kills: &mut Vec<Kill>,
    ) -> bool {
        let from = self.position;
        let to = from + direction.scale(step);
        if map.grid().cell_at(to).is_none() || map.grid().blocks_sight(to) {
            return false;
        }

        let reach = hit_radius * hit_radius;
        let mut struck: Vec<(Fixed, Handle, Vec2Fixed)> = enemies
            .iter()
            .filter(|(handle, enemy)| !enemy.is_destroyed() && !self.previous_hits.contains(handle))
            .filter_map(|(handle, enemy)| {
                let offset = enemy.position() - from;
                let along = offset.dot(direction).clamp(Fixed::ZERO, step);
                let closest = from + direction.scale(along);
                (enemy.position().distance_squared(closest) <= reach)
                    .then_some((along, handle, enemy.position()))
            })
            .collect();
        struck.sort_unstable_by_key(|&(along, handle, _)| (along, handle));

        self.position = to;
        for (_, handle, at) in struck {
            if !self.pierce(handle, at, enemies, rng, kills) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enemy_data::EnemyKind;
    use crate::grid::{GridPos, Tile, TileGrid};
    use crate::turret_data::TurretKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fixed(n: f64) -> Fixed {
        Fixed::from_num(n)
    }

    fn dt() -> Fixed {
        Fixed::ONE / Fixed::from_num(50)
    }

    const OWNER: TurretId = TurretId(3);

    /// East-west path along row 5 of a 30x11 map.
    fn corridor(obstacles: &[(u32, u32)]) -> GameMap {
        wide_corridor(30, obstacles)
    }

    fn wide_corridor(width: u32, obstacles: &[(u32, u32)]) -> GameMap {
        let mut grid = TileGrid::new(width, 11);
        for &(x, y) in obstacles {
            grid.set(GridPos::new(x, y), Tile::Obstacle);
        }
        let cells = (0..width).map(|x| GridPos::new(x, 5)).collect();
        GameMap::from_path(grid, cells).unwrap()
    }

    /// Pool with a Slow enemy standing on each of the given path cells.
    fn enemies_at(map: &GameMap, cells: &[usize]) -> (Pool<Enemy>, Vec<Handle>) {
        let mut pool = Pool::new("enemies", 4, true);
        let handles = cells
            .iter()
            .map(|&cell| {
                let mut enemy = Enemy::spawn(1, EnemyKind::Slow, map.waypoints()[0]);
                // 1.25 cells per second.
                enemy.advance(fixed(cell as f64 * 0.8), map.waypoints());
                pool.acquire(enemy).unwrap()
            })
            .collect();
        (pool, handles)
    }

    fn hp(pool: &Pool<Enemy>, handle: Handle) -> Fixed {
        pool.get(handle).unwrap().hp()
    }

    fn strike(origin: Vec2Fixed, range: f64, damage: f64) -> Strike {
        Strike {
            owner: OWNER,
            origin,
            range: fixed(range),
            payload: HitPayload {
                damage: fixed(damage),
                ..HitPayload::default()
            },
        }
    }

    fn javelin(chance: f64) -> TurretBlueprint {
        let mut blueprint = TurretKind::Javelin.base_blueprint();
        blueprint.damage = fixed(10.0);
        blueprint.piercing_chance = Some(fixed(chance));
        blueprint
    }

    /// Fly `bullet` until released, returning the steps taken.
    fn fly(
        bullet: &mut Projectile,
        map: &GameMap,
        pool: &mut Pool<Enemy>,
        kills: &mut Vec<Kill>,
    ) -> usize {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let params = CombatParams::default();
        for step in 1..=1000 {
            if !bullet.advance(dt(), pool, map, params.hit_radius, &mut rng, kills) {
                return step;
            }
        }
        panic!("bullet never released");
    }

    #[test]
    fn test_laser_penetration_nearest_first() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[5, 6, 7, 8]);
        let origin = TileGrid::cell_center(GridPos::new(3, 5));
        let mut kills = Vec::new();
        let toward = map.waypoints()[10];
        fire_laser(&strike(origin, 10.0, 40.0), toward, 2, fixed(0.1), &map, &mut pool, &mut kills);
        assert_eq!(hp(&pool, handles[0]), fixed(310.0));
        assert_eq!(hp(&pool, handles[1]), fixed(310.0));
        assert_eq!(hp(&pool, handles[2]), fixed(350.0));
        assert!(kills.is_empty());
    }

    #[test]
    fn test_laser_stops_at_obstacle() {
        let origin = TileGrid::cell_center(GridPos::new(5, 8));
        for (wall, expected) in [(&[][..], 310.0), (&[(5, 6)][..], 350.0)] {
            let map = corridor(wall);
            let (mut pool, handles) = enemies_at(&map, &[5]);
            let mut kills = Vec::new();
            let toward = map.waypoints()[5];
            fire_laser(&strike(origin, 5.0, 40.0), toward, 5, fixed(0.1), &map, &mut pool, &mut kills);
            assert_eq!(hp(&pool, handles[0]), fixed(expected));
        }
    }

    #[test]
    fn test_laser_respects_range_and_reports_kills() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[5, 9]);
        let origin = TileGrid::cell_center(GridPos::new(3, 5));
        let mut kills = Vec::new();
        fire_laser(&strike(origin, 3.0, 500.0), map.waypoints()[10], 5, fixed(0.1), &map, &mut pool, &mut kills);
        assert_eq!(kills, vec![Kill { enemy: handles[0], credited: OWNER }]);
        assert_eq!(hp(&pool, handles[1]), fixed(350.0));
    }

    #[test]
    fn test_melee_radius() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[4, 5, 6, 9]);
        let origin = TileGrid::cell_center(GridPos::new(5, 6));
        let mut kills = Vec::new();
        melee(&strike(origin, 1.6, 10.0), &mut pool, &mut kills);
        let hps: Vec<Fixed> = handles.iter().map(|h| hp(&pool, *h)).collect();
        assert_eq!(hps, vec![fixed(340.0), fixed(340.0), fixed(340.0), fixed(350.0)]);
    }

    #[test]
    fn test_bullet_homes_and_hits() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[8]);
        let origin = TileGrid::cell_center(GridPos::new(8, 8));
        let blueprint = TurretKind::Basic.base_blueprint();
        let mut bullet = Projectile::bullet(OWNER, origin, handles[0], &blueprint, &CombatParams::default());
        let mut kills = Vec::new();
        let steps = fly(&mut bullet, &map, &mut pool, &mut kills);
        // Three cells at ten cells per second.
        assert!((15..=16).contains(&steps), "{steps} steps");
        assert_eq!(hp(&pool, handles[0]), fixed(300.0));
    }

    #[test]
    fn test_bullet_released_when_target_vanishes() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[8]);
        let origin = TileGrid::cell_center(GridPos::new(8, 8));
        let blueprint = TurretKind::Basic.base_blueprint();
        let mut bullet = Projectile::bullet(OWNER, origin, handles[0], &blueprint, &CombatParams::default());
        pool.release(handles[0]);
        let mut kills = Vec::new();
        assert_eq!(fly(&mut bullet, &map, &mut pool, &mut kills), 1);
    }

    #[test]
    fn test_splash_hits_neighbours() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[7, 8, 9, 12]);
        let origin = TileGrid::cell_center(GridPos::new(8, 8));
        let blueprint = TurretKind::Pulse.base_blueprint();
        let mut bullet = Projectile::bullet(OWNER, origin, handles[1], &blueprint, &CombatParams::default());
        let mut kills = Vec::new();
        fly(&mut bullet, &map, &mut pool, &mut kills);
        let hps: Vec<Fixed> = handles.iter().map(|h| hp(&pool, *h)).collect();
        assert_eq!(hps, vec![fixed(260.0), fixed(260.0), fixed(260.0), fixed(350.0)]);
    }

    #[test]
    fn test_pierce_chance_zero_stops_at_first_hit() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[5, 6, 7, 8]);
        let origin = TileGrid::cell_center(GridPos::new(2, 5));
        let mut bullet =
            Projectile::bullet(OWNER, origin, handles[0], &javelin(0.0), &CombatParams::default());
        let mut kills = Vec::new();
        fly(&mut bullet, &map, &mut pool, &mut kills);
        assert_eq!(hp(&pool, handles[0]), fixed(340.0));
        for handle in &handles[1..] {
            assert_eq!(hp(&pool, *handle), fixed(350.0));
        }
    }

    #[test]
    fn test_pierce_chance_one_passes_through_chain() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[5, 6, 7, 8]);
        let origin = TileGrid::cell_center(GridPos::new(2, 5));
        let mut bullet =
            Projectile::bullet(OWNER, origin, handles[0], &javelin(1.0), &CombatParams::default());
        let mut kills = Vec::new();
        fly(&mut bullet, &map, &mut pool, &mut kills);
        for handle in &handles {
            assert_eq!(hp(&pool, *handle), fixed(340.0));
        }
        assert_eq!(bullet.previous_hits().len(), 4);
    }

    #[test]
    fn test_piercing_bullet_hits_enemies_before_its_target() {
        let map = corridor(&[]);
        let origin = TileGrid::cell_center(GridPos::new(2, 5));

        let (mut pool, handles) = enemies_at(&map, &[5, 6, 7, 8]);
        let mut bullet =
            Projectile::bullet(OWNER, origin, handles[3], &javelin(1.0), &CombatParams::default());
        let mut kills = Vec::new();
        fly(&mut bullet, &map, &mut pool, &mut kills);
        for handle in &handles {
            assert_eq!(hp(&pool, *handle), fixed(340.0));
        }
        assert_eq!(bullet.previous_hits(), &handles[..]);

        // A failed roll on the first enemy in the way spends the bullet.
        let (mut pool, handles) = enemies_at(&map, &[5, 6, 7, 8]);
        let mut bullet =
            Projectile::bullet(OWNER, origin, handles[3], &javelin(0.0), &CombatParams::default());
        fly(&mut bullet, &map, &mut pool, &mut kills);
        let hps: Vec<Fixed> = handles.iter().map(|h| hp(&pool, *h)).collect();
        assert_eq!(hps, vec![fixed(340.0), fixed(350.0), fixed(350.0), fixed(350.0)]);
    }

    #[test]
    fn test_homing_piercing_bullet_stopped_by_wall() {
        // Wall between the turret and its target.
        let map = corridor(&[(5, 7)]);
        let (mut pool, handles) = enemies_at(&map, &[5]);
        let origin = TileGrid::cell_center(GridPos::new(5, 8));
        let mut bullet =
            Projectile::bullet(OWNER, origin, handles[0], &javelin(1.0), &CombatParams::default());
        let mut kills = Vec::new();
        let steps = fly(&mut bullet, &map, &mut pool, &mut kills);
        assert!(steps < 10, "{steps} steps");
        assert_eq!(hp(&pool, handles[0]), fixed(350.0));
        assert!(!bullet.is_piercing());
    }

    #[test]
    fn test_pierce_chain_ends_at_lifetime() {
        // Wide enough that the bullet cannot leave the map in its lifetime.
        let map = wide_corridor(120, &[]);
        let (mut pool, handles) = enemies_at(&map, &[5, 6, 7, 8]);
        let origin = TileGrid::cell_center(GridPos::new(2, 5));
        let params = CombatParams::default();
        let mut bullet = Projectile::bullet(OWNER, origin, handles[0], &javelin(1.0), &params);
        let mut kills = Vec::new();
        let steps = fly(&mut bullet, &map, &mut pool, &mut kills);

        let expected: usize = (params.bullet_lifetime / dt()).ceil().to_num();
        assert_eq!(steps, expected);
        assert_eq!(bullet.previous_hits().len(), 4);
        assert!(map.grid().cell_at(bullet.position()).is_some());
    }

    #[test]
    fn test_piercing_bullet_stopped_by_wall() {
        // Fired across the path; after the hit it keeps flying the same way.
        let origin = TileGrid::cell_center(GridPos::new(5, 8));
        let mut steps = Vec::new();
        for wall in [&[][..], &[(5, 3)][..]] {
            let map = corridor(wall);
            let (mut pool, handles) = enemies_at(&map, &[5]);
            let mut bullet =
                Projectile::bullet(OWNER, origin, handles[0], &javelin(1.0), &CombatParams::default());
            let mut kills = Vec::new();
            steps.push(fly(&mut bullet, &map, &mut pool, &mut kills));
            assert_eq!(hp(&pool, handles[0]), fixed(340.0));
            assert!(bullet.is_piercing());
        }
        assert!(steps[1] < steps[0], "{steps:?}");
    }

    #[test]
    fn test_lifetime_expiry() {
        let map = corridor(&[]);
        let (mut pool, handles) = enemies_at(&map, &[5]);
        let origin = TileGrid::cell_center(GridPos::new(2, 5));
        let mut params = CombatParams::default();
        params.bullet_speed = fixed(0.1);
        params.bullet_lifetime = fixed(1.0);
        let blueprint = TurretKind::Basic.base_blueprint();
        let mut bullet = Projectile::bullet(OWNER, origin, handles[0], &blueprint, &params);
        let mut kills = Vec::new();
        let steps = fly(&mut bullet, &map, &mut pool, &mut kills);
        assert!((50..=51).contains(&steps), "{steps} steps");
        assert_eq!(hp(&pool, handles[0]), fixed(350.0));
    }
}
