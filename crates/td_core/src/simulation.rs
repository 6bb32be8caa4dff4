//! The simulation context.
//!
//! [`Simulation`] owns every subsystem of a match: the map, the ledger, the
//! clock, the wave scheduler, the enemy and projectile pools and the placed
//! turrets. Subsystems never reach for shared state; each step hands them the
//! pieces they need by reference.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - Randomness comes from ChaCha streams seeded by the match seed
//! - Turrets update in id order, enemies and projectiles in slot order
//! - Same seed and same commands always produce the same [`state_hash`](Simulation::state_hash)
//!
//! # Example
//!
//! ```
//! use td_core::config::GameConfig;
//! use td_core::grid::{GameMap, GridPos, TileGrid};
//! use td_core::simulation::Simulation;
//! use td_core::turret_data::TurretKind;
//!
//! let cells = (0..20).map(|x| GridPos::new(x, 5)).collect();
//! let map = GameMap::from_path(TileGrid::new(20, 11), cells).unwrap();
//! let mut sim = Simulation::with_map(GameConfig::default(), map);
//!
//! let id = sim.place_defender(GridPos::new(10, 7), TurretKind::Basic).unwrap();
//! assert_eq!(sim.balance(), 1200);
//!
//! sim.start_game().unwrap();
//! sim.start_wave(0).unwrap();
//! sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! assert!(sim.turret(id).is_some());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::clock::{GameClock, MatchState, TimeScale};
use crate::config::GameConfig;
use crate::economy::Ledger;
use crate::enemy::{Enemy, Movement};
use crate::enemy_data::EnemyKind;
use crate::error::{GameError, Result};
use crate::grid::{GameMap, GridPos};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::pool::{Handle, Pool};
use crate::projectile::Projectile;
use crate::scheduler::SpawnRequest;
use crate::spawner::{SpawnScheduler, WaveSurvived};
use crate::targeting::{Candidate, PathIndex, TargetingMode};
use crate::turret::{Battlefield, CombatParams, Kill, Turret, TurretId};
use crate::turret_data::TurretKind;
use crate::visibility::VisibilityParams;

/// Mixed into the match seed for the combat random stream.
const COMBAT_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// A player input. Every way of changing a match from outside goes through
/// one of these so matches can be recorded and replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Leave the lobby and start the first countdown.
    StartGame,
    /// Pause or resume.
    TogglePause,
    /// Start the next wave with an explicit reward bonus.
    StartWave {
        /// Percent added to the wave reward.
        bonus_percent: u32,
    },
    /// Start the next wave early, earning the skip bonus.
    SkipToNextWave,
    /// Change the number of steps per tick.
    SetTimeScale(TimeScale),
    /// Build a turret.
    PlaceDefender {
        /// Target cell.
        cell: GridPos,
        /// Turret type.
        kind: TurretKind,
    },
    /// Sell a turret.
    SellDefender(TurretId),
    /// Upgrade a turret.
    UpgradeDefender {
        /// Turret to upgrade.
        id: TurretId,
        /// Tier step: branch (1 or 2) for a choice, 2 otherwise.
        delta_tier: u8,
        /// Whether this picks a branch from tier 0.
        is_choice: bool,
    },
    /// Set a turret's targeting policy.
    SetTargetingMode {
        /// Turret to configure.
        id: TurretId,
        /// New policy.
        mode: TargetingMode,
    },
    /// Advance a turret to its next targeting policy.
    CycleTargetingMode(TurretId),
}

/// Something observable that happened during a tick or command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A wave began spawning.
    WaveStarted {
        /// Wave number.
        index: u32,
        /// Boss wave.
        is_boss: bool,
        /// Enemies the wave will spawn.
        enemies: u32,
    },
    /// Every enemy of a wave was resolved.
    WaveSurvived {
        /// Wave number.
        index: u32,
        /// Reward paid (zero after a leak).
        reward: u64,
    },
    /// An enemy died.
    EnemyKilled {
        /// Wave of the enemy.
        wave: u32,
        /// Enemy type.
        kind: EnemyKind,
        /// Currency paid.
        reward: u64,
        /// Turret credited with the kill.
        turret: TurretId,
    },
    /// An enemy reached the exit.
    EnemyLeaked {
        /// Wave of the enemy.
        wave: u32,
    },
    /// A wave could not start because too many are running.
    WaveCapacityReached,
    /// The last life was lost.
    GameOver {
        /// Waves survived before the end.
        waves_survived: u32,
    },
    /// A pool doubled its capacity.
    PoolGrown {
        /// Pool name.
        pool: String,
        /// New capacity.
        capacity: usize,
    },
}

/// Events produced by one [`Simulation::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Fixed steps executed.
    pub steps: u32,
    /// Events in the order they happened, including those raised by commands
    /// since the previous tick.
    pub events: Vec<SimEvent>,
}

impl TickEvents {
    /// Nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of enemies killed.
    #[must_use]
    pub fn kills(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SimEvent::EnemyKilled { .. }))
            .count()
    }

    /// Number of enemies leaked.
    #[must_use]
    pub fn leaks(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SimEvent::EnemyLeaked { .. }))
            .count()
    }
}

/// The match context.
///
/// # Step Order
///
/// Each fixed step runs, in order:
/// 1. **Spawn** - release due enemies at the path entry
/// 2. **Effects** - slow expiry, sprint, heal and DOT ticks
/// 3. **Movement** - walk the path, collect leaks
/// 4. **Index** - rebuild the path-distance bucket index
/// 5. **Turrets** - target, turn, fire
/// 6. **Projectiles** - fly, hit, pierce, expire
/// 7. **Resolution** - rewards, wave survival, lives, events
/// 8. **Clock** - between-wave timer and automatic wave start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    config: GameConfig,
    map: GameMap,
    ledger: Ledger,
    clock: GameClock,
    spawner: SpawnScheduler,
    enemies: Pool<Enemy>,
    projectiles: Pool<Projectile>,
    turrets: BTreeMap<TurretId, Turret>,
    next_turret_id: u32,
    rng: ChaCha8Rng,
    #[serde(with = "fixed_serde")]
    sell_multiplier: Fixed,
    #[serde(with = "fixed_serde")]
    dt: Fixed,
    #[serde(skip)]
    index: PathIndex,
    #[serde(skip)]
    visibility: VisibilityParams,
    #[serde(skip)]
    combat: CombatParams,
    #[serde(skip)]
    events: Vec<SimEvent>,
}

impl Simulation {
    /// Build a match, generating its map from the configuration.
    ///
    /// # Errors
    ///
    /// [`GameError::ConfigParse`] for an invalid configuration,
    /// [`GameError::MapGenerationFailed`] when no map fits the constraints.
    pub fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;
        let map = GameMap::generate(&config.map, config.seed)?;
        Ok(Self::with_map(config, map))
    }

    /// Build a match on an existing map.
    #[must_use]
    pub fn with_map(config: GameConfig, map: GameMap) -> Self {
        let clock = GameClock::new(
            config.starting_lives,
            Fixed::from_num(config.time_between_waves),
            Fixed::from_num(config.wave_skip_multiplier),
        );
        let spawner = SpawnScheduler::new(config.seed, config.waves.clone(), config.max_running_waves);
        let pools = &config.pools;
        Self {
            tick: 0,
            ledger: Ledger::new(config.starting_currency),
            clock,
            spawner,
            enemies: Pool::new("enemies", pools.enemy_capacity, pools.growable),
            projectiles: Pool::new("projectiles", pools.projectile_capacity, pools.growable),
            turrets: BTreeMap::new(),
            next_turret_id: 1,
            rng: ChaCha8Rng::seed_from_u64(config.seed ^ COMBAT_STREAM),
            sell_multiplier: Fixed::from_num(config.sell_multiplier),
            dt: config.tick_duration(),
            index: PathIndex::new(map.path_length()),
            visibility: VisibilityParams::from(&config.visibility),
            combat: CombatParams::from_config(&config),
            events: Vec::new(),
            map,
            config,
        }
    }

    /// Recompute state that is derived from the configuration and map.
    fn rebuild_derived(&mut self) {
        self.index = PathIndex::new(self.map.path_length());
        self.visibility = VisibilityParams::from(&self.config.visibility);
        self.combat = CombatParams::from_config(&self.config);
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Match configuration.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The map.
    #[must_use]
    pub const fn map(&self) -> &GameMap {
        &self.map
    }

    /// Currency ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Current balance.
    #[must_use]
    pub const fn balance(&self) -> u64 {
        self.ledger.balance()
    }

    /// Match clock.
    #[must_use]
    pub const fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// Remaining lives.
    #[must_use]
    pub const fn lives(&self) -> u32 {
        self.clock.lives()
    }

    /// Most recently started wave.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.clock.wave()
    }

    /// Waves fully resolved.
    #[must_use]
    pub const fn waves_survived(&self) -> u32 {
        self.clock.waves_survived()
    }

    /// Match state.
    #[must_use]
    pub const fn state(&self) -> MatchState {
        self.clock.state()
    }

    /// Wave scheduler.
    #[must_use]
    pub const fn spawner(&self) -> &SpawnScheduler {
        &self.spawner
    }

    /// Placed turrets in id order.
    pub fn turrets(&self) -> impl Iterator<Item = &Turret> {
        self.turrets.values()
    }

    /// Look up a turret.
    #[must_use]
    pub fn turret(&self, id: TurretId) -> Option<&Turret> {
        self.turrets.get(&id)
    }

    /// Live enemies in slot order.
    pub fn enemies(&self) -> impl Iterator<Item = (Handle, &Enemy)> {
        self.enemies.iter()
    }

    /// Look up an enemy. Stale handles resolve to `None`.
    #[must_use]
    pub fn enemy(&self, handle: Handle) -> Option<&Enemy> {
        self.enemies.get(handle)
    }

    /// Projectiles in flight.
    pub fn projectiles(&self) -> impl Iterator<Item = (Handle, &Projectile)> {
        self.projectiles.iter()
    }

    /// Apply a player command.
    ///
    /// # Errors
    ///
    /// Whatever the underlying operation returns; a failed command changes
    /// nothing.
    pub fn apply_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::StartGame => self.start_game(),
            Command::TogglePause => {
                self.toggle_pause();
                Ok(())
            }
            Command::StartWave { bonus_percent } => self.start_wave(bonus_percent).map(|_| ()),
            Command::SkipToNextWave => self.skip_to_next_wave().map(|_| ()),
            Command::SetTimeScale(scale) => {
                self.set_time_scale(scale);
                Ok(())
            }
            Command::PlaceDefender { cell, kind } => self.place_defender(cell, kind).map(|_| ()),
            Command::SellDefender(id) => self.sell_defender(id).map(|_| ()),
            Command::UpgradeDefender {
                id,
                delta_tier,
                is_choice,
            } => self.upgrade_defender(id, delta_tier, is_choice),
            Command::SetTargetingMode { id, mode } => self.set_targeting_mode(id, mode),
            Command::CycleTargetingMode(id) => self.cycle_targeting_mode(id).map(|_| ()),
        }
    }

    /// Leave the lobby and start the first countdown.
    pub fn start_game(&mut self) -> Result<()> {
        self.clock.start_game()
    }

    /// Pause or resume; returns the new state.
    pub fn toggle_pause(&mut self) -> MatchState {
        self.clock.toggle_pause()
    }

    /// Set the number of fixed steps per tick.
    pub fn set_time_scale(&mut self, scale: TimeScale) {
        self.clock.set_time_scale(scale);
    }

    /// Start the next wave, adding `bonus_percent` to its reward.
    ///
    /// Returns the wave number.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] outside a running or paused match;
    /// [`GameError::WaveCapacityExceeded`] when the running-wave cap is hit,
    /// which also raises [`SimEvent::WaveCapacityReached`].
    pub fn start_wave(&mut self, bonus_percent: u32) -> Result<u32> {
        if !matches!(self.clock.state(), MatchState::InGame | MatchState::Paused) {
            return Err(GameError::InvalidState(format!(
                "Cannot start a wave in state {:?}",
                self.clock.state()
            )));
        }
        if let Err(err) = self.spawner.ensure_capacity() {
            self.events.push(SimEvent::WaveCapacityReached);
            return Err(err);
        }
        let (index, is_boss) = self.clock.next_wave();
        let enemies = self.spawner.start_wave(index, is_boss, bonus_percent)?;
        self.clock.on_wave_started();
        self.events.push(SimEvent::WaveStarted {
            index,
            is_boss,
            enemies,
        });
        Ok(index)
    }

    /// Start the next wave before the timer runs out, earning the skip bonus.
    pub fn skip_to_next_wave(&mut self) -> Result<u32> {
        let bonus = self.clock.skip_bonus_percent();
        self.start_wave(bonus)
    }

    /// Build a tier-0 turret of `kind` on `cell`.
    ///
    /// # Errors
    ///
    /// [`GameError::InsufficientFunds`], [`GameError::OutOfBounds`] or
    /// [`GameError::TileOccupied`]; nothing is spent or placed on error.
    pub fn place_defender(&mut self, cell: GridPos, kind: TurretKind) -> Result<TurretId> {
        let cost = kind.base_blueprint().cost;
        if !self.ledger.can_afford(cost) {
            return Err(GameError::InsufficientFunds {
                required: cost,
                available: self.ledger.balance(),
            });
        }
        self.map.place_defender(cell)?;
        self.ledger.spend(cost)?;

        let id = TurretId(self.next_turret_id);
        self.next_turret_id += 1;
        let turret = Turret::new(id, kind, cell, &self.map, &self.visibility, &self.combat);
        tracing::debug!(
            turret = %id,
            kind = kind.name(),
            %cell,
            segments = turret.visibility().segments().len(),
            "Turret placed"
        );
        self.turrets.insert(id, turret);
        Ok(id)
    }

    /// Sell a turret, refunding the floor of its sell value times the sell
    /// multiplier. Returns the refund.
    pub fn sell_defender(&mut self, id: TurretId) -> Result<u64> {
        let cell = self
            .turrets
            .get(&id)
            .ok_or(GameError::TurretNotFound(id))?
            .cell();
        self.map.clear_defender(cell)?;
        let Some(mut turret) = self.turrets.remove(&id) else {
            return Err(GameError::TurretNotFound(id));
        };
        turret.drop_target(&mut self.enemies);

        let refund: u64 = (Fixed::from_num(turret.sell_value()) * self.sell_multiplier)
            .floor()
            .to_num();
        self.ledger.deposit(refund);
        tracing::debug!(turret = %id, refund, "Turret sold");
        Ok(refund)
    }

    /// Upgrade a turret, paying the tier's cost.
    ///
    /// # Errors
    ///
    /// [`GameError::TurretNotFound`], [`GameError::InvalidTier`] or
    /// [`GameError::InsufficientFunds`]; nothing changes on error.
    pub fn upgrade_defender(&mut self, id: TurretId, delta_tier: u8, is_choice: bool) -> Result<()> {
        let turret = self.turrets.get_mut(&id).ok_or(GameError::TurretNotFound(id))?;
        let (tier, delta) = turret.plan_upgrade(delta_tier, is_choice)?;
        self.ledger.spend(delta.cost)?;
        turret.apply_upgrade(tier, &delta, &self.map, &self.visibility, &mut self.enemies);
        Ok(())
    }

    /// Set a turret's targeting policy.
    pub fn set_targeting_mode(&mut self, id: TurretId, mode: TargetingMode) -> Result<()> {
        self.turrets
            .get_mut(&id)
            .ok_or(GameError::TurretNotFound(id))?
            .set_targeting(mode);
        Ok(())
    }

    /// Advance a turret to its next targeting policy and return it.
    pub fn cycle_targeting_mode(&mut self, id: TurretId) -> Result<TargetingMode> {
        Ok(self
            .turrets
            .get_mut(&id)
            .ok_or(GameError::TurretNotFound(id))?
            .cycle_targeting())
    }

    /// Advance the simulation by one tick.
    ///
    /// A running match executes one fixed step per time-scale step; otherwise
    /// only the tick counter moves. Returns the events raised since the
    /// previous tick.
    pub fn tick(&mut self) -> TickEvents {
        let mut steps = 0;
        for _ in 0..self.clock.time_scale().steps() {
            if !self.clock.is_running() {
                break;
            }
            self.step();
            steps += 1;
        }

        self.tick += 1;

        #[cfg(debug_assertions)]
        if tracing::enabled!(tracing::Level::DEBUG) {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents {
            steps,
            events: std::mem::take(&mut self.events),
        }
    }

    /// Run one fixed step.
    fn step(&mut self) {
        let dt = self.dt;
        let mut kills = Vec::new();
        let mut survived = Vec::new();

        // 1. Spawn
        let spawn = self.spawner.advance(dt);
        survived.extend(spawn.survived);
        self.spawn_enemies(&spawn.requests, &mut survived);

        // 2. Effects
        for (handle, enemy) in self.enemies.iter_mut() {
            if let Some(credited) = enemy.update_effects(dt) {
                kills.push(Kill {
                    enemy: handle,
                    credited,
                });
            }
        }

        // 3. Movement
        let mut leaks = Vec::new();
        let waypoints = self.map.waypoints();
        for (handle, enemy) in self.enemies.iter_mut() {
            if enemy.advance(dt, waypoints) == Movement::Leaked {
                leaks.push((handle, enemy.wave()));
            }
        }
        for &(handle, _) in &leaks {
            self.enemies.release(handle);
        }

        // 4. Index
        self.index.rebuild(
            self.enemies
                .iter()
                .filter(|(_, enemy)| !enemy.is_destroyed())
                .map(|(handle, enemy)| Candidate {
                    handle,
                    distance: enemy.distance(),
                    hp: enemy.hp(),
                    position: enemy.position(),
                }),
        );

        // 5. Turrets
        let mut field = Battlefield {
            map: &self.map,
            index: &self.index,
            enemies: &mut self.enemies,
            projectiles: &mut self.projectiles,
        };
        for turret in self.turrets.values_mut() {
            if let Err(err) = turret.update(dt, &mut field, &self.combat, &mut kills) {
                tracing::warn!(turret = %turret.id(), %err, "Shot dropped");
            }
        }

        // 6. Projectiles
        for handle in self.projectiles.handles() {
            let Some(projectile) = self.projectiles.get_mut(handle) else {
                continue;
            };
            let alive = projectile.advance(
                dt,
                &mut self.enemies,
                &self.map,
                self.combat.hit_radius,
                &mut self.rng,
                &mut kills,
            );
            if !alive {
                self.projectiles.release(handle);
            }
        }

        // 7. Resolution
        self.resolve_kills(&kills, &mut survived);
        self.resolve_leaks(&leaks, &mut survived);
        for wave in survived {
            self.on_wave_survived(wave);
        }
        if spawn.all_spawned {
            self.clock.on_all_spawned();
        }
        self.report_pool_growth();

        // 8. Clock
        if self.clock.is_running() && self.clock.tick(dt) {
            self.auto_start_wave();
        }
    }

    fn spawn_enemies(&mut self, requests: &[SpawnRequest], survived: &mut Vec<WaveSurvived>) {
        let start = self.map.waypoints().first().copied().unwrap_or(Vec2Fixed::ZERO);
        for request in requests {
            let enemy = Enemy::spawn(request.wave, request.kind, start);
            if let Err(err) = self.enemies.acquire(enemy) {
                tracing::warn!(wave = request.wave, kind = ?request.kind, %err, "Enemy dropped");
                survived.extend(self.spawner.on_enemy_killed(request.wave));
            }
        }
    }

    fn resolve_kills(&mut self, kills: &[Kill], survived: &mut Vec<WaveSurvived>) {
        for kill in kills {
            // A second kill record for the same enemy finds the slot released.
            let Some(enemy) = self.enemies.get(kill.enemy) else {
                continue;
            };
            let (wave, kind) = (enemy.wave(), enemy.kind());
            self.enemies.release(kill.enemy);

            let reward = u64::from(kind.blueprint().reward);
            self.ledger.deposit(reward);
            if let Some(turret) = self.turrets.get_mut(&kill.credited) {
                turret.credit_kill(&mut self.enemies);
            }
            survived.extend(self.spawner.on_enemy_killed(wave));
            self.events.push(SimEvent::EnemyKilled {
                wave,
                kind,
                reward,
                turret: kill.credited,
            });
        }
    }

    fn resolve_leaks(&mut self, leaks: &[(Handle, u32)], survived: &mut Vec<WaveSurvived>) {
        for &(_, wave) in leaks {
            self.events.push(SimEvent::EnemyLeaked { wave });
            survived.extend(self.spawner.on_enemy_leaked(wave));
            if let Some(waves_survived) = self.clock.on_leak() {
                self.events.push(SimEvent::GameOver { waves_survived });
            }
        }
    }

    fn on_wave_survived(&mut self, wave: WaveSurvived) {
        self.ledger.deposit(wave.reward);
        self.clock.on_wave_survived();
        self.events.push(SimEvent::WaveSurvived {
            index: wave.index,
            reward: wave.reward,
        });
    }

    fn report_pool_growth(&mut self) {
        if let Some(capacity) = self.enemies.take_growth() {
            self.events.push(SimEvent::PoolGrown {
                pool: self.enemies.name().to_string(),
                capacity,
            });
        }
        if let Some(capacity) = self.projectiles.take_growth() {
            self.events.push(SimEvent::PoolGrown {
                pool: self.projectiles.name().to_string(),
                capacity,
            });
        }
    }

    fn auto_start_wave(&mut self) {
        if self.spawner.ensure_capacity().is_err() {
            if self.clock.on_capacity_reached() {
                tracing::warn!(
                    running = self.spawner.running_count(),
                    max = self.config.max_running_waves,
                    "Automatic wave start rejected"
                );
                self.events.push(SimEvent::WaveCapacityReached);
            }
            return;
        }
        if let Err(err) = self.start_wave(0) {
            tracing::warn!(%err, "Automatic wave start failed");
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes; replays
    /// compare it to detect divergence.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.ledger.hash(&mut hasher);

        self.clock.state().hash(&mut hasher);
        self.clock.lives().hash(&mut hasher);
        self.clock.wave().hash(&mut hasher);
        self.clock.waves_survived().hash(&mut hasher);
        self.clock.timer().map(Fixed::to_bits).hash(&mut hasher);

        for (index, wave) in self.spawner.running() {
            index.hash(&mut hasher);
            wave.remaining.hash(&mut hasher);
            wave.reward.hash(&mut hasher);
        }

        self.enemies.len().hash(&mut hasher);
        for (handle, enemy) in self.enemies.iter() {
            handle.hash(&mut hasher);
            enemy.kind().hash(&mut hasher);
            enemy.hp().to_bits().hash(&mut hasher);
            enemy.position().x.to_bits().hash(&mut hasher);
            enemy.position().y.to_bits().hash(&mut hasher);
            enemy.distance().to_bits().hash(&mut hasher);
        }

        self.projectiles.len().hash(&mut hasher);
        for (handle, projectile) in self.projectiles.iter() {
            handle.hash(&mut hasher);
            projectile.position().x.to_bits().hash(&mut hasher);
            projectile.position().y.to_bits().hash(&mut hasher);
        }

        for (id, turret) in &self.turrets {
            id.hash(&mut hasher);
            turret.tier().hash(&mut hasher);
            turret.target().hash(&mut hasher);
            turret.cooldown().to_bits().hash(&mut hasher);
            turret.heading().to_bits().hash(&mut hasher);
            turret.kills().hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the simulation state for snapshots and replays.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {}", e)))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut sim: Self = bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {}", e))
        })?;
        sim.rebuild_derived();
        Ok(sim)
    }
}
