//! Match metrics collection for balance analysis.
//!
//! A [`MetricsCollector`] watches the events of one match; a
//! [`BatchSummary`] aggregates many finished matches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use td_core::simulation::{Command, SimEvent, Simulation, TickEvents};

/// Complete metrics for a single match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique match identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Strategy name.
    pub strategy: String,
    /// Random seed used.
    pub seed: u64,
    /// Total match duration in ticks.
    pub duration_ticks: u64,
    /// Waves started.
    pub waves_started: u32,
    /// Waves fully resolved.
    pub waves_survived: u32,
    /// Waves resolved with a full reward (no leaks).
    pub waves_clean: u32,
    /// Lives ran out before the tick limit.
    pub game_over: bool,
    /// Lives remaining at the end.
    pub lives_left: u32,
    /// Enemies killed.
    pub enemies_killed: u32,
    /// Enemies that reached the exit.
    pub enemies_leaked: u32,
    /// Kills credited per turret type.
    pub kills_by_turret: BTreeMap<String, u32>,
    /// Kills per enemy type.
    pub kills_by_enemy: BTreeMap<String, u32>,
    /// Currency paid out by kills and waves.
    pub currency_earned: u64,
    /// Currency spent on turrets and upgrades.
    pub currency_spent: u64,
    /// Balance at the end.
    pub final_balance: u64,
    /// Turrets placed.
    pub turrets_built: u32,
    /// Upgrades bought.
    pub upgrades_bought: u32,
    /// Commands the simulation rejected.
    pub commands_rejected: u32,
    /// Most enemies alive at once.
    pub peak_enemies: u32,
    /// Wave-level events log.
    pub events: Vec<TimedEvent>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new match metrics instance.
    #[must_use]
    pub fn new(
        game_id: impl Into<String>,
        scenario: impl Into<String>,
        strategy: impl Into<String>,
        seed: u64,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            strategy: strategy.into(),
            seed,
            ..Default::default()
        }
    }

    /// Record a timed event.
    pub fn record_event(&mut self, tick: u64, event_type: EventType, details: impl Into<String>) {
        self.events.push(TimedEvent {
            tick,
            event_type,
            details: details.into(),
        });
    }

    /// Share of kills landed by each turret type.
    #[must_use]
    pub fn kill_shares(&self) -> BTreeMap<String, f64> {
        let total: u32 = self.kills_by_turret.values().sum();
        self.kills_by_turret
            .iter()
            .map(|(kind, kills)| (kind.clone(), f64::from(*kills) / f64::from(total.max(1))))
            .collect()
    }
}

/// A timed event during the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Tick when the event occurred.
    pub tick: u64,
    /// Type of event.
    pub event_type: EventType,
    /// Event details.
    pub details: String,
}

/// Types of events that are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A wave began spawning.
    WaveStarted,
    /// A wave resolved with no leaks.
    WaveCleared,
    /// A wave resolved after at least one leak.
    WaveLeaked,
    /// A wave start was refused at the running-wave cap.
    CapacityReached,
    /// An object pool grew.
    PoolGrown,
    /// The last life was lost.
    GameOver,
}

/// Summary statistics across multiple matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total matches played.
    pub total_games: u32,
    /// Matches that ended with lives exhausted.
    pub games_over: u32,
    /// Average waves survived.
    pub avg_waves_survived: f64,
    /// Fewest waves survived.
    pub min_waves_survived: u32,
    /// Most waves survived.
    pub max_waves_survived: u32,
    /// Average match duration in ticks.
    pub avg_duration_ticks: f64,
    /// Average kills per match.
    pub avg_kills: f64,
    /// Average leaks per match.
    pub avg_leaks: f64,
    /// Average currency earned per match.
    pub avg_earned: f64,
    /// Total kills per turret type across all matches.
    pub kills_by_turret: BTreeMap<String, u64>,
    /// Kill share per turret type across all matches.
    pub kill_shares: BTreeMap<String, f64>,
}

impl BatchSummary {
    /// Calculate summary from a list of match metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let count = games.len() as f64;
        let mut summary = Self {
            total_games: games.len() as u32,
            min_waves_survived: u32::MAX,
            ..Default::default()
        };

        let (mut waves, mut duration, mut kills, mut leaks, mut earned) = (0u64, 0u64, 0u64, 0u64, 0u64);
        for game in games {
            if game.game_over {
                summary.games_over += 1;
            }
            waves += u64::from(game.waves_survived);
            summary.min_waves_survived = summary.min_waves_survived.min(game.waves_survived);
            summary.max_waves_survived = summary.max_waves_survived.max(game.waves_survived);
            duration += game.duration_ticks;
            kills += u64::from(game.enemies_killed);
            leaks += u64::from(game.enemies_leaked);
            earned += game.currency_earned;

            for (kind, turret_kills) in &game.kills_by_turret {
                *summary.kills_by_turret.entry(kind.clone()).or_default() += u64::from(*turret_kills);
            }
        }

        summary.avg_waves_survived = waves as f64 / count;
        summary.avg_duration_ticks = duration as f64 / count;
        summary.avg_kills = kills as f64 / count;
        summary.avg_leaks = leaks as f64 / count;
        summary.avg_earned = earned as f64 / count;

        let total: u64 = summary.kills_by_turret.values().sum();
        summary.kill_shares = summary
            .kills_by_turret
            .iter()
            .map(|(kind, k)| (kind.clone(), *k as f64 / total.max(1) as f64))
            .collect();

        summary
    }

    /// Turret type landing more than `threshold` of all kills, if any.
    #[must_use]
    pub fn dominant_turret(&self, threshold: f64) -> Option<&String> {
        self.kill_shares
            .iter()
            .find(|(_, share)| **share > threshold)
            .map(|(kind, _)| kind)
    }
}

/// Metrics collector that tracks one match.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Current match metrics.
    metrics: GameMetrics,
    /// Current tick.
    current_tick: u64,
    /// Waves that lost at least one enemy to the exit.
    leaked_waves: Vec<u32>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(game_id: &str, scenario: &str, strategy: &str, seed: u64) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, scenario, strategy, seed),
            current_tick: 0,
            leaked_waves: Vec::new(),
        }
    }

    /// Update the current tick.
    pub fn set_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    /// Record the outcome of an issued command.
    pub fn on_command<E>(&mut self, command: &Command, result: &Result<(), E>) {
        if result.is_err() {
            self.metrics.commands_rejected += 1;
            return;
        }
        match command {
            Command::PlaceDefender { .. } => self.metrics.turrets_built += 1,
            Command::UpgradeDefender { .. } => self.metrics.upgrades_bought += 1,
            _ => {}
        }
    }

    /// Record one tick's events. `sim` is the state after the tick.
    pub fn on_tick(&mut self, events: &TickEvents, sim: &Simulation) {
        let tick = self.current_tick;
        for event in &events.events {
            match event {
                SimEvent::WaveStarted {
                    index,
                    is_boss,
                    enemies,
                } => {
                    self.metrics.waves_started += 1;
                    let kind = if *is_boss { "boss wave" } else { "wave" };
                    self.metrics.record_event(
                        tick,
                        EventType::WaveStarted,
                        format!("{kind} {index}: {enemies} enemies"),
                    );
                }
                SimEvent::WaveSurvived { index, reward } => {
                    self.metrics.waves_survived += 1;
                    let event_type = if self.leaked_waves.contains(index) {
                        EventType::WaveLeaked
                    } else {
                        self.metrics.waves_clean += 1;
                        EventType::WaveCleared
                    };
                    self.metrics
                        .record_event(tick, event_type, format!("wave {index}: reward {reward}"));
                }
                SimEvent::EnemyKilled { kind, turret, .. } => {
                    self.metrics.enemies_killed += 1;
                    let turret_kind = sim
                        .turret(*turret)
                        .map_or("sold", |t| t.kind().name())
                        .to_string();
                    *self.metrics.kills_by_turret.entry(turret_kind).or_default() += 1;
                    *self
                        .metrics
                        .kills_by_enemy
                        .entry(kind.blueprint().name.to_string())
                        .or_default() += 1;
                }
                SimEvent::EnemyLeaked { wave } => {
                    self.metrics.enemies_leaked += 1;
                    if !self.leaked_waves.contains(wave) {
                        self.leaked_waves.push(*wave);
                    }
                }
                SimEvent::WaveCapacityReached => {
                    self.metrics
                        .record_event(tick, EventType::CapacityReached, "wave cap reached");
                }
                SimEvent::PoolGrown { pool, capacity } => {
                    self.metrics
                        .record_event(tick, EventType::PoolGrown, format!("{pool} -> {capacity}"));
                }
                SimEvent::GameOver { waves_survived } => {
                    self.metrics.game_over = true;
                    self.metrics.record_event(
                        tick,
                        EventType::GameOver,
                        format!("survived {waves_survived} waves"),
                    );
                }
            }
        }
        let alive = sim.enemies().count() as u32;
        self.metrics.peak_enemies = self.metrics.peak_enemies.max(alive);
    }

    /// Finalize and return the metrics.
    #[must_use]
    pub fn finalize(mut self, sim: &Simulation) -> GameMetrics {
        self.metrics.duration_ticks = self.current_tick;
        self.metrics.lives_left = sim.lives();
        self.metrics.currency_earned = sim.ledger().earned();
        self.metrics.currency_spent = sim.ledger().spent();
        self.metrics.final_balance = sim.balance();
        self.metrics.final_state_hash = sim.state_hash();
        self.metrics
    }

    /// Get current metrics (immutable).
    #[must_use]
    pub fn current(&self) -> &GameMetrics {
        &self.metrics
    }
}
