//! Scripted build strategies for headless playtesting.
//!
//! A strategy is a build order plus a few standing rules. The executor turns
//! it into [`Command`]s against the live simulation, one at a time, so every
//! decision goes through the same command path a recording sees.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use td_core::clock::MatchState;
use td_core::grid::{GameMap, GridPos, Tile};
use td_core::simulation::{Command, Simulation};
use td_core::targeting::TargetingMode;
use td_core::turret::Turret;
use td_core::turret_data::{TurretKind, MAX_TIER};

use crate::error::{Result, RunnerError};

/// Names accepted by [`Strategy::named`].
pub const STRATEGY_NAMES: [&str; 5] = ["balanced", "frugal", "upgrader", "rusher", "idle"];

/// A complete build strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Build order to follow.
    pub build_order: Vec<BuildOrderItem>,
    /// Kind to keep placing once the build order is done.
    pub filler: Option<TurretKind>,
    /// Start the next wave early whenever nothing is spawning.
    pub early_start: bool,
    /// Targeting policy given to every placed turret.
    pub targeting: TargetingMode,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            name: "Balanced".to_string(),
            description: "Mixed damage types with steady upgrades".to_string(),
            build_order: vec![
                BuildOrderItem::Place(TurretKind::Basic),
                BuildOrderItem::Place(TurretKind::Basic),
                BuildOrderItem::WaitForWave(2),
                BuildOrderItem::Place(TurretKind::Cryo),
                BuildOrderItem::Place(TurretKind::Bleed),
                BuildOrderItem::Upgrade { turret: 0, branch: 1 },
                BuildOrderItem::WaitForWave(5),
                BuildOrderItem::Place(TurretKind::Laser),
                BuildOrderItem::Place(TurretKind::Pulse),
                BuildOrderItem::Upgrade { turret: 1, branch: 2 },
                BuildOrderItem::Upgrade { turret: 0, branch: 1 },
                BuildOrderItem::WaitForWave(10),
                BuildOrderItem::Place(TurretKind::Javelin),
                BuildOrderItem::Upgrade { turret: 4, branch: 1 },
                BuildOrderItem::Upgrade { turret: 2, branch: 2 },
            ],
            filler: Some(TurretKind::Basic),
            early_start: false,
            targeting: TargetingMode::First,
        }
    }
}

impl Strategy {
    /// Load a strategy from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RunnerError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let strategy: Strategy = ron::from_str(&contents)?;
        Ok(strategy)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let strategy: Strategy = ron::from_str(ron)?;
        Ok(strategy)
    }

    /// Look up a built-in strategy by name.
    pub fn named(name: &str) -> Result<Self> {
        match name {
            "balanced" => Ok(Self::default()),
            "frugal" => Ok(Self::frugal()),
            "upgrader" => Ok(Self::upgrader()),
            "rusher" => Ok(Self::rusher()),
            "idle" => Ok(Self::idle()),
            _ => Err(RunnerError::UnknownPreset {
                kind: "strategy",
                name: name.to_string(),
            }),
        }
    }

    /// Only the cheapest gun, as many as money allows.
    #[must_use]
    pub fn frugal() -> Self {
        Self {
            name: "Frugal".to_string(),
            description: "Spam basic turrets, never upgrade".to_string(),
            build_order: Vec::new(),
            filler: Some(TurretKind::Basic),
            early_start: false,
            targeting: TargetingMode::First,
        }
    }

    /// Few turrets taken deep into their branches.
    #[must_use]
    pub fn upgrader() -> Self {
        Self {
            name: "Upgrader".to_string(),
            description: "Two turrets pushed to their top tiers".to_string(),
            build_order: vec![
                BuildOrderItem::Place(TurretKind::Basic),
                BuildOrderItem::Place(TurretKind::Cryo),
                BuildOrderItem::Upgrade { turret: 0, branch: 2 },
                BuildOrderItem::Upgrade { turret: 1, branch: 1 },
                BuildOrderItem::Upgrade { turret: 0, branch: 2 },
                BuildOrderItem::Upgrade { turret: 1, branch: 1 },
                BuildOrderItem::Upgrade { turret: 0, branch: 2 },
                BuildOrderItem::Upgrade { turret: 1, branch: 1 },
            ],
            filler: None,
            early_start: false,
            targeting: TargetingMode::Strong,
        }
    }

    /// Balanced build that calls every wave early for the bonus.
    #[must_use]
    pub fn rusher() -> Self {
        Self {
            name: "Rusher".to_string(),
            description: "Balanced build, every wave started early".to_string(),
            early_start: true,
            ..Self::default()
        }
    }

    /// Never builds anything.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            name: "Idle".to_string(),
            description: "No defence; measures how long lives last".to_string(),
            build_order: Vec::new(),
            filler: None,
            early_start: false,
            targeting: TargetingMode::First,
        }
    }
}

/// A single item in a build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildOrderItem {
    /// Place a turret on the next free site.
    Place(TurretKind),
    /// Take the `turret`-th placed turret one step along `branch` (1 or 2).
    Upgrade {
        /// Placement index.
        turret: usize,
        /// Branch chosen at tier 0.
        branch: u8,
    },
    /// Wait until the balance reaches this amount.
    WaitForBalance(u64),
    /// Wait until this wave has started.
    WaitForWave(u32),
}

/// Buildable cells bordering the path, cells touching more path first.
#[must_use]
pub fn defence_sites(map: &GameMap) -> Vec<GridPos> {
    let grid = map.grid();
    let path: HashSet<GridPos> = map.path_cells().iter().copied().collect();
    let mut seen = HashSet::new();
    let mut sites = Vec::new();

    for cell in map.path_cells() {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let (x, y) = (i64::from(cell.x) + dx, i64::from(cell.y) + dy);
                if x < 0 || y < 0 {
                    continue;
                }
                let pos = GridPos::new(x as u32, y as u32);
                if grid.get(pos) == Some(Tile::Ground) && seen.insert(pos) {
                    sites.push(pos);
                }
            }
        }
    }

    let exposure = |pos: &GridPos| {
        path.iter()
            .filter(|p| p.x.abs_diff(pos.x) <= 1 && p.y.abs_diff(pos.y) <= 1)
            .count()
    };
    // Stable sort keeps path order among equals.
    sites.sort_by_key(|pos| std::cmp::Reverse(exposure(pos)));
    sites
}

/// Tier step and choice flag for the next upgrade of `turret` along `branch`.
fn next_upgrade(turret: &Turret, branch: u8) -> Option<(u8, bool, u64)> {
    let (delta_tier, is_choice, next) = match turret.tier() {
        0 => (branch, true, branch),
        tier if tier + 2 <= MAX_TIER => (2, false, tier + 2),
        _ => return None,
    };
    let cost = turret.kind().delta(next)?.cost;
    Some((delta_tier, is_choice, cost))
}

/// Runtime state for executing a strategy.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    /// The strategy being executed.
    strategy: Strategy,
    /// Remaining build order items.
    build_queue: VecDeque<BuildOrderItem>,
    /// Candidate cells in preference order.
    sites: Vec<GridPos>,
    /// Items consumed so far.
    current_index: usize,
    /// Wave most recently called early.
    last_skip: Option<u32>,
}

impl StrategyExecutor {
    /// Create an executor for `strategy` on `map`.
    #[must_use]
    pub fn new(strategy: Strategy, map: &GameMap) -> Self {
        let build_queue = strategy.build_order.iter().copied().collect();
        Self {
            strategy,
            build_queue,
            sites: defence_sites(map),
            current_index: 0,
            last_skip: None,
        }
    }

    /// The next command to issue, or `None` when there is nothing to do now.
    ///
    /// Call repeatedly, applying each command, until it returns `None`.
    pub fn next_command(&mut self, sim: &Simulation) -> Option<Command> {
        match sim.state() {
            MatchState::BeforeGame => return Some(Command::StartGame),
            MatchState::AfterGame | MatchState::Paused => return None,
            MatchState::InGame => {}
        }

        if let Some(command) = self.retarget(sim) {
            return Some(command);
        }
        if let Some(command) = self.next_build(sim) {
            return Some(command);
        }
        self.early_start(sim)
    }

    fn retarget(&self, sim: &Simulation) -> Option<Command> {
        let mode = self.strategy.targeting;
        sim.turrets()
            .find(|t| t.targeting() != mode)
            .map(|t| Command::SetTargetingMode { id: t.id(), mode })
    }

    fn next_build(&mut self, sim: &Simulation) -> Option<Command> {
        let balance = sim.balance();
        while let Some(&item) = self.build_queue.front() {
            match item {
                BuildOrderItem::WaitForBalance(amount) => {
                    if balance < amount {
                        return None;
                    }
                }
                BuildOrderItem::WaitForWave(wave) => {
                    if sim.wave() < wave {
                        return None;
                    }
                }
                BuildOrderItem::Place(kind) => {
                    if balance < kind.base_blueprint().cost {
                        return None;
                    }
                    let command = self.free_site(sim).map(|cell| Command::PlaceDefender { cell, kind });
                    self.advance();
                    if command.is_some() {
                        return command;
                    }
                    tracing::debug!(kind = kind.name(), "No free site left");
                    continue;
                }
                BuildOrderItem::Upgrade { turret, branch } => {
                    let planned = sim
                        .turrets()
                        .nth(turret)
                        .and_then(|t| next_upgrade(t, branch).map(|plan| (t.id(), plan)));
                    let Some((id, (delta_tier, is_choice, cost))) = planned else {
                        // Missing turret or top tier: nothing to wait for.
                        self.advance();
                        continue;
                    };
                    if balance < cost {
                        return None;
                    }
                    self.advance();
                    return Some(Command::UpgradeDefender {
                        id,
                        delta_tier,
                        is_choice,
                    });
                }
            }
            self.advance();
        }

        let kind = self.strategy.filler?;
        if balance < kind.base_blueprint().cost {
            return None;
        }
        self.free_site(sim).map(|cell| Command::PlaceDefender { cell, kind })
    }

    fn early_start(&mut self, sim: &Simulation) -> Option<Command> {
        if !self.strategy.early_start
            || sim.spawner().spawning_count() > 0
            || self.last_skip == Some(sim.wave())
        {
            return None;
        }
        self.last_skip = Some(sim.wave());
        Some(Command::SkipToNextWave)
    }

    fn advance(&mut self) {
        self.build_queue.pop_front();
        self.current_index += 1;
    }

    fn free_site(&self, sim: &Simulation) -> Option<GridPos> {
        let grid = sim.map().grid();
        self.sites
            .iter()
            .copied()
            .find(|&cell| grid.get(cell) == Some(Tile::Ground))
    }

    /// Get the strategy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.strategy.name
    }

    /// Candidate cells in preference order.
    #[must_use]
    pub fn sites(&self) -> &[GridPos] {
        &self.sites
    }

    /// Get build order progress as a fraction.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.strategy.build_order.is_empty() {
            1.0
        } else {
            self.current_index as f64 / self.strategy.build_order.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use td_test_utils::fixtures::{lobby_match, straight_map, PATH_ROW};

    fn apply_all(executor: &mut StrategyExecutor, sim: &mut Simulation) -> Vec<Command> {
        let mut issued = Vec::new();
        for _ in 0..32 {
            let Some(command) = executor.next_command(sim) else {
                break;
            };
            sim.apply_command(command).unwrap();
            issued.push(command);
        }
        issued
    }

    #[test]
    fn test_named_strategies() {
        for name in STRATEGY_NAMES {
            assert!(Strategy::named(name).is_ok(), "{name}");
        }
        assert!(matches!(
            Strategy::named("turtle"),
            Err(RunnerError::UnknownPreset { .. })
        ));
        assert!(Strategy::rusher().early_start);
    }

    #[test]
    fn test_strategy_ron_round_trip() {
        let strategy = Strategy::upgrader();
        let text = ron::to_string(&strategy).unwrap();
        assert_eq!(Strategy::from_ron_str(&text).unwrap(), strategy);
    }

    #[test]
    fn test_sites_border_the_path() {
        let map = straight_map(10);
        let sites = defence_sites(&map);
        assert_eq!(sites.len(), 20);
        for site in &sites {
            assert_eq!(site.y.abs_diff(PATH_ROW), 1);
        }
        // End cells touch only two path cells, interior ones three.
        assert_eq!(sites.last().map(|s| s.x % 9), Some(0));
    }

    #[test]
    fn test_executor_starts_game_and_builds() {
        let mut sim = lobby_match(3);
        let mut executor = StrategyExecutor::new(Strategy::default(), sim.map());

        let issued = apply_all(&mut executor, &mut sim);

        assert_eq!(issued.first(), Some(&Command::StartGame));
        let placed = issued
            .iter()
            .filter(|c| matches!(c, Command::PlaceDefender { .. }))
            .count();
        // Stops at the first WaitForWave.
        assert_eq!(placed, 2);
        assert_eq!(sim.turrets().count(), 2);
        assert!(executor.progress() > 0.0);
    }

    #[test]
    fn test_executor_waits_for_funds() {
        let config = td_test_utils::fixtures::rich_config(1).with_currency(900);
        let mut sim = Simulation::with_map(config, straight_map(20));
        let mut executor = StrategyExecutor::new(Strategy::frugal(), sim.map());

        apply_all(&mut executor, &mut sim);

        assert_eq!(sim.turrets().count(), 1);
        assert_eq!(sim.balance(), 100);
        assert_eq!(executor.next_command(&sim), None);
    }

    #[test]
    fn test_upgrades_follow_branch() {
        let mut sim = lobby_match(5);
        let strategy = Strategy {
            build_order: vec![
                BuildOrderItem::Place(TurretKind::Basic),
                BuildOrderItem::Upgrade { turret: 0, branch: 2 },
                BuildOrderItem::Upgrade { turret: 0, branch: 2 },
                BuildOrderItem::Upgrade { turret: 7, branch: 1 },
            ],
            filler: None,
            ..Strategy::default()
        };
        let mut executor = StrategyExecutor::new(strategy, sim.map());

        apply_all(&mut executor, &mut sim);

        let turret = sim.turrets().next().unwrap();
        assert_eq!(turret.tier(), 4);
        assert_eq!(executor.progress(), 1.0);
    }

    #[test]
    fn test_retargets_new_turrets() {
        let mut sim = lobby_match(2);
        let mut executor = StrategyExecutor::new(Strategy::upgrader(), sim.map());

        apply_all(&mut executor, &mut sim);

        assert!(sim.turrets().all(|t| t.targeting() == TargetingMode::Strong));
    }

    #[test]
    fn test_rusher_skips_once_per_wave() {
        let mut sim = lobby_match(8);
        let strategy = Strategy {
            build_order: Vec::new(),
            filler: None,
            ..Strategy::rusher()
        };
        let mut executor = StrategyExecutor::new(strategy, sim.map());

        let issued = apply_all(&mut executor, &mut sim);

        assert_eq!(issued, vec![Command::StartGame, Command::SkipToNextWave]);
        assert_eq!(sim.wave(), 1);
    }

    #[test]
    fn test_idle_only_starts() {
        let mut sim = lobby_match(4);
        let mut executor = StrategyExecutor::new(Strategy::idle(), sim.map());
        assert_eq!(apply_all(&mut executor, &mut sim), vec![Command::StartGame]);
    }
}
