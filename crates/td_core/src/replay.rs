//! Replay system for recording and playing back matches.
//!
//! A replay stores the initial match state and the stream of commands issued
//! during the match, stamped with the tick they were applied before. Since the
//! simulation is deterministic this is enough to recreate any match and to
//! check the recreation against the recorded final hash.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::{GameError, Result};
use crate::simulation::{Command, Simulation, TickEvents};

/// A single command record for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Tick the command was applied before.
    pub tick: u64,
    /// The command that was issued.
    pub command: Command,
}

impl ReplayCommand {
    /// Create a new replay command record.
    #[must_use]
    pub const fn new(tick: u64, command: Command) -> Self {
        Self { tick, command }
    }
}

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Match seed.
    pub seed: u64,
    /// Match configuration.
    pub config: GameConfig,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// Stream of commands in tick order.
    pub commands: Vec<ReplayCommand>,
    /// Final tick when the recording ended.
    pub final_tick: u64,
    /// Final state hash for verification.
    pub final_hash: u64,
}

impl Replay {
    /// Create a new replay from a simulation's initial state.
    pub fn new(scenario_id: impl Into<String>, initial_state: &Simulation) -> Result<Self> {
        let state_bytes = initial_state.serialize()?;
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed: initial_state.config().seed,
            config: initial_state.config().clone(),
            initial_state: state_bytes,
            commands: Vec::new(),
            final_tick: initial_state.get_tick(),
            final_hash: initial_state.state_hash(),
        })
    }

    /// Record a command for replay.
    pub fn record_command(&mut self, tick: u64, command: Command) {
        self.commands.push(ReplayCommand::new(tick, command));
    }

    /// Finalize the replay with end-of-match state.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {}", e)))?;
        std::fs::write(path, bytes).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), commands = self.commands.len(), "Replay saved");
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading, deserialization or the version check fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {}", e)))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {}, got {}",
                REPLAY_VERSION, replay.version
            )));
        }

        Ok(replay)
    }

    /// Get the initial simulation state for playback.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// Commands applied before tick `tick`. The stream is tick-ordered.
    #[must_use]
    pub fn commands_at_tick(&self, tick: u64) -> &[ReplayCommand] {
        let start = self.commands.partition_point(|cmd| cmd.tick < tick);
        let end = self.commands.partition_point(|cmd| cmd.tick <= tick);
        &self.commands[start..end]
    }

    /// Get the total number of commands in the replay.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Play the whole replay and compare against the recorded hash.
    ///
    /// Returns the final hash.
    ///
    /// # Errors
    /// [`GameError::ReplayMismatch`] when playback diverges.
    pub fn verify(&self) -> Result<u64> {
        let mut player = ReplayPlayer::new(self.clone())?;
        while player.advance() {}
        // Commands issued after the last tick still count.
        player.apply_due_commands();
        let actual = player.simulation().state_hash();
        if actual != self.final_hash {
            return Err(GameError::ReplayMismatch {
                tick: player.current_tick(),
                expected: self.final_hash,
                actual,
            });
        }
        Ok(actual)
    }
}

/// Records the commands applied to a live simulation.
#[derive(Debug)]
pub struct Recorder {
    simulation: Simulation,
    replay: Replay,
}

impl Recorder {
    /// Start recording from the current state of `simulation`.
    pub fn new(scenario_id: impl Into<String>, simulation: Simulation) -> Result<Self> {
        let replay = Replay::new(scenario_id, &simulation)?;
        Ok(Self { simulation, replay })
    }

    /// The simulation being recorded.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Apply and record a command. Rejected commands are recorded too, since
    /// playback rejects them the same way.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        self.replay
            .record_command(self.simulation.get_tick(), command);
        self.simulation.apply_command(command)
    }

    /// Advance the simulation one tick.
    pub fn tick(&mut self) -> TickEvents {
        self.simulation.tick()
    }

    /// Stop recording and return the finished replay and simulation.
    #[must_use]
    pub fn finish(mut self) -> (Replay, Simulation) {
        self.replay
            .finalize(self.simulation.get_tick(), self.simulation.state_hash());
        (self.replay, self.simulation)
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    /// The replay being played.
    replay: Replay,
    /// Current simulation state.
    simulation: Simulation,
    /// Index into the command stream.
    command_index: usize,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            simulation,
            command_index: 0,
        })
    }

    /// Advance the replay by one tick.
    ///
    /// Returns true if there are more ticks to play.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.apply_due_commands();
        self.simulation.tick();
        !self.is_finished()
    }

    fn apply_due_commands(&mut self) {
        let tick = self.simulation.get_tick();
        while let Some(cmd) = self.replay.commands.get(self.command_index) {
            if cmd.tick > tick {
                break;
            }
            if let Err(err) = self.simulation.apply_command(cmd.command) {
                tracing::debug!(tick, command = ?cmd.command, %err, "Replayed command rejected");
            }
            self.command_index += 1;
        }
    }

    /// Seek to a specific tick.
    ///
    /// # Errors
    /// Returns an error if state restoration fails.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        if target_tick < self.simulation.get_tick() {
            self.simulation = self.replay.restore_initial_state()?;
            self.command_index = 0;
        }
        while self.simulation.get_tick() < target_tick && self.advance() {}
        Ok(())
    }

    /// Get the current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.simulation.get_tick()
    }

    /// Get a reference to the current simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.simulation.get_tick() >= self.replay.final_tick
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.final_tick == 0 {
            100.0
        } else {
            (self.current_tick() as f64 / self.replay.final_tick as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GameMap, GridPos, TileGrid};
    use crate::turret_data::TurretKind;

    fn create_test_simulation() -> Simulation {
        let cells = (0..20).map(|x| GridPos::new(x, 5)).collect();
        let map = GameMap::from_path(TileGrid::new(20, 11), cells).unwrap();
        Simulation::with_map(GameConfig::default().with_seed(4242), map)
    }

    /// Record a short match: two turrets, one wave, a few hundred ticks.
    fn record() -> Replay {
        let mut recorder = Recorder::new("test_scenario", create_test_simulation()).unwrap();
        recorder.apply(Command::StartGame).unwrap();
        recorder
            .apply(Command::PlaceDefender {
                cell: GridPos::new(6, 6),
                kind: TurretKind::Basic,
            })
            .unwrap();
        recorder
            .apply(Command::StartWave { bonus_percent: 0 })
            .unwrap();
        for tick in 0..400 {
            if tick == 150 {
                recorder
                    .apply(Command::PlaceDefender {
                        cell: GridPos::new(12, 4),
                        kind: TurretKind::Basic,
                    })
                    .unwrap();
                // Rejected: the cell is taken.
                assert!(recorder
                    .apply(Command::PlaceDefender {
                        cell: GridPos::new(12, 4),
                        kind: TurretKind::Basic,
                    })
                    .is_err());
            }
            recorder.tick();
        }
        recorder.finish().0
    }

    #[test]
    fn test_replay_create() {
        let sim = create_test_simulation();
        let replay = Replay::new("test_scenario", &sim).unwrap();
        assert_eq!(replay.version, REPLAY_VERSION);
        assert_eq!(replay.scenario_id, "test_scenario");
        assert_eq!(replay.seed, 4242);
        assert!(replay.commands.is_empty());
        assert_eq!(replay.final_hash, sim.state_hash());
    }

    #[test]
    fn test_replay_record_commands() {
        let replay = record();
        assert_eq!(replay.command_count(), 5);
        assert_eq!(replay.commands_at_tick(0).len(), 3);
        assert_eq!(replay.commands_at_tick(150).len(), 2);
        assert_eq!(replay.commands_at_tick(7).len(), 0);
        assert_eq!(replay.final_tick, 400);
    }

    #[test]
    fn test_replay_verifies() {
        let replay = record();
        assert_eq!(replay.verify().unwrap(), replay.final_hash);
    }

    #[test]
    fn test_tampered_replay_mismatches() {
        let mut replay = record();
        replay.commands.retain(|cmd| cmd.tick != 150);
        assert!(matches!(
            replay.verify(),
            Err(GameError::ReplayMismatch { tick: 400, .. })
        ));
    }

    #[test]
    fn test_replay_save_load() {
        let replay = record();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.replay");
        replay.save(&path).unwrap();

        let loaded = Replay::load(&path).unwrap();
        assert_eq!(loaded.scenario_id, "test_scenario");
        assert_eq!(loaded.seed, 4242);
        assert_eq!(loaded.command_count(), replay.command_count());
        assert_eq!(loaded.final_hash, replay.final_hash);
        assert!(loaded.verify().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Replay::load(dir.path().join("nope.replay")),
            Err(GameError::Io { .. })
        ));
    }

    #[test]
    fn test_replay_player_advance_and_seek() {
        let replay = record();
        let mut player = ReplayPlayer::new(replay).unwrap();
        assert_eq!(player.current_tick(), 0);
        assert!(!player.is_finished());

        for _ in 0..5 {
            assert!(player.advance());
        }
        assert_eq!(player.current_tick(), 5);

        player.seek(200).unwrap();
        assert_eq!(player.current_tick(), 200);
        assert_eq!(player.simulation().turrets().count(), 2);
        assert!((player.progress_percent() - 50.0).abs() < 0.01);

        player.seek(10).unwrap();
        assert_eq!(player.current_tick(), 10);
        assert_eq!(player.simulation().turrets().count(), 1);

        while player.advance() {}
        assert!(player.is_finished());
        assert_eq!(player.simulation().state_hash(), player.replay().final_hash);
    }
}
