//! Single-match runner.
//!
//! Plays one scenario to completion with its strategy, recording every
//! command so the match can be replayed and verified later.

use tracing::{debug, info};

use td_core::clock::MatchState;
use td_core::replay::{Recorder, Replay};
use td_core::simulation::Simulation;

use crate::error::Result;
use crate::metrics::{GameMetrics, MetricsCollector};
use crate::scenario::Scenario;
use crate::strategies::StrategyExecutor;

/// Most commands a strategy may issue between two ticks.
pub const MAX_COMMANDS_PER_TICK: usize = 8;

/// Outcome of one match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Collected metrics.
    pub metrics: GameMetrics,
    /// Recording of the match.
    pub replay: Replay,
}

/// Play `scenario` with `seed` for at most `max_ticks` ticks.
///
/// The match ends early once the lives run out.
pub fn run_match(scenario: &Scenario, seed: u64, max_ticks: u64) -> Result<MatchResult> {
    let game_id = format!("{}_{seed}", scenario.name);
    let sim = Simulation::new(scenario.config.clone().with_seed(seed))?;
    let mut executor = StrategyExecutor::new(scenario.strategy.clone(), sim.map());
    let mut recorder = Recorder::new(scenario.name.clone(), sim)?;
    let mut collector = MetricsCollector::new(&game_id, &scenario.name, executor.name(), seed);

    info!(
        game = %game_id,
        strategy = executor.name(),
        path_length = %recorder.simulation().map().path_length(),
        "Starting match"
    );

    while recorder.simulation().get_tick() < max_ticks {
        for _ in 0..MAX_COMMANDS_PER_TICK {
            let Some(command) = executor.next_command(recorder.simulation()) else {
                break;
            };
            let result = recorder.apply(command);
            if let Err(e) = &result {
                debug!(?command, error = %e, "Command rejected");
            }
            collector.on_command(&command, &result);
        }

        let events = recorder.tick();
        collector.set_tick(recorder.simulation().get_tick());
        collector.on_tick(&events, recorder.simulation());

        if recorder.simulation().state() == MatchState::AfterGame {
            break;
        }
    }

    let (replay, sim) = recorder.finish();
    let metrics = collector.finalize(&sim);

    info!(
        game = %game_id,
        ticks = metrics.duration_ticks,
        waves = metrics.waves_survived,
        lives = metrics.lives_left,
        kills = metrics.enemies_killed,
        "Match finished"
    );

    Ok(MatchResult { metrics, replay })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::Strategy;

    fn short(scenario: Scenario) -> Scenario {
        Scenario {
            max_ticks: 50 * 120,
            ..scenario
        }
    }

    #[test]
    fn test_match_is_deterministic() {
        let scenario = short(Scenario::small());
        let a = run_match(&scenario, 5, scenario.max_ticks).unwrap();
        let b = run_match(&scenario, 5, scenario.max_ticks).unwrap();
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.replay.final_hash, b.replay.final_hash);
    }

    #[test]
    fn test_recording_verifies() {
        let scenario = short(Scenario::standard());
        let result = run_match(&scenario, 9, scenario.max_ticks).unwrap();

        assert!(result.replay.command_count() > 0);
        assert_eq!(result.replay.final_tick, result.metrics.duration_ticks);
        assert_eq!(
            result.replay.verify().unwrap(),
            result.metrics.final_state_hash
        );
    }

    #[test]
    fn test_defended_match_builds_and_kills() {
        let scenario = short(Scenario::standard());
        let metrics = run_match(&scenario, 11, scenario.max_ticks).unwrap().metrics;

        assert!(metrics.turrets_built >= 2);
        assert!(metrics.waves_started >= 1);
        assert!(metrics.enemies_killed > 0);
        assert!(metrics.currency_spent > 0);
    }

    #[test]
    fn test_idle_match_stops_at_game_over() {
        let scenario = Scenario::idle().with_strategy(Strategy {
            early_start: true,
            ..Strategy::idle()
        });
        let metrics = run_match(&scenario, 2, 50 * 60 * 60).unwrap().metrics;

        assert!(metrics.game_over);
        assert_eq!(metrics.lives_left, 0);
        assert!(metrics.duration_ticks < 50 * 60 * 60);
    }

    #[test]
    fn test_tick_limit_respected() {
        let scenario = Scenario::idle();
        let metrics = run_match(&scenario, 3, 100).unwrap().metrics;
        assert_eq!(metrics.duration_ticks, 100);
        assert!(!metrics.game_over);
    }
}
