//! Whole-match scenarios on hand-built maps.

use td_core::clock::MatchState;
use td_core::grid::GridPos;
use td_core::simulation::{SimEvent, Simulation};
use td_core::targeting::TargetingMode;
use td_core::turret_data::TurretKind;
use td_test_utils::fixtures::{bent_map, defended_match, lobby_match, rich_config, run_ticks};

fn bent_match(seed: u64) -> Simulation {
    Simulation::with_map(rich_config(seed), bent_map())
}

/// Run until wave `index` is resolved or `limit` ticks pass.
fn run_until_survived(sim: &mut Simulation, index: u32, limit: u64) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for _ in 0..limit {
        let tick = sim.tick();
        let done = tick
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::WaveSurvived { index: i, .. } if *i == index));
        events.extend(tick.events);
        if done {
            break;
        }
    }
    events
}

#[test]
fn test_bent_map_wave_resolves() {
    let mut sim = bent_match(17);
    for (cell, kind) in [
        (GridPos::new(4, 11), TurretKind::Basic),
        (GridPos::new(2, 11), TurretKind::Cryo),
        (GridPos::new(5, 13), TurretKind::Pulse),
        (GridPos::new(4, 5), TurretKind::Laser),
        (GridPos::new(2, 3), TurretKind::Bleed),
    ] {
        sim.place_defender(cell, kind).unwrap();
    }
    sim.start_game().unwrap();
    sim.start_wave(0).unwrap();

    let events = run_until_survived(&mut sim, 1, 50 * 120);

    let spawned = events.iter().find_map(|e| match e {
        SimEvent::WaveStarted { index: 1, enemies, .. } => Some(*enemies),
        _ => None,
    });
    let kills = events
        .iter()
        .filter(|e| matches!(e, SimEvent::EnemyKilled { wave: 1, .. }))
        .count() as u32;
    let leaks = events
        .iter()
        .filter(|e| matches!(e, SimEvent::EnemyLeaked { wave: 1 }))
        .count() as u32;
    let reward = events.iter().find_map(|e| match e {
        SimEvent::WaveSurvived { index: 1, reward } => Some(*reward),
        _ => None,
    });

    assert!(kills > 0);
    assert_eq!(spawned, Some(kills + leaks));
    assert_eq!(sim.lives(), 50 - leaks);
    match reward {
        Some(0) => assert!(leaks > 0),
        Some(_) => assert_eq!(leaks, 0),
        None => panic!("wave 1 never resolved"),
    }
}

#[test]
fn test_enemies_stay_on_the_path() {
    let mut sim = bent_match(4);
    sim.start_game().unwrap();
    sim.start_wave(0).unwrap();
    let path = sim.map().path_cells().to_vec();

    for _ in 0..40 {
        run_ticks(&mut sim, 25);
        for (_, enemy) in sim.enemies() {
            let cell = sim.map().grid().cell_at(enemy.position());
            assert!(
                cell.is_some_and(|c| path.contains(&c)),
                "enemy at {:?} left the path",
                enemy.position()
            );
            assert!(enemy.distance() <= sim.map().path_length());
        }
    }
}

#[test]
fn test_ledger_tracks_every_payment() {
    let mut sim = defended_match(9);
    let spent = sim.ledger().spent();
    let events = run_ticks(&mut sim, 50 * 90);

    let paid: u64 = events
        .iter()
        .map(|e| match e {
            SimEvent::EnemyKilled { reward, .. } | SimEvent::WaveSurvived { reward, .. } => *reward,
            _ => 0,
        })
        .sum();
    assert!(paid > 0);
    assert_eq!(sim.ledger().earned(), paid);
    assert_eq!(sim.ledger().spent(), spent);
    assert_eq!(sim.balance(), 1_000_000 - spent + paid);
}

#[test]
fn test_waves_overlap_up_to_capacity() {
    let mut sim = lobby_match(6);
    sim.start_game().unwrap();
    for expected in 1..=3 {
        assert_eq!(sim.start_wave(0).unwrap(), expected);
    }
    assert_eq!(sim.wave(), 3);
    assert_eq!(sim.spawner().running_count(), 3);

    let events = run_ticks(&mut sim, 200);
    let started: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            SimEvent::WaveStarted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![1, 2, 3]);
}

#[test]
fn test_long_match_ends_without_defence() {
    let mut sim = lobby_match(30);
    sim.start_game().unwrap();
    let mut over = None;
    for _ in 0..50 * 600 {
        let tick = sim.tick();
        over = tick.events.iter().find_map(|e| match e {
            SimEvent::GameOver { waves_survived } => Some(*waves_survived),
            _ => None,
        });
        if over.is_some() {
            break;
        }
    }

    assert_eq!(over, Some(sim.waves_survived()));
    assert_eq!(sim.state(), MatchState::AfterGame);
    assert_eq!(sim.lives(), 0);

    let enemies = sim.enemies().count();
    let tick = sim.tick();
    assert_eq!(tick.steps, 0);
    assert!(tick.is_empty());
    assert!(sim.start_wave(0).is_err());
    assert_eq!(sim.enemies().count(), enemies);
}

#[test]
fn test_sold_cell_can_be_rebuilt() {
    let mut sim = defended_match(12);
    run_ticks(&mut sim, 300);
    let (id, cell) = sim
        .turrets()
        .find(|t| t.kind() == TurretKind::Cryo)
        .map(|t| (t.id(), t.cell()))
        .unwrap();

    sim.sell_defender(id).unwrap();
    assert!(sim.turret(id).is_none());
    run_ticks(&mut sim, 50);

    let rebuilt = sim.place_defender(cell, TurretKind::Javelin).unwrap();
    assert_ne!(rebuilt, id);
    sim.set_targeting_mode(rebuilt, TargetingMode::Strong).unwrap();
    run_ticks(&mut sim, 300);
    assert_eq!(
        sim.turret(rebuilt).map(|t| t.targeting()),
        Some(TargetingMode::Strong)
    );
}
