//! Test fixtures and helpers.
//!
//! Hand-built maps and pre-configured matches for consistent testing. The
//! maps skip procedural generation so tests can reason about exact cells.

use fixed::types::I32F32;
use td_core::config::GameConfig;
use td_core::grid::{GameMap, GridPos, Tile, TileGrid};
use td_core::simulation::{SimEvent, Simulation};
use td_core::turret_data::TurretKind;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Row the straight path runs along.
pub const PATH_ROW: u32 = 5;

/// A `length` x 11 map whose path runs west to east along [`PATH_ROW`].
///
/// # Panics
///
/// Panics if `length` is zero.
#[must_use]
pub fn straight_map(length: u32) -> GameMap {
    let cells = (0..length).map(|x| GridPos::new(x, PATH_ROW)).collect();
    GameMap::from_path(TileGrid::new(length, 11), cells).expect("straight path is valid")
}

/// A 16 x 16 map with an L-shaped path: south along column 3, then east
/// along row 12. A ridge of obstacles sits inside the bend.
#[must_use]
pub fn bent_map() -> GameMap {
    let mut grid = TileGrid::new(16, 16);
    for y in 6..10 {
        grid.set(GridPos::new(6, y), Tile::Obstacle);
    }
    let mut cells: Vec<GridPos> = (0..=12).map(|y| GridPos::new(3, y)).collect();
    cells.extend((4..16).map(|x| GridPos::new(x, 12)));
    GameMap::from_path(grid, cells).expect("bent path is valid")
}

/// Default configuration with `seed` and plenty of currency.
#[must_use]
pub fn rich_config(seed: u64) -> GameConfig {
    GameConfig::default()
        .with_seed(seed)
        .with_currency(1_000_000)
}

/// A match on the 20-cell straight map, still in the lobby.
#[must_use]
pub fn lobby_match(seed: u64) -> Simulation {
    Simulation::with_map(rich_config(seed), straight_map(20))
}

/// A running match on the straight map with one turret of every kind and
/// wave 1 spawning.
///
/// # Panics
///
/// Panics if a placement fails, which would mean the fixture itself is broken.
#[must_use]
pub fn defended_match(seed: u64) -> Simulation {
    let mut sim = lobby_match(seed);
    for (i, kind) in TurretKind::ALL.into_iter().enumerate() {
        let x = 2 + 3 * i as u32;
        let y = if i % 2 == 0 { PATH_ROW + 1 } else { PATH_ROW - 1 };
        sim.place_defender(GridPos::new(x, y), kind)
            .expect("fixture placement");
    }
    sim.start_game().expect("fixture start");
    sim.start_wave(0).expect("fixture wave");
    sim
}

/// Tick `sim` `ticks` times, collecting every event.
pub fn run_ticks(sim: &mut Simulation, ticks: u64) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        events.extend(sim.tick().events);
    }
    events
}
