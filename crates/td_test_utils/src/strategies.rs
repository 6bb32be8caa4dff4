//! Proptest strategies.
//!
//! These strategies generate random but reproducible inputs for
//! property-based testing of the simulation and its subsystems.

use proptest::prelude::*;
use td_core::enemy_data::EnemyKind;
use td_core::grid::GridPos;
use td_core::math::Fixed;
use td_core::simulation::Command;
use td_core::targeting::TargetingMode;
use td_core::turret::TurretId;
use td_core::turret_data::TurretKind;

/// Any turret type.
pub fn arb_turret_kind() -> impl Strategy<Value = TurretKind> {
    prop::sample::select(TurretKind::ALL.to_vec())
}

/// Any enemy type, bosses included.
pub fn arb_enemy_kind() -> impl Strategy<Value = EnemyKind> {
    prop::sample::select(EnemyKind::ALL.to_vec())
}

/// Any targeting policy.
pub fn arb_targeting_mode() -> impl Strategy<Value = TargetingMode> {
    prop::sample::select(TargetingMode::ALL.to_vec())
}

/// Match seeds.
pub fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

/// Wave numbers in the range the HP curve is tuned for.
pub fn arb_wave_number() -> impl Strategy<Value = u32> {
    1u32..80
}

/// Damage amounts, including zero and overkill.
///
/// Range: 0 to 5000 in steps of 1/16
pub fn arb_damage() -> impl Strategy<Value = Fixed> {
    (0i32..80_000).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(16))
}

/// Slow multipliers in `(0, 1]`.
pub fn arb_slow_multiplier() -> impl Strategy<Value = Fixed> {
    (1i32..=100).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(100))
}

/// Currency amounts.
pub fn arb_amount() -> impl Strategy<Value = i64> {
    -1_000_000i64..1_000_000
}

/// A cell inside a `width` x `height` grid.
pub fn arb_grid_pos(width: u32, height: u32) -> impl Strategy<Value = GridPos> {
    (0..width, 0..height).prop_map(|(x, y)| GridPos::new(x, y))
}

/// Ids of the first few placed turrets, plus some that never exist.
pub fn arb_turret_id() -> impl Strategy<Value = TurretId> {
    (1u32..12).prop_map(TurretId)
}

/// Any player command on a `width` x `height` map.
pub fn arb_command(width: u32, height: u32) -> impl Strategy<Value = Command> {
    prop_oneof![
        3 => (arb_grid_pos(width, height), arb_turret_kind())
            .prop_map(|(cell, kind)| Command::PlaceDefender { cell, kind }),
        1 => arb_turret_id().prop_map(Command::SellDefender),
        2 => (arb_turret_id(), 1u8..=2, any::<bool>()).prop_map(|(id, delta_tier, is_choice)| {
            Command::UpgradeDefender {
                id,
                delta_tier,
                is_choice,
            }
        }),
        1 => (arb_turret_id(), arb_targeting_mode())
            .prop_map(|(id, mode)| Command::SetTargetingMode { id, mode }),
        1 => arb_turret_id().prop_map(Command::CycleTargetingMode),
        1 => (0u32..=50).prop_map(|bonus_percent| Command::StartWave { bonus_percent }),
        1 => Just(Command::SkipToNextWave),
        1 => Just(Command::StartGame),
    ]
}

/// A tick-stamped command script within the first `max_tick` ticks, sorted
/// by tick.
pub fn arb_script(
    width: u32,
    height: u32,
    max_len: usize,
    max_tick: u64,
) -> impl Strategy<Value = Vec<(u64, Command)>> {
    proptest::collection::vec((0..max_tick, arb_command(width, height)), 0..max_len).prop_map(
        |mut script| {
            script.sort_by_key(|(tick, _)| *tick);
            script
        },
    )
}
