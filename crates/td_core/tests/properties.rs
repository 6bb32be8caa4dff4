//! Property tests for the simulation building blocks.
//!
//! Each property holds for every input proptest can find, not just the
//! hand-picked cases in the unit tests.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use td_core::config::WaveTuning;
use td_core::economy::Ledger;
use td_core::enemy::Enemy;
use td_core::enemy_data::EnemyKind;
use td_core::error::GameError;
use td_core::grid::{GridPos, Tile, TileGrid};
use td_core::math::{Fixed, Vec2Fixed};
use td_core::pathfinding::PathFinder;
use td_core::turret::TurretId;
use td_core::turret_data::{SlowParams, TurretKind, MAX_TIER};
use td_core::wave_generator::{fill_budget, GroupSizeBand, WaveGenerator};
use td_test_utils::strategies::{
    arb_amount, arb_damage, arb_enemy_kind, arb_grid_pos, arb_seed, arb_slow_multiplier,
    arb_turret_kind, arb_wave_number,
};

fn spawned(kind: EnemyKind) -> Enemy {
    Enemy::spawn(1, kind, Vec2Fixed::ZERO)
}

proptest! {
    /// HP never leaves `[0, max_hp]`, whatever the damage sequence.
    #[test]
    fn prop_hp_stays_in_bounds(
        kind in arb_enemy_kind(),
        hits in proptest::collection::vec(arb_damage(), 1..20),
    ) {
        let mut enemy = spawned(kind);
        let max_hp = enemy.max_hp();
        for damage in hits {
            let killed = enemy.apply_damage(damage, TurretId(1)).is_some();
            prop_assert!(enemy.hp() >= Fixed::ZERO);
            prop_assert!(enemy.hp() <= max_hp);
            if killed {
                prop_assert_eq!(enemy.hp(), Fixed::ZERO);
                prop_assert!(enemy.is_destroyed());
            }
        }
    }

    /// A kill is credited exactly once.
    #[test]
    fn prop_kill_credited_once(
        kind in arb_enemy_kind(),
        hits in proptest::collection::vec(arb_damage(), 1..40),
    ) {
        let mut enemy = spawned(kind);
        let credits = hits
            .into_iter()
            .filter_map(|damage| enemy.apply_damage(damage, TurretId(2)))
            .count();
        prop_assert!(credits <= 1);
        prop_assert_eq!(credits == 1, enemy.is_destroyed());
    }

    /// An overdraft fails and leaves the ledger untouched.
    #[test]
    fn prop_overdraft_rejected(balance in 0u64..1_000_000, excess in 1u64..1_000_000) {
        let mut ledger = Ledger::new(balance);
        let debit = balance + excess;
        let result = ledger.apply(-(debit as i64));
        let rejected = matches!(result, Err(GameError::InsufficientFunds { .. }));
        prop_assert!(rejected);
        prop_assert_eq!(ledger.balance(), balance);
        prop_assert_eq!(ledger.spent(), 0);
    }

    /// Crediting and then debiting the same amount restores the balance.
    #[test]
    fn prop_credit_then_debit_restores(balance in 0u64..1_000_000, amount in arb_amount()) {
        let mut ledger = Ledger::new(balance);
        let magnitude = amount.abs();
        prop_assert!(ledger.apply(magnitude).is_ok());
        prop_assert!(ledger.apply(-magnitude).is_ok());
        prop_assert_eq!(ledger.balance(), balance);
    }

    /// The strongest slow wins, and removing it falls back to the next one.
    #[test]
    fn prop_strongest_slow_wins(a in arb_slow_multiplier(), b in arb_slow_multiplier()) {
        let mut enemy = spawned(EnemyKind::Normal);
        enemy.add_slow(TurretId(1), SlowParams::permanent(a));
        enemy.add_slow(TurretId(2), SlowParams::permanent(b));
        prop_assert_eq!(enemy.slow_multiplier(), a.min(b));

        enemy.remove_slow(TurretId(1));
        prop_assert_eq!(enemy.slow_multiplier(), b);
        prop_assert!(enemy.current_speed() <= EnemyKind::Normal.blueprint().speed_fixed());
    }

    /// Slow-immune kinds keep full speed.
    #[test]
    fn prop_immune_kinds_ignore_slows(multiplier in arb_slow_multiplier()) {
        for kind in [EnemyKind::Unslowable, EnemyKind::UnslowableBoss] {
            let mut enemy = spawned(kind);
            enemy.add_slow(TurretId(4), SlowParams::permanent(multiplier));
            prop_assert_eq!(enemy.slow_multiplier(), Fixed::ONE);
        }
    }

    /// Every reachable blueprint has a usable fire interval and a positive range.
    #[test]
    fn prop_blueprints_well_formed(kind in arb_turret_kind(), tier in 0u8..=MAX_TIER) {
        let blueprint = kind.blueprint_at(tier).unwrap();
        prop_assert!(blueprint.fire_interval() > Fixed::ZERO);
        prop_assert!(blueprint.range > Fixed::ZERO);
        prop_assert!(blueprint.damage >= Fixed::ZERO);
        if let Some(chance) = blueprint.piercing_chance {
            prop_assert!(chance >= Fixed::ZERO && chance <= Fixed::ONE);
        }
    }

    /// Tiers past the last one are rejected.
    #[test]
    fn prop_tier_beyond_max_rejected(kind in arb_turret_kind(), tier in (MAX_TIER + 1)..=u8::MAX) {
        prop_assert!(kind.blueprint_at(tier).is_err());
    }

    /// On an open grid the route is a shortest 4-connected walk.
    #[test]
    fn prop_open_grid_route_is_manhattan(
        start in arb_grid_pos(12, 12),
        goal in arb_grid_pos(12, 12),
    ) {
        let grid = TileGrid::new(12, 12);
        let mut finder = PathFinder::new(1000);
        let route = finder.find(&grid, start, goal).unwrap();
        prop_assert_eq!(route.len() as u32, start.manhattan(goal) + 1);
        prop_assert_eq!(route.first(), Some(&start));
        prop_assert_eq!(route.last(), Some(&goal));
        for pair in route.windows(2) {
            prop_assert_eq!(pair[0].manhattan(pair[1]), 1);
        }
    }

    /// A start boxed in by obstacles never reaches an outside goal.
    #[test]
    fn prop_enclosed_start_has_no_path(x in 1u32..9, y in 1u32..9, goal in arb_grid_pos(10, 10)) {
        let start = GridPos::new(x, y);
        prop_assume!(goal != start);
        let mut grid = TileGrid::new(10, 10);
        for wall in [
            GridPos::new(x - 1, y),
            GridPos::new(x + 1, y),
            GridPos::new(x, y - 1),
            GridPos::new(x, y + 1),
        ] {
            grid.set(wall, Tile::Obstacle);
        }
        let mut finder = PathFinder::new(1000);
        let result = finder.find(&grid, start, goal);
        prop_assert!(matches!(result, Err(GameError::NoPath { .. })), "expected NoPath, got {:?}", result);
    }

    /// Budget filling never overspends and leaves less than the cheapest weight.
    #[test]
    fn prop_fill_budget_spends_down(seed in arb_seed(), budget in 0u32..3000, tier in 0u32..6) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let pool = &EnemyKind::REGULAR[..];
        let (groups, left) = fill_budget(
            &mut rng,
            &WaveTuning::default(),
            budget,
            pool,
            GroupSizeBand::for_tier(tier),
        );
        let spent: u32 = groups.iter().map(|g| g.amount * g.kind.blueprint().weight).sum();
        let cheapest = pool.iter().map(|k| k.blueprint().weight).min().unwrap();
        prop_assert_eq!(spent + left, budget);
        prop_assert!(left < cheapest);
        prop_assert!(groups.iter().all(|g| g.amount > 0));
    }

    /// Generated regular waves stay within their budget.
    #[test]
    fn prop_wave_within_budget(seed in arb_seed(), wave in arb_wave_number()) {
        prop_assume!(wave <= WaveTuning::default().boss_injection_after);
        let mut generator = WaveGenerator::new(seed, WaveTuning::default());
        let budget = u64::from(generator.budget(wave));
        let generated = generator.generate(wave, false);
        prop_assert!(generated.total_weight() <= budget);
        prop_assert_eq!(generated.remaining, generated.enemy_count());
    }

    /// The same seed yields byte-identical waves.
    #[test]
    fn prop_same_seed_same_waves(seed in arb_seed()) {
        let first = WaveGenerator::new(seed, WaveTuning::default()).preview(12);
        let second = WaveGenerator::new(seed, WaveTuning::default()).preview(12);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            bincode::serialize(&first).unwrap(),
            bincode::serialize(&second).unwrap()
        );
    }
}
