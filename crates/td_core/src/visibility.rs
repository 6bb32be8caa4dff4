//! Field of view of a turret over the static path.
//!
//! Visibility is computed in two phases. The broad phase sweeps evenly
//! spaced rays out to the turret's range; a ray stops at the first obstacle
//! and every path section it crosses before that becomes a candidate. The
//! narrow phase samples each candidate section at a fixed step, keeps the
//! samples inside the range circle and tests line of sight from the turret
//! to each of them. Contiguous visible samples form a [`VisibleSegment`].
//!
//! Sample offsets lie on a fixed grid along each section, independent of the
//! range, which lets [`Visibility::rescan`] reuse earlier scans after a range
//! change and still produce exactly what a fresh [`Visibility::compute`]
//! would.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::VisibilityConfig;
use crate::grid::{GameMap, GridPos, PathSection, Tile, TileGrid};
use crate::math::{fixed_serde, normalize_degrees, Fixed, Vec2Fixed};

/// Sampling parameters in simulation units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityParams {
    /// Rays in the broad phase.
    pub ray_count: u32,
    /// Step along broad-phase rays and line-of-sight tests.
    pub ray_step: Fixed,
    /// Step along path sections in the narrow phase.
    pub scan_step: Fixed,
    /// Merge tolerance for angular ranges, degrees.
    pub merge_tolerance: Fixed,
    /// Slack when testing a bearing against the ranges, degrees.
    pub angle_tolerance: Fixed,
}

impl From<&VisibilityConfig> for VisibilityParams {
    fn from(config: &VisibilityConfig) -> Self {
        Self {
            ray_count: config.ray_count.max(1),
            ray_step: Fixed::from_num(config.ray_step),
            scan_step: Fixed::from_num(config.scan_step),
            merge_tolerance: Fixed::from_num(config.merge_tolerance_deg),
            angle_tolerance: Fixed::from_num(config.angle_tolerance_deg),
        }
    }
}

impl Default for VisibilityParams {
    fn default() -> Self {
        Self::from(&VisibilityConfig::default())
    }
}

/// A visible stretch of the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleSegment {
    /// Index of the path section this stretch belongs to.
    pub section: usize,
    /// World position where the stretch begins (path order).
    pub start: Vec2Fixed,
    /// World position where the stretch ends.
    pub end: Vec2Fixed,
    /// Path distance at `start`.
    #[serde(with = "fixed_serde")]
    pub start_distance: Fixed,
    /// Path distance at `end`.
    #[serde(with = "fixed_serde")]
    pub end_distance: Fixed,
}

impl VisibleSegment {
    /// Whether a path distance falls inside the stretch, widened by `slack`.
    #[must_use]
    pub fn contains_distance(&self, distance: Fixed, slack: Fixed) -> bool {
        distance >= self.start_distance - slack && distance <= self.end_distance + slack
    }
}

/// A range of bearings in degrees. `end` may exceed 360 for wrapping ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AngularRange {
    /// Lower bearing.
    #[serde(with = "fixed_serde")]
    pub start: Fixed,
    /// Upper bearing.
    #[serde(with = "fixed_serde")]
    pub end: Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    offset: Fixed,
    distance_squared: Fixed,
    visible: bool,
}

/// Narrow-phase result for one section, valid up to `radius`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SectionScan {
    radius: Fixed,
    covers_section: bool,
    samples: Vec<Sample>,
}

/// Visible segments and angular limits of a turret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    origin: Vec2Fixed,
    #[serde(with = "fixed_serde")]
    range: Fixed,
    segments: Vec<VisibleSegment>,
    ranges: Vec<AngularRange>,
    #[serde(skip)]
    scans: BTreeMap<usize, SectionScan>,
}

impl Visibility {
    /// Compute visibility from `origin` out to `range`.
    #[must_use]
    pub fn compute(map: &GameMap, origin: Vec2Fixed, range: Fixed, params: &VisibilityParams) -> Self {
        let mut visibility = Self {
            origin,
            range,
            segments: Vec::new(),
            ranges: Vec::new(),
            scans: BTreeMap::new(),
        };
        visibility.rebuild(map, params);
        visibility
    }

    /// Recompute for a new range, reusing cached section scans where valid.
    pub fn rescan(&mut self, map: &GameMap, new_range: Fixed, params: &VisibilityParams) {
        self.range = new_range;
        self.rebuild(map, params);
    }

    /// Turret position.
    #[must_use]
    pub const fn origin(&self) -> Vec2Fixed {
        self.origin
    }

    /// Range the data was computed for.
    #[must_use]
    pub const fn range(&self) -> Fixed {
        self.range
    }

    /// Visible segments, furthest along the path first.
    #[must_use]
    pub fn segments(&self) -> &[VisibleSegment] {
        &self.segments
    }

    /// Merged angular ranges, ascending by start.
    #[must_use]
    pub fn ranges(&self) -> &[AngularRange] {
        &self.ranges
    }

    /// Whether any part of the path is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether a path distance lies on a visible segment.
    #[must_use]
    pub fn contains_distance(&self, distance: Fixed, slack: Fixed) -> bool {
        self.segments
            .iter()
            .any(|s| s.contains_distance(distance, slack))
    }

    /// Whether `angle` (degrees) lies inside some range, with `tolerance` slack.
    #[must_use]
    pub fn is_angle_within_limits(&self, angle: Fixed, tolerance: Fixed) -> bool {
        let full = Fixed::from_num(360);
        self.ranges.iter().any(|r| {
            let start = r.start - tolerance;
            let span = r.end + tolerance - start;
            if span >= full {
                return true;
            }
            normalize_degrees(angle - start) < span
        })
    }

    fn rebuild(&mut self, map: &GameMap, params: &VisibilityParams) {
        let candidates = broad_phase(map, self.origin, self.range, params);
        let range_squared = self.range * self.range;

        let mut scans = BTreeMap::new();
        let mut segments = Vec::new();

        for index in candidates {
            let section = &map.sections()[index];
            let scan = match self.scans.remove(&index) {
                Some(cached) if cached.radius >= self.range || cached.covers_section => cached,
                _ => scan_section(map.grid(), section, self.origin, self.range, params),
            };

            let in_range: Vec<Sample> = scan
                .samples
                .iter()
                .copied()
                .filter(|s| s.distance_squared <= range_squared)
                .collect();
            collect_runs(index, section, &in_range, &mut segments);
            scans.insert(index, scan);
        }

        segments.sort_by(|a, b| {
            b.end_distance
                .cmp(&a.end_distance)
                .then_with(|| b.start_distance.cmp(&a.start_distance))
        });

        self.ranges = angular_ranges(self.origin, &segments, params.merge_tolerance);
        self.segments = segments;
        self.scans = scans;
    }
}

/// Sections crossed by any ray before it meets an obstacle.
fn broad_phase(
    map: &GameMap,
    origin: Vec2Fixed,
    range: Fixed,
    params: &VisibilityParams,
) -> BTreeSet<usize> {
    let grid = map.grid();
    let mut lookup: HashMap<GridPos, Vec<usize>> = HashMap::new();
    for (index, section) in map.sections().iter().enumerate() {
        for cell in &section.cells {
            lookup.entry(*cell).or_default().push(index);
        }
    }

    let mut candidates = BTreeSet::new();
    let steps = if params.ray_step > Fixed::ZERO {
        (range / params.ray_step).to_num::<u32>()
    } else {
        0
    };
    let full = Fixed::from_num(360);

    for ray in 0..params.ray_count {
        let bearing = full * Fixed::from_num(ray) / Fixed::from_num(params.ray_count);
        let direction = Vec2Fixed::from_bearing(bearing);
        let mut last_cell = None;

        for step in 0..=steps {
            let point = origin + direction.scale(params.ray_step * Fixed::from_num(step));
            let Some(cell) = grid.cell_at(point) else {
                break;
            };
            if last_cell == Some(cell) {
                continue;
            }
            last_cell = Some(cell);

            match grid.get(cell) {
                Some(Tile::Obstacle) => break,
                Some(Tile::Path) => {
                    if let Some(sections) = lookup.get(&cell) {
                        candidates.extend(sections.iter().copied());
                    }
                }
                _ => {}
            }
        }
    }
    candidates
}

/// Line of sight from `from` to `to`, walking at `step`.
fn line_of_sight(grid: &TileGrid, from: Vec2Fixed, to: Vec2Fixed, step: Fixed) -> bool {
    let distance = from.distance(to);
    if distance == Fixed::ZERO || step <= Fixed::ZERO {
        return true;
    }
    let count = (distance / step).ceil().to_num::<u32>().max(1);
    let count_fixed = Fixed::from_num(count);
    (1..=count).all(|i| !grid.blocks_sight(from.lerp(to, Fixed::from_num(i) / count_fixed)))
}

fn scan_section(
    grid: &TileGrid,
    section: &PathSection,
    origin: Vec2Fixed,
    radius: Fixed,
    params: &VisibilityParams,
) -> SectionScan {
    let radius_squared = radius * radius;
    let covers_section = section.start.distance_squared(origin) <= radius_squared
        && section.end.distance_squared(origin) <= radius_squared;

    let mut offsets = Vec::new();
    if params.scan_step > Fixed::ZERO {
        let mut k = 0_u32;
        loop {
            let offset = params.scan_step * Fixed::from_num(k);
            if offset >= section.length {
                break;
            }
            offsets.push(offset);
            k += 1;
        }
    }
    offsets.push(section.length);

    let samples = offsets
        .into_iter()
        .filter_map(|offset| {
            let point = section.point_at(offset);
            let distance_squared = point.distance_squared(origin);
            (distance_squared <= radius_squared).then(|| Sample {
                offset,
                distance_squared,
                visible: line_of_sight(grid, origin, point, params.ray_step),
            })
        })
        .collect();

    SectionScan {
        radius,
        covers_section,
        samples,
    }
}

fn collect_runs(
    index: usize,
    section: &PathSection,
    samples: &[Sample],
    out: &mut Vec<VisibleSegment>,
) {
    let mut run: Option<(Fixed, Fixed)> = None;
    let mut flush = |run: &mut Option<(Fixed, Fixed)>| {
        if let Some((first, last)) = run.take() {
            out.push(VisibleSegment {
                section: index,
                start: section.point_at(first),
                end: section.point_at(last),
                start_distance: section.start_distance + first,
                end_distance: section.start_distance + last,
            });
        }
    };

    for sample in samples {
        if sample.visible {
            run = Some(match run {
                Some((first, _)) => (first, sample.offset),
                None => (sample.offset, sample.offset),
            });
        } else {
            flush(&mut run);
        }
    }
    flush(&mut run);
}

/// Bearing ranges of the segments, normalised, sorted and merged.
fn angular_ranges(
    origin: Vec2Fixed,
    segments: &[VisibleSegment],
    tolerance: Fixed,
) -> Vec<AngularRange> {
    let half = Fixed::from_num(180);
    let full = Fixed::from_num(360);

    let mut ranges: Vec<AngularRange> = segments
        .iter()
        .map(|segment| {
            let a = origin.bearing_to(segment.start);
            let b = origin.bearing_to(segment.end);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            if high - low > half {
                AngularRange {
                    start: high,
                    end: low + full,
                }
            } else {
                AngularRange {
                    start: low,
                    end: high,
                }
            }
        })
        .collect();

    ranges.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));

    let mut merged: Vec<AngularRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.end + tolerance >= range.start => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileGrid;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    /// Straight east-west path along row 5 of a 20x11 map.
    fn straight_map(obstacles: &[(u32, u32)]) -> GameMap {
        let mut grid = TileGrid::new(20, 11);
        for &(x, y) in obstacles {
            grid.set(GridPos::new(x, y), Tile::Obstacle);
        }
        let cells = (0..20).map(|x| GridPos::new(x, 5)).collect();
        GameMap::from_path(grid, cells).unwrap()
    }

    fn turret_at(x: u32, y: u32) -> Vec2Fixed {
        TileGrid::cell_center(GridPos::new(x, y))
    }

    #[test]
    fn test_open_field_sees_chord_of_range() {
        let map = straight_map(&[]);
        let params = VisibilityParams::default();
        let vis = Visibility::compute(&map, turret_at(10, 7), fixed(3), &params);

        assert_eq!(vis.segments().len(), 1);
        let segment = vis.segments()[0];
        // Chord half-width is sqrt(9 - 4) ~ 2.236 around x = 10.5.
        let half = Fixed::from_num(2.3);
        assert!(segment.start.x >= Fixed::from_num(10.5) - half);
        assert!(segment.end.x <= Fixed::from_num(10.5) + half);
        assert!(segment.end_distance > segment.start_distance);
        assert!(vis.contains_distance(fixed(10), Fixed::ZERO));
        assert!(!vis.contains_distance(fixed(2), Fixed::ZERO));
    }

    #[test]
    fn test_out_of_range_sees_nothing() {
        let map = straight_map(&[]);
        let vis = Visibility::compute(&map, turret_at(10, 10), fixed(2), &VisibilityParams::default());
        assert!(vis.is_empty());
        assert!(vis.ranges().is_empty());
        assert!(!vis.is_angle_within_limits(fixed(270), Fixed::ONE));
    }

    #[test]
    fn test_obstacle_wall_blocks_view() {
        // Wall directly between the turret and the path.
        let wall: Vec<(u32, u32)> = (0..20).map(|x| (x, 6)).collect();
        let map = straight_map(&wall);
        let vis = Visibility::compute(&map, turret_at(10, 7), fixed(3), &VisibilityParams::default());
        assert!(vis.is_empty());
    }

    #[test]
    fn test_partial_occlusion_splits_view() {
        // A single pillar right below the turret hides the middle of the path.
        let map = straight_map(&[(10, 6)]);
        let vis = Visibility::compute(&map, turret_at(10, 7), fixed(4), &VisibilityParams::default());
        assert!(vis.segments().len() >= 2, "{:?}", vis.segments());
        // Furthest along the path comes first.
        assert!(vis.segments()[0].end_distance > vis.segments()[1].end_distance);
        assert!(!vis.contains_distance(Fixed::from_num(10.5), Fixed::ZERO));
    }

    #[test]
    fn test_angular_ranges_cover_path_below() {
        let map = straight_map(&[]);
        let vis = Visibility::compute(&map, turret_at(10, 7), fixed(3), &VisibilityParams::default());
        assert_eq!(vis.ranges().len(), 1);
        // Path is south of the turret: bearings around 270 degrees.
        assert!(vis.is_angle_within_limits(fixed(270), Fixed::ONE));
        assert!(!vis.is_angle_within_limits(fixed(90), Fixed::ONE));
    }

    #[test]
    fn test_wrapping_range_normalised() {
        let origin = Vec2Fixed::ZERO;
        let segment = VisibleSegment {
            section: 0,
            start: Vec2Fixed::from_ints(2, -1),
            end: Vec2Fixed::from_ints(2, 1),
            start_distance: Fixed::ZERO,
            end_distance: fixed(2),
        };
        let ranges = angular_ranges(origin, &[segment], Fixed::ONE);
        assert_eq!(ranges.len(), 1);
        // (~333, ~27) becomes (333, 387).
        assert!(ranges[0].start > fixed(300));
        assert!(ranges[0].end > fixed(360));

        let vis = Visibility {
            origin,
            range: fixed(5),
            segments: vec![segment],
            ranges,
            scans: BTreeMap::new(),
        };
        assert!(vis.is_angle_within_limits(fixed(0), Fixed::ONE));
        assert!(vis.is_angle_within_limits(fixed(359), Fixed::ONE));
        assert!(vis.is_angle_within_limits(fixed(20), Fixed::ONE));
        assert!(!vis.is_angle_within_limits(fixed(180), Fixed::ONE));
    }

    #[test]
    fn test_close_ranges_merge() {
        let origin = Vec2Fixed::ZERO;
        let make = |start: (i32, i32), end: (i32, i32)| VisibleSegment {
            section: 0,
            start: Vec2Fixed::from_ints(start.0, start.1),
            end: Vec2Fixed::from_ints(end.0, end.1),
            start_distance: Fixed::ZERO,
            end_distance: Fixed::ONE,
        };
        // 0..45 and 45..90 touch; 180..225 stays apart.
        let segments = [make((1, 0), (1, 1)), make((1, 1), (0, 1)), make((-1, 0), (-1, -1))];
        let ranges = angular_ranges(origin, &segments, Fixed::ONE);
        assert_eq!(ranges.len(), 2);
        assert!(ranges[0].end > fixed(89));
    }

    #[test]
    fn test_rescan_matches_fresh_compute() {
        let map = straight_map(&[(8, 6), (13, 4)]);
        let params = VisibilityParams::default();
        let origin = turret_at(10, 7);

        let mut grown = Visibility::compute(&map, origin, fixed(2), &params);
        grown.rescan(&map, fixed(5), &params);
        let fresh = Visibility::compute(&map, origin, fixed(5), &params);
        assert_eq!(grown.segments(), fresh.segments());
        assert_eq!(grown.ranges(), fresh.ranges());

        let mut shrunk = Visibility::compute(&map, origin, fixed(6), &params);
        shrunk.rescan(&map, Fixed::from_num(2.5), &params);
        let fresh = Visibility::compute(&map, origin, Fixed::from_num(2.5), &params);
        assert_eq!(shrunk.segments(), fresh.segments());
        assert_eq!(shrunk.range(), Fixed::from_num(2.5));
    }

    #[test]
    fn test_serde_skips_cache() {
        let map = straight_map(&[]);
        let vis = Visibility::compute(&map, turret_at(10, 7), fixed(3), &VisibilityParams::default());
        let bytes = bincode::serialize(&vis).unwrap();
        let back: Visibility = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.segments(), vis.segments());
        assert!(back.scans.is_empty());
    }
}
