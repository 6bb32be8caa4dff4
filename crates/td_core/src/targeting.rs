//! Runtime enemy detection through a path-distance bucket index.
//!
//! Turrets see the path as a list of [`VisibleSegment`]s, each covering an
//! interval of path distance. Enemies are bucketed by the distance they have
//! travelled, so finding the enemies inside a segment only touches the
//! buckets overlapping its interval.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};
use crate::pool::Handle;
use crate::visibility::VisibleSegment;

/// How a turret picks among visible enemies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetingMode {
    /// Furthest along the path.
    #[default]
    First,
    /// Least far along the path.
    Last,
    /// Highest current HP.
    Strong,
    /// Lowest current HP.
    Weak,
    /// Nearest to the turret.
    Closest,
}

impl TargetingMode {
    /// Every mode in cycle order.
    pub const ALL: [Self; 5] = [
        Self::First,
        Self::Last,
        Self::Strong,
        Self::Weak,
        Self::Closest,
    ];

    /// The mode after this one, wrapping around.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::First => Self::Last,
            Self::Last => Self::Strong,
            Self::Strong => Self::Weak,
            Self::Weak => Self::Closest,
            Self::Closest => Self::First,
        }
    }
}

/// Snapshot of an enemy as seen by targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Enemy handle.
    pub handle: Handle,
    /// Distance travelled.
    pub distance: Fixed,
    /// Current HP.
    pub hp: Fixed,
    /// World position.
    pub position: Vec2Fixed,
}

/// Enemies bucketed by path distance, rebuilt every tick.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    buckets: Vec<Vec<Candidate>>,
}

impl PathIndex {
    /// Index for a path of `path_length` units, one bucket per unit.
    #[must_use]
    pub fn new(path_length: Fixed) -> Self {
        let count = path_length.ceil().to_num::<usize>() + 1;
        Self {
            buckets: vec![Vec::new(); count],
        }
    }

    fn bucket_of(&self, distance: Fixed) -> usize {
        let index = distance.max(Fixed::ZERO).floor().to_num::<usize>();
        index.min(self.buckets.len().saturating_sub(1))
    }

    /// Drop every entry, keeping allocations.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Add one enemy.
    pub fn insert(&mut self, candidate: Candidate) {
        if self.buckets.is_empty() {
            self.buckets.push(Vec::new());
        }
        let bucket = self.bucket_of(candidate.distance);
        self.buckets[bucket].push(candidate);
    }

    /// Replace the contents with `candidates`.
    pub fn rebuild(&mut self, candidates: impl IntoIterator<Item = Candidate>) {
        self.clear();
        for candidate in candidates {
            self.insert(candidate);
        }
    }

    /// Number of indexed enemies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Nothing indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Enemies whose distance lies in `[from, to]`.
    pub fn query(&self, from: Fixed, to: Fixed) -> impl Iterator<Item = &Candidate> {
        let (first, last) = if self.buckets.is_empty() || from > to {
            (1, 0)
        } else {
            (self.bucket_of(from), self.bucket_of(to))
        };
        self.buckets
            .get(first..=last)
            .unwrap_or(&[])
            .iter()
            .flatten()
            .filter(move |c| c.distance >= from && c.distance <= to)
    }

    /// Enemies inside a visible segment.
    pub fn in_segment<'a>(
        &'a self,
        segment: &VisibleSegment,
    ) -> impl Iterator<Item = &'a Candidate> + 'a {
        self.query(segment.start_distance, segment.end_distance)
    }

    /// Pick a target among enemies inside `segments` according to `mode`.
    ///
    /// `segments` are ordered furthest along the path first.
    #[must_use]
    pub fn select(
        &self,
        mode: TargetingMode,
        segments: &[VisibleSegment],
        origin: Vec2Fixed,
    ) -> Option<Handle> {
        match mode {
            TargetingMode::First => segments.iter().find_map(|segment| {
                self.in_segment(segment)
                    .max_by(|a, b| a.distance.cmp(&b.distance).then(b.handle.cmp(&a.handle)))
                    .map(|c| c.handle)
            }),
            TargetingMode::Last => segments.iter().rev().find_map(|segment| {
                self.in_segment(segment)
                    .min_by(|a, b| a.distance.cmp(&b.distance).then(a.handle.cmp(&b.handle)))
                    .map(|c| c.handle)
            }),
            TargetingMode::Closest => self
                .visible(segments)
                .min_by(|a, b| {
                    a.position
                        .distance_squared(origin)
                        .cmp(&b.position.distance_squared(origin))
                        .then(a.handle.cmp(&b.handle))
                })
                .map(|c| c.handle),
            TargetingMode::Strong => self
                .visible(segments)
                .max_by(|a, b| {
                    a.hp.cmp(&b.hp)
                        .then(a.distance.cmp(&b.distance))
                        .then(b.handle.cmp(&a.handle))
                })
                .map(|c| c.handle),
            TargetingMode::Weak => self
                .visible(segments)
                .min_by(|a, b| {
                    a.hp.cmp(&b.hp)
                        .then(b.distance.cmp(&a.distance))
                        .then(a.handle.cmp(&b.handle))
                })
                .map(|c| c.handle),
        }
    }

    fn visible<'a>(
        &'a self,
        segments: &'a [VisibleSegment],
    ) -> impl Iterator<Item = &'a Candidate> + 'a {
        segments.iter().flat_map(move |segment| self.in_segment(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;

    fn fixed(n: f64) -> Fixed {
        Fixed::from_num(n)
    }

    fn segment(from: f64, to: f64) -> VisibleSegment {
        VisibleSegment {
            section: 0,
            start: Vec2Fixed::new(fixed(from), Fixed::ZERO),
            end: Vec2Fixed::new(fixed(to), Fixed::ZERO),
            start_distance: fixed(from),
            end_distance: fixed(to),
        }
    }

    /// Index with enemies at `(distance, hp)`, positioned along the x axis.
    fn index(entries: &[(f64, f64)]) -> (PathIndex, Vec<Handle>) {
        let mut pool: Pool<u8> = Pool::new("test", 8, true);
        let mut index = PathIndex::new(fixed(40.0));
        let mut handles = Vec::new();
        for &(distance, hp) in entries {
            let handle = pool.acquire(0).unwrap();
            handles.push(handle);
            index.insert(Candidate {
                handle,
                distance: fixed(distance),
                hp: fixed(hp),
                position: Vec2Fixed::new(fixed(distance), Fixed::ZERO),
            });
        }
        (index, handles)
    }

    #[test]
    fn test_mode_cycle() {
        let mut mode = TargetingMode::default();
        for expected in TargetingMode::ALL.iter().skip(1) {
            mode = mode.next();
            assert_eq!(mode, *expected);
        }
        assert_eq!(mode.next(), TargetingMode::First);
    }

    #[test]
    fn test_query_bounds() {
        let (index, handles) = index(&[(1.5, 10.0), (3.0, 10.0), (7.25, 10.0)]);
        let found: Vec<Handle> = index.query(fixed(1.5), fixed(3.0)).map(|c| c.handle).collect();
        assert_eq!(found, vec![handles[0], handles[1]]);
        assert_eq!(index.query(fixed(3.5), fixed(7.0)).count(), 0);
        assert_eq!(index.query(fixed(5.0), fixed(4.0)).count(), 0);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_first_short_circuits_on_furthest_segment() {
        let (index, handles) = index(&[(2.0, 10.0), (4.0, 10.0), (21.0, 10.0), (25.0, 10.0)]);
        let segments = [segment(20.0, 22.0), segment(1.0, 5.0)];
        // The furthest segment wins even though 25 is further overall.
        let target = index.select(TargetingMode::First, &segments, Vec2Fixed::ZERO);
        assert_eq!(target, Some(handles[2]));
    }

    #[test]
    fn test_last_uses_nearest_segment() {
        let (index, handles) = index(&[(2.0, 10.0), (4.0, 10.0), (21.0, 10.0)]);
        let segments = [segment(20.0, 22.0), segment(1.0, 5.0)];
        let target = index.select(TargetingMode::Last, &segments, Vec2Fixed::ZERO);
        assert_eq!(target, Some(handles[0]));
    }

    #[test]
    fn test_strong_and_weak_break_ties_by_distance() {
        let (index, handles) = index(&[(2.0, 50.0), (3.0, 50.0), (4.0, 10.0), (4.5, 10.0)]);
        let segments = [segment(0.0, 10.0)];
        assert_eq!(
            index.select(TargetingMode::Strong, &segments, Vec2Fixed::ZERO),
            Some(handles[1])
        );
        assert_eq!(
            index.select(TargetingMode::Weak, &segments, Vec2Fixed::ZERO),
            Some(handles[3])
        );
    }

    #[test]
    fn test_closest() {
        let (index, handles) = index(&[(2.0, 10.0), (6.0, 10.0), (9.0, 10.0)]);
        let segments = [segment(5.0, 10.0), segment(0.0, 3.0)];
        let origin = Vec2Fixed::new(fixed(8.0), Fixed::ZERO);
        assert_eq!(
            index.select(TargetingMode::Closest, &segments, origin),
            Some(handles[2])
        );
    }

    #[test]
    fn test_nothing_visible() {
        let (index, _) = index(&[(2.0, 10.0)]);
        for mode in TargetingMode::ALL {
            assert_eq!(index.select(mode, &[segment(10.0, 12.0)], Vec2Fixed::ZERO), None);
            assert_eq!(index.select(mode, &[], Vec2Fixed::ZERO), None);
        }
    }

    #[test]
    fn test_distances_past_the_end_clamp() {
        let mut index = PathIndex::new(fixed(5.0));
        let (_, handles) = self::index(&[(0.0, 1.0)]);
        index.insert(Candidate {
            handle: handles[0],
            distance: fixed(9.0),
            hp: Fixed::ONE,
            position: Vec2Fixed::ZERO,
        });
        assert_eq!(index.query(fixed(8.0), fixed(10.0)).count(), 1);
    }
}
