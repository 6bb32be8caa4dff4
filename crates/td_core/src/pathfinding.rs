//! Grid A* used to carve the enemy path.
//!
//! Searches are 4-connected with unit step cost and a Manhattan heuristic.
//! Open-set ties are broken by `(f, h)` and then by insertion order, so the
//! same grid always yields the same path.
//!
//! A [`PathFinder`] remembers a reserved set between searches: after every
//! successful search the neighbours of the found path (except around the
//! goal) become unwalkable for later searches on the same finder. This keeps
//! the segments of a multi-waypoint path from running alongside each other.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::error::{GameError, Result};
use crate::grid::{GridPos, Tile, TileGrid};

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct OpenNode {
    index: usize,
    f: u32,
    h: u32,
    /// Insertion counter; earlier entries win remaining ties.
    seq: u64,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse every key for min-heap behaviour.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Stateful A* search over a [`TileGrid`].
#[derive(Debug, Clone, Default)]
pub struct PathFinder {
    reserved: HashSet<GridPos>,
    max_cells: usize,
}

impl PathFinder {
    /// Create a finder whose results are capped at `max_cells` cells.
    #[must_use]
    pub fn new(max_cells: usize) -> Self {
        Self {
            reserved: HashSet::new(),
            max_cells: max_cells.max(1),
        }
    }

    /// Cells currently reserved by earlier searches.
    #[must_use]
    pub fn reserved(&self) -> &HashSet<GridPos> {
        &self.reserved
    }

    /// Forget every reservation.
    pub fn clear_reserved(&mut self) {
        self.reserved.clear();
    }

    /// Whether a search may step onto `pos`.
    fn walkable(&self, grid: &TileGrid, pos: GridPos) -> bool {
        grid.get(pos) == Some(Tile::Ground) && !self.reserved.contains(&pos)
    }

    /// Find the shortest walkable route from `start` to `goal`.
    ///
    /// The start cell itself is never tested for walkability, so a segment
    /// may begin on the previous segment's goal. Returns the ascending cell
    /// list `start..=goal`.
    ///
    /// # Errors
    ///
    /// [`GameError::OutOfBounds`] for cells outside the grid,
    /// [`GameError::NoPath`] when the goal cannot be reached. A failed search
    /// clears the reserved set.
    pub fn find(&mut self, grid: &TileGrid, start: GridPos, goal: GridPos) -> Result<Vec<GridPos>> {
        for pos in [start, goal] {
            if !grid.in_bounds(pos) {
                return Err(GameError::OutOfBounds(pos));
            }
        }

        if start == goal {
            return Ok(vec![start]);
        }

        let cell_count = grid.len();
        let mut g_score = vec![u32::MAX; cell_count];
        let mut came_from: Vec<Option<usize>> = vec![None; cell_count];
        let mut closed = vec![false; cell_count];
        let mut open = BinaryHeap::new();
        let mut seq = 0_u64;

        let start_index = grid.index(start);
        let goal_index = grid.index(goal);
        let start_h = start.manhattan(goal);
        g_score[start_index] = 0;
        open.push(OpenNode {
            index: start_index,
            f: start_h,
            h: start_h,
            seq,
        });

        while let Some(current) = open.pop() {
            if closed[current.index] {
                continue;
            }
            if current.index == goal_index {
                let cells = self.reconstruct(grid, &came_from, goal_index);
                return Ok(cells);
            }
            closed[current.index] = true;

            let current_pos = grid.pos_of(current.index);
            let tentative = g_score[current.index] + 1;

            for neighbour in grid.neighbours(current_pos) {
                let index = grid.index(neighbour);
                if closed[index] || !self.walkable(grid, neighbour) {
                    continue;
                }
                if tentative < g_score[index] {
                    g_score[index] = tentative;
                    came_from[index] = Some(current.index);
                    let h = neighbour.manhattan(goal);
                    seq += 1;
                    open.push(OpenNode {
                        index,
                        f: tentative + h,
                        h,
                        seq,
                    });
                }
            }
        }

        self.reserved.clear();
        Err(GameError::NoPath {
            from: start,
            to: goal,
        })
    }

    /// Walk the back-pointers, reserve the path's surroundings and apply the cap.
    fn reconstruct(
        &mut self,
        grid: &TileGrid,
        came_from: &[Option<usize>],
        goal_index: usize,
    ) -> Vec<GridPos> {
        let mut cells = vec![grid.pos_of(goal_index)];
        let mut current = goal_index;
        while let Some(previous) = came_from[current] {
            let pos = grid.pos_of(previous);
            self.reserved.extend(grid.neighbours(pos));
            cells.push(pos);
            current = previous;
        }
        cells.reverse();

        if cells.len() > self.max_cells {
            let excess = cells.len() - self.max_cells;
            tracing::warn!(
                length = cells.len(),
                cap = self.max_cells,
                "Path exceeds cap, dropping earliest cells"
            );
            cells.drain(..excess);
        }
        cells
    }
}
