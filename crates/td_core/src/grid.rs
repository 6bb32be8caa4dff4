//! Tile grid and procedural path generation.
//!
//! The map is a `width x height` grid of unit cells. Cell `(x, y)` covers the
//! world square `[x, x+1) x [y, y+1)` and its centre is `(x + 0.5, y + 0.5)`.
//! Enemies walk the centres of the path cells, from the west edge to the
//! east edge.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::MapConfig;
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::noise::PerlinNoise;
use crate::pathfinding::PathFinder;

/// Classification of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    /// Buildable terrain.
    #[default]
    Ground,
    /// Part of the enemy path.
    Path,
    /// Impassable hill; blocks line of sight.
    Obstacle,
    /// Ground occupied by a defender.
    Tower,
}

impl Tile {
    /// Character used by [`GameMap::render_ascii`].
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Ground => '.',
            Self::Path => '#',
            Self::Obstacle => '^',
            Self::Tower => 'T',
        }
    }
}

/// Integer cell coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridPos {
    /// Column, growing east.
    pub x: u32,
    /// Row, growing north.
    pub y: u32,
}

impl GridPos {
    /// Create a cell coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two cells.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Dense row-major tile storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Create a grid filled with [`Tile::Ground`].
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "TileGrid width must be positive");
        assert!(height > 0, "TileGrid height must be positive");

        Self {
            width,
            height,
            tiles: vec![Tile::Ground; width as usize * height as usize],
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major index of a cell. Caller checks bounds.
    #[inline]
    #[must_use]
    pub fn index(&self, pos: GridPos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    /// Cell at a row-major index.
    #[must_use]
    pub fn pos_of(&self, index: usize) -> GridPos {
        let width = self.width as usize;
        GridPos::new((index % width) as u32, (index / width) as u32)
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether the grid has no cells. Always false for a constructed grid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Whether a cell lies inside the grid.
    #[must_use]
    pub const fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Tile at a cell, or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, pos: GridPos) -> Option<Tile> {
        self.in_bounds(pos).then(|| self.tiles[self.index(pos)])
    }

    /// Overwrite a tile. Returns `false` when out of bounds.
    pub fn set(&mut self, pos: GridPos, tile: Tile) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        let index = self.index(pos);
        self.tiles[index] = tile;
        true
    }

    /// Number of cells holding `tile`.
    #[must_use]
    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }

    /// In-bounds 4-neighbours in the order +x, -x, +y, -y.
    pub fn neighbours(&self, pos: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        let candidates = [
            pos.x.checked_add(1).map(|x| GridPos::new(x, pos.y)),
            pos.x.checked_sub(1).map(|x| GridPos::new(x, pos.y)),
            pos.y.checked_add(1).map(|y| GridPos::new(pos.x, y)),
            pos.y.checked_sub(1).map(|y| GridPos::new(pos.x, y)),
        ];
        candidates
            .into_iter()
            .flatten()
            .filter(move |p| self.in_bounds(*p))
    }

    /// World position of a cell centre.
    #[must_use]
    pub fn cell_center(pos: GridPos) -> Vec2Fixed {
        let half = Fixed::from_num(0.5);
        Vec2Fixed::new(Fixed::from_num(pos.x) + half, Fixed::from_num(pos.y) + half)
    }

    /// Cell containing a world point, or `None` outside the grid.
    #[must_use]
    pub fn cell_at(&self, point: Vec2Fixed) -> Option<GridPos> {
        if point.x < Fixed::ZERO || point.y < Fixed::ZERO {
            return None;
        }
        let pos = GridPos::new(point.x.to_num::<u32>(), point.y.to_num::<u32>());
        self.in_bounds(pos).then_some(pos)
    }

    /// Whether the world point lies on an obstacle.
    ///
    /// Points outside the grid do not block.
    #[must_use]
    pub fn blocks_sight(&self, point: Vec2Fixed) -> bool {
        self.cell_at(point)
            .and_then(|pos| self.get(pos))
            .is_some_and(|tile| tile == Tile::Obstacle)
    }
}

/// A maximal straight run of the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSection {
    /// World position of the first cell centre.
    pub start: Vec2Fixed,
    /// World position of the last cell centre.
    pub end: Vec2Fixed,
    /// Path distance at `start`.
    #[serde(with = "fixed_serde")]
    pub start_distance: Fixed,
    /// Length of the section.
    #[serde(with = "fixed_serde")]
    pub length: Fixed,
    /// Cells covered, in path order. Junction cells are shared with neighbours.
    pub cells: Vec<GridPos>,
}

impl PathSection {
    /// Path distance at `end`.
    #[must_use]
    pub fn end_distance(&self) -> Fixed {
        self.start_distance + self.length
    }

    /// Point `offset` units along the section, clamped to its ends.
    #[must_use]
    pub fn point_at(&self, offset: Fixed) -> Vec2Fixed {
        if self.length == Fixed::ZERO {
            return self.start;
        }
        let t = (offset / self.length).clamp(Fixed::ZERO, Fixed::ONE);
        self.start.lerp(self.end, t)
    }
}

/// A generated map: terrain, path cells, waypoints and straight sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMap {
    grid: TileGrid,
    cells: Vec<GridPos>,
    waypoints: Vec<Vec2Fixed>,
    sections: Vec<PathSection>,
    attempts: u32,
}

impl GameMap {
    /// Generate a map, retrying candidates until one satisfies the length band.
    ///
    /// # Errors
    ///
    /// [`GameError::ConfigParse`] when the map settings are unusable,
    /// [`GameError::MapGenerationFailed`] when `max_attempts` candidates fail.
    pub fn generate(config: &MapConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let noise = PerlinNoise::new(&mut rng);

        for attempt in 1..=config.max_attempts {
            let grid = generate_terrain(config, &noise, &mut rng);
            let waypoints = road_points(config, &mut rng);

            match carve_path(grid, &waypoints, config) {
                Ok((grid, cells)) => {
                    tracing::info!(
                        attempt,
                        path_cells = cells.len(),
                        obstacles = grid.count(Tile::Obstacle),
                        "Map generated"
                    );
                    return Ok(Self::from_cells(grid, cells, attempt));
                }
                Err(reason) => {
                    tracing::trace!(attempt, %reason, "Map candidate rejected");
                }
            }
        }

        Err(GameError::MapGenerationFailed {
            attempts: config.max_attempts,
        })
    }

    /// Build a map from an explicit grid and path, marking the path cells.
    ///
    /// Consecutive cells must be 4-adjacent.
    pub fn from_path(mut grid: TileGrid, cells: Vec<GridPos>) -> Result<Self> {
        if cells.is_empty() {
            return Err(GameError::InvalidState("Path must not be empty".into()));
        }
        for pair in cells.windows(2) {
            if pair[0].manhattan(pair[1]) != 1 {
                return Err(GameError::InvalidState(format!(
                    "Path cells {} and {} are not adjacent",
                    pair[0], pair[1]
                )));
            }
        }
        for &cell in &cells {
            if !grid.set(cell, Tile::Path) {
                return Err(GameError::OutOfBounds(cell));
            }
        }
        Ok(Self::from_cells(grid, cells, 0))
    }

    fn from_cells(grid: TileGrid, cells: Vec<GridPos>, attempts: u32) -> Self {
        let waypoints: Vec<Vec2Fixed> = cells.iter().map(|c| TileGrid::cell_center(*c)).collect();
        let sections = build_sections(&cells, &waypoints);
        Self {
            grid,
            cells,
            waypoints,
            sections,
            attempts,
        }
    }

    /// The tile grid.
    #[must_use]
    pub const fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Path cells from entry to exit.
    #[must_use]
    pub fn path_cells(&self) -> &[GridPos] {
        &self.cells
    }

    /// World waypoints (cell centres) from entry to exit.
    #[must_use]
    pub fn waypoints(&self) -> &[Vec2Fixed] {
        &self.waypoints
    }

    /// Straight path sections in path order.
    #[must_use]
    pub fn sections(&self) -> &[PathSection] {
        &self.sections
    }

    /// Candidates tried before this map was accepted (0 for explicit maps).
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total walking distance from entry to exit.
    #[must_use]
    pub fn path_length(&self) -> Fixed {
        self.sections
            .last()
            .map_or(Fixed::ZERO, PathSection::end_distance)
    }

    /// Mark a ground cell as occupied by a defender.
    ///
    /// # Errors
    ///
    /// [`GameError::OutOfBounds`] or [`GameError::TileOccupied`]; the grid is
    /// untouched on error.
    pub fn place_defender(&mut self, cell: GridPos) -> Result<()> {
        match self.grid.get(cell) {
            None => Err(GameError::OutOfBounds(cell)),
            Some(Tile::Ground) => {
                self.grid.set(cell, Tile::Tower);
                Ok(())
            }
            Some(_) => Err(GameError::TileOccupied(cell)),
        }
    }

    /// Return a defender's cell to ground.
    pub fn clear_defender(&mut self, cell: GridPos) -> Result<()> {
        match self.grid.get(cell) {
            None => Err(GameError::OutOfBounds(cell)),
            Some(Tile::Tower) => {
                self.grid.set(cell, Tile::Ground);
                Ok(())
            }
            Some(other) => Err(GameError::InvalidState(format!(
                "Cell {cell} holds {other:?}, not a defender"
            ))),
        }
    }

    /// Render the map as text, north row first.
    #[must_use]
    pub fn render_ascii(&self) -> String {
        let width = self.grid.width();
        let height = self.grid.height();
        let entry = self.cells.first().copied();
        let exit = self.cells.last().copied();

        let mut out = String::with_capacity(((width + 1) * height) as usize);
        for y in (0..height).rev() {
            for x in 0..width {
                let pos = GridPos::new(x, y);
                let glyph = if Some(pos) == entry {
                    'S'
                } else if Some(pos) == exit {
                    'E'
                } else {
                    self.grid.get(pos).map_or(' ', Tile::glyph)
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}

fn generate_terrain(config: &MapConfig, noise: &PerlinNoise, rng: &mut ChaCha8Rng) -> TileGrid {
    let mut grid = TileGrid::new(config.width, config.height);
    let offset = f64::from(rng.gen_range(5_u32..573_121));

    for x in 0..config.width {
        for y in 0..config.height {
            let height = noise.sample(
                offset + f64::from(x) * config.noise_scale,
                offset + f64::from(y) * config.noise_scale,
            );
            if height > config.obstacle_threshold {
                grid.set(GridPos::new(x, y), Tile::Obstacle);
            }
        }
    }
    grid
}

/// Entry on the west edge, exit on the east edge, interior points inside the padding.
fn road_points(config: &MapConfig, rng: &mut ChaCha8Rng) -> Vec<GridPos> {
    let entry = GridPos::new(0, rng.gen_range(0..config.height));
    let exit = GridPos::new(config.width - 1, rng.gen_range(0..config.height));

    let mut points = Vec::with_capacity(config.road_points as usize + 2);
    points.push(entry);
    for _ in 0..config.road_points {
        points.push(GridPos::new(
            rng.gen_range(config.padding..config.width - config.padding),
            rng.gen_range(config.padding..config.height - config.padding),
        ));
    }
    points.push(exit);
    points
}

fn carve_path(
    mut grid: TileGrid,
    points: &[GridPos],
    config: &MapConfig,
) -> Result<(TileGrid, Vec<GridPos>)> {
    let mut finder = PathFinder::new(config.max_segment_cells);
    let mut cells: Vec<GridPos> = Vec::new();

    for (i, pair) in points.windows(2).enumerate() {
        let mut segment = finder.find(&grid, pair[0], pair[1])?;
        if i > 0 && !segment.is_empty() {
            segment.remove(0);
        }
        for &cell in &segment {
            grid.set(cell, Tile::Path);
        }
        cells.extend(segment);
    }

    if cells.len() < config.min_path_length || cells.len() > config.max_path_length {
        return Err(GameError::InvalidState(format!(
            "Path length {} outside [{}, {}]",
            cells.len(),
            config.min_path_length,
            config.max_path_length
        )));
    }
    Ok((grid, cells))
}

fn step(a: GridPos, b: GridPos) -> (i64, i64) {
    (
        i64::from(b.x) - i64::from(a.x),
        i64::from(b.y) - i64::from(a.y),
    )
}

fn build_sections(cells: &[GridPos], waypoints: &[Vec2Fixed]) -> Vec<PathSection> {
    let mut cumulative = Vec::with_capacity(waypoints.len());
    let mut total = Fixed::ZERO;
    for (i, point) in waypoints.iter().enumerate() {
        // Cells are 4-adjacent, so each step is exactly one unit.
        if i > 0 {
            total += waypoints[i - 1].manhattan_distance(*point);
        }
        cumulative.push(total);
    }

    let make = |from: usize, to: usize| PathSection {
        start: waypoints[from],
        end: waypoints[to],
        start_distance: cumulative[from],
        length: cumulative[to] - cumulative[from],
        cells: cells[from..=to].to_vec(),
    };

    if cells.len() < 2 {
        return cells.first().map(|_| make(0, 0)).into_iter().collect();
    }

    let mut sections = Vec::new();
    let mut origin = 0;
    let mut direction = step(cells[0], cells[1]);
    for i in 1..cells.len() - 1 {
        let next = step(cells[i], cells[i + 1]);
        if next != direction {
            sections.push(make(origin, i));
            origin = i;
            direction = next;
        }
    }
    sections.push(make(origin, cells.len() - 1));
    sections
}
