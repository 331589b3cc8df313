//! Maze Generation
//!
//! Perfect mazes carved with a recursive backtracker, plus the spawn and
//! wall queries the session needs every tick.
//!
//! Cells with two odd coordinates are "rooms"; the carver knocks out the
//! wall cell between two rooms, so both dimensions must be odd.

use std::collections::VecDeque;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;

/// Side length of one maze cell in pixels.
pub const TILE_SIZE: f32 = 40.0;

/// Smallest maze dimension a mode may request.
pub const MIN_MAZE_DIMENSION: usize = 5;

/// Largest maze dimension a mode may request. Odd, so normalization
/// never pushes a clamped size past it.
pub const MAX_MAZE_DIMENSION: usize = 199;

/// Uniform samples tried before falling back to a scan.
const SPAWN_SAMPLE_ATTEMPTS: usize = 100;

/// Attempts at finding a spawn cell clear of the goal.
const SAFE_SPAWN_ATTEMPTS: usize = 16;

/// Room offsets two cells away: up, right, down, left.
const ROOM_STEPS: [(isize, isize); 4] = [(0, -2), (2, 0), (0, 2), (-2, 0)];

/// A single maze cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Cell {
    /// Walkable floor.
    Empty = 0,
    /// Solid wall.
    Wall = 1,
}

/// Row-major maze grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl MazeGrid {
    /// Create a grid where every cell is a wall.
    pub fn filled(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Wall; width * height],
        }
    }

    /// Build a grid from text rows: `#` is a wall, anything else is empty.
    ///
    /// Rows shorter than the first one are padded with walls.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        let mut grid = Self::filled(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().take(width).enumerate() {
                if ch != '#' {
                    grid.set(x, y, Cell::Empty);
                }
            }
        }
        grid
    }

    /// Grid width in cells.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell at (x, y), or None if out of bounds.
    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    /// Is (x, y) an in-bounds empty cell?
    #[inline]
    pub fn is_empty_cell(&self, x: usize, y: usize) -> bool {
        self.cell(x, y) == Some(Cell::Empty)
    }

    /// Overwrite a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    /// Pixel centre of a cell.
    #[inline]
    pub fn cell_center(x: usize, y: usize) -> Vec2 {
        Vec2::new(
            x as f32 * TILE_SIZE + TILE_SIZE / 2.0,
            y as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        )
    }

    /// Cell containing a pixel position, if inside the grid.
    pub fn cell_at(&self, pos: Vec2) -> Option<(usize, usize)> {
        if pos.x < 0.0 || pos.y < 0.0 {
            return None;
        }
        let x = (pos.x / TILE_SIZE) as usize;
        let y = (pos.y / TILE_SIZE) as usize;
        if x < self.width && y < self.height {
            Some((x, y))
        } else {
            None
        }
    }

    /// Is the pixel position inside a wall? Outside the grid counts as wall.
    pub fn is_wall_at_pixel(&self, pos: Vec2) -> bool {
        match self.cell_at(pos) {
            Some((x, y)) => !self.is_empty_cell(x, y),
            None => true,
        }
    }

    /// Can a circle of `radius` sit at `center` without touching a wall?
    ///
    /// Tests the corners of the bounding square, which is exact for radii
    /// below half a tile.
    pub fn is_circle_clear(&self, center: Vec2, radius: f32) -> bool {
        let r = radius.min(TILE_SIZE / 2.0 - 0.01);
        [(-r, -r), (r, -r), (-r, r), (r, r)]
            .iter()
            .all(|(dx, dy)| !self.is_wall_at_pixel(Vec2::new(center.x + dx, center.y + dy)))
    }

    /// Iterate over the coordinates of every empty cell, row-major.
    pub fn empty_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Cell::Empty)
            .map(move |(i, _)| (i % self.width, i / self.width))
    }

    /// Number of empty cells.
    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| **c == Cell::Empty).count()
    }

    /// Breadth-first check that every empty cell reaches every other.
    ///
    /// A grid with no empty cells is not considered connected.
    pub fn is_fully_connected(&self) -> bool {
        let Some(start) = self.empty_cells().next() else {
            return false;
        };

        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        visited[start.1 * self.width + start.0] = true;
        queue.push_back(start);
        let mut reached = 1;

        while let Some((x, y)) = queue.pop_front() {
            for (nx, ny) in self.orthogonal_neighbours(x, y) {
                let idx = ny * self.width + nx;
                if !visited[idx] && self.cells[idx] == Cell::Empty {
                    visited[idx] = true;
                    reached += 1;
                    queue.push_back((nx, ny));
                }
            }
        }

        reached == self.empty_count()
    }

    /// Row-major bytes for the wire: 1 = wall, 0 = empty.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.cells.iter().map(|c| *c as u8).collect()
    }

    fn orthogonal_neighbours(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let (w, h) = (self.width, self.height);
        [(0isize, -1isize), (1, 0), (0, 1), (-1, 0)]
            .into_iter()
            .filter_map(move |(dx, dy)| {
                let nx = x.checked_add_signed(dx)?;
                let ny = y.checked_add_signed(dy)?;
                (nx < w && ny < h).then_some((nx, ny))
            })
    }
}

/// Round a requested dimension up to the odd size the carver needs.
///
/// Even values grow by one; anything below 3 becomes 3 so (1, 1) is a room.
#[inline]
pub fn normalize_dimension(requested: usize) -> usize {
    let n = requested.max(3);
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Generate a perfect maze.
///
/// Both dimensions are normalized with [`normalize_dimension`]. The result
/// has exactly one path between any two empty cells.
pub fn generate(width: usize, height: usize, rng: &mut DeterministicRng) -> MazeGrid {
    let width = normalize_dimension(width);
    let height = normalize_dimension(height);
    let mut grid = MazeGrid::filled(width, height);

    let mut stack: Vec<(usize, usize)> = vec![(1, 1)];
    grid.set(1, 1, Cell::Empty);

    let mut candidates: Vec<(usize, usize)> = Vec::with_capacity(4);
    while let Some(&(x, y)) = stack.last() {
        candidates.clear();
        for (dx, dy) in ROOM_STEPS {
            let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
                continue;
            };
            // Rooms stay strictly inside the outer wall
            if nx >= 1 && nx <= width - 2 && ny >= 1 && ny <= height - 2
                && grid.cell(nx, ny) == Some(Cell::Wall)
            {
                candidates.push((nx, ny));
            }
        }

        match rng.choose(&candidates).copied() {
            Some((nx, ny)) => {
                grid.set((x + nx) / 2, (y + ny) / 2, Cell::Empty);
                grid.set(nx, ny, Cell::Empty);
                stack.push((nx, ny));
            }
            None => {
                stack.pop();
            }
        }
    }

    grid
}

/// Pick a random empty cell and return its pixel centre.
///
/// Tries uniform samples first and falls back to a row-major scan, so it
/// terminates on sparse grids. Returns None only if no cell is empty.
pub fn random_empty_position(grid: &MazeGrid, rng: &mut DeterministicRng) -> Option<Vec2> {
    if grid.width() == 0 || grid.height() == 0 {
        return None;
    }

    for _ in 0..SPAWN_SAMPLE_ATTEMPTS {
        let x = rng.next_index(grid.width());
        let y = rng.next_index(grid.height());
        if grid.is_empty_cell(x, y) {
            return Some(MazeGrid::cell_center(x, y));
        }
    }

    grid.empty_cells()
        .next()
        .map(|(x, y)| MazeGrid::cell_center(x, y))
}

/// Pick a spawn point outside the cell that contains `avoid` and at least
/// `clearance` pixels from it.
///
/// When no empty cell qualifies, the cell farthest from `avoid` is used.
pub fn safe_spawn_position(
    grid: &MazeGrid,
    avoid: Option<Vec2>,
    clearance: f32,
    rng: &mut DeterministicRng,
) -> Option<Vec2> {
    let Some(avoid) = avoid else {
        return random_empty_position(grid, rng);
    };
    let avoid_cell = grid.cell_at(avoid);
    let is_clear = |pos: Vec2| grid.cell_at(pos) != avoid_cell && pos.distance(avoid) >= clearance;

    for _ in 0..SAFE_SPAWN_ATTEMPTS {
        let pos = random_empty_position(grid, rng)?;
        if is_clear(pos) {
            return Some(pos);
        }
    }

    let centres = || grid.empty_cells().map(|(x, y)| MazeGrid::cell_center(x, y));
    centres()
        .find(|pos| is_clear(*pos))
        .or_else(|| centres().max_by(|a, b| a.distance(avoid).total_cmp(&b.distance(avoid))))
}

// =============================================================================
// TESTS
// =============================================================================
