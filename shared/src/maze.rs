//! Procedural maze generation
//!
//! Mazes are carved by a randomized depth-first walk over the odd lattice of
//! the grid, starting from the centre. The border is never carved by the walk;
//! afterwards one exit is opened on each side next to a carved corridor, so
//! every exit leads into the same connected maze.

use crate::grid::{Cell, Grid, Position};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const MIN_WIDTH: usize = 40;
pub const MAX_WIDTH: usize = 50;
pub const MIN_HEIGHT: usize = 10;
pub const MAX_HEIGHT: usize = 15;
/// One carved cell in `ITEM_RATE` holds an item
pub const ITEM_RATE: u32 = 10;

/// Supplies a fresh grid for every session
pub trait MapSource: Send {
    fn next_map(&mut self) -> Grid;
}

/// Random mazes with dimensions drawn from the configured ranges
pub struct RandomMaze {
    rng: StdRng,
}

impl RandomMaze {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomMaze {
    fn default() -> Self {
        Self::new()
    }
}

impl MapSource for RandomMaze {
    fn next_map(&mut self) -> Grid {
        generate(&mut self.rng)
    }
}

/// Hands out copies of one fixed grid
pub struct FixedMap(pub Grid);

impl MapSource for FixedMap {
    fn next_map(&mut self) -> Grid {
        self.0.clone()
    }
}

/// Generates a maze with random odd dimensions
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Grid {
    let width = rng.gen_range(MIN_WIDTH..=MAX_WIDTH) | 1;
    let height = rng.gen_range(MIN_HEIGHT..=MAX_HEIGHT) | 1;
    generate_with_size(rng, width, height)
}

/// Generates a maze of the given size.
///
/// Sizes are rounded up to odd values of at least 5 so the lattice walk
/// leaves a solid border.
pub fn generate_with_size<R: Rng + ?Sized>(rng: &mut R, width: usize, height: usize) -> Grid {
    let width = width.max(5) | 1;
    let height = height.max(5) | 1;

    let mut grid = Grid::filled(width, height, Cell::Wall);
    carve(&mut grid, rng);
    open_exits(&mut grid, rng);
    grid
}

fn is_interior(grid: &Grid, row: isize, col: isize) -> bool {
    row > 0 && col > 0 && row < grid.height() as isize - 1 && col < grid.width() as isize - 1
}

fn carve<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) {
    const JUMPS: [(isize, isize); 4] = [(-2, 0), (2, 0), (0, -2), (0, 2)];

    let width = grid.width();
    let mut visited = vec![false; width * grid.height()];
    let start = Position::new(grid.height() / 2 | 1, width / 2 | 1);

    let open_cell = |grid: &mut Grid, pos: Position, rng: &mut R| {
        let cell = if rng.gen_ratio(1, ITEM_RATE) {
            Cell::Item
        } else {
            Cell::Path
        };
        grid.set(pos, cell);
    };

    visited[start.row * width + start.col] = true;
    open_cell(grid, start, rng);

    let mut order = JUMPS;
    order.shuffle(rng);
    let mut stack = vec![(start, order, 0usize)];

    while let Some((pos, order, next)) = stack.last_mut() {
        if *next == order.len() {
            stack.pop();
            continue;
        }

        let (dr, dc) = order[*next];
        *next += 1;

        let row = pos.row as isize + dr;
        let col = pos.col as isize + dc;
        if !is_interior(grid, row, col) {
            continue;
        }

        let target = Position::new(row as usize, col as usize);
        if visited[target.row * width + target.col] {
            continue;
        }

        let between = Position::new(
            (pos.row as isize + dr / 2) as usize,
            (pos.col as isize + dc / 2) as usize,
        );
        grid.set(between, Cell::Path);

        visited[target.row * width + target.col] = true;
        open_cell(grid, target, rng);

        let mut order = JUMPS;
        order.shuffle(rng);
        stack.push((target, order, 0));
    }
}

fn open_exits<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) {
    let (width, height) = (grid.width(), grid.height());
    let walkable = |grid: &Grid, row: usize, col: usize| {
        grid.get(Position::new(row, col))
            .map_or(false, Cell::is_walkable)
    };

    // (border cell, interior neighbour) pairs for each side
    let sides: [Vec<(Position, Position)>; 4] = [
        (1..height - 1)
            .map(|row| (Position::new(row, 0), Position::new(row, 1)))
            .collect(),
        (1..height - 1)
            .map(|row| (Position::new(row, width - 1), Position::new(row, width - 2)))
            .collect(),
        (1..width - 1)
            .map(|col| (Position::new(0, col), Position::new(1, col)))
            .collect(),
        (1..width - 1)
            .map(|col| (Position::new(height - 1, col), Position::new(height - 2, col)))
            .collect(),
    ];

    for side in sides {
        let candidates: Vec<Position> = side
            .into_iter()
            .filter(|(_, inner)| walkable(grid, inner.row, inner.col))
            .map(|(border, _)| border)
            .collect();

        if let Some(exit) = candidates.choose(rng) {
            grid.set(*exit, Cell::Path);
        }
    }
}
