//! Maze grid, positions and the per-player fog matrix
//!
//! The grid is stored row-major. Positions use `row`/`col`; on the wire the
//! row travels as `x` and the column as `y`.

use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::VecDeque;

pub const WALL: u8 = b'#';
pub const PATH: u8 = b' ';
pub const ITEM: u8 = b'+';
/// Rendered at the viewing player's own position
pub const PLAYER: u8 = b'X';
/// Rendered for cells hidden by fog
pub const UNSEEN: u8 = b'?';

/// Kind of a single maze cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Wall,
    Path,
    Item,
}

impl Cell {
    pub fn as_byte(self) -> u8 {
        match self {
            Cell::Wall => WALL,
            Cell::Path => PATH,
            Cell::Item => ITEM,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Cell> {
        match byte {
            WALL => Some(Cell::Wall),
            PATH => Some(Cell::Path),
            ITEM => Some(Cell::Item),
            _ => None,
        }
    }

    pub fn is_walkable(self) -> bool {
        self != Cell::Wall
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// True if `other` lies in the 8-neighbourhood of `self` (or is `self`)
    pub fn is_near(&self, other: Position) -> bool {
        self.row.abs_diff(other.row) <= 1 && self.col.abs_diff(other.col) <= 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Row and column delta of one step
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

/// Result of stepping from a cell in some direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Inside(Position),
    /// The step leaves the grid through its border
    OffGrid,
}

/// Rectangular maze of cells, fixed size for its lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn filled(width: usize, height: usize, cell: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![cell; width * height],
        }
    }

    /// Builds a grid from text rows using the wire bytes (`#`, ` `, `+`).
    ///
    /// Returns None for ragged rows, unknown bytes or an empty grid.
    pub fn from_rows(rows: &[&str]) -> Option<Self> {
        let height = rows.len();
        let width = rows.first()?.len();
        if width == 0 {
            return None;
        }

        let mut cells = Vec::with_capacity(width * height);
        for row in rows {
            if row.len() != width {
                return None;
            }
            for byte in row.bytes() {
                cells.push(Cell::from_byte(byte)?);
            }
        }

        Some(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.height && pos.col < self.width
    }

    pub fn get(&self, pos: Position) -> Option<Cell> {
        if self.contains(pos) {
            Some(self.cells[pos.row * self.width + pos.col])
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: Position, cell: Cell) {
        if self.contains(pos) {
            self.cells[pos.row * self.width + pos.col] = cell;
        }
    }

    pub fn step(&self, from: Position, direction: Direction) -> Step {
        let (dr, dc) = direction.delta();
        let row = from.row as isize + dr;
        let col = from.col as isize + dc;

        if row < 0 || col < 0 || row >= self.height as isize || col >= self.width as isize {
            Step::OffGrid
        } else {
            Step::Inside(Position::new(row as usize, col as usize))
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |row| (0..self.width).map(move |col| Position::new(row, col)))
    }

    pub fn count(&self, kind: Cell) -> usize {
        self.cells.iter().filter(|cell| **cell == kind).count()
    }

    /// Picks a cell of the given kind uniformly at random
    pub fn random_cell<R: Rng + ?Sized>(&self, kind: Cell, rng: &mut R) -> Option<Position> {
        self.positions()
            .filter(|pos| self.get(*pos) == Some(kind))
            .choose(rng)
    }

    /// Renders the 3x3 window around `center`, clipped at the edges.
    ///
    /// Returns `(rows, cols, bytes)` with the bytes in row-major order.
    pub fn render_window(&self, center: Position) -> (usize, usize, Vec<u8>) {
        let first_row = center.row.saturating_sub(1);
        let last_row = (center.row + 1).min(self.height - 1);
        let first_col = center.col.saturating_sub(1);
        let last_col = (center.col + 1).min(self.width - 1);

        let mut bytes = Vec::with_capacity(9);
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                bytes.push(self.render_cell(Position::new(row, col), center));
            }
        }

        (last_row - first_row + 1, last_col - first_col + 1, bytes)
    }

    /// Renders the whole grid, hiding every cell the player has not seen
    pub fn render_fogged(&self, center: Position, fog: &FogMatrix) -> Vec<u8> {
        self.positions()
            .map(|pos| {
                if fog.is_seen(pos) || center.is_near(pos) {
                    self.render_cell(pos, center)
                } else {
                    UNSEEN
                }
            })
            .collect()
    }

    /// Text form of the full grid, one line per row
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.cells.chunks(self.width) {
            out.extend(row.iter().map(|cell| cell.as_byte() as char));
            out.push('\n');
        }
        out
    }

    fn render_cell(&self, pos: Position, center: Position) -> u8 {
        if pos == center {
            PLAYER
        } else {
            self.get(pos).map(Cell::as_byte).unwrap_or(UNSEEN)
        }
    }

    /// Checks that every walkable cell is reachable from every other one
    pub fn is_fully_connected(&self) -> bool {
        let Some(start) = self.positions().find(|pos| self.is_walkable(*pos)) else {
            return true;
        };

        let mut seen = vec![false; self.cells.len()];
        let mut queue = VecDeque::from([start]);
        seen[start.row * self.width + start.col] = true;
        let mut reached = 1;

        while let Some(pos) = queue.pop_front() {
            for direction in Direction::ALL {
                if let Step::Inside(next) = self.step(pos, direction) {
                    let index = next.row * self.width + next.col;
                    if !seen[index] && self.is_walkable(next) {
                        seen[index] = true;
                        reached += 1;
                        queue.push_back(next);
                    }
                }
            }
        }

        reached == self.cells.iter().filter(|cell| cell.is_walkable()).count()
    }

    fn is_walkable(&self, pos: Position) -> bool {
        self.get(pos).map_or(false, Cell::is_walkable)
    }
}

/// Cells a single player has observed during the current session.
///
/// Only ever grows: nothing clears a cell once it has been seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FogMatrix {
    width: usize,
    height: usize,
    seen: Vec<bool>,
}

impl FogMatrix {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            seen: vec![false; width * height],
        }
    }

    /// Marks `center` and its 8 neighbours as seen
    pub fn reveal_around(&mut self, center: Position) {
        let first_row = center.row.saturating_sub(1);
        let first_col = center.col.saturating_sub(1);
        for row in first_row..=(center.row + 1) {
            for col in first_col..=(center.col + 1) {
                if row < self.height && col < self.width {
                    self.seen[row * self.width + col] = true;
                }
            }
        }
    }

    pub fn is_seen(&self, pos: Position) -> bool {
        pos.row < self.height && pos.col < self.width && self.seen[pos.row * self.width + pos.col]
    }

    pub fn seen_count(&self) -> usize {
        self.seen.iter().filter(|seen| **seen).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_grid() -> Grid {
        Grid::from_rows(&["#####", "# + #", "#   #", "#####"]).unwrap()
    }

    #[test]
    fn test_from_rows() {
        let grid = sample_grid();
        assert_eq!(grid.width(), 5);
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.get(Position::new(0, 0)), Some(Cell::Wall));
        assert_eq!(grid.get(Position::new(1, 2)), Some(Cell::Item));
        assert_eq!(grid.get(Position::new(2, 1)), Some(Cell::Path));
        assert_eq!(grid.get(Position::new(4, 0)), None);
        assert_eq!(grid.count(Cell::Path), 5);
    }

    #[test]
    fn test_from_rows_rejects_bad_input() {
        assert!(Grid::from_rows(&[]).is_none());
        assert!(Grid::from_rows(&["###", "##"]).is_none());
        assert!(Grid::from_rows(&["#x#"]).is_none());
    }

    #[test]
    fn test_step_off_grid() {
        let grid = sample_grid();
        assert_eq!(grid.step(Position::new(0, 2), Direction::Up), Step::OffGrid);
        assert_eq!(grid.step(Position::new(3, 2), Direction::Down), Step::OffGrid);
        assert_eq!(grid.step(Position::new(2, 0), Direction::Left), Step::OffGrid);
        assert_eq!(grid.step(Position::new(2, 4), Direction::Right), Step::OffGrid);
        assert_eq!(
            grid.step(Position::new(2, 2), Direction::Up),
            Step::Inside(Position::new(1, 2))
        );
    }

    #[test]
    fn test_render_window_interior() {
        let grid = sample_grid();
        let (rows, cols, bytes) = grid.render_window(Position::new(2, 2));
        assert_eq!((rows, cols), (3, 3));
        assert_eq!(bytes, b" +  X ###".to_vec());
    }

    #[test]
    fn test_render_window_clipped_at_corner() {
        let grid = sample_grid();
        let (rows, cols, bytes) = grid.render_window(Position::new(0, 0));
        assert_eq!((rows, cols), (2, 2));
        assert_eq!(bytes, b"X## ".to_vec());
    }

    #[test]
    fn test_render_full_grid() {
        let grid = Grid::from_rows(&["# +", "  #"]).unwrap();
        assert_eq!(grid.render(), "# +\n  #\n");
    }

    #[test]
    fn test_render_fogged_hides_unseen_cells() {
        let grid = sample_grid();
        let mut fog = FogMatrix::new(5, 4);
        fog.reveal_around(Position::new(1, 1));

        let bytes = grid.render_fogged(Position::new(1, 1), &fog);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, ["###??", "#X+??", "#  ??", "?????"].concat());
    }

    #[test]
    fn test_fog_is_monotonic() {
        let mut fog = FogMatrix::new(5, 4);
        fog.reveal_around(Position::new(1, 1));
        let after_first = fog.seen_count();
        assert_eq!(after_first, 9);

        fog.reveal_around(Position::new(2, 3));
        assert!(fog.is_seen(Position::new(0, 0)));
        assert!(fog.seen_count() > after_first);
    }

    #[test]
    fn test_fog_clips_at_edges() {
        let mut fog = FogMatrix::new(3, 3);
        fog.reveal_around(Position::new(0, 0));
        assert_eq!(fog.seen_count(), 4);
        assert!(!fog.is_seen(Position::new(2, 2)));
    }

    #[test]
    fn test_random_cell_only_returns_requested_kind() {
        let grid = sample_grid();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let pos = grid.random_cell(Cell::Path, &mut rng).unwrap();
            assert_eq!(grid.get(pos), Some(Cell::Path));
        }
        assert!(Grid::filled(3, 3, Cell::Wall)
            .random_cell(Cell::Path, &mut rng)
            .is_none());
    }

    #[test]
    fn test_connectivity() {
        assert!(sample_grid().is_fully_connected());
        let split = Grid::from_rows(&["#####", "# # #", "#####"]).unwrap();
        assert!(!split.is_fully_connected());
    }
}
