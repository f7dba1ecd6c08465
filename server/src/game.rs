//! Shared maze state for one session
//!
//! Every move is a single read-modify-write under the grid's write lock.
//! View rendering only takes the read lock long enough to copy the cells it
//! needs; nothing here holds a lock across a network send.

use log::debug;
use maze_shared::{Cell, Direction, FogMatrix, Frame, Grid, Position, Step};
use tokio::sync::RwLock;

/// What a single move did to the mover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move crossed the grid border: the player found an exit
    Exited,
    Moved { to: Position, collected: bool },
    /// Destination is a wall; the player stays put
    Blocked,
}

pub struct MapState {
    width: usize,
    height: usize,
    grid: RwLock<Grid>,
}

impl MapState {
    pub fn new(grid: Grid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            grid: RwLock::new(grid),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Picks a random path cell to place a player on
    pub async fn spawn_point(&self) -> Option<Position> {
        let grid = self.grid.read().await;
        grid.random_cell(Cell::Path, &mut rand::thread_rng())
    }

    /// Applies one move from `from` in `direction`.
    ///
    /// Reading the destination and converting a collected item back to a
    /// path happen under one write lock, so two players racing for the same
    /// item can never both collect it.
    pub async fn apply_move(&self, from: Position, direction: Direction) -> MoveOutcome {
        let mut grid = self.grid.write().await;

        let to = match grid.step(from, direction) {
            Step::OffGrid => return MoveOutcome::Exited,
            Step::Inside(to) => to,
        };

        match grid.get(to) {
            Some(Cell::Path) => MoveOutcome::Moved {
                to,
                collected: false,
            },
            Some(Cell::Item) => {
                grid.set(to, Cell::Path);
                debug!("Item at ({}, {}) collected", to.row, to.col);
                MoveOutcome::Moved {
                    to,
                    collected: true,
                }
            }
            Some(Cell::Wall) | None => MoveOutcome::Blocked,
        }
    }

    pub async fn cell(&self, pos: Position) -> Option<Cell> {
        self.grid.read().await.get(pos)
    }

    pub async fn adjacent_frame(&self, position: Position) -> Frame {
        let grid = self.grid.read().await;
        Frame::adjacent(&grid, position)
    }

    pub async fn fogged_frame(&self, position: Position, fog: &FogMatrix) -> Frame {
        let grid = self.grid.read().await;
        Frame::fogged(&grid, position, fog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn item_corridor() -> Grid {
        Grid::from_rows(&["#####", "# + #", "#####"]).unwrap()
    }

    #[tokio::test]
    async fn test_collect_item_turns_cell_into_path() {
        let map = MapState::new(item_corridor());
        let outcome = map.apply_move(Position::new(1, 1), Direction::Right).await;

        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                to: Position::new(1, 2),
                collected: true
            }
        );
        assert_eq!(map.cell(Position::new(1, 2)).await, Some(Cell::Path));

        // Walking back over the same cell collects nothing
        map.apply_move(Position::new(1, 2), Direction::Right).await;
        let again = map.apply_move(Position::new(1, 3), Direction::Left).await;
        assert_eq!(
            again,
            MoveOutcome::Moved {
                to: Position::new(1, 2),
                collected: false
            }
        );
    }

    #[tokio::test]
    async fn test_wall_blocks_move() {
        let map = MapState::new(item_corridor());
        let outcome = map.apply_move(Position::new(1, 1), Direction::Up).await;
        assert_eq!(outcome, MoveOutcome::Blocked);
    }

    #[tokio::test]
    async fn test_step_off_border_is_exit() {
        let map = MapState::new(Grid::from_rows(&["   ", "   "]).unwrap());
        assert_eq!(
            map.apply_move(Position::new(0, 1), Direction::Up).await,
            MoveOutcome::Exited
        );
        assert_eq!(
            map.apply_move(Position::new(1, 2), Direction::Right).await,
            MoveOutcome::Exited
        );
        assert_eq!(
            map.apply_move(Position::new(1, 0), Direction::Left).await,
            MoveOutcome::Exited
        );
        assert_eq!(
            map.apply_move(Position::new(1, 1), Direction::Down).await,
            MoveOutcome::Exited
        );
    }

    #[tokio::test]
    async fn test_racing_players_collect_item_once() {
        let map = Arc::new(MapState::new(
            Grid::from_rows(&["#####", "# + #", "#####"]).unwrap(),
        ));

        let left = {
            let map = Arc::clone(&map);
            tokio::spawn(async move { map.apply_move(Position::new(1, 1), Direction::Right).await })
        };
        let right = {
            let map = Arc::clone(&map);
            tokio::spawn(async move { map.apply_move(Position::new(1, 3), Direction::Left).await })
        };

        let outcomes = [left.await.unwrap(), right.await.unwrap()];
        let collected = outcomes
            .iter()
            .filter(|o| matches!(o, MoveOutcome::Moved { collected: true, .. }))
            .count();
        assert_eq!(collected, 1);
        assert_eq!(map.cell(Position::new(1, 2)).await, Some(Cell::Path));
    }

    #[tokio::test]
    async fn test_spawn_point_is_path() {
        let map = MapState::new(item_corridor());
        for _ in 0..20 {
            let spawn = map.spawn_point().await.unwrap();
            assert_eq!(map.cell(spawn).await, Some(Cell::Path));
        }
        assert_eq!((map.width(), map.height()), (5, 3));
    }

    #[tokio::test]
    async fn test_adjacent_frame_marks_player() {
        let map = MapState::new(item_corridor());
        match map.adjacent_frame(Position::new(1, 1)).await {
            Frame::Adjacent { rows, cols, cells, .. } => {
                assert_eq!((rows, cols), (3, 3));
                assert_eq!(cells, b"####X+###".to_vec());
            }
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}
