//! # Maze Shared Library
//!
//! Types shared by the maze server and its clients: the maze itself, the
//! per-player fog of war, the maze generator and the wire protocol.
//!
//! ## Modules
//!
//! ### Grid (`grid`)
//! The rectangular maze of walls, paths and items, positions and movement
//! directions, and the `FogMatrix` recording which cells a player has seen.
//! Rendering helpers produce the exact bytes that go on the wire.
//!
//! ### Maze (`maze`)
//! Randomized depth-first maze carving with one exit per border, plus the
//! `MapSource` trait the server uses to obtain a grid for each session.
//!
//! ### Protocol (`protocol`)
//! Client commands (`W`, `A`, `S`, `D`, `exit`) and the tagged server
//! frames: adjacent view `A`, fogged view `B`, and the single-byte
//! `M`, `E`, `W`, `L` notifications.

pub mod grid;
pub mod maze;
pub mod protocol;

pub use grid::{Cell, Direction, FogMatrix, Grid, Position, Step};
pub use maze::{FixedMap, MapSource, RandomMaze};
pub use protocol::{Command, Frame, FrameError};
