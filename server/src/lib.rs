//! # Maze Session Server Library
//!
//! Runs sequential multiplayer maze sessions over TCP. A fixed number of
//! players join a lobby, race through one shared procedurally generated maze
//! collecting items before a shared deadline, and a single winner is
//! resolved from everyone's outcome before the next session begins.
//!
//! ## Session Lifecycle
//!
//! ### Lobby
//! Each connection first sends a display name. Authenticated players wait at
//! the lobby barrier until the configured number of players has registered.
//! The join that fills the lobby starts the game and launches the deadline
//! timer, exactly once per session. Connections that arrive after that point
//! receive `E` and are closed.
//!
//! ### Play
//! Players move with `W`/`A`/`S`/`D` and leave with `exit`. Every move is one
//! atomic read-modify-write of the shared grid: an item is collected by
//! exactly one player and turns into a path. Stepping off the grid border is
//! finding the exit. After every other command the player receives the 3x3
//! window around them, and a per-player fog broadcaster periodically sends
//! the whole map with unvisited cells masked.
//!
//! ### Endgame
//! However play ends (quit, disconnect, exit found, deadline), the worker
//! writes one score line, sends `E` and waits at the endgame barrier. The
//! last player to arrive ranks the ledger and publishes the winner to every
//! waiter, who then receive `W` or `L`. The supervisor is notified, clears
//! the ledger, regenerates the maze and starts over.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Shared map state behind a read-write lock; moves, item pickup and views.
//!
//! ### Ledger Module (`ledger`)
//! Append-only score file and the ranking rule:
//! - Exited players outrank everyone who did not exit
//! - More items wins among equals
//! - Earliest registration breaks remaining ties
//!
//! ### Session Module (`session`)
//! Lobby barrier, deadline timer and endgame barrier for one session.
//!
//! ### Player Module (`player`)
//! The per-connection worker state machine.
//!
//! ### Fog Module (`fog`)
//! Periodic fogged map updates, sharing the worker's send lock.
//!
//! ### Connection Module (`connection`)
//! Message splitting on the read half and serialized frame writes.
//!
//! ### Network Module (`network`)
//! Configuration, the accept loop and session supervision.
//!
//! ## Known Limitations
//!
//! A player who disconnects before the lobby fills never joins, so the lobby
//! waits until enough other players arrive. By default the deadline is only
//! noticed when a player sends something or disconnects; `interrupt_reads`
//! makes the deadline cancel a pending read instead.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use maze_server::network::{Server, ServerConfig};
//! use maze_shared::RandomMaze;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         addr: "127.0.0.1:8080".to_string(),
//!         expected_players: 3,
//!         deadline: Duration::from_secs(60),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::new(config, Box::new(RandomMaze::new())).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod fog;
pub mod game;
pub mod ledger;
pub mod network;
pub mod player;
pub mod session;
