//! Player session worker: owns one connection from authentication to result
//!
//! ```text
//! Authenticating -> WaitingInLobby -> Playing -> AwaitingWinner -> Delivered -> Closed
//! ```
//!
//! Every way out of `Playing` (quit, disconnect, boundary exit, deadline)
//! funnels into the same teardown: stop the fog broadcaster, record the
//! score, send `E`, wait at the endgame barrier, then send `W` or `L`.

use crate::connection::{CommandReader, FrameSender};
use crate::fog::{spawn_fog_broadcaster, PlayerView};
use crate::game::MoveOutcome;
use crate::ledger::ScoreEntry;
use crate::session::SessionState;
use log::{debug, info, warn};
use maze_shared::{Command, Frame, Position};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Authenticating,
    WaitingInLobby,
    Playing,
    AwaitingWinner,
    Delivered,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    VoluntaryQuit,
    Disconnect,
    BoundaryExit,
    DeadlineExpired,
}

/// Per-worker knobs taken from the server configuration
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub fog_interval: Duration,
    /// Let the deadline cancel a pending command read
    pub interrupt_reads: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            fog_interval: Duration::from_secs(10),
            interrupt_reads: false,
        }
    }
}

/// What the worker knows about its player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    pub seat: u32,
    pub position: Position,
    pub items_collected: u32,
    pub exited: bool,
    pub finished: bool,
    pub exit_reason: Option<ExitReason>,
    pub won: bool,
}

impl PlayerRecord {
    fn new(name: String, seat: u32) -> Self {
        Self {
            name,
            seat,
            position: Position::new(0, 0),
            items_collected: 0,
            exited: false,
            finished: false,
            exit_reason: None,
            won: false,
        }
    }

    fn score(&self) -> ScoreEntry {
        ScoreEntry {
            seat: self.seat,
            name: self.name.clone(),
            items: self.items_collected,
            exited: self.exited,
        }
    }
}

pub struct PlayerWorker<R, W> {
    session: Arc<SessionState>,
    reader: CommandReader<R>,
    sender: FrameSender<W>,
    peer: IpAddr,
    settings: WorkerSettings,
    state: WorkerState,
    tag: String,
}

impl<R, W> PlayerWorker<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        session: Arc<SessionState>,
        reader: R,
        writer: W,
        peer: IpAddr,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            session,
            reader: CommandReader::new(reader),
            sender: FrameSender::new(writer),
            peer,
            settings,
            state: WorkerState::Authenticating,
            tag: format!("[?@{}]", peer),
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!("{} {:?} -> {:?}", self.tag, self.state, next);
        self.state = next;
    }

    /// Drives the connection to completion.
    ///
    /// Returns `None` when the player never got past the lobby (failed
    /// authentication or a session that had already started).
    pub async fn run(mut self) -> Option<PlayerRecord> {
        let name = match self.reader.next_message().await {
            Some(name) => name,
            None => {
                info!("{} closed during authentication", self.tag);
                self.transition(WorkerState::Closed);
                return None;
            }
        };
        self.tag = format!("[{}@{}]", name, self.peer);
        info!("{} authenticated", self.tag);

        self.transition(WorkerState::WaitingInLobby);
        let ticket = match self.session.join_lobby().await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("{} rejected: {}", self.tag, e);
                self.send_quietly(&Frame::SessionOver).await;
                self.close().await;
                return None;
            }
        };
        let mut record = PlayerRecord::new(name, ticket.seat);
        if ticket.started_deadline {
            debug!("{} filled the lobby", self.tag);
        }

        self.transition(WorkerState::Playing);
        let reason = match self.session.map().spawn_point().await {
            Some(spawn) => self.play(&mut record, spawn).await,
            None => {
                warn!("{} no free cell to spawn on", self.tag);
                ExitReason::Disconnect
            }
        };
        record.exit_reason = Some(reason);
        info!(
            "{} left play: {:?} (items {}, exited {})",
            self.tag, reason, record.items_collected, record.exited
        );

        self.session.record_score(&record.score()).await;
        self.send_quietly(&Frame::SessionOver).await;

        self.transition(WorkerState::AwaitingWinner);
        let winner = self.session.join_endgame().await;
        record.finished = true;
        record.won = winner.map_or(false, |w| w.seat == record.seat);

        let result = if record.won { Frame::Won } else { Frame::Lost };
        self.send_quietly(&result).await;
        info!(
            "{} result delivered: {}",
            self.tag,
            if record.won { "won" } else { "lost" }
        );
        self.transition(WorkerState::Delivered);

        self.close().await;
        Some(record)
    }

    /// Playing phase, bracketed by the initial view and the fog broadcaster
    async fn play(&mut self, record: &mut PlayerRecord, spawn: Position) -> ExitReason {
        let map = self.session.map();
        record.position = spawn;
        info!("{} spawned at ({}, {})", self.tag, spawn.row, spawn.col);

        let view = Arc::new(Mutex::new(PlayerView::new(spawn, map.width(), map.height())));
        if let Err(e) = self.sender.send(&map.adjacent_frame(spawn).await).await {
            debug!("{} initial view failed: {}", self.tag, e);
            return ExitReason::Disconnect;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let fog = spawn_fog_broadcaster(
            self.tag.clone(),
            Arc::clone(&self.session),
            Arc::clone(&view),
            self.sender.clone(),
            self.settings.fog_interval,
            stop_rx,
        );

        let reason = self.movement_loop(record, &view).await;

        stop_tx.send_replace(true);
        if let Err(e) = fog.await {
            warn!("{} fog broadcaster failed: {}", self.tag, e);
        }

        if reason == ExitReason::BoundaryExit {
            self.send_quietly(&Frame::ExitFound).await;
        }
        reason
    }

    async fn movement_loop(
        &mut self,
        record: &mut PlayerRecord,
        view: &Arc<Mutex<PlayerView>>,
    ) -> ExitReason {
        let mut deadline = self.session.deadline_watch();

        loop {
            if self.session.deadline_expired() {
                return ExitReason::DeadlineExpired;
            }

            let message = if self.settings.interrupt_reads {
                tokio::select! {
                    message = self.reader.next_message() => message,
                    _ = expired(&mut deadline) => return ExitReason::DeadlineExpired,
                }
            } else {
                self.reader.next_message().await
            };

            let Some(message) = message else {
                return ExitReason::Disconnect;
            };

            if self.session.deadline_expired() {
                debug!("{} late command {:?} discarded", self.tag, message);
                return ExitReason::DeadlineExpired;
            }

            match Command::parse(&message) {
                Some(Command::Quit) => return ExitReason::VoluntaryQuit,
                Some(Command::Move(direction)) => {
                    match self.session.map().apply_move(record.position, direction).await {
                        MoveOutcome::Exited => {
                            record.exited = true;
                            info!("{} found an exit", self.tag);
                            return ExitReason::BoundaryExit;
                        }
                        MoveOutcome::Moved { to, collected } => {
                            if collected {
                                record.items_collected += 1;
                                info!(
                                    "{} collected an item ({} total)",
                                    self.tag, record.items_collected
                                );
                            }
                            record.position = to;
                            view.lock().await.move_to(to);
                            debug!("{} {:?} to ({}, {})", self.tag, direction, to.row, to.col);
                        }
                        MoveOutcome::Blocked => {
                            debug!("{} {:?} blocked", self.tag, direction);
                        }
                    }
                }
                None => warn!("{} unknown command {:?}", self.tag, message),
            }

            let frame = self.session.map().adjacent_frame(record.position).await;
            if let Err(e) = self.sender.send(&frame).await {
                debug!("{} send failed: {}", self.tag, e);
                return ExitReason::Disconnect;
            }
        }
    }

    async fn send_quietly(&self, frame: &Frame) {
        if let Err(e) = self.sender.send(frame).await {
            debug!("{} could not send {:?}: {}", self.tag, frame, e);
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.sender.shutdown().await {
            debug!("{} shutdown: {}", self.tag, e);
        }
        self.transition(WorkerState::Closed);
        info!("{} connection closed", self.tag);
    }
}

async fn expired(deadline: &mut watch::Receiver<bool>) {
    let _ = deadline.wait_for(|expired| *expired).await;
}
