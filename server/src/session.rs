//! Per-session coordination: lobby barrier, deadline timer and the endgame
//! barrier that resolves the winner.
//!
//! A fresh `SessionState` is built by the supervisor for every game and
//! handed to each worker behind an `Arc`. Counters live under one async
//! mutex; the three one-way transitions of a session (game started, deadline
//! reached, winner resolved) are published through `watch` channels so late
//! subscribers still observe the final value.

use crate::game::MapState;
use crate::ledger::{self, ScoreEntry, ScoreLedger};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("session {0} already started")]
    AlreadyStarted(u64),
    #[error("session {0} was torn down before the lobby filled")]
    Closed(u64),
}

/// Result of passing the lobby barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyTicket {
    /// Registration order, 1-based
    pub seat: u32,
    /// True for the one worker whose join filled the lobby
    pub started_deadline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endgame {
    Pending,
    Resolved(Option<ScoreEntry>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub ready_count: usize,
    pub game_started: bool,
    pub finished_count: usize,
}

/// Sent to the supervisor once the winner has been published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: u64,
    pub players: usize,
    pub winner: Option<ScoreEntry>,
}

pub struct SessionState {
    id: u64,
    expected_players: usize,
    deadline: Duration,
    counters: Mutex<SessionCounters>,
    started_tx: watch::Sender<bool>,
    deadline_tx: watch::Sender<bool>,
    endgame_tx: watch::Sender<Endgame>,
    map: MapState,
    ledger: Arc<ScoreLedger>,
    done_tx: mpsc::UnboundedSender<SessionSummary>,
}

impl SessionState {
    pub fn new(
        id: u64,
        expected_players: usize,
        deadline: Duration,
        map: MapState,
        ledger: Arc<ScoreLedger>,
        done_tx: mpsc::UnboundedSender<SessionSummary>,
    ) -> Arc<Self> {
        let (started_tx, _) = watch::channel(false);
        let (deadline_tx, _) = watch::channel(false);
        let (endgame_tx, _) = watch::channel(Endgame::Pending);

        Arc::new(Self {
            id,
            expected_players: expected_players.max(1),
            deadline,
            counters: Mutex::new(SessionCounters::default()),
            started_tx,
            deadline_tx,
            endgame_tx,
            map,
            ledger,
            done_tx,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn expected_players(&self) -> usize {
        self.expected_players
    }

    pub fn map(&self) -> &MapState {
        &self.map
    }

    pub fn has_started(&self) -> bool {
        *self.started_tx.borrow()
    }

    pub fn deadline_expired(&self) -> bool {
        *self.deadline_tx.borrow()
    }

    /// Receiver that flips to `true` when the deadline fires
    pub fn deadline_watch(&self) -> watch::Receiver<bool> {
        self.deadline_tx.subscribe()
    }

    #[cfg(test)]
    pub async fn counters(&self) -> SessionCounters {
        *self.counters.lock().await
    }

    /// Registers one authenticated player and waits until the lobby is full.
    ///
    /// The join that fills the lobby marks the game started, launches the
    /// deadline timer and releases every waiter. Joins after that point are
    /// refused.
    pub async fn join_lobby(self: &Arc<Self>) -> Result<LobbyTicket, LobbyError> {
        let mut started = self.started_tx.subscribe();

        let seat = {
            let mut counters = self.counters.lock().await;
            if counters.game_started {
                return Err(LobbyError::AlreadyStarted(self.id));
            }

            counters.ready_count += 1;
            let seat = counters.ready_count as u32;
            info!(
                "Session {}: {}/{} players ready",
                self.id, counters.ready_count, self.expected_players
            );

            if counters.ready_count == self.expected_players {
                counters.game_started = true;
                self.start_deadline_timer();
                self.started_tx.send_replace(true);
                info!("Session {}: lobby full, game started", self.id);
                return Ok(LobbyTicket {
                    seat,
                    started_deadline: true,
                });
            }
            seat
        };

        started
            .wait_for(|started| *started)
            .await
            .map_err(|_| LobbyError::Closed(self.id))?;

        Ok(LobbyTicket {
            seat,
            started_deadline: false,
        })
    }

    fn start_deadline_timer(self: &Arc<Self>) {
        let session = Arc::clone(self);
        info!(
            "Session {}: deadline timer started ({:?})",
            session.id, session.deadline
        );

        tokio::spawn(async move {
            let mut endgame = session.endgame_tx.subscribe();
            let resolved = async move {
                let _ = endgame
                    .wait_for(|e| matches!(e, Endgame::Resolved(_)))
                    .await;
            };

            tokio::select! {
                _ = tokio::time::sleep(session.deadline) => {
                    session.deadline_tx.send_replace(true);
                    info!("Session {}: deadline reached", session.id);
                }
                _ = resolved => {
                    debug!("Session {}: resolved before deadline, timer stopped", session.id);
                }
            }
        });
    }

    /// Appends a score; a ledger failure only drops this entry from ranking
    pub async fn record_score(&self, entry: &ScoreEntry) {
        match self.ledger.record(entry).await {
            Ok(()) => info!(
                "Session {}: score written for {} (items {}, exited {})",
                self.id, entry.name, entry.items, entry.exited
            ),
            Err(e) => error!("Session {}: dropping score for {}: {}", self.id, entry.name, e),
        }
    }

    /// Waits at the endgame barrier and returns the resolved winner.
    ///
    /// The last worker to arrive ranks the ledger, publishes the winner to
    /// every waiter and notifies the supervisor.
    pub async fn join_endgame(&self) -> Option<ScoreEntry> {
        let mut endgame = self.endgame_tx.subscribe();

        let last = {
            let mut counters = self.counters.lock().await;
            counters.finished_count += 1;
            info!(
                "Session {}: {}/{} players finished",
                self.id, counters.finished_count, self.expected_players
            );
            counters.finished_count == self.expected_players
        };

        if last {
            return self.resolve_winner().await;
        }

        let winner = match endgame
            .wait_for(|e| matches!(e, Endgame::Resolved(_)))
            .await
        {
            Ok(state) => match &*state {
                Endgame::Resolved(winner) => winner.clone(),
                Endgame::Pending => None,
            },
            Err(_) => None,
        };
        winner
    }

    async fn resolve_winner(&self) -> Option<ScoreEntry> {
        let winner = match self.ledger.snapshot().await {
            Ok(entries) => ledger::winner(&entries),
            Err(e) => {
                error!("Session {}: cannot read scores: {}", self.id, e);
                None
            }
        };

        match &winner {
            Some(w) => info!(
                "Session {}: winner is {} (seat {}, items {}, exited {})",
                self.id, w.name, w.seat, w.items, w.exited
            ),
            None => info!("Session {}: no winner", self.id),
        }

        self.endgame_tx.send_replace(Endgame::Resolved(winner.clone()));

        let summary = SessionSummary {
            id: self.id,
            players: self.expected_players,
            winner: winner.clone(),
        };
        if self.done_tx.send(summary).is_err() {
            debug!("Session {}: supervisor no longer listening", self.id);
        }

        winner
    }
}
