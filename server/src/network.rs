//! Session supervisor: TCP accept loop and per-session lifecycle

use crate::connection::FrameSender;
use crate::game::MapState;
use crate::ledger::ScoreLedger;
use crate::player::{PlayerWorker, WorkerSettings};
use crate::session::{SessionState, SessionSummary};
use log::{debug, error, info, warn};
use maze_shared::{Cell, Frame, MapSource};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Everything the supervisor needs to run sessions
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub expected_players: usize,
    pub deadline: Duration,
    pub fog_interval: Duration,
    pub ledger_path: PathBuf,
    pub interrupt_reads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            expected_players: 2,
            deadline: Duration::from_secs(30),
            fog_interval: Duration::from_secs(10),
            ledger_path: PathBuf::from("score.txt"),
            interrupt_reads: false,
        }
    }
}

/// Accepts players and runs one session at a time
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    ledger: Arc<ScoreLedger>,
    maps: Box<dyn MapSource>,
    next_session_id: u64,

    // Workers report a resolved session here
    done_tx: mpsc::UnboundedSender<SessionSummary>,
    done_rx: mpsc::UnboundedReceiver<SessionSummary>,
}

impl Server {
    pub async fn new(config: ServerConfig, maps: Box<dyn MapSource>) -> ServerResult<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let ledger = Arc::new(ScoreLedger::new(config.ledger_path.clone()));
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            config,
            ledger,
            maps,
            next_session_id: 0,
            done_tx,
            done_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs sessions back to back until one fails to start
    pub async fn run(&mut self) -> ServerResult<()> {
        loop {
            let summary = self.run_session().await?;
            info!(
                "Session {} finished with {} players, winner: {}",
                summary.id,
                summary.players,
                summary.winner.as_ref().map_or("none", |w| w.name.as_str())
            );
        }
    }

    /// Prepares a fresh session, admits players until it resolves and
    /// returns its summary.
    ///
    /// Failing to clear the score ledger or an unusable map aborts the
    /// session with an error.
    pub async fn run_session(&mut self) -> ServerResult<SessionSummary> {
        self.ledger.reset().await?;

        let grid = self.maps.next_map();
        if grid.count(Cell::Path) == 0 {
            return Err("generated map has no path cell to spawn on".into());
        }

        self.next_session_id += 1;
        let id = self.next_session_id;
        info!(
            "Session {}: {}x{} maze, waiting for {} players",
            id,
            grid.width(),
            grid.height(),
            self.config.expected_players
        );
        debug!("Session {} maze:\n{}", id, grid.render().trim_end());

        let session = SessionState::new(
            id,
            self.config.expected_players,
            self.config.deadline,
            MapState::new(grid),
            Arc::clone(&self.ledger),
            self.done_tx.clone(),
        );
        let settings = WorkerSettings {
            fog_interval: self.config.fog_interval,
            interrupt_reads: self.config.interrupt_reads,
        };

        loop {
            tokio::select! {
                biased;

                Some(summary) = self.done_rx.recv() => {
                    if summary.id != id {
                        warn!("Ignoring summary of stale session {}", summary.id);
                        continue;
                    }
                    info!("Session {}: resolved, resetting", id);
                    return Ok(summary);
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => admit(&session, stream, addr, &settings),
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }
    }
}

/// Hands a new connection to a worker, or turns it away if the game is
/// already running
fn admit(
    session: &Arc<SessionState>,
    stream: TcpStream,
    addr: SocketAddr,
    settings: &WorkerSettings,
) {
    if session.has_started() {
        warn!(
            "Rejecting {}: session {} already started",
            addr,
            session.id()
        );
        tokio::spawn(reject(stream, addr));
        return;
    }

    info!("Connection accepted from {}", addr);
    if let Err(e) = stream.set_nodelay(true) {
        debug!("set_nodelay failed for {}: {}", addr, e);
    }

    let (reader, writer) = stream.into_split();
    let worker = PlayerWorker::new(
        Arc::clone(session),
        reader,
        writer,
        addr.ip(),
        settings.clone(),
    );
    tokio::spawn(async move {
        worker.run().await;
    });
}

async fn reject(stream: TcpStream, addr: SocketAddr) {
    let sender = FrameSender::new(stream);
    if let Err(e) = sender.send(&Frame::SessionOver).await {
        debug!("Could not notify {}: {}", addr, e);
    }
    if let Err(e) = sender.shutdown().await {
        debug!("Shutdown of {} failed: {}", addr, e);
    }
}
