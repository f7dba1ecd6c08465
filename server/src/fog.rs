//! Periodic fogged map updates for one player

use crate::connection::FrameSender;
use crate::session::SessionState;
use log::debug;
use maze_shared::{FogMatrix, Position};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Position and fog of one player, shared by the worker and its broadcaster
#[derive(Debug, Clone)]
pub struct PlayerView {
    pub position: Position,
    pub fog: FogMatrix,
}

impl PlayerView {
    /// A view at `position` with that cell and its neighbours already seen
    pub fn new(position: Position, width: usize, height: usize) -> Self {
        let mut fog = FogMatrix::new(width, height);
        fog.reveal_around(position);
        Self { position, fog }
    }

    pub fn move_to(&mut self, position: Position) {
        self.position = position;
        self.fog.reveal_around(position);
    }
}

/// Starts the broadcaster task.
///
/// Sends one fogged frame every `period` until `stop` flips to `true` or a
/// send fails. The first frame goes out one full period after start.
pub fn spawn_fog_broadcaster<W>(
    tag: String,
    session: Arc<SessionState>,
    view: Arc<Mutex<PlayerView>>,
    sender: FrameSender<W>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut stop) => break,
                _ = ticker.tick() => {}
            }

            let snapshot = view.lock().await.clone();
            let frame = session
                .map()
                .fogged_frame(snapshot.position, &snapshot.fog)
                .await;

            if let Err(e) = sender.send(&frame).await {
                debug!("{} fog broadcaster stopping: {}", tag, e);
                return;
            }
            debug!(
                "{} fog frame sent ({} cells seen)",
                tag,
                snapshot.fog.seen_count()
            );
        }

        debug!("{} fog broadcaster stopped", tag);
    })
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    // A dropped sender also counts as stop
    let _ = stop.wait_for(|stopped| *stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MapState;
    use crate::ledger::ScoreLedger;
    use maze_shared::{Frame, Grid};
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    fn session() -> Arc<SessionState> {
        let (done_tx, _) = mpsc::unbounded_channel();
        let grid = Grid::from_rows(&["#####", "# + #", "#   #", "#####"]).unwrap();
        SessionState::new(
            1,
            1,
            Duration::from_secs(60),
            MapState::new(grid),
            Arc::new(ScoreLedger::new(std::env::temp_dir().join("maze-fog-unused.txt"))),
            done_tx,
        )
    }

    #[test]
    fn test_view_reveals_neighbourhood() {
        let mut view = PlayerView::new(Position::new(1, 1), 5, 4);
        assert_eq!(view.fog.seen_count(), 9);

        view.move_to(Position::new(2, 2));
        assert_eq!(view.position, Position::new(2, 2));
        assert!(view.fog.is_seen(Position::new(3, 3)));
        assert!(view.fog.is_seen(Position::new(0, 0)));
        assert!(!view.fog.is_seen(Position::new(0, 4)));
    }

    #[tokio::test]
    async fn test_broadcaster_sends_fogged_frames_until_stopped() {
        let (mut client, server) = tokio::io::duplex(4096);
        let sender = FrameSender::new(server);
        let view = Arc::new(Mutex::new(PlayerView::new(Position::new(1, 1), 5, 4)));
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = spawn_fog_broadcaster(
            "[test@local]".to_string(),
            session(),
            Arc::clone(&view),
            sender.clone(),
            Duration::from_millis(20),
            stop_rx,
        );

        let mut buf = vec![0u8; 4096];
        let mut received = Vec::new();
        while Frame::decode(&received).unwrap().is_none() {
            let n = client.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
        }

        let (frame, _) = Frame::decode(&received).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Fogged {
                width: 5,
                height: 4,
                position: Position::new(1, 1),
                cells: ["###??", "#X+??", "#  ??", "?????"].concat().into_bytes(),
            }
        );

        stop_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_broadcaster_stops_on_closed_connection() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let (_stop_tx, stop_rx) = watch::channel(false);
        let handle = spawn_fog_broadcaster(
            "[test@local]".to_string(),
            session(),
            Arc::new(Mutex::new(PlayerView::new(Position::new(1, 1), 5, 4))),
            FrameSender::new(server),
            Duration::from_millis(10),
            stop_rx,
        );

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
