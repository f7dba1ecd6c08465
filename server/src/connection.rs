//! Connection halves used by a player worker
//!
//! `CommandReader` turns the inbound byte stream into text messages.
//! `FrameSender` serializes every outbound frame through one per-player lock,
//! shared between the movement loop and the fog broadcaster.

use log::debug;
use maze_shared::Frame;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

const READ_CHUNK: usize = 256;

/// Splits incoming bytes into messages.
///
/// One read is one chunk; a chunk is cut on line terminators and each
/// non-empty piece becomes a message. A client that sends bare `W` without a
/// newline still gets one message per read.
pub struct CommandReader<R> {
    reader: R,
    pending: VecDeque<String>,
    buffer: [u8; READ_CHUNK],
}

impl<R: AsyncRead + Unpin> CommandReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            buffer: [0; READ_CHUNK],
        }
    }

    /// Next message, or `None` once the peer closed or the read failed
    pub async fn next_message(&mut self) -> Option<String> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Some(message);
            }

            let n = match self.reader.read(&mut self.buffer).await {
                Ok(0) => return None,
                Ok(n) => n,
                Err(e) => {
                    debug!("Read failed: {}", e);
                    return None;
                }
            };

            let chunk = String::from_utf8_lossy(&self.buffer[..n]);
            self.pending.extend(
                chunk
                    .split('\n')
                    .map(|piece| piece.trim_end_matches('\r'))
                    .filter(|piece| !piece.is_empty())
                    .map(str::to_string),
            );
        }
    }
}

/// Cloneable handle to a player's write half
pub struct FrameSender<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for FrameSender<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Encodes and writes one whole frame while holding the send lock
    pub async fn send(&self, frame: &Frame) -> io::Result<()> {
        let bytes = frame
            .encode()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await
    }

    pub async fn shutdown(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}
