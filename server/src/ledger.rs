//! Append-only score ledger
//!
//! One line per finished player: `seat;name;items;exited`. The supervisor
//! truncates the file when a session starts; workers only ever append.
//! All file access goes through one async mutex so a snapshot never sees a
//! half-written record.

use log::{debug, warn};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("score ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One player's outcome for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    /// Lobby registration order, 1-based
    pub seat: u32,
    pub name: String,
    pub items: u32,
    pub exited: bool,
}

impl ScoreEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{};{};{};{}\n",
            self.seat,
            self.name,
            self.items,
            u8::from(self.exited)
        )
    }

    /// Parses one ledger line. Names may contain `;`, so the numeric fields
    /// are split off from both ends.
    pub fn parse_line(line: &str) -> Option<ScoreEntry> {
        let (seat, rest) = line.trim_end_matches(['\r', '\n']).split_once(';')?;
        let (rest, exited) = rest.rsplit_once(';')?;
        let (name, items) = rest.rsplit_once(';')?;

        let exited = match exited {
            "0" => false,
            "1" => true,
            _ => return None,
        };

        Some(ScoreEntry {
            seat: seat.parse().ok()?,
            name: name.to_string(),
            items: items.parse().ok()?,
            exited,
        })
    }
}

/// Orders entries best first: exited players ahead of everyone else, then
/// by items collected, then by who registered first.
pub fn rank(entries: &[ScoreEntry]) -> Vec<ScoreEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by_key(|e| (Reverse(e.exited), Reverse(e.items), e.seat));
    ranked
}

pub fn winner(entries: &[ScoreEntry]) -> Option<ScoreEntry> {
    rank(entries).into_iter().next()
}

pub struct ScoreLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ScoreLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Creates or truncates the ledger file
    pub async fn reset(&self) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().await;
        fs::write(&self.path, b"")
            .await
            .map_err(|e| self.io_error(e))?;
        debug!("Score ledger {} cleared", self.path.display());
        Ok(())
    }

    pub async fn record(&self, entry: &ScoreEntry) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        file.write_all(entry.to_line().as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Reads every well-formed record currently in the ledger
    pub async fn snapshot(&self) -> Result<Vec<ScoreEntry>, LedgerError> {
        let contents = {
            let _guard = self.lock.lock().await;
            fs::read_to_string(&self.path)
                .await
                .map_err(|e| self.io_error(e))?
        };

        let entries = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let entry = ScoreEntry::parse_line(line);
                if entry.is_none() {
                    warn!("Skipping malformed ledger line: {:?}", line);
                }
                entry
            })
            .collect();
        Ok(entries)
    }
}
