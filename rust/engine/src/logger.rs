use std::collections::HashMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::Hand;
use crate::player::SeatId;

/// Represents a betting street in Texas Hold'em poker, plus the showdown.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    /// Before flop (hole cards dealt)
    Preflop,
    /// After flop (3 community cards)
    Flop,
    /// After turn (4th community card)
    Turn,
    /// After river (5th community card)
    River,
    Showdown,
}

impl Street {
    /// The following street and how many community cards it deals.
    pub fn next(self) -> Option<(Street, usize)> {
        match self {
            Street::Preflop => Some((Street::Flop, 3)),
            Street::Flop => Some((Street::Turn, 1)),
            Street::Turn => Some((Street::River, 1)),
            Street::River => Some((Street::Showdown, 0)),
            Street::Showdown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
}

/// One entry of a hand's append-only action log.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub seat_id: SeatId,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Chips moved from the stack into the pot by this action
    pub amount: u32,
    /// The seat's total for the street after the action
    pub street_total: u32,
    pub street: Street,
    /// Blinds and timeout actions the seat did not choose
    #[serde(default)]
    pub forced: bool,
}

pub fn format_hand_id(yyyymmdd: &str, seq: u32) -> String {
    format!("{}-{:06}", yyyymmdd, seq)
}

/// Why a checkpoint was taken.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "street", rename_all = "snake_case")]
pub enum CheckpointKind {
    HandStarted,
    StreetDealt(Street),
    Finished,
    Aborted,
}

/// Full snapshot of an in-flight hand, enough to resume it after a crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandCheckpoint {
    pub hand_id: String,
    pub kind: CheckpointKind,
    /// Timestamp when the checkpoint was written (RFC3339 format)
    #[serde(default)]
    pub ts: Option<String>,
    pub hand: Hand,
}

impl HandCheckpoint {
    pub fn new(kind: CheckpointKind, hand: &Hand) -> Self {
        Self {
            hand_id: hand.id().to_string(),
            kind,
            ts: None,
            hand: hand.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Checkpoint store unavailable: {0}")]
    Unavailable(String),
}

/// Where hand checkpoints go. Saving must be durable before it returns `Ok`.
pub trait CheckpointSink: Send {
    fn save(&mut self, checkpoint: &HandCheckpoint) -> Result<(), PersistError>;

    /// The most recent checkpoint for a hand, if any was saved.
    fn latest(&self, hand_id: &str) -> Result<Option<HandCheckpoint>, PersistError>;
}

/// Appends checkpoints as JSON lines (LF only) and indexes the latest per hand.
pub struct HandLogger {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    latest: HashMap<String, HandCheckpoint>,
}

impl HandLogger {
    /// Creates (or truncates) a checkpoint file.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        ensure_parent(path.as_ref());
        let f = File::create(&path)?;
        Ok(Self {
            writer: Some(BufWriter::new(f)),
            path: Some(path.as_ref().to_path_buf()),
            latest: HashMap::new(),
        })
    }

    /// Opens an existing checkpoint file for appending, replaying what it
    /// holds so earlier hands can still be recovered.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let mut latest = HashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let cp: HandCheckpoint = serde_json::from_str(&line)?;
                latest.insert(cp.hand_id.clone(), cp);
            }
        } else {
            ensure_parent(path);
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::debug!(path = %path.display(), hands = latest.len(), "opened checkpoint log");
        Ok(Self {
            writer: Some(BufWriter::new(f)),
            path: Some(path.to_path_buf()),
            latest,
        })
    }

    /// Keeps checkpoints in memory only.
    pub fn in_memory() -> Self {
        Self {
            writer: None,
            path: None,
            latest: HashMap::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn write(&mut self, checkpoint: &HandCheckpoint) -> Result<(), PersistError> {
        // inject timestamp if missing
        let mut rec = checkpoint.clone();
        if rec.ts.is_none() {
            rec.ts = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        let line = serde_json::to_string(&rec)?;
        if let Some(w) = &mut self.writer {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
            w.flush()?;
            w.get_ref().sync_data()?;
        }
        self.latest.insert(rec.hand_id.clone(), rec);
        Ok(())
    }
}

impl CheckpointSink for HandLogger {
    fn save(&mut self, checkpoint: &HandCheckpoint) -> Result<(), PersistError> {
        self.write(checkpoint)
    }

    fn latest(&self, hand_id: &str) -> Result<Option<HandCheckpoint>, PersistError> {
        Ok(self.latest.get(hand_id).cloned())
    }
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = create_dir_all(parent);
        }
    }
}

/// Shared in-memory checkpoint list; clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoints {
    inner: Arc<Mutex<Vec<HandCheckpoint>>>,
}

impl MemoryCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<HandCheckpoint> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl CheckpointSink for MemoryCheckpoints {
    fn save(&mut self, checkpoint: &HandCheckpoint) -> Result<(), PersistError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| PersistError::Unavailable("checkpoint list poisoned".into()))?;
        guard.push(checkpoint.clone());
        Ok(())
    }

    fn latest(&self, hand_id: &str) -> Result<Option<HandCheckpoint>, PersistError> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| PersistError::Unavailable("checkpoint list poisoned".into()))?;
        Ok(guard.iter().rev().find(|cp| cp.hand_id == hand_id).cloned())
    }
}
