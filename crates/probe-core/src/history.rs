//! Session history for trend analysis.
//!
//! Finished sessions are appended to a store after each run and the most
//! recent ones are read back as the trend baseline. [`JsonlHistoryStore`]
//! keeps one session per line in an append-only file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use probe_proto::Session;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where finished sessions are kept.
pub trait HistoryStore: Send + Sync {
    /// Up to `n` most recent sessions, oldest first.
    fn recent(&self, n: usize) -> Result<Vec<Session>, HistoryError>;

    fn append(&self, session: &Session) -> Result<(), HistoryError>;
}

/// Append-only JSONL file, one session per line.
pub struct JsonlHistoryStore {
    path: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<Session>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut sessions = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // Skip malformed lines
            match serde_json::from_str::<Session>(&line) {
                Ok(session) => sessions.push(session),
                Err(e) => debug!(path = %self.path.display(), error = %e, "skipping history line"),
            }
        }
        Ok(sessions)
    }
}

impl HistoryStore for JsonlHistoryStore {
    fn recent(&self, n: usize) -> Result<Vec<Session>, HistoryError> {
        let mut sessions = self.read_all()?;
        let skip = sessions.len().saturating_sub(n);
        Ok(sessions.split_off(skip))
    }

    fn append(&self, session: &Session) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(session)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}

/// In-process store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    sessions: Mutex<Vec<Session>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn recent(&self, n: usize) -> Result<Vec<Session>, HistoryError> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = sessions.len().saturating_sub(n);
        Ok(sessions[skip..].to_vec())
    }

    fn append(&self, session: &Session) -> Result<(), HistoryError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session.clone());
        Ok(())
    }
}
