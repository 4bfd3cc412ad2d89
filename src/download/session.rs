//! Bookkeeping of in-flight transfers.
//!
//! The [`SessionTable`] maps a live transfer handle ([`SessionId`]) to its
//! [`TransferSession`] and a filename to its handle. Both maps sit behind one
//! mutex so lookups by either key always agree, and so that at most one
//! session exists per filename.

use crate::error::{Error, Result};

use indicatif::ProgressBar;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Handle identifying one transfer. Never reused within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Request sent, no response yet.
    Requesting,
    /// Streaming bytes into the temp file.
    Downloading,
    /// Temp file closed and handed to the hash-and-install worker.
    Verifying,
}

/// One in-flight download.
#[derive(Debug)]
pub struct TransferSession {
    pub filename: String,
    pub start_offset: u64,
    pub started_at: Instant,
    pub state: SessionState,
    /// The transfer task, aborted on cancel.
    pub task: Option<JoinHandle<()>>,
    pub bar: Option<ProgressBar>,
}

/// What progress and completion handlers need to know about a session.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub filename: String,
    pub start_offset: u64,
    pub state: SessionState,
    pub bar: Option<ProgressBar>,
}

#[derive(Debug, Default)]
struct Tables {
    by_handle: HashMap<SessionId, TransferSession>,
    by_name: HashMap<String, SessionId>,
}

impl Tables {
    fn remove(&mut self, id: SessionId) -> Option<TransferSession> {
        let session = self.by_handle.remove(&id)?;
        self.by_name.remove(&session.filename);
        Some(session)
    }
}

/// Concurrency-safe table of every [`TransferSession`].
#[derive(Debug, Default)]
pub struct SessionTable {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new session for `filename` in the `Requesting` state.
    ///
    /// Fails with [`Error::AlreadyActive`] if one already exists.
    pub fn reserve(&self, filename: &str) -> Result<SessionId> {
        let mut tables = self.lock();
        if tables.by_name.contains_key(filename) {
            return Err(Error::AlreadyActive(filename.to_string()));
        }
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tables.by_name.insert(filename.to_string(), id);
        tables.by_handle.insert(
            id,
            TransferSession {
                filename: filename.to_string(),
                start_offset: 0,
                started_at: Instant::now(),
                state: SessionState::Requesting,
                task: None,
                bar: None,
            },
        );
        Ok(id)
    }

    /// Record the resume offset and progress bar once the temp file is open.
    ///
    /// Returns `false` if the session no longer exists.
    pub fn set_start(&self, id: SessionId, start_offset: u64, bar: ProgressBar) -> bool {
        match self.lock().by_handle.get_mut(&id) {
            Some(session) => {
                session.start_offset = start_offset;
                session.bar = Some(bar);
                true
            }
            None => false,
        }
    }

    /// Store the transfer task so it can be aborted, then run `on_attached`.
    ///
    /// `on_attached` runs under the table lock, so nothing that removes the
    /// session (cancel, failure, completion) can be observed before it.
    /// Returns `false`, dropping the handle without calling `on_attached`, if
    /// the session already ended.
    pub fn attach_task(
        &self,
        id: SessionId,
        task: JoinHandle<()>,
        on_attached: impl FnOnce(),
    ) -> bool {
        let mut tables = self.lock();
        match tables.by_handle.get_mut(&id) {
            Some(session) => {
                session.task = Some(task);
                on_attached();
                true
            }
            None => false,
        }
    }

    /// Move a live session to `state`. Returns `false` if it no longer exists.
    pub fn set_state(&self, id: SessionId, state: SessionState) -> bool {
        match self.lock().by_handle.get_mut(&id) {
            Some(session) => {
                session.state = state;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: SessionId) -> Option<SessionView> {
        self.lock().by_handle.get(&id).map(|s| SessionView {
            filename: s.filename.clone(),
            start_offset: s.start_offset,
            state: s.state,
            bar: s.bar.clone(),
        })
    }

    pub fn find(&self, filename: &str) -> Option<SessionId> {
        self.lock().by_name.get(filename).copied()
    }

    /// Remove the session on a terminal transition.
    pub fn remove(&self, id: SessionId) -> Option<TransferSession> {
        self.lock().remove(id)
    }

    /// Remove the session for `filename` unless it is verifying.
    ///
    /// The check and the removal happen under one lock, so a session that
    /// reaches `Verifying` concurrently is never torn down half way.
    pub fn remove_cancellable(&self, filename: &str) -> Option<TransferSession> {
        let mut tables = self.lock();
        let id = *tables.by_name.get(filename)?;
        match tables.by_handle.get(&id) {
            Some(session) if session.state != SessionState::Verifying => tables.remove(id),
            _ => None,
        }
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.lock().by_name.contains_key(filename)
    }

    /// Filenames with a live session, sorted.
    pub fn filenames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
