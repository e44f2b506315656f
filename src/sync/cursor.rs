//! Per-table sync cursors
//!
//! Invariants:
//! - `last_sync_timestamp` never decreases
//! - Only the sync engine mutates cursors
//! - Cursor state survives restarts (JSON file in the data directory)

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{SyncError, SyncResult};

/// Sync state of one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No pull in flight
    Idle,
    /// A pull is in flight
    Syncing,
    /// The last pull failed; retry pending
    Failed,
}

/// Replication progress for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Logical table name
    pub table_name: String,

    /// Timestamp of the newest record applied, None before the first
    /// successful pull
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_sync_timestamp: Option<DateTime<Utc>>,

    /// Current sync state
    pub status: SyncStatus,

    /// Why the last pull failed, if it did
    pub error_message: Option<String>,
}

impl SyncCursor {
    /// A fresh cursor for a table that has never synced.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            last_sync_timestamp: None,
            status: SyncStatus::Idle,
            error_message: None,
        }
    }

    /// Advance the cursor, never regressing.
    ///
    /// Returns whether the cursor actually moved.
    pub fn advance(&mut self, observed: DateTime<Utc>) -> bool {
        match self.last_sync_timestamp {
            Some(current) if observed <= current => false,
            _ => {
                self.last_sync_timestamp = Some(observed);
                true
            }
        }
    }
}

/// All cursors for this replica, with optional file persistence.
///
/// `Syncing` is a transient in-process state: cursors loaded from disk are
/// normalized back to `Idle` so a crash mid-pull does not wedge a table.
#[derive(Debug)]
pub struct CursorStore {
    cursors: RwLock<HashMap<String, SyncCursor>>,
    path: Option<PathBuf>,
}

impl CursorStore {
    /// Create a store persisted at the given path, loading existing state.
    pub fn open(path: PathBuf) -> SyncResult<Self> {
        let mut cursors: HashMap<String, SyncCursor> = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| SyncError::storage(format!("Failed to read cursor file: {}", e)))?;
            serde_json::from_str(&content)
                .map_err(|e| SyncError::storage(format!("Invalid cursor file: {}", e)))?
        } else {
            HashMap::new()
        };

        for cursor in cursors.values_mut() {
            if cursor.status == SyncStatus::Syncing {
                cursor.status = SyncStatus::Idle;
            }
        }

        Ok(Self {
            cursors: RwLock::new(cursors),
            path: Some(path),
        })
    }

    /// Create an unpersisted store.
    pub fn in_memory() -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    /// Get the cursor for a table (a fresh one if the table never synced).
    pub fn get(&self, table: &str) -> SyncCursor {
        let cursors = self.cursors.read().expect("cursor store lock poisoned");
        cursors.get(table).cloned().unwrap_or_else(|| SyncCursor::new(table))
    }

    /// Mark a pull as in flight.
    pub fn begin(&self, table: &str) {
        let mut cursors = self.cursors.write().expect("cursor store lock poisoned");
        let cursor = cursors
            .entry(table.to_string())
            .or_insert_with(|| SyncCursor::new(table));
        cursor.status = SyncStatus::Syncing;
    }

    /// Record a committed pull: advance the cursor (monotonic) and persist.
    ///
    /// `observed` is the maximum record timestamp in the applied batch;
    /// None (empty batch) leaves the cursor value unchanged.
    pub fn commit(&self, table: &str, observed: Option<DateTime<Utc>>) -> SyncResult<SyncCursor> {
        let updated = {
            let mut cursors = self.cursors.write().expect("cursor store lock poisoned");
            let cursor = cursors
                .entry(table.to_string())
                .or_insert_with(|| SyncCursor::new(table));

            if let Some(observed) = observed {
                cursor.advance(observed);
            }
            cursor.status = SyncStatus::Idle;
            cursor.error_message = None;
            cursor.clone()
        };

        self.persist()?;
        Ok(updated)
    }

    /// Record a failed pull: cursor value unchanged, failure noted.
    pub fn fail(&self, table: &str, error: impl Into<String>) -> SyncResult<SyncCursor> {
        let updated = {
            let mut cursors = self.cursors.write().expect("cursor store lock poisoned");
            let cursor = cursors
                .entry(table.to_string())
                .or_insert_with(|| SyncCursor::new(table));

            cursor.status = SyncStatus::Failed;
            cursor.error_message = Some(error.into());
            cursor.clone()
        };

        self.persist()?;
        Ok(updated)
    }

    /// All cursors, sorted by table name.
    pub fn all(&self) -> Vec<SyncCursor> {
        let cursors = self.cursors.read().expect("cursor store lock poisoned");
        let mut all: Vec<SyncCursor> = cursors.values().cloned().collect();
        all.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        all
    }

    fn persist(&self) -> SyncResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let cursors = self.cursors.read().expect("cursor store lock poisoned");
        let content = serde_json::to_string_pretty(&*cursors)
            .map_err(|e| SyncError::storage(format!("Failed to serialize cursors: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| SyncError::storage(format!("Failed to write cursor file: {}", e)))
    }
}
