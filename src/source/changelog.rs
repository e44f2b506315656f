//! Per-table change log
//!
//! Append-only history of upserts and deletions, queried by timestamp to
//! build incremental changesets. The latest operation per id wins: an id
//! deleted after an upsert appears only in the deletion set, and vice
//! versa.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::store::Record;

#[derive(Debug, Clone)]
enum LoggedChange {
    Upsert(Record),
    Delete { id: String, deleted_at: DateTime<Utc> },
}

impl LoggedChange {
    fn id(&self) -> &str {
        match self {
            LoggedChange::Upsert(record) => &record.id,
            LoggedChange::Delete { id, .. } => id,
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LoggedChange::Upsert(record) => record.updated_at,
            LoggedChange::Delete { deleted_at, .. } => *deleted_at,
        }
    }
}

/// Append-only change history per table.
#[derive(Debug, Default)]
pub struct ChangeLog {
    tables: RwLock<HashMap<String, Vec<LoggedChange>>>,
}

impl ChangeLog {
    /// Create an empty change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created or modified record.
    pub fn record_upsert(&self, table: &str, record: Record) {
        let mut tables = self.tables.write().expect("change log lock poisoned");
        tables
            .entry(table.to_string())
            .or_default()
            .push(LoggedChange::Upsert(record));
    }

    /// Record a deletion.
    pub fn record_delete(&self, table: &str, id: impl Into<String>, deleted_at: DateTime<Utc>) {
        let mut tables = self.tables.write().expect("change log lock poisoned");
        tables.entry(table.to_string()).or_default().push(LoggedChange::Delete {
            id: id.into(),
            deleted_at,
        });
    }

    /// Collect changes for one table newer than `since`.
    ///
    /// Returns upserts ordered by (updated_at, id) and deleted ids sorted,
    /// with only the latest operation per id included. `None` means "from
    /// the beginning".
    pub fn changes_since(
        &self,
        table: &str,
        since: Option<DateTime<Utc>>,
    ) -> (Vec<Record>, Vec<String>) {
        let tables = self.tables.read().expect("change log lock poisoned");
        let Some(log) = tables.get(table) else {
            return (Vec::new(), Vec::new());
        };

        // Log order is append order; later entries override earlier ones
        let mut latest: HashMap<&str, &LoggedChange> = HashMap::new();
        for change in log {
            latest.insert(change.id(), change);
        }

        let mut upserted = Vec::new();
        let mut deleted = Vec::new();

        for change in latest.into_values() {
            if let Some(since) = since {
                if change.timestamp() <= since {
                    continue;
                }
            }
            match change {
                LoggedChange::Upsert(record) => upserted.push(record.clone()),
                LoggedChange::Delete { id, .. } => deleted.push(id.clone()),
            }
        }

        upserted.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        deleted.sort();

        (upserted, deleted)
    }

    /// Number of logged changes for a table.
    pub fn len(&self, table: &str) -> usize {
        let tables = self.tables.read().expect("change log lock poisoned");
        tables.get(table).map(|log| log.len()).unwrap_or(0)
    }

    /// Check whether a table has no logged changes.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}
