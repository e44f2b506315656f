//! In-memory table store with staged commit

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{StoreError, StoreResult};

/// One replicated record.
///
/// Records are schemaless JSON documents keyed by an opaque primary key.
/// `updated_at` is assigned by the authoritative source and drives cursor
/// advancement on the replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key
    pub id: String,

    /// Source-assigned modification time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    /// Record body
    pub fields: Value,
}

/// Outcome of applying a changeset batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Records upserted
    pub upserted: usize,
    /// Record ids removed (ids already absent count as applied no-ops)
    pub deleted: usize,
    /// Maximum `updated_at` observed among applied upserts
    pub max_timestamp: Option<DateTime<Utc>>,
}

/// The local replicated dataset: table name → primary key → record.
///
/// Writes are staged against a copy of the target table and committed by a
/// single map swap, so readers never observe a half-applied batch and an
/// apply error leaves the table untouched.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: RwLock<HashMap<String, HashMap<String, Record>>>,
}

impl TableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of upserts and deletions to one table atomically.
    ///
    /// Upserts overwrite by primary key (the source is authoritative).
    /// Deletes of absent ids are no-ops. Idempotent: re-applying the same
    /// batch yields the same resulting state.
    pub fn apply(
        &self,
        table: &str,
        upserts: &[Record],
        deletes: &[String],
    ) -> StoreResult<ApplyOutcome> {
        // Validate the whole batch before staging anything
        for record in upserts {
            if record.id.is_empty() {
                return Err(StoreError::invalid_record(format!(
                    "Record in table {} has an empty primary key",
                    table
                )));
            }
        }

        let mut tables = self.tables.write().expect("table store lock poisoned");

        // Stage against a copy; commit is the swap below
        let mut staged = tables.get(table).cloned().unwrap_or_default();
        let mut max_timestamp: Option<DateTime<Utc>> = None;

        for record in upserts {
            max_timestamp = Some(match max_timestamp {
                Some(current) => current.max(record.updated_at),
                None => record.updated_at,
            });
            staged.insert(record.id.clone(), record.clone());
        }

        for id in deletes {
            staged.remove(id);
        }

        tables.insert(table.to_string(), staged);

        Ok(ApplyOutcome {
            upserted: upserts.len(),
            deleted: deletes.len(),
            max_timestamp,
        })
    }

    /// Look up a record by table and primary key.
    pub fn get(&self, table: &str, id: &str) -> Option<Record> {
        let tables = self.tables.read().expect("table store lock poisoned");
        tables.get(table).and_then(|t| t.get(id)).cloned()
    }

    /// Number of records in a table.
    pub fn len(&self, table: &str) -> usize {
        let tables = self.tables.read().expect("table store lock poisoned");
        tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    /// Check whether a table has no records.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Names of tables holding at least one record, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().expect("table store lock poisoned");
        let mut names: Vec<String> = tables
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Full copy of one table, for the serving layer.
    pub fn snapshot(&self, table: &str) -> HashMap<String, Record> {
        let tables = self.tables.read().expect("table store lock poisoned");
        tables.get(table).cloned().unwrap_or_default()
    }
}
