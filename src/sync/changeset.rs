//! Changeset wire type
//!
//! A changeset is the unit of replication: everything that changed in one
//! table since a given timestamp, signed by the source. Immutable once
//! issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::integrity::{canonical_json, push_field, Canonical, Signature};
use crate::store::Record;

/// A signed batch of upserts and deletions for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Logical table this batch belongs to
    pub table_name: String,

    /// Records created or modified since the requested timestamp,
    /// ordered by (updated_at, id). Serialized as `records` on the wire.
    #[serde(rename = "records")]
    pub upserted: Vec<Record>,

    /// Ids deleted since the requested timestamp, sorted
    pub deleted: Vec<String>,

    /// When the source signed this batch
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub signed_at: DateTime<Utc>,

    /// Detached signature over the canonical form
    pub signature: Signature,
}

impl ChangeSet {
    /// Total number of changes in this batch.
    pub fn change_count(&self) -> usize {
        self.upserted.len() + self.deleted.len()
    }

    /// Check whether this batch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

/// Canonical layout (every field length-prefixed, fixed order):
///
/// ```text
/// version tag "1"
/// table_name
/// signed_at as unix milliseconds
/// "u", upsert count, then per record: id, updated_at millis,
///     canonical JSON of fields
/// "d", delete count, then each deleted id
/// ```
///
/// The signature field itself is not part of the canonical form.
impl Canonical for ChangeSet {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.change_count() * 64);

        push_field(&mut buf, b"1");
        push_field(&mut buf, self.table_name.as_bytes());
        push_field(&mut buf, self.signed_at.timestamp_millis().to_string().as_bytes());

        push_field(&mut buf, b"u");
        push_field(&mut buf, self.upserted.len().to_string().as_bytes());
        for record in &self.upserted {
            push_field(&mut buf, record.id.as_bytes());
            push_field(&mut buf, record.updated_at.timestamp_millis().to_string().as_bytes());
            push_field(&mut buf, canonical_json(&record.fields).as_bytes());
        }

        push_field(&mut buf, b"d");
        push_field(&mut buf, self.deleted.len().to_string().as_bytes());
        for id in &self.deleted {
            push_field(&mut buf, id.as_bytes());
        }

        buf
    }

    fn signed_at(&self) -> DateTime<Utc> {
        self.signed_at
    }
}
