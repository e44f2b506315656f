//! Source service: builds and signs changesets on demand

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::changelog::ChangeLog;
use crate::integrity::{PayloadSigner, PublicKeyEntry, Signature, SIGNATURE_ALGORITHM};
use crate::store::Record;
use crate::sync::ChangeSet;

/// The authoritative source: change log plus signer.
///
/// The CRUD layer records changes through [`record_upsert`] and
/// [`record_delete`]; the sync endpoint asks for a signed changeset per
/// pull.
///
/// [`record_upsert`]: SourceService::record_upsert
/// [`record_delete`]: SourceService::record_delete
pub struct SourceService {
    log: ChangeLog,
    signer: PayloadSigner,
    /// Previously valid public keys still announced during rotation
    previous_keys: RwLock<Vec<PublicKeyEntry>>,
}

impl SourceService {
    /// Create a source service around a signer.
    pub fn new(signer: PayloadSigner) -> Self {
        Self {
            log: ChangeLog::new(),
            signer,
            previous_keys: RwLock::new(Vec::new()),
        }
    }

    /// Record a created or modified record.
    pub fn record_upsert(&self, table: &str, record: Record) {
        self.log.record_upsert(table, record);
    }

    /// Record a deletion.
    pub fn record_delete(&self, table: &str, id: impl Into<String>, deleted_at: DateTime<Utc>) {
        self.log.record_delete(table, id, deleted_at);
    }

    /// Build and sign a changeset for one table since a timestamp.
    ///
    /// Issued fresh per pull; an empty batch is still signed so the replica
    /// can trust "nothing changed".
    pub fn changeset(&self, table: &str, since: Option<DateTime<Utc>>) -> ChangeSet {
        let (upserted, deleted) = self.log.changes_since(table, since);

        let mut changeset = ChangeSet {
            table_name: table.to_string(),
            upserted,
            deleted,
            signed_at: Utc::now(),
            signature: Signature {
                key_id: self.signer.key_id().to_string(),
                algorithm: SIGNATURE_ALGORITHM.to_string(),
                digest: String::new(),
                bytes: String::new(),
            },
        };
        changeset.signature = self.signer.sign(&changeset);
        changeset
    }

    /// Keep announcing a previously valid public key during rotation.
    ///
    /// Consumers that have not refreshed yet keep verifying batches signed
    /// under the old key until it is dropped from this list.
    pub fn announce_previous_key(&self, entry: PublicKeyEntry) {
        let mut keys = self.previous_keys.write().expect("previous keys lock poisoned");
        keys.retain(|k| k.key_id != entry.key_id);
        keys.push(entry);
    }

    /// All currently valid public keys: the active key first, then any
    /// still-announced previous keys.
    pub fn public_keys(&self) -> Vec<PublicKeyEntry> {
        let mut keys = vec![self.signer.public_key_entry()];
        let previous = self.previous_keys.read().expect("previous keys lock poisoned");
        keys.extend(previous.iter().cloned());
        keys
    }
}
