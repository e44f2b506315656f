//! Sync Subsystem (replica side)
//!
//! Pulls incremental changesets from the authoritative source, verifies
//! them, and applies them to the local dataset.
//!
//! Invariants:
//! - A changeset is applied only if its signature verifies
//! - The per-table cursor never decreases, and advances only after the
//!   apply transaction commits
//! - Within one table, pulls are strictly sequential; tables sync
//!   independently of one another
//! - Any transport, verification, or apply failure leaves the cursor
//!   unchanged (at-least-once redelivery on retry)

mod backoff;
mod changeset;
mod config;
mod cursor;
mod engine;
mod errors;
mod source_client;

pub use backoff::Backoff;
pub use changeset::ChangeSet;
pub use config::SyncConfig;
pub use cursor::{CursorStore, SyncCursor, SyncStatus};
pub use engine::{SyncEngine, SyncOutcome};
pub use errors::{SyncError, SyncErrorKind, SyncResult};
pub use source_client::{PublicKeyResponse, SourceClient};
