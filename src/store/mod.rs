//! Local replicated dataset
//!
//! Invariants:
//! - Single writer (the sync engine), multiple readers (the serving layer)
//! - A changeset commits atomically or not at all
//! - Re-applying an already-applied changeset is a no-op in effect

mod errors;
mod table;

pub use errors::{StoreError, StoreErrorKind, StoreResult};
pub use table::{ApplyOutcome, Record, TableStore};
