//! Authoritative Source
//!
//! The single writable origin of shared data. Tracks per-table changes and
//! serves signed changesets to pulling replicas.
//!
//! Invariants:
//! - Only the source holds a private signing key
//! - A changeset is signed at issue time; replicas and clients treat it as
//!   immutable

mod changelog;
mod service;

pub use changelog::ChangeLog;
pub use service::SourceService;
