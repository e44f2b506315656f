//! Metrics registry
//!
//! Invariants:
//! - Counters only, monotonic, exact
//! - Reset only on process start
//! - Thread-safe with minimal locking

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry containing all operational counters.
///
/// Verification failures are tracked separately from ordinary sync
/// failures: a rising `verification_failures` counter is the escalation
/// signal for a data-trust incident.
///
/// # Thread Safety
///
/// All counters use atomic operations with Relaxed ordering (eventual
/// consistency is fine for metrics).
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Changesets pulled from the source
    changesets_pulled: AtomicU64,
    /// Changesets verified and applied
    changesets_applied: AtomicU64,
    /// Records upserted into the local dataset
    records_upserted: AtomicU64,
    /// Records deleted from the local dataset
    records_deleted: AtomicU64,
    /// Sync cycles that failed on transport or apply
    sync_failures: AtomicU64,
    /// Changesets rejected by signature verification
    verification_failures: AtomicU64,
    /// Public-key set refreshes
    key_refreshes: AtomicU64,
    /// Health probes performed
    probes_performed: AtomicU64,
    /// Health probes that failed
    probe_failures: AtomicU64,
    /// Instance status transitions
    status_transitions: AtomicU64,
    /// Instances registered
    instances_registered: AtomicU64,
    /// Instances deregistered
    instances_deregistered: AtomicU64,
    /// Discovery queries served
    discovery_queries: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Sync metrics

    /// Increment changesets pulled
    pub fn increment_changesets_pulled(&self) {
        self.changesets_pulled.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment changesets applied
    pub fn increment_changesets_applied(&self) {
        self.changesets_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Add upserted record count
    pub fn add_records_upserted(&self, count: u64) {
        self.records_upserted.fetch_add(count, Ordering::Relaxed);
    }

    /// Add deleted record count
    pub fn add_records_deleted(&self, count: u64) {
        self.records_deleted.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment sync failures (transport or apply)
    pub fn increment_sync_failures(&self) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment verification failures
    pub fn increment_verification_failures(&self) {
        self.verification_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment key refreshes
    pub fn increment_key_refreshes(&self) {
        self.key_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get verification failure count
    pub fn verification_failures(&self) -> u64 {
        self.verification_failures.load(Ordering::Relaxed)
    }

    // Probe metrics

    /// Increment probes performed
    pub fn increment_probes_performed(&self) {
        self.probes_performed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment probe failures
    pub fn increment_probe_failures(&self) {
        self.probe_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment status transitions
    pub fn increment_status_transitions(&self) {
        self.status_transitions.fetch_add(1, Ordering::Relaxed);
    }

    // Registry metrics

    /// Increment instances registered
    pub fn increment_instances_registered(&self) {
        self.instances_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment instances deregistered
    pub fn increment_instances_deregistered(&self) {
        self.instances_deregistered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment discovery queries
    pub fn increment_discovery_queries(&self) {
        self.discovery_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"changesets_pulled":{},"changesets_applied":{},"records_upserted":{},"records_deleted":{},"sync_failures":{},"verification_failures":{},"key_refreshes":{},"probes_performed":{},"probe_failures":{},"status_transitions":{},"instances_registered":{},"instances_deregistered":{},"discovery_queries":{}}}"#,
            s.changesets_pulled,
            s.changesets_applied,
            s.records_upserted,
            s.records_deleted,
            s.sync_failures,
            s.verification_failures,
            s.key_refreshes,
            s.probes_performed,
            s.probe_failures,
            s.status_transitions,
            s.instances_registered,
            s.instances_deregistered,
            s.discovery_queries,
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            changesets_pulled: self.changesets_pulled.load(Ordering::Relaxed),
            changesets_applied: self.changesets_applied.load(Ordering::Relaxed),
            records_upserted: self.records_upserted.load(Ordering::Relaxed),
            records_deleted: self.records_deleted.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            verification_failures: self.verification_failures.load(Ordering::Relaxed),
            key_refreshes: self.key_refreshes.load(Ordering::Relaxed),
            probes_performed: self.probes_performed.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            status_transitions: self.status_transitions.load(Ordering::Relaxed),
            instances_registered: self.instances_registered.load(Ordering::Relaxed),
            instances_deregistered: self.instances_deregistered.load(Ordering::Relaxed),
            discovery_queries: self.discovery_queries.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub changesets_pulled: u64,
    pub changesets_applied: u64,
    pub records_upserted: u64,
    pub records_deleted: u64,
    pub sync_failures: u64,
    pub verification_failures: u64,
    pub key_refreshes: u64,
    pub probes_performed: u64,
    pub probe_failures: u64,
    pub status_transitions: u64,
    pub instances_registered: u64,
    pub instances_deregistered: u64,
    pub discovery_queries: u64,
}
