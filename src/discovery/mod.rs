//! Discovery Service
//!
//! Answers "which instance should I use" from the registry's current
//! state. Every query is a fresh finite snapshot: offline instances are
//! excluded, degraded instances are included (flagged) when configured,
//! and ordering is deterministic.

mod ranking;

pub use ranking::rank;

use std::sync::Arc;

use crate::observability::MetricsRegistry;
use crate::registry::{InstanceRecord, InstanceRegistry, InstanceStatus};

/// Optional narrowing of a discovery query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryFilter {
    /// Only instances in this location
    pub location: Option<String>,

    /// Override the configured include-degraded behavior
    pub include_degraded: Option<bool>,
}

/// Serves ranked instance lists to clients.
pub struct DiscoveryService {
    registry: Arc<InstanceRegistry>,
    metrics: Arc<MetricsRegistry>,
}

impl DiscoveryService {
    /// Create a discovery service over a registry.
    pub fn new(registry: Arc<InstanceRegistry>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { registry, metrics }
    }

    /// How long clients should cache results, in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.registry.config().discovery_ttl_secs
    }

    /// Rank the currently usable instances.
    ///
    /// Ascending rolling latency; ties broken by descending uptime, then
    /// by registration order. The returned snapshot does not change as the
    /// registry moves on.
    pub fn query(&self, filter: &DiscoveryFilter) -> Vec<InstanceRecord> {
        let include_degraded = filter
            .include_degraded
            .unwrap_or(self.registry.config().discovery_include_degraded);

        let mut records: Vec<InstanceRecord> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|record| match record.status {
                InstanceStatus::Online => true,
                InstanceStatus::Degraded => include_degraded,
                InstanceStatus::Offline => false,
            })
            .filter(|record| match &filter.location {
                Some(location) => record.location.as_deref() == Some(location.as_str()),
                None => true,
            })
            .collect();

        rank(&mut records);
        self.metrics.increment_discovery_queries();
        records
    }
}
