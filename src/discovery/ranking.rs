//! Deterministic instance ranking

use crate::registry::InstanceRecord;

/// Order instances best-first.
///
/// Ascending rolling latency, ties broken by descending uptime, remaining
/// ties by registration order. Stable and deterministic for any snapshot.
pub fn rank(records: &mut [InstanceRecord]) {
    records.sort_by(|a, b| {
        a.average_latency_ms
            .total_cmp(&b.average_latency_ms)
            .then_with(|| b.uptime_percentage.total_cmp(&a.uptime_percentage))
            .then_with(|| a.registration_seq.cmp(&b.registration_seq))
    });
}
