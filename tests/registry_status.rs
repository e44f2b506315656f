//! Registry Status Tests
//!
//! Status is a pure function of probe history: a fixed outcome sequence
//! with fixed thresholds reproduces the same status sequence on every run.

use std::sync::Arc;

use chrono::Utc;
use mirrornet::observability::MetricsRegistry;
use mirrornet::registry::{
    HealthCheckSample, InstanceMetadata, InstanceRegistry, InstanceStatus, RegistryConfig,
};
use uuid::Uuid;

fn registry(config: RegistryConfig) -> InstanceRegistry {
    InstanceRegistry::new(config, Arc::new(MetricsRegistry::new())).unwrap()
}

fn default_registry() -> InstanceRegistry {
    registry(RegistryConfig::default())
}

/// Replay a probe-outcome sequence and collect the status after each
/// sample. `true` is a fast success, `false` a failure.
fn replay(registry: &InstanceRegistry, id: Uuid, outcomes: &[bool]) -> Vec<InstanceStatus> {
    outcomes
        .iter()
        .map(|&success| {
            let sample = if success {
                HealthCheckSample::ok(id, Utc::now(), 20)
            } else {
                HealthCheckSample::failed(id, Utc::now(), 0, "probe failed")
            };
            registry.record_sample(sample).unwrap().status
        })
        .collect()
}

// =============================================================================
// Determinism
// =============================================================================

/// The same outcome sequence yields the same status sequence, run after
/// run.
#[test]
fn test_status_sequence_reproducible() {
    let outcomes = [
        true, true, false, false, false, true, false, false, false, false, false, false, false,
        false, false, false, true, true, true,
    ];

    let run = || {
        let registry = default_registry();
        let record = registry
            .register("http://replica:7800", InstanceMetadata::default())
            .unwrap();
        replay(&registry, record.id, &outcomes)
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
}

// =============================================================================
// Threshold Transitions
// =============================================================================

/// online → degraded at exactly F1 consecutive failures.
#[test]
fn test_degrades_at_f1() {
    let registry = default_registry();
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    let statuses = replay(&registry, record.id, &[false, false, false]);
    assert_eq!(
        statuses,
        vec![InstanceStatus::Online, InstanceStatus::Online, InstanceStatus::Degraded]
    );
}

/// degraded → offline at exactly F2 consecutive failures.
#[test]
fn test_goes_offline_at_f2() {
    let registry = default_registry();
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    let statuses = replay(&registry, record.id, &[false; 10]);

    assert_eq!(statuses[8], InstanceStatus::Degraded);
    assert_eq!(statuses[9], InstanceStatus::Offline);
}

/// Thresholds come from configuration, not constants.
#[test]
fn test_custom_thresholds_respected() {
    let mut config = RegistryConfig::default();
    config.thresholds.degraded_failures = 1;
    config.thresholds.offline_failures = 2;

    let registry = registry(config);
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    let statuses = replay(&registry, record.id, &[false, false]);
    assert_eq!(statuses, vec![InstanceStatus::Degraded, InstanceStatus::Offline]);
}

/// Sustained high latency degrades an instance that never fails a probe.
#[test]
fn test_latency_degradation() {
    let mut config = RegistryConfig::default();
    config.thresholds.degraded_latency_ms = 100.0;

    let registry = registry(config);
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    let slow = registry
        .record_sample(HealthCheckSample::ok(record.id, Utc::now(), 500))
        .unwrap();
    assert_eq!(slow.status, InstanceStatus::Degraded);

    // Enough fast probes pull the rolling average back under the bar
    let mut latest = slow;
    for _ in 0..10 {
        latest = registry
            .record_sample(HealthCheckSample::ok(record.id, Utc::now(), 10))
            .unwrap();
    }
    assert_eq!(latest.status, InstanceStatus::Online);
}

// =============================================================================
// Flapping Dampening
// =============================================================================

/// A degraded instance needs the full recovery streak; one success is not
/// enough.
#[test]
fn test_recovery_requires_streak() {
    let registry = default_registry();
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    let statuses = replay(&registry, record.id, &[false, false, false, true, true]);

    assert_eq!(statuses[2], InstanceStatus::Degraded);
    assert_eq!(statuses[3], InstanceStatus::Degraded); // one success: still degraded
    assert_eq!(statuses[4], InstanceStatus::Online); // streak of two: recovered
}

/// An offline instance walks back through the same recovery gate.
#[test]
fn test_offline_recovery() {
    let registry = default_registry();
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    let mut outcomes = vec![false; 10];
    outcomes.extend([true, true]);
    let statuses = replay(&registry, record.id, &outcomes);

    assert_eq!(statuses[9], InstanceStatus::Offline);
    assert_eq!(statuses[10], InstanceStatus::Offline);
    assert_eq!(statuses[11], InstanceStatus::Online);
}

/// Strict alternation never accumulates enough consecutive failures to
/// degrade.
#[test]
fn test_alternating_outcomes_stay_online() {
    let registry = default_registry();
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    let outcomes: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
    let statuses = replay(&registry, record.id, &outcomes);

    assert!(statuses.iter().all(|s| *s == InstanceStatus::Online));
}

// =============================================================================
// Registry Behavior Around Status
// =============================================================================

/// Offline instances stay registered and visible until deregistered.
#[test]
fn test_offline_instance_not_auto_deleted() {
    let registry = default_registry();
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    replay(&registry, record.id, &[false; 15]);

    assert_eq!(registry.len(), 1);
    let visible = registry.get(record.id).unwrap();
    assert_eq!(visible.status, InstanceStatus::Offline);

    registry.deregister(record.id).unwrap();
    assert!(registry.is_empty());
}

/// Counters reset across the success/failure boundary.
#[test]
fn test_consecutive_counters_reset() {
    let registry = default_registry();
    let record = registry
        .register("http://replica:7800", InstanceMetadata::default())
        .unwrap();

    replay(&registry, record.id, &[false, false]);
    let after_failures = registry.get(record.id).unwrap();
    assert_eq!(after_failures.consecutive_failures, 2);
    assert_eq!(after_failures.consecutive_successes, 0);

    replay(&registry, record.id, &[true]);
    let after_success = registry.get(record.id).unwrap();
    assert_eq!(after_success.consecutive_failures, 0);
    assert_eq!(after_success.consecutive_successes, 1);
}
