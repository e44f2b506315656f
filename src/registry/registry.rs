//! Instance registry
//!
//! Single writer (the health monitor), multiple readers (discovery and the
//! HTTP layer). The map lock is held only for lookups and membership
//! changes; per-instance metric updates happen under that instance's own
//! mutex.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::config::RegistryConfig;
use super::errors::{RegistryError, RegistryResult};
use super::instance::{next_status, probe_interval_after, InstanceMetadata, InstanceRecord};
use super::samples::{HealthCheckSample, SampleWindow};
use crate::observability::{Logger, MetricsRegistry};

#[derive(Debug)]
struct InstanceEntry {
    record: InstanceRecord,
    window: SampleWindow,
    next_probe_at: DateTime<Utc>,
}

/// All registered instances plus their rolling probe state.
pub struct InstanceRegistry {
    entries: RwLock<HashMap<Uuid, Arc<Mutex<InstanceEntry>>>>,
    by_url: RwLock<HashMap<String, Uuid>>,
    registration_counter: AtomicU64,
    config: RegistryConfig,
    metrics: Arc<MetricsRegistry>,
    persist_path: Option<PathBuf>,
}

impl InstanceRegistry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig, metrics: Arc<MetricsRegistry>) -> RegistryResult<Self> {
        config.validate()?;
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            by_url: RwLock::new(HashMap::new()),
            registration_counter: AtomicU64::new(0),
            config,
            metrics,
            persist_path: None,
        })
    }

    /// Create a registry persisted at the given path, loading membership
    /// from an existing snapshot.
    ///
    /// Rolling windows are not persisted: loaded instances keep their last
    /// known status and rebuild metrics from fresh probes.
    pub fn with_persistence(
        config: RegistryConfig,
        metrics: Arc<MetricsRegistry>,
        path: PathBuf,
    ) -> RegistryResult<Self> {
        let mut registry = Self::new(config, metrics)?;
        registry.persist_path = Some(path.clone());

        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| RegistryError::StorageError(format!("Failed to read registry snapshot: {}", e)))?;
            let records: Vec<InstanceRecord> = serde_json::from_str(&content)
                .map_err(|e| RegistryError::StorageError(format!("Invalid registry snapshot: {}", e)))?;

            let now = Utc::now();
            let mut max_seq = 0u64;
            {
                let mut entries = registry.entries.write().expect("registry lock poisoned");
                let mut by_url = registry.by_url.write().expect("registry lock poisoned");
                for record in records {
                    max_seq = max_seq.max(record.registration_seq);
                    by_url.insert(record.url.clone(), record.id);
                    entries.insert(
                        record.id,
                        Arc::new(Mutex::new(InstanceEntry {
                            window: SampleWindow::new(registry.config.sample_window),
                            next_probe_at: now,
                            record,
                        })),
                    );
                }
            }
            registry.registration_counter.store(max_seq + 1, Ordering::SeqCst);
        }

        Ok(registry)
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new instance.
    ///
    /// Rejects duplicate urls with a conflict error and mutates nothing on
    /// rejection.
    pub fn register(&self, url: &str, metadata: InstanceMetadata) -> RegistryResult<InstanceRecord> {
        let url = url.trim_end_matches('/');
        if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RegistryError::InvalidUrl(url.to_string()));
        }

        let mut by_url = self.by_url.write().expect("registry lock poisoned");
        if by_url.contains_key(url) {
            return Err(RegistryError::DuplicateUrl(url.to_string()));
        }

        let id = Uuid::new_v4();
        let seq = self.registration_counter.fetch_add(1, Ordering::SeqCst);
        let record = InstanceRecord::new(id, url.to_string(), metadata, seq);

        by_url.insert(url.to_string(), id);
        {
            let mut entries = self.entries.write().expect("registry lock poisoned");
            entries.insert(
                id,
                Arc::new(Mutex::new(InstanceEntry {
                    record: record.clone(),
                    window: SampleWindow::new(self.config.sample_window),
                    next_probe_at: Utc::now(),
                })),
            );
        }
        drop(by_url);

        self.persist()?;
        self.metrics.increment_instances_registered();
        Logger::info("INSTANCE_REGISTERED", &[("id", &id.to_string()), ("url", url)]);

        Ok(record)
    }

    /// Remove an instance.
    pub fn deregister(&self, id: Uuid) -> RegistryResult<InstanceRecord> {
        let removed = {
            let mut entries = self.entries.write().expect("registry lock poisoned");
            entries.remove(&id)
        };

        let Some(entry) = removed else {
            return Err(RegistryError::InstanceNotFound(id));
        };

        let record = entry.lock().expect("instance lock poisoned").record.clone();
        {
            let mut by_url = self.by_url.write().expect("registry lock poisoned");
            by_url.remove(&record.url);
        }

        self.persist()?;
        self.metrics.increment_instances_deregistered();
        Logger::info("INSTANCE_DEREGISTERED", &[("id", &id.to_string()), ("url", &record.url)]);

        Ok(record)
    }

    /// Look up one instance.
    pub fn get(&self, id: Uuid) -> Option<InstanceRecord> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .get(&id)
            .map(|entry| entry.lock().expect("instance lock poisoned").record.clone())
    }

    /// All records, ordered by registration.
    pub fn snapshot(&self) -> Vec<InstanceRecord> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let mut records: Vec<InstanceRecord> = entries
            .values()
            .map(|entry| entry.lock().expect("instance lock poisoned").record.clone())
            .collect();
        records.sort_by_key(|r| r.registration_seq);
        records
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries.len()
    }

    /// Check whether no instances are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Instances whose next probe is due at `now`.
    pub fn due_instances(&self, now: DateTime<Utc>) -> Vec<(Uuid, String)> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let mut due: Vec<(u64, Uuid, String)> = entries
            .iter()
            .filter_map(|(id, entry)| {
                let entry = entry.lock().expect("instance lock poisoned");
                if entry.next_probe_at <= now {
                    Some((entry.record.registration_seq, *id, entry.record.url.clone()))
                } else {
                    None
                }
            })
            .collect();
        due.sort_by_key(|(seq, _, _)| *seq);
        due.into_iter().map(|(_, id, url)| (id, url)).collect()
    }

    /// Fold a probe outcome into an instance's rolling state.
    ///
    /// The whole update happens under the instance's own mutex: counters,
    /// window, rolling metrics, derived status, and the backed-off next
    /// probe time.
    pub fn record_sample(&self, sample: HealthCheckSample) -> RegistryResult<InstanceRecord> {
        let entry = {
            let entries = self.entries.read().expect("registry lock poisoned");
            entries
                .get(&sample.instance_id)
                .cloned()
                .ok_or(RegistryError::InstanceNotFound(sample.instance_id))?
        };

        let base = Duration::from_secs(self.config.probe_interval_secs);
        let cap = Duration::from_secs(self.config.probe_backoff_cap_secs);

        let mut entry = entry.lock().expect("instance lock poisoned");

        if sample.success {
            entry.record.consecutive_successes = entry.record.consecutive_successes.saturating_add(1);
            entry.record.consecutive_failures = 0;
        } else {
            entry.record.consecutive_failures = entry.record.consecutive_failures.saturating_add(1);
            entry.record.consecutive_successes = 0;
        }

        let probed_at = sample.timestamp;
        entry.window.record(sample);
        entry.record.uptime_percentage = entry.window.uptime_percentage();
        entry.record.average_latency_ms = entry.window.average_latency_ms();

        let previous = entry.record.status;
        entry.record.status = next_status(
            previous,
            entry.record.consecutive_failures,
            entry.record.consecutive_successes,
            entry.record.average_latency_ms,
            &self.config.thresholds,
        );

        let interval = probe_interval_after(base, cap, entry.record.consecutive_failures);
        entry.next_probe_at = probed_at
            + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::seconds(
                self.config.probe_backoff_cap_secs as i64,
            ));

        if entry.record.status != previous {
            self.metrics.increment_status_transitions();
            Logger::warn(
                "INSTANCE_STATUS_CHANGED",
                &[
                    ("id", &entry.record.id.to_string()),
                    ("url", &entry.record.url),
                    ("from", previous.as_str()),
                    ("to", entry.record.status.as_str()),
                ],
            );
        }

        Ok(entry.record.clone())
    }

    fn persist(&self) -> RegistryResult<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let records = self.snapshot();
        let content = serde_json::to_string_pretty(&records)
            .map_err(|e| RegistryError::StorageError(format!("Failed to serialize registry: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| RegistryError::StorageError(format!("Failed to write registry snapshot: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InstanceStatus;

    fn registry() -> InstanceRegistry {
        InstanceRegistry::new(RegistryConfig::default(), Arc::new(MetricsRegistry::new())).unwrap()
    }

    fn ok_sample(id: Uuid, latency_ms: u64) -> HealthCheckSample {
        HealthCheckSample::ok(id, Utc::now(), latency_ms)
    }

    fn failed_sample(id: Uuid) -> HealthCheckSample {
        HealthCheckSample::failed(id, Utc::now(), 0, "connection refused")
    }

    #[test]
    fn test_register_allocates_online_record() {
        let registry = registry();
        let record = registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        assert_eq!(record.status, InstanceStatus::Online);
        assert_eq!(record.url, "http://replica-a:7800");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_url_rejected_without_mutation() {
        let registry = registry();
        registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        let err = registry
            .register("http://replica-a:7800", InstanceMetadata::default())
            .unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateUrl(_)));
        assert_eq!(err.status_code(), 409);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_trailing_slash_does_not_evade_uniqueness() {
        let registry = registry();
        registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        let err = registry
            .register("http://replica-a:7800/", InstanceMetadata::default())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateUrl(_)));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.register("replica-a:7800", InstanceMetadata::default()),
            Err(RegistryError::InvalidUrl(_))
        ));
        assert!(matches!(
            registry.register("", InstanceMetadata::default()),
            Err(RegistryError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_deregister_removes_and_frees_url() {
        let registry = registry();
        let record = registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        registry.deregister(record.id).unwrap();
        assert!(registry.is_empty());

        // The url can be registered again
        assert!(registry.register("http://replica-a:7800", InstanceMetadata::default()).is_ok());
    }

    #[test]
    fn test_deregister_unknown_id() {
        let registry = registry();
        let err = registry.deregister(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, RegistryError::InstanceNotFound(_)));
    }

    #[test]
    fn test_record_sample_updates_rolling_metrics() {
        let registry = registry();
        let record = registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        registry.record_sample(ok_sample(record.id, 10)).unwrap();
        let updated = registry.record_sample(ok_sample(record.id, 30)).unwrap();

        assert_eq!(updated.average_latency_ms, 20.0);
        assert_eq!(updated.uptime_percentage, 100.0);
        assert_eq!(updated.consecutive_successes, 2);
    }

    #[test]
    fn test_failures_drive_degraded_then_offline() {
        let registry = registry();
        let record = registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        let mut latest = record.clone();
        for _ in 0..3 {
            latest = registry.record_sample(failed_sample(record.id)).unwrap();
        }
        assert_eq!(latest.status, InstanceStatus::Degraded);

        for _ in 3..10 {
            latest = registry.record_sample(failed_sample(record.id)).unwrap();
        }
        assert_eq!(latest.status, InstanceStatus::Offline);

        // Offline instances remain registered and visible
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(record.id).unwrap().status, InstanceStatus::Offline);
    }

    #[test]
    fn test_recovery_needs_consecutive_successes() {
        let registry = registry();
        let record = registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        for _ in 0..3 {
            registry.record_sample(failed_sample(record.id)).unwrap();
        }

        let after_one = registry.record_sample(ok_sample(record.id, 10)).unwrap();
        assert_eq!(after_one.status, InstanceStatus::Degraded);

        let after_two = registry.record_sample(ok_sample(record.id, 10)).unwrap();
        assert_eq!(after_two.status, InstanceStatus::Online);
    }

    #[test]
    fn test_probe_backoff_pushes_next_probe_out() {
        let registry = registry();
        let record = registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap();

        let now = Utc::now();
        registry.record_sample(HealthCheckSample::failed(record.id, now, 0, "refused")).unwrap();

        // One failure: next probe 2x base away, so nothing is due at base
        let due_soon = registry.due_instances(now + chrono::Duration::seconds(61));
        assert!(due_soon.is_empty());

        let due_later = registry.due_instances(now + chrono::Duration::seconds(121));
        assert_eq!(due_later.len(), 1);
    }

    #[test]
    fn test_sample_for_unknown_instance() {
        let registry = registry();
        let err = registry.record_sample(ok_sample(Uuid::new_v4(), 10)).unwrap_err();
        assert!(matches!(err, RegistryError::InstanceNotFound(_)));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances.json");
        let metrics = Arc::new(MetricsRegistry::new());

        let first_id = {
            let registry = InstanceRegistry::with_persistence(
                RegistryConfig::default(),
                Arc::clone(&metrics),
                path.clone(),
            )
            .unwrap();
            registry.register("http://replica-a:7800", InstanceMetadata::default()).unwrap().id
        };

        let reopened =
            InstanceRegistry::with_persistence(RegistryConfig::default(), metrics, path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get(first_id).is_some());

        // Sequence counter resumes past the loaded records
        let next = reopened.register("http://replica-b:7800", InstanceMetadata::default()).unwrap();
        assert!(next.registration_seq > reopened.get(first_id).unwrap().registration_seq);
    }
}
