//! Health monitor
//!
//! A scheduling loop wakes once a second, collects instances whose probe
//! is due, and fans probes out through a bounded worker pool. A slow probe
//! never delays other instances; the pool caps outbound fan-out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

use super::config::RegistryConfig;
use super::errors::RegistryResult;
use super::probe::ProbeClient;
use super::registry::InstanceRegistry;
use crate::observability::{Logger, MetricsRegistry};

const SCHEDULER_TICK: Duration = Duration::from_secs(1);

/// Continuously probes every registered instance.
pub struct HealthMonitor {
    registry: Arc<InstanceRegistry>,
    probe: ProbeClient,
    metrics: Arc<MetricsRegistry>,
    permits: Arc<Semaphore>,
}

impl HealthMonitor {
    /// Create a monitor over a registry.
    pub fn new(registry: Arc<InstanceRegistry>, metrics: Arc<MetricsRegistry>) -> RegistryResult<Self> {
        let config: &RegistryConfig = registry.config();
        let probe = ProbeClient::new(Duration::from_secs(config.probe_timeout_secs))?;
        let permits = Arc::new(Semaphore::new(config.probe_concurrency));

        Ok(Self {
            registry,
            probe,
            metrics,
            permits,
        })
    }

    /// Probe one instance now and fold the outcome into the registry.
    ///
    /// Probe failures are expected steady-state behavior: they become
    /// samples, never errors.
    pub async fn probe_instance_once(&self, id: Uuid, url: &str) {
        let sample = self.probe.probe(id, url).await;

        self.metrics.increment_probes_performed();
        if !sample.success {
            self.metrics.increment_probe_failures();
            Logger::trace(
                "PROBE_FAILED",
                &[
                    ("id", &id.to_string()),
                    ("url", url),
                    ("error", sample.error.as_deref().unwrap_or("unknown")),
                ],
            );
        }

        // The instance may have been deregistered while the probe was in
        // flight; that is not an error.
        let _ = self.registry.record_sample(sample);
    }

    /// Run the scheduling loop until the shutdown signal flips.
    ///
    /// In-flight probes are abandoned on shutdown; their permits release
    /// on drop.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SCHEDULER_TICK) => {
                    let due = self.registry.due_instances(Utc::now());
                    for (id, url) in due {
                        let monitor = Arc::clone(&self);
                        let permits = Arc::clone(&self.permits);
                        tokio::spawn(async move {
                            let Ok(_permit) = permits.acquire().await else {
                                return;
                            };
                            monitor.probe_instance_once(id, &url).await;
                        });
                    }
                }
                _ = shutdown.changed() => {
                    Logger::info("HEALTH_MONITOR_STOPPED", &[]);
                    break;
                }
            }
        }
    }
}
