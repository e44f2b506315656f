//! Probe samples and rolling metrics
//!
//! Samples are retained only as long as the rolling window needs them.
//! Given a fixed sample sequence the derived metrics are identical across
//! runs.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckSample {
    /// Instance probed
    pub instance_id: Uuid,

    /// When the probe completed
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Round-trip time measured by the registry
    pub latency_ms: u64,

    /// Whether the probe succeeded
    pub success: bool,

    /// Failure detail, if any
    pub error: Option<String>,
}

impl HealthCheckSample {
    /// A successful sample.
    pub fn ok(instance_id: Uuid, timestamp: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            instance_id,
            timestamp,
            latency_ms,
            success: true,
            error: None,
        }
    }

    /// A failed sample.
    pub fn failed(
        instance_id: Uuid,
        timestamp: DateTime<Utc>,
        latency_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            instance_id,
            timestamp,
            latency_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Fixed-capacity window of recent samples for one instance.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<HealthCheckSample>,
}

impl SampleWindow {
    /// Create a window retaining at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Record a sample, evicting the oldest beyond capacity.
    pub fn record(&mut self, sample: HealthCheckSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check whether the window has no samples yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Rolling uptime as a percentage of retained probes.
    ///
    /// An empty window reports 100: a freshly registered instance has not
    /// failed yet.
    pub fn uptime_percentage(&self) -> f64 {
        if self.samples.is_empty() {
            return 100.0;
        }
        let successes = self.samples.iter().filter(|s| s.success).count();
        successes as f64 * 100.0 / self.samples.len() as f64
    }

    /// Rolling mean latency over successful probes.
    ///
    /// Failed probes measure unavailability, not speed, so they are
    /// excluded. No successes yet reports 0.
    pub fn average_latency_ms(&self) -> f64 {
        let successes: Vec<u64> = self
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.latency_ms)
            .collect();

        if successes.is_empty() {
            return 0.0;
        }
        successes.iter().sum::<u64>() as f64 / successes.len() as f64
    }
}
