//! Instance records and the status state machine
//!
//! Status is never assigned directly: [`next_status`] derives it from the
//! consecutive-outcome counters, the rolling latency, and the configured
//! thresholds, so a fixed probe history always reproduces the same status
//! sequence.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::StatusThresholds;

/// Health status of a registered instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Serving normally
    Online,
    /// Reachable but failing or slow; still discoverable when configured
    Degraded,
    /// Unreachable; excluded from discovery, kept for operator visibility
    Offline,
}

impl InstanceStatus {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Online => "online",
            InstanceStatus::Degraded => "degraded",
            InstanceStatus::Offline => "offline",
        }
    }
}

/// Operator-supplied metadata at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    /// Where this instance runs (free-form, e.g. "eu-west")
    #[serde(default)]
    pub location: Option<String>,

    /// Who operates it
    #[serde(default)]
    pub owner: Option<String>,

    /// Software version it reports
    #[serde(default)]
    pub version: Option<String>,
}

/// One registered instance.
///
/// Created at registration, mutated only by the health monitor, removed
/// only by explicit deregistration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Opaque unique identifier
    pub id: Uuid,

    /// Probe target base url; unique across the registry
    pub url: String,

    /// Where this instance runs
    pub location: Option<String>,

    /// Who operates it
    pub owner: Option<String>,

    /// Software version it reports
    pub version: Option<String>,

    /// Derived health status
    pub status: InstanceStatus,

    /// Rolling share of successful probes, 0–100
    pub uptime_percentage: f64,

    /// Rolling mean latency of successful probes
    pub average_latency_ms: f64,

    /// Consecutive failed probes
    pub consecutive_failures: u32,

    /// Consecutive successful probes
    pub consecutive_successes: u32,

    /// When this instance registered
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub registered_at: DateTime<Utc>,

    /// Registration order, the final ranking tie-breaker
    pub registration_seq: u64,
}

impl InstanceRecord {
    /// A fresh record with zeroed counters, starting online.
    pub fn new(id: Uuid, url: String, metadata: InstanceMetadata, registration_seq: u64) -> Self {
        Self {
            id,
            url,
            location: metadata.location,
            owner: metadata.owner,
            version: metadata.version,
            status: InstanceStatus::Online,
            uptime_percentage: 100.0,
            average_latency_ms: 0.0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            registered_at: Utc::now(),
            registration_seq,
        }
    }
}

/// Derive the next status from probe history.
///
/// Transitions:
/// - any → offline at `offline_failures` consecutive failures
/// - online/degraded → degraded at `degraded_failures` consecutive
///   failures, or online → degraded when rolling latency crosses the
///   threshold
/// - degraded/offline → online only after `recovery_successes`
///   consecutive successes (and acceptable latency)
pub fn next_status(
    current: InstanceStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    average_latency_ms: f64,
    thresholds: &StatusThresholds,
) -> InstanceStatus {
    if consecutive_failures >= thresholds.offline_failures {
        return InstanceStatus::Offline;
    }

    if consecutive_failures >= thresholds.degraded_failures {
        // Not failed enough to go offline; offline stays offline until
        // it strings successes together
        return match current {
            InstanceStatus::Offline => InstanceStatus::Offline,
            _ => InstanceStatus::Degraded,
        };
    }

    match current {
        InstanceStatus::Online => {
            if average_latency_ms > thresholds.degraded_latency_ms {
                InstanceStatus::Degraded
            } else {
                InstanceStatus::Online
            }
        }
        InstanceStatus::Degraded | InstanceStatus::Offline => {
            if consecutive_successes >= thresholds.recovery_successes {
                if average_latency_ms > thresholds.degraded_latency_ms {
                    InstanceStatus::Degraded
                } else {
                    InstanceStatus::Online
                }
            } else {
                current
            }
        }
    }
}

/// Probe interval for an instance given its failure streak.
///
/// Doubles per consecutive failure so degraded instances are checked less
/// often, capped.
pub fn probe_interval_after(base: Duration, cap: Duration, consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.min(16);
    let factor = 1u32 << exponent;
    base.saturating_mul(factor).min(cap)
}
