//! Registry Configuration

use serde::{Deserialize, Serialize};

use super::errors::{RegistryError, RegistryResult};

/// Status-transition thresholds.
///
/// Recovery requires at least two consecutive successes so a single lucky
/// probe cannot flip a flapping instance back online.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusThresholds {
    /// Consecutive failures before online → degraded (default: 3)
    #[serde(default = "default_degraded_failures")]
    pub degraded_failures: u32,

    /// Consecutive failures before degraded → offline (default: 10)
    #[serde(default = "default_offline_failures")]
    pub offline_failures: u32,

    /// Consecutive successes required to return online (default: 2)
    #[serde(default = "default_recovery_successes")]
    pub recovery_successes: u32,

    /// Rolling average latency above which an online instance degrades,
    /// in milliseconds (default: 2000)
    #[serde(default = "default_degraded_latency_ms")]
    pub degraded_latency_ms: f64,
}

fn default_degraded_failures() -> u32 {
    3
}
fn default_offline_failures() -> u32 {
    10
}
fn default_recovery_successes() -> u32 {
    2
}
fn default_degraded_latency_ms() -> f64 {
    2000.0
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            degraded_failures: default_degraded_failures(),
            offline_failures: default_offline_failures(),
            recovery_successes: default_recovery_successes(),
            degraded_latency_ms: default_degraded_latency_ms(),
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base seconds between probes per instance (default: 60)
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Per-probe timeout in seconds (default: 10)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Cap on a failing instance's backed-off probe interval (default: 960)
    #[serde(default = "default_probe_backoff_cap_secs")]
    pub probe_backoff_cap_secs: u64,

    /// Maximum concurrent outbound probes (default: 8)
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    /// Probe samples retained per instance for rolling metrics
    /// (default: 50)
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,

    /// Status-transition thresholds
    #[serde(default)]
    pub thresholds: StatusThresholds,

    /// Whether discovery results include degraded instances (default: true)
    #[serde(default = "default_discovery_include_degraded")]
    pub discovery_include_degraded: bool,

    /// How long clients should cache discovery results, in seconds
    /// (default: 300)
    #[serde(default = "default_discovery_ttl_secs")]
    pub discovery_ttl_secs: u64,
}

fn default_probe_interval_secs() -> u64 {
    60
}
fn default_probe_timeout_secs() -> u64 {
    10
}
fn default_probe_backoff_cap_secs() -> u64 {
    960
}
fn default_probe_concurrency() -> usize {
    8
}
fn default_sample_window() -> usize {
    50
}
fn default_discovery_include_degraded() -> bool {
    true
}
fn default_discovery_ttl_secs() -> u64 {
    300
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            probe_backoff_cap_secs: default_probe_backoff_cap_secs(),
            probe_concurrency: default_probe_concurrency(),
            sample_window: default_sample_window(),
            thresholds: StatusThresholds::default(),
            discovery_include_degraded: default_discovery_include_degraded(),
            discovery_ttl_secs: default_discovery_ttl_secs(),
        }
    }
}

impl RegistryConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.probe_interval_secs == 0 {
            return Err(RegistryError::InvalidConfiguration(
                "probe_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.probe_backoff_cap_secs < self.probe_interval_secs {
            return Err(RegistryError::InvalidConfiguration(
                "probe_backoff_cap_secs must be at least probe_interval_secs".to_string(),
            ));
        }
        if self.probe_concurrency == 0 {
            return Err(RegistryError::InvalidConfiguration(
                "probe_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.sample_window == 0 {
            return Err(RegistryError::InvalidConfiguration(
                "sample_window must be greater than zero".to_string(),
            ));
        }
        if self.thresholds.recovery_successes < 2 {
            return Err(RegistryError::InvalidConfiguration(
                "recovery_successes must be at least 2 to dampen flapping".to_string(),
            ));
        }
        if self.thresholds.offline_failures <= self.thresholds.degraded_failures {
            return Err(RegistryError::InvalidConfiguration(
                "offline_failures must exceed degraded_failures".to_string(),
            ));
        }
        Ok(())
    }
}
