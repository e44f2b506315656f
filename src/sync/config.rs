//! Sync Configuration

use serde::{Deserialize, Serialize};

use super::errors::{SyncError, SyncResult};

/// Replica sync configuration.
///
/// Loaded from the node config file; immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the authoritative source
    pub source_url: String,

    /// Tables this replica mirrors
    pub tables: Vec<String>,

    /// Seconds between pulls per table (default: 3600)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum random jitter added to each interval, in seconds
    /// (default: 300). Spreads replica pulls so they do not hit the
    /// source in lockstep.
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,

    /// Per-request timeout for pulls and key fetches (default: 30)
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,

    /// Base retry delay after a failed pull (default: 60)
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Maximum retry delay (default: 3600)
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,

    /// Verification skew window in seconds (default: 900)
    #[serde(default = "default_max_signature_age_secs")]
    pub max_signature_age_secs: u64,

    /// How long fetched public keys stay fresh, in seconds (default: 3600)
    #[serde(default = "default_key_cache_ttl_secs")]
    pub key_cache_ttl_secs: u64,
}

fn default_interval_secs() -> u64 {
    3600
}
fn default_jitter_secs() -> u64 {
    300
}
fn default_pull_timeout_secs() -> u64 {
    30
}
fn default_backoff_base_secs() -> u64 {
    60
}
fn default_backoff_cap_secs() -> u64 {
    3600
}
fn default_max_signature_age_secs() -> u64 {
    900
}
fn default_key_cache_ttl_secs() -> u64 {
    3600
}

impl SyncConfig {
    /// Create a config with defaults for everything but the source and
    /// table list.
    pub fn new(source_url: impl Into<String>, tables: Vec<String>) -> Self {
        Self {
            source_url: source_url.into(),
            tables,
            interval_secs: default_interval_secs(),
            jitter_secs: default_jitter_secs(),
            pull_timeout_secs: default_pull_timeout_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            max_signature_age_secs: default_max_signature_age_secs(),
            key_cache_ttl_secs: default_key_cache_ttl_secs(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.source_url.is_empty() {
            return Err(SyncError::configuration("source_url must not be empty"));
        }
        if self.tables.is_empty() {
            return Err(SyncError::configuration("at least one table must be configured"));
        }
        if self.interval_secs == 0 {
            return Err(SyncError::configuration("interval_secs must be greater than zero"));
        }
        if self.backoff_base_secs == 0 {
            return Err(SyncError::configuration("backoff_base_secs must be greater than zero"));
        }
        if self.backoff_cap_secs < self.backoff_base_secs {
            return Err(SyncError::configuration(
                "backoff_cap_secs must be at least backoff_base_secs",
            ));
        }
        Ok(())
    }
}
