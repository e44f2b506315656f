//! Registry Subsystem
//!
//! Tracks every registered instance, probes each one continuously, and
//! keeps rolling health metrics that discovery ranks by.
//!
//! Invariants:
//! - Instance urls are unique
//! - Status is a pure function of recent probe history and the configured
//!   thresholds; nothing sets it directly
//! - Instances are removed only by explicit deregistration; offline
//!   instances stay visible to operators
//! - Rolling-metric updates are a per-instance critical section, not a
//!   registry-wide lock

mod config;
mod errors;
mod instance;
mod monitor;
mod probe;
mod registry;
mod samples;

pub use config::{RegistryConfig, StatusThresholds};
pub use errors::{RegistryError, RegistryResult};
pub use instance::{next_status, probe_interval_after, InstanceMetadata, InstanceRecord, InstanceStatus};
pub use monitor::HealthMonitor;
pub use probe::ProbeClient;
pub use registry::InstanceRegistry;
pub use samples::{HealthCheckSample, SampleWindow};
