//! Observability subsystem
//!
//! - Structured one-line JSON logs with deterministic field ordering
//! - Exact atomic counters for sync, verification, and probe activity
//! - No sampling, no buffering

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
