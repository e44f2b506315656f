//! mirrornet - A signed-replication and instance-discovery mesh for
//! community-run read replicas
//!
//! One authoritative source, many independently-operated replicas:
//! - Replicas pull signed changesets per table and apply them atomically
//! - Every batch is verified before it touches replica state
//! - A registry probes instances and serves latency-ranked discovery

pub mod cli;
pub mod client;
pub mod discovery;
pub mod http_server;
pub mod integrity;
pub mod observability;
pub mod registry;
pub mod source;
pub mod store;
pub mod sync;
