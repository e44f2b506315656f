//! HTTP Server
//!
//! Role-aware HTTP surface:
//! - `/health` on every node (the registry's probe target)
//! - `/sync/{table}` and `/public-key` on the source
//! - `/instances` registration and discovery on the registry
//! - `/observability/metrics` on every node

mod config;
mod health_routes;
mod instance_routes;
mod key_routes;
mod observability_routes;
mod server;
mod sync_routes;

pub use config::HttpServerConfig;
pub use health_routes::{health_routes, HealthResponse};
pub use instance_routes::{instance_routes, InstanceApiState};
pub use key_routes::key_routes;
pub use observability_routes::observability_routes;
pub use server::HttpServer;
pub use sync_routes::sync_routes;
