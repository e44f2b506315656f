//! HTTP Server
//!
//! Combines the role's endpoint routers behind one listener with CORS and
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use super::config::HttpServerConfig;
use super::health_routes::health_routes;
use super::instance_routes::{instance_routes, InstanceApiState};
use super::key_routes::key_routes;
use super::observability_routes::observability_routes;
use super::sync_routes::sync_routes;
use crate::observability::{Logger, MetricsRegistry};
use crate::source::SourceService;

/// HTTP server for one mirrornet node.
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Build a server for a node's role.
    ///
    /// Health and metrics are served on every role; the sync and key
    /// endpoints only where a source service exists, the instance
    /// endpoints only where a registry exists.
    pub fn build(
        config: HttpServerConfig,
        metrics: Arc<MetricsRegistry>,
        source: Option<Arc<SourceService>>,
        instance_api: Option<Arc<InstanceApiState>>,
    ) -> Self {
        let mut router = Router::new()
            .merge(health_routes())
            .merge(observability_routes(metrics));

        if let Some(source) = source {
            router = router
                .merge(sync_routes(Arc::clone(&source)))
                .merge(key_routes(source));
        }

        if let Some(state) = instance_api {
            router = router.merge(instance_routes(state));
        }

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            use tower_http::cors::AllowOrigin;
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let router = router.layer(cors);
        Self { config, router }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until the shutdown signal flips.
    pub async fn start(self, mut shutdown: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{}", e)))?;

        let listener = TcpListener::bind(addr).await?;
        Logger::info("HTTP_SERVER_STARTED", &[("addr", &addr.to_string())]);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        Logger::info("HTTP_SERVER_STOPPED", &[("addr", &addr.to_string())]);
        Ok(())
    }
}
