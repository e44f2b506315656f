//! Client-side instance selection and failover
//!
//! Clients query the registry for a ranked instance list, cache it with a
//! TTL, and walk it on failure: next-ranked instance first, the
//! authoritative source last.

mod failover;

pub use failover::{execute_with_failover, failover_plan};

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

use crate::observability::Logger;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client-side errors
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The registry's discovery endpoint could not be queried
    #[error("Discovery query failed: {0}")]
    Discovery(String),

    /// Every instance and the source failed
    #[error("All instances and the source failed; last error: {0}")]
    Exhausted(String),
}

/// One instance as served by the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoveredInstance {
    /// Instance identifier
    pub id: uuid::Uuid,
    /// Base url to issue requests against
    pub url: String,
    /// Operator-reported location
    #[serde(default)]
    pub location: Option<String>,
    /// Health status at ranking time
    pub status: String,
    /// Rolling mean probe latency
    pub average_latency_ms: f64,
    /// Rolling probe success percentage
    pub uptime_percentage: f64,
}

#[derive(Debug)]
struct CachedInstances {
    fetched_at: Instant,
    instances: Vec<DiscoveredInstance>,
}

impl CachedInstances {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Discovery-backed client with TTL caching and ranked failover.
pub struct DiscoveryClient {
    http: reqwest::Client,
    registry_url: String,
    source_url: String,
    ttl: Duration,
    cache: Mutex<Option<CachedInstances>>,
}

impl DiscoveryClient {
    /// Create a client against a registry and an authoritative source.
    pub fn new(
        registry_url: impl Into<String>,
        source_url: impl Into<String>,
        ttl: Duration,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ClientError::Discovery(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
            source_url: source_url.into().trim_end_matches('/').to_string(),
            ttl,
            cache: Mutex::new(None),
        })
    }

    /// The ranked instances, from cache while fresh.
    pub async fn instances(&self) -> ClientResult<Vec<DiscoveredInstance>> {
        {
            let cache = self.cache.lock().expect("instance cache lock poisoned");
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(self.ttl) {
                    return Ok(cached.instances.clone());
                }
            }
        }

        let instances = self.fetch_instances().await?;

        let mut cache = self.cache.lock().expect("instance cache lock poisoned");
        *cache = Some(CachedInstances {
            fetched_at: Instant::now(),
            instances: instances.clone(),
        });
        Ok(instances)
    }

    /// Drop the cached list, forcing a re-query on next use.
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().expect("instance cache lock poisoned");
        *cache = None;
    }

    /// The current failover plan: ranked instance urls, source last.
    pub async fn plan(&self) -> ClientResult<Vec<String>> {
        let instances = self.instances().await?;
        Ok(failover_plan(&instances, &self.source_url))
    }

    /// Run a request with ranked failover.
    ///
    /// `attempt` is called with each base url in plan order until one
    /// succeeds. Exhausting the plan invalidates the cached list so the
    /// next call re-queries discovery.
    pub async fn execute<T, F, Fut>(&self, attempt: F) -> ClientResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let plan = self.plan().await?;
        match execute_with_failover(&plan, attempt).await {
            Ok(value) => Ok(value),
            Err(e) => {
                Logger::warn("FAILOVER_EXHAUSTED", &[("error", &e.to_string())]);
                self.invalidate();
                Err(e)
            }
        }
    }

    async fn fetch_instances(&self) -> ClientResult<Vec<DiscoveredInstance>> {
        #[derive(Deserialize)]
        struct InstancesBody {
            instances: Vec<DiscoveredInstance>,
        }

        let url = format!("{}/instances", self.registry_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Discovery(format!(
                "Discovery returned HTTP {}",
                response.status()
            )));
        }

        let body: InstancesBody = response
            .json()
            .await
            .map_err(|e| ClientError::Discovery(format!("Malformed discovery response: {}", e)))?;

        Ok(body.instances)
    }
}
