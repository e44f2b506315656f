//! Health probe client

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::errors::{RegistryError, RegistryResult};
use super::samples::HealthCheckSample;

/// Shape of an instance's `GET /health` body.
#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
    #[allow(dead_code)]
    version: Option<String>,
}

/// Probes instance health endpoints.
///
/// Latency is measured registry-side (request round-trip), never taken
/// from the instance's own report. A probe never errors to its caller:
/// every outcome, including timeouts, becomes a sample.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    http: reqwest::Client,
}

impl ProbeClient {
    /// Create a probe client with the given per-probe timeout.
    pub fn new(timeout: Duration) -> RegistryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RegistryError::StorageError(format!("Failed to build probe client: {}", e)))?;

        Ok(Self { http })
    }

    /// Probe one instance and return the outcome as a sample.
    pub async fn probe(&self, instance_id: Uuid, url: &str) -> HealthCheckSample {
        let target = format!("{}/health", url.trim_end_matches('/'));
        let started = Instant::now();

        let outcome = self.http.get(&target).send().await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let completed_at = Utc::now();

        match outcome {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthBody>().await {
                    Ok(body) if body.status == "ok" => {
                        HealthCheckSample::ok(instance_id, completed_at, latency_ms)
                    }
                    Ok(body) => HealthCheckSample::failed(
                        instance_id,
                        completed_at,
                        latency_ms,
                        format!("Instance reported status {}", body.status),
                    ),
                    Err(e) => HealthCheckSample::failed(
                        instance_id,
                        completed_at,
                        latency_ms,
                        format!("Malformed health body: {}", e),
                    ),
                }
            }
            Ok(response) => HealthCheckSample::failed(
                instance_id,
                completed_at,
                latency_ms,
                format!("Health endpoint returned HTTP {}", response.status()),
            ),
            Err(e) => HealthCheckSample::failed(instance_id, completed_at, latency_ms, e.to_string()),
        }
    }
}
