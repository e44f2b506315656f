//! Instance Routes (registry role)
//!
//! Registration, deregistration, the ranked discovery listing, and the
//! operator view that includes offline instances.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discovery::{DiscoveryFilter, DiscoveryService};
use crate::registry::{InstanceMetadata, InstanceRecord, InstanceRegistry, RegistryError};

// ==================
// Shared State
// ==================

/// Registry state shared across handlers
pub struct InstanceApiState {
    pub registry: Arc<InstanceRegistry>,
    pub discovery: DiscoveryService,
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub url: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InstanceSummary {
    pub id: Uuid,
    pub url: String,
    pub location: Option<String>,
    pub status: String,
    pub average_latency_ms: f64,
    pub uptime_percentage: f64,
}

impl From<InstanceRecord> for InstanceSummary {
    fn from(record: InstanceRecord) -> Self {
        Self {
            id: record.id,
            url: record.url,
            location: record.location,
            status: record.status.as_str().to_string(),
            average_latency_ms: record.average_latency_ms,
            uptime_percentage: record.uptime_percentage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstancesResponse {
    pub instances: Vec<InstanceSummary>,
    pub total: usize,
    /// How long clients should cache this result
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct DiscoveryQuery {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub include_degraded: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn error_response(err: RegistryError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse {
            error: err.to_string(),
            code,
        }),
    )
}

// ==================
// Routes
// ==================

/// Create instance routes
pub fn instance_routes(state: Arc<InstanceApiState>) -> Router {
    Router::new()
        .route("/instances", get(list_instances_handler))
        .route("/instances", post(register_instance_handler))
        .route("/instances/all", get(list_all_instances_handler))
        .route("/instances/:id", delete(deregister_instance_handler))
        .with_state(state)
}

// ==================
// Handlers
// ==================

/// Ranked discovery listing: online (and optionally degraded) instances,
/// best first.
async fn list_instances_handler(
    State(state): State<Arc<InstanceApiState>>,
    Query(query): Query<DiscoveryQuery>,
) -> Json<InstancesResponse> {
    let filter = DiscoveryFilter {
        location: query.location,
        include_degraded: query.include_degraded,
    };

    let ranked = state.discovery.query(&filter);
    let instances: Vec<InstanceSummary> = ranked.into_iter().map(InstanceSummary::from).collect();

    Json(InstancesResponse {
        total: instances.len(),
        ttl_secs: state.discovery.ttl_secs(),
        instances,
    })
}

/// Operator view: every registered instance, offline included.
async fn list_all_instances_handler(
    State(state): State<Arc<InstanceApiState>>,
) -> Json<Vec<InstanceRecord>> {
    Json(state.registry.snapshot())
}

async fn register_instance_handler(
    State(state): State<Arc<InstanceApiState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<InstanceRecord>), (StatusCode, Json<ErrorResponse>)> {
    let metadata = InstanceMetadata {
        location: request.location,
        owner: request.owner,
        version: request.version,
    };

    state
        .registry
        .register(&request.url, metadata)
        .map(|record| (StatusCode::CREATED, Json(record)))
        .map_err(error_response)
}

async fn deregister_instance_handler(
    State(state): State<Arc<InstanceApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .registry
        .deregister(id)
        .map(|record| {
            Json(MessageResponse {
                message: format!("Instance {} deregistered", record.url),
            })
        })
        .map_err(error_response)
}
