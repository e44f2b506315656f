//! Observability Routes

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::Value;

use crate::observability::MetricsRegistry;

/// Create observability routes over the process metrics registry
pub fn observability_routes(metrics: Arc<MetricsRegistry>) -> Router {
    Router::new()
        .route("/observability/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    let metrics_json: Value = serde_json::from_str(&metrics.to_json())
        .unwrap_or_else(|_| serde_json::json!({"error": "Failed to serialize metrics"}));

    (StatusCode::OK, Json(metrics_json))
}
