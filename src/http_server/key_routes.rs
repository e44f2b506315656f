//! Public-Key Route (source role)
//!
//! Serves every currently valid verification key so rotation never breaks
//! consumers that have not refreshed yet.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::source::SourceService;
use crate::sync::PublicKeyResponse;

/// Create the public-key route over a source service
pub fn key_routes(source: Arc<SourceService>) -> Router {
    Router::new()
        .route("/public-key", get(public_key_handler))
        .with_state(source)
}

async fn public_key_handler(State(source): State<Arc<SourceService>>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        keys: source.public_keys(),
    })
}
