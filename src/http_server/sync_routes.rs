//! Sync Route (source role)
//!
//! `GET /sync/{table}?since=<millis>` returns everything that changed in
//! the table since the cursor timestamp, signed.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::DateTime;
use serde::Deserialize;

use crate::source::SourceService;
use crate::sync::ChangeSet;

#[derive(Debug, Deserialize)]
struct SinceQuery {
    /// Cursor timestamp in unix milliseconds; absent means "from the
    /// beginning"
    since: Option<i64>,
}

/// Create the sync route over a source service
pub fn sync_routes(source: Arc<SourceService>) -> Router {
    Router::new()
        .route("/sync/:table", get(pull_changes_handler))
        .with_state(source)
}

async fn pull_changes_handler(
    State(source): State<Arc<SourceService>>,
    Path(table): Path<String>,
    Query(query): Query<SinceQuery>,
) -> Json<ChangeSet> {
    let since = query.since.and_then(DateTime::from_timestamp_millis);
    Json(source.changeset(&table, since))
}
