//! Sync Apply Tests
//!
//! End-to-end pull cycles against a live source endpoint:
//! - a signed batch applies and advances the cursor to the newest record
//! - a tampered batch leaves state and cursor untouched
//! - re-applying an identical batch is a no-op in effect

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use mirrornet::http_server::{key_routes, sync_routes};
use mirrornet::integrity::{KeyStore, PayloadSigner, SourceKey};
use mirrornet::observability::MetricsRegistry;
use mirrornet::source::SourceService;
use mirrornet::store::{Record, TableStore};
use mirrornet::sync::{CursorStore, SyncConfig, SyncEngine, SyncErrorKind, SyncStatus};
use serde_json::json;
use tokio::net::TcpListener;

fn ts(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap()
}

fn record(id: &str, millis: i64, name: &str) -> Record {
    Record {
        id: id.to_string(),
        updated_at: ts(millis),
        fields: json!({"name": name}),
    }
}

/// Serve a router on an ephemeral port, returning its base url.
async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn serve_source(service: Arc<SourceService>) -> String {
    let router = Router::new()
        .merge(sync_routes(Arc::clone(&service)))
        .merge(key_routes(service));
    serve(router).await
}

struct Replica {
    engine: SyncEngine,
    store: Arc<TableStore>,
    metrics: Arc<MetricsRegistry>,
}

fn replica(source_url: &str) -> Replica {
    let store = Arc::new(TableStore::new());
    let metrics = Arc::new(MetricsRegistry::new());

    let mut config = SyncConfig::new(source_url, vec!["items".to_string()]);
    config.pull_timeout_secs = 5;

    let engine = SyncEngine::new(
        config,
        Arc::new(KeyStore::new()),
        Arc::clone(&store),
        Arc::new(CursorStore::in_memory()),
        Arc::clone(&metrics),
    )
    .unwrap();

    Replica { engine, store, metrics }
}

// =============================================================================
// Committed Pull
// =============================================================================

/// Two upserts and one deletion, valid signature: local state gains the
/// records, loses the deleted id, and the cursor lands on the newest
/// record timestamp.
#[tokio::test]
async fn test_signed_batch_applies_and_advances_cursor() {
    let service = Arc::new(SourceService::new(PayloadSigner::new(SourceKey::generate("k"))));
    service.record_upsert("items", record("a", 1_000, "first"));
    service.record_upsert("items", record("b", 2_000, "second"));
    service.record_delete("items", "stale", ts(1_500));

    let url = serve_source(Arc::clone(&service)).await;
    let replica = replica(&url);

    // The replica already mirrors the record that will be deleted
    replica
        .store
        .apply("items", &[record("stale", 500, "old")], &[])
        .unwrap();

    let outcome = replica.engine.sync_table_once("items").await.unwrap();

    assert_eq!(outcome.upserted, 2);
    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.cursor, Some(ts(2_000)));

    assert_eq!(replica.store.get("items", "a").unwrap().fields["name"], "first");
    assert_eq!(replica.store.get("items", "b").unwrap().fields["name"], "second");
    assert!(replica.store.get("items", "stale").is_none());

    let cursor = replica.engine.cursors().get("items");
    assert_eq!(cursor.status, SyncStatus::Idle);
    assert_eq!(cursor.last_sync_timestamp, Some(ts(2_000)));
}

/// A second pull after commit fetches only newer changes; with nothing
/// new, state and cursor stay put.
#[tokio::test]
async fn test_incremental_pull_is_idempotent() {
    let service = Arc::new(SourceService::new(PayloadSigner::new(SourceKey::generate("k"))));
    service.record_upsert("items", record("a", 1_000, "first"));

    let url = serve_source(Arc::clone(&service)).await;
    let replica = replica(&url);

    replica.engine.sync_table_once("items").await.unwrap();
    let state_after_first = replica.store.snapshot("items");
    let cursor_after_first = replica.engine.cursors().get("items");

    let outcome = replica.engine.sync_table_once("items").await.unwrap();

    assert_eq!(outcome.upserted, 0);
    assert_eq!(replica.store.snapshot("items"), state_after_first);
    assert_eq!(
        replica.engine.cursors().get("items").last_sync_timestamp,
        cursor_after_first.last_sync_timestamp
    );
}

/// Replaying the same batch through the store yields identical state.
#[tokio::test]
async fn test_reapplied_batch_is_noop() {
    let service = Arc::new(SourceService::new(PayloadSigner::new(SourceKey::generate("k"))));
    service.record_upsert("items", record("a", 1_000, "first"));
    service.record_delete("items", "b", ts(1_200));

    let url = serve_source(Arc::clone(&service)).await;
    let replica = replica(&url);

    replica.engine.sync_table_once("items").await.unwrap();
    let first = replica.store.snapshot("items");

    // Same changeset content applied again, directly
    let cs = service.changeset("items", None);
    replica.store.apply("items", &cs.upserted, &cs.deleted).unwrap();

    assert_eq!(replica.store.snapshot("items"), first);
}

/// Later changes at the source arrive on the next pull.
#[tokio::test]
async fn test_second_pull_picks_up_new_changes() {
    let service = Arc::new(SourceService::new(PayloadSigner::new(SourceKey::generate("k"))));
    service.record_upsert("items", record("a", 1_000, "first"));

    let url = serve_source(Arc::clone(&service)).await;
    let replica = replica(&url);

    replica.engine.sync_table_once("items").await.unwrap();

    service.record_upsert("items", record("b", 5_000, "late"));
    service.record_delete("items", "a", ts(6_000));

    let outcome = replica.engine.sync_table_once("items").await.unwrap();

    assert_eq!(outcome.upserted, 1);
    assert_eq!(outcome.deleted, 1);
    assert!(replica.store.get("items", "a").is_none());
    assert!(replica.store.get("items", "b").is_some());
    assert_eq!(
        replica.engine.cursors().get("items").last_sync_timestamp,
        Some(ts(5_000))
    );
}

// =============================================================================
// Rejected Pull
// =============================================================================

/// The same batch with tampered content: nothing applies, the cursor keeps
/// its value, and the failure lands in the cursor record and the
/// verification-failure counter.
#[tokio::test]
async fn test_tampered_batch_leaves_state_unchanged() {
    use axum::extract::Path;
    use axum::routing::get;
    use axum::Json;

    let service = Arc::new(SourceService::new(PayloadSigner::new(SourceKey::generate("k"))));
    service.record_upsert("items", record("a", 1_000, "first"));

    // Sign honestly, then tamper with the content afterwards
    let mut tampered = service.changeset("items", None);
    tampered.upserted[0].fields = json!({"name": "forged"});

    let router = Router::new()
        .route(
            "/sync/:table",
            get(move |Path(_table): Path<String>| {
                let body = tampered.clone();
                async move { Json(body) }
            }),
        )
        .merge(key_routes(service));
    let url = serve(router).await;

    let replica = replica(&url);
    let err = replica.engine.sync_table_once("items").await.unwrap_err();

    assert_eq!(err.kind, SyncErrorKind::Verification);
    assert!(replica.store.is_empty("items"));

    let cursor = replica.engine.cursors().get("items");
    assert_eq!(cursor.status, SyncStatus::Failed);
    assert_eq!(cursor.last_sync_timestamp, None);
    assert!(cursor.error_message.is_some());

    assert_eq!(replica.metrics.snapshot().verification_failures, 1);
    assert_eq!(replica.metrics.snapshot().changesets_applied, 0);
}

/// A batch for the wrong table is rejected even with a valid signature.
#[tokio::test]
async fn test_cross_table_batch_rejected() {
    use axum::extract::Path;
    use axum::routing::get;
    use axum::Json;

    let service = Arc::new(SourceService::new(PayloadSigner::new(SourceKey::generate("k"))));
    service.record_upsert("reviews", record("r-1", 1_000, "nice"));

    // Honestly signed, but for another table than the one requested
    let misdirected = service.changeset("reviews", None);

    let router = Router::new()
        .route(
            "/sync/:table",
            get(move |Path(_table): Path<String>| {
                let body = misdirected.clone();
                async move { Json(body) }
            }),
        )
        .merge(key_routes(service));
    let url = serve(router).await;

    let replica = replica(&url);
    let err = replica.engine.sync_table_once("items").await.unwrap_err();

    assert_eq!(err.kind, SyncErrorKind::Verification);
    assert!(replica.store.is_empty("items"));
}
