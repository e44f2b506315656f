//! Sync engine
//!
//! One pull cycle per table: read cursor, pull, verify, apply, advance.
//! The cursor advances only after the apply transaction commits; every
//! failure path leaves it unchanged.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::backoff::Backoff;
use super::config::SyncConfig;
use super::cursor::CursorStore;
use super::errors::{SyncError, SyncResult};
use super::source_client::SourceClient;
use crate::integrity::{KeyStore, PayloadVerifier, VerifierConfig};
use crate::observability::{Logger, MetricsRegistry};
use crate::store::TableStore;

/// Result of one committed pull cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Table that synced
    pub table: String,
    /// Records upserted
    pub upserted: usize,
    /// Record ids deleted
    pub deleted: usize,
    /// Cursor position after commit
    pub cursor: Option<DateTime<Utc>>,
}

/// Replica-side sync engine.
///
/// Holds everything one replica needs to mirror its configured tables:
/// the source client, the verifier over the injected key store, the local
/// dataset, and the cursor store.
pub struct SyncEngine {
    client: SourceClient,
    verifier: PayloadVerifier,
    store: Arc<TableStore>,
    cursors: Arc<CursorStore>,
    config: SyncConfig,
    metrics: Arc<MetricsRegistry>,
    keys_refreshed_at: Mutex<Option<Instant>>,
}

impl SyncEngine {
    /// Create an engine from a validated configuration.
    pub fn new(
        config: SyncConfig,
        keys: Arc<KeyStore>,
        store: Arc<TableStore>,
        cursors: Arc<CursorStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let client = SourceClient::new(
            &config.source_url,
            Duration::from_secs(config.pull_timeout_secs),
        )?;
        let verifier = PayloadVerifier::new(
            keys,
            VerifierConfig {
                max_signature_age_secs: config.max_signature_age_secs,
            },
        );

        Ok(Self {
            client,
            verifier,
            store,
            cursors,
            config,
            metrics,
            keys_refreshed_at: Mutex::new(None),
        })
    }

    /// Get the cursor store.
    pub fn cursors(&self) -> &Arc<CursorStore> {
        &self.cursors
    }

    /// Fetch the source's public keys and swap them into the key store.
    pub async fn refresh_keys(&self) -> SyncResult<usize> {
        let entries = self.client.fetch_keys().await?;
        let installed = self
            .verifier
            .keys()
            .replace_with_entries(&entries)
            .map_err(|e| SyncError::storage(e.to_string()))?;

        let mut refreshed_at = self.keys_refreshed_at.lock().expect("key refresh lock poisoned");
        *refreshed_at = Some(Instant::now());

        self.metrics.increment_key_refreshes();
        Logger::info("KEYS_REFRESHED", &[("installed", &installed.to_string())]);
        Ok(installed)
    }

    /// Refresh keys if the cache TTL has lapsed (or nothing is cached yet).
    async fn ensure_keys_fresh(&self) -> SyncResult<()> {
        let ttl = Duration::from_secs(self.config.key_cache_ttl_secs);
        let stale = {
            let refreshed_at = self.keys_refreshed_at.lock().expect("key refresh lock poisoned");
            match *refreshed_at {
                None => true,
                Some(at) => at.elapsed() >= ttl,
            }
        };

        if stale {
            self.refresh_keys().await?;
        }
        Ok(())
    }

    /// Run one pull cycle for a table.
    ///
    /// On failure the cursor keeps its value, the table is marked failed
    /// with the error message, and the error is returned for the caller's
    /// backoff.
    pub async fn sync_table_once(&self, table: &str) -> SyncResult<SyncOutcome> {
        self.cursors.begin(table);

        match self.run_cycle(table).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if e.is_verification() {
                    self.metrics.increment_verification_failures();
                    Logger::error(
                        "SYNC_VERIFICATION_FAILED",
                        &[("table", table), ("error", &e.to_string())],
                    );
                } else {
                    self.metrics.increment_sync_failures();
                    Logger::warn("SYNC_FAILED", &[("table", table), ("error", &e.to_string())]);
                }

                if let Err(persist) = self.cursors.fail(table, e.to_string()) {
                    Logger::error(
                        "CURSOR_PERSIST_FAILED",
                        &[("table", table), ("error", &persist.to_string())],
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, table: &str) -> SyncResult<SyncOutcome> {
        let since = self.cursors.get(table).last_sync_timestamp;

        self.ensure_keys_fresh().await?;

        let changeset = self.client.pull(table, since).await?;
        self.metrics.increment_changesets_pulled();

        if changeset.table_name != table {
            return Err(SyncError::verification(format!(
                "Changeset is for table {}, requested {}",
                changeset.table_name, table
            )));
        }

        // A signature under an unrotated-in key id gets one forced key
        // refresh before the batch is rejected.
        if let Err(e) = self.verifier.verify(&changeset, &changeset.signature) {
            if e.is_unknown_key() {
                self.refresh_keys().await?;
                self.verifier
                    .verify(&changeset, &changeset.signature)
                    .map_err(|e| SyncError::verification(e.to_string()))?;
            } else {
                return Err(SyncError::verification(e.to_string()));
            }
        }

        let outcome = self
            .store
            .apply(table, &changeset.upserted, &changeset.deleted)
            .map_err(|e| SyncError::apply(e.to_string()))?;

        let cursor = self.cursors.commit(table, outcome.max_timestamp)?;

        self.metrics.increment_changesets_applied();
        self.metrics.add_records_upserted(outcome.upserted as u64);
        self.metrics.add_records_deleted(outcome.deleted as u64);

        Logger::info(
            "SYNC_COMMITTED",
            &[
                ("table", table),
                ("upserted", &outcome.upserted.to_string()),
                ("deleted", &outcome.deleted.to_string()),
                (
                    "cursor",
                    &cursor
                        .last_sync_timestamp
                        .map(|t| t.timestamp_millis().to_string())
                        .unwrap_or_else(|| "none".to_string()),
                ),
            ],
        );

        Ok(SyncOutcome {
            table: table.to_string(),
            upserted: outcome.upserted,
            deleted: outcome.deleted,
            cursor: cursor.last_sync_timestamp,
        })
    }

    /// Spawn one periodic pull task per configured table.
    ///
    /// Tasks run until the shutdown signal flips; a slow or failing table
    /// never delays the others.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.config
            .tables
            .clone()
            .into_iter()
            .map(|table| {
                let engine = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    engine.run_table_loop(table, shutdown).await;
                })
            })
            .collect()
    }

    async fn run_table_loop(&self, table: String, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(
            Duration::from_secs(self.config.backoff_base_secs),
            Duration::from_secs(self.config.backoff_cap_secs),
        );

        // Startup jitter spreads the first pulls across replicas
        let mut delay = self.startup_delay();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    match self.sync_table_once(&table).await {
                        Ok(_) => {
                            backoff.reset();
                            delay = self.jittered_interval();
                        }
                        Err(_) => {
                            backoff.record_failure();
                            delay = backoff.delay();
                        }
                    }
                }
                _ = shutdown.changed() => {
                    Logger::info("SYNC_TASK_STOPPED", &[("table", &table)]);
                    break;
                }
            }
        }
    }

    fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.random_jitter_secs())
    }

    fn jittered_interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs + self.random_jitter_secs())
    }

    fn random_jitter_secs(&self) -> u64 {
        if self.config.jitter_secs == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.jitter_secs)
        }
    }
}
