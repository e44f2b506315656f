//! CLI command implementations
//!
//! `init` writes a config skeleton and creates the data directory.
//! `start` boots the role's subsystems, serves HTTP, and shuts everything
//! down deterministically on interrupt: the stop signal flips, periodic
//! tasks observe it and exit, the server drains.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::args::Command;
use super::errors::{CliError, CliResult};
use crate::discovery::DiscoveryService;
use crate::http_server::{HttpServer, HttpServerConfig, InstanceApiState};
use crate::integrity::{KeyStore, PayloadSigner, PublicKeyEntry, SourceKey};
use crate::observability::{Logger, MetricsRegistry};
use crate::registry::{HealthMonitor, InstanceRegistry, RegistryConfig};
use crate::source::SourceService;
use crate::store::TableStore;
use crate::sync::{CursorStore, SyncConfig, SyncEngine};

/// Node role, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Authoritative source: signs and serves changesets
    Source,
    /// Read replica: pulls, verifies, applies
    Replica,
    /// Registry: probes instances and serves discovery
    Registry,
}

impl NodeRole {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Source => "source",
            NodeRole::Replica => "replica",
            NodeRole::Registry => "registry",
        }
    }
}

/// Node configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Role this node runs as
    pub role: NodeRole,

    /// Data directory for persisted state
    pub data_dir: String,

    /// HTTP listener configuration
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Replica sync configuration (required for replicas)
    #[serde(default)]
    pub sync: Option<SyncConfig>,

    /// Registry configuration (registry role)
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Signing key id (required for sources)
    #[serde(default)]
    pub signing_key_id: Option<String>,

    /// Signing key seed, base64 (required for sources)
    #[serde(default)]
    pub signing_seed: Option<String>,

    /// Previously valid public keys still announced during rotation
    #[serde(default)]
    pub previous_public_keys: Vec<PublicKeyEntry>,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for the configured role
    pub fn validate(&self) -> CliResult<()> {
        if self.data_dir.is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }

        match self.role {
            NodeRole::Source => {
                if self.signing_key_id.is_none() || self.signing_seed.is_none() {
                    return Err(CliError::config_error(
                        "Source requires signing_key_id and signing_seed",
                    ));
                }
            }
            NodeRole::Replica => {
                let Some(sync) = &self.sync else {
                    return Err(CliError::config_error("Replica requires a sync section"));
                };
                sync.validate()
                    .map_err(|e| CliError::config_error(e.to_string()))?;
            }
            NodeRole::Registry => {
                self.registry
                    .validate()
                    .map_err(|e| CliError::config_error(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Dispatch a parsed command.
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Init { config, role } => init(&config, &role),
        Command::Start { config } => start(&config),
    }
}

/// Write a config skeleton for the given role and create its data
/// directory. Source configs get a freshly generated signing key.
pub fn init(config_path: &Path, role: &str) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::already_initialized(&config_path.display().to_string()));
    }

    let role = match role {
        "source" => NodeRole::Source,
        "replica" => NodeRole::Replica,
        "registry" => NodeRole::Registry,
        other => {
            return Err(CliError::config_error(format!(
                "Unknown role {}; expected source, replica, or registry",
                other
            )))
        }
    };

    let data_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .join("mirrornet-data")
        .display()
        .to_string();

    let mut config = Config {
        role,
        data_dir: data_dir.clone(),
        http: HttpServerConfig::default(),
        sync: None,
        registry: RegistryConfig::default(),
        signing_key_id: None,
        signing_seed: None,
        previous_public_keys: Vec::new(),
    };

    match role {
        NodeRole::Source => {
            let key_id = format!("key-{}", Uuid::new_v4());
            let key = SourceKey::generate(&key_id);
            config.signing_key_id = Some(key_id);
            config.signing_seed = Some(key.seed_base64());
        }
        NodeRole::Replica => {
            config.sync = Some(SyncConfig::new(
                "http://localhost:7800",
                vec![
                    "companies".to_string(),
                    "products".to_string(),
                    "reviews".to_string(),
                ],
            ));
        }
        NodeRole::Registry => {}
    }

    fs::create_dir_all(&data_dir)?;
    fs::write(config_path, serde_json::to_string_pretty(&config)?)?;

    println!("Initialized {} config at {}", role.as_str(), config_path.display());
    Ok(())
}

/// Boot the node and serve until interrupted.
pub fn start(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to start runtime: {}", e)))?;

    runtime.block_on(run_node(config))
}

async fn run_node(config: Config) -> CliResult<()> {
    fs::create_dir_all(&config.data_dir)?;

    let metrics = Arc::new(MetricsRegistry::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut task_handles = Vec::new();
    let mut source_service = None;
    let mut instance_api = None;

    match config.role {
        NodeRole::Source => {
            let key_id = config.signing_key_id.as_deref().unwrap_or_default();
            let seed = config.signing_seed.as_deref().unwrap_or_default();
            let key = SourceKey::from_seed_base64(key_id, seed)
                .map_err(|e| CliError::boot_failed(e.to_string()))?;

            let service = SourceService::new(PayloadSigner::new(key));
            for entry in &config.previous_public_keys {
                service.announce_previous_key(entry.clone());
            }
            source_service = Some(Arc::new(service));
        }
        NodeRole::Replica => {
            let sync_config = config.sync.clone().expect("validated replica config");
            let cursors = CursorStore::open(Path::new(&config.data_dir).join("cursors.json"))
                .map_err(|e| CliError::boot_failed(e.to_string()))?;

            let engine = SyncEngine::new(
                sync_config,
                Arc::new(KeyStore::new()),
                Arc::new(TableStore::new()),
                Arc::new(cursors),
                Arc::clone(&metrics),
            )
            .map_err(|e| CliError::boot_failed(e.to_string()))?;

            task_handles.extend(Arc::new(engine).spawn(shutdown_rx.clone()));
        }
        NodeRole::Registry => {
            let registry = Arc::new(
                InstanceRegistry::with_persistence(
                    config.registry.clone(),
                    Arc::clone(&metrics),
                    Path::new(&config.data_dir).join("instances.json"),
                )
                .map_err(|e| CliError::boot_failed(e.to_string()))?,
            );

            let monitor = Arc::new(
                HealthMonitor::new(Arc::clone(&registry), Arc::clone(&metrics))
                    .map_err(|e| CliError::boot_failed(e.to_string()))?,
            );
            task_handles.push(tokio::spawn(monitor.run(shutdown_rx.clone())));

            let discovery = DiscoveryService::new(Arc::clone(&registry), Arc::clone(&metrics));
            instance_api = Some(Arc::new(InstanceApiState { registry, discovery }));
        }
    }

    let server = HttpServer::build(config.http.clone(), metrics, source_service, instance_api);
    let server_handle = tokio::spawn(server.start(shutdown_rx));

    Logger::info(
        "NODE_STARTED",
        &[("role", config.role.as_str()), ("addr", &config.http.socket_addr())],
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CliError::io_error(format!("Failed to listen for interrupt: {}", e)))?;

    Logger::info("NODE_STOPPING", &[("role", config.role.as_str())]);
    let _ = shutdown_tx.send(true);

    for handle in task_handles {
        let _ = handle.await;
    }
    match server_handle.await {
        Ok(result) => result.map_err(|e| CliError::io_error(e.to_string()))?,
        Err(e) => return Err(CliError::boot_failed(format!("Server task panicked: {}", e))),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(role: NodeRole) -> Config {
        Config {
            role,
            data_dir: "./data".to_string(),
            http: HttpServerConfig::default(),
            sync: None,
            registry: RegistryConfig::default(),
            signing_key_id: None,
            signing_seed: None,
            previous_public_keys: Vec::new(),
        }
    }

    #[test]
    fn test_source_requires_signing_key() {
        let mut config = base_config(NodeRole::Source);
        assert!(config.validate().is_err());

        let key = SourceKey::generate("key-1");
        config.signing_key_id = Some("key-1".to_string());
        config.signing_seed = Some(key.seed_base64());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replica_requires_sync_section() {
        let mut config = base_config(NodeRole::Replica);
        assert!(config.validate().is_err());

        config.sync = Some(SyncConfig::new("http://source:7800", vec!["items".to_string()]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_registry_config_validates() {
        let mut config = base_config(NodeRole::Registry);
        assert!(config.validate().is_ok());

        config.registry.thresholds.recovery_successes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirrornet.json");

        init(&path, "source").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.role, NodeRole::Source);
        assert!(config.signing_seed.is_some());

        // The data directory lands next to the config file
        assert!(dir.path().join("mirrornet-data").is_dir());
    }

    #[test]
    fn test_init_refuses_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirrornet.json");
        fs::write(&path, "{}").unwrap();

        let err = init(&path, "replica").unwrap_err();
        assert_eq!(*err.code(), super::super::errors::CliErrorCode::AlreadyInitialized);
    }

    #[test]
    fn test_init_rejects_unknown_role() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirrornet.json");

        assert!(init(&path, "observer").is_err());
    }
}
