//! Configuration for the master

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional TOML config file
pub const CONFIG_ENV: &str = "CHUNKMASTER_CONFIG";

/// Prefix for environment overrides, e.g. `CHUNKMASTER_MASTER__REPLICATION_FACTOR=2`
pub const ENV_PREFIX: &str = "CHUNKMASTER";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Master-specific config
    #[serde(default)]
    pub master: MasterConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master: MasterConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the file named by `CHUNKMASTER_CONFIG` (if any)
    /// and `CHUNKMASTER_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("master.chunkservers")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.master.validate()?;
        Ok(config)
    }
}

/// Which collaborator keeps the metadata table durable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Whole table serialized to a single JSON file
    Json,
    /// Nothing survives a restart
    Memory,
    /// Embedded sled tree (requires the `sled-backend` feature)
    Sled,
}

impl std::str::FromStr for PersistenceBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(PersistenceBackend::Json),
            "memory" => Ok(PersistenceBackend::Memory),
            "sled" => Ok(PersistenceBackend::Sled),
            other => Err(Error::InvalidConfig(format!(
                "unknown persistence backend: {}",
                other
            ))),
        }
    }
}

/// Master configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Bind address for HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Size of every chunk except possibly the last one
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,

    /// Replication factor
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,

    /// Chunkserver endpoints registered at startup
    #[serde(default)]
    pub chunkservers: Vec<String>,

    /// Metadata persistence backend
    #[serde(default = "default_backend")]
    pub persistence_backend: PersistenceBackend,

    /// Path used by the persistence backend (file for json, directory for sled)
    #[serde(default = "default_persistence_path")]
    pub persistence_path: PathBuf,

    /// Per-call timeout for delete-chunk requests
    #[serde(default = "default_delete_timeout")]
    pub delete_timeout_ms: u64,

    /// Maximum delete-chunk calls in flight during one fan-out
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,

    /// Largest chunk count a single object may be planned with
    #[serde(default = "default_max_chunks_per_object")]
    pub max_chunks_per_object: u64,

    /// Whether planning an existing object id replaces its placement
    #[serde(default = "default_allow_overwrite")]
    pub allow_overwrite: bool,

    /// Maximum accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_chunk_size() -> u64 {
    32 * 1024
}
fn default_replication_factor() -> usize {
    3
}
fn default_backend() -> PersistenceBackend {
    PersistenceBackend::Json
}
fn default_persistence_path() -> PathBuf {
    PathBuf::from("./master-data/metadata.json")
}
fn default_delete_timeout() -> u64 {
    5_000
}
fn default_fanout_concurrency() -> usize {
    16
}
fn default_max_chunks_per_object() -> u64 {
    // 4 GiB at the default chunk size
    128 * 1024
}
fn default_allow_overwrite() -> bool {
    true
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            chunk_size_bytes: default_chunk_size(),
            replication_factor: default_replication_factor(),
            chunkservers: Vec::new(),
            persistence_backend: default_backend(),
            persistence_path: default_persistence_path(),
            delete_timeout_ms: default_delete_timeout(),
            fanout_concurrency: default_fanout_concurrency(),
            max_chunks_per_object: default_max_chunks_per_object(),
            allow_overwrite: default_allow_overwrite(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl MasterConfig {
    /// Reject values the planner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_bytes == 0 {
            return Err(Error::InvalidConfig(
                "chunk_size_bytes must be greater than 0".into(),
            ));
        }
        if self.replication_factor == 0 {
            return Err(Error::InvalidConfig(
                "replication_factor must be at least 1".into(),
            ));
        }
        if self.delete_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "delete_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.fanout_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "fanout_concurrency must be at least 1".into(),
            ));
        }
        if self.max_chunks_per_object == 0 {
            return Err(Error::InvalidConfig(
                "max_chunks_per_object must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.delete_timeout_ms)
    }
}
