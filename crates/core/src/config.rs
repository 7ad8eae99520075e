//! # Configuration
//!
//! `DexConfig` lives in `config.json` inside the data directory. Environment
//! variables override what the file says; the file is never rewritten with
//! those overrides unless `save` is called explicitly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::state::db::DEFAULT_DB_FILE;
use crate::state::io;

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "config.json";

pub const REMOTE_ENDPOINT_ENV: &str = "DEXCACHE_REMOTE_ENDPOINT";
pub const FETCH_LIMIT_ENV: &str = "DEXCACHE_FETCH_LIMIT";

const DEFAULT_REMOTE_ENDPOINT: &str = "http://127.0.0.1:8080/pokemon";
pub(crate) const DEFAULT_FETCH_LIMIT: usize = 151;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Which storage backend the stores are built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Nothing survives the process
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexConfig {
    pub remote_endpoint: String,
    pub fetch_limit: usize,
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
    /// Database file name, relative to the data directory unless absolute
    pub database_file: String,
}

impl Default for DexConfig {
    fn default() -> Self {
        Self {
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            storage: StorageBackend::default(),
            database_file: DEFAULT_DB_FILE.to_string(),
        }
    }
}

/// Partial update for [`DexConfig`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_file: Option<String>,
}

impl DexConfig {
    /// Load `config.json` (defaults if missing or unreadable), then apply env overrides.
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_file().await?;
        config.apply_env();
        Ok(config)
    }

    async fn load_file() -> Result<Self> {
        let Some(content) = io::read_data_file(CONFIG_FILE).await? else {
            debug!("No {} found, using defaults", CONFIG_FILE);
            return Ok(Self::default());
        };

        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable {}", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(REMOTE_ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.remote_endpoint = endpoint;
            }
        }
        if let Ok(limit) = std::env::var(FETCH_LIMIT_ENV) {
            match limit.parse() {
                Ok(limit) => self.fetch_limit = limit,
                Err(_) => warn!(value = %limit, "Ignoring invalid {}", FETCH_LIMIT_ENV),
            }
        }
    }

    /// Write the config to `config.json` in the data directory.
    pub async fn save(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        io::write_data_file(CONFIG_FILE, &content).await
    }

    pub fn merge(&mut self, patch: ConfigPatch) {
        if let Some(endpoint) = patch.remote_endpoint {
            self.remote_endpoint = endpoint;
        }
        if let Some(limit) = patch.fetch_limit {
            self.fetch_limit = limit;
        }
        if let Some(secs) = patch.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(storage) = patch.storage {
            self.storage = storage;
        }
        if let Some(file) = patch.database_file {
            self.database_file = file;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn database_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.database_file);
        if file.is_absolute() {
            file
        } else {
            io::get_data_dir().join(file)
        }
    }
}
