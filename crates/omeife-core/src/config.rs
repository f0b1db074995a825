//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! origin, request and session timing, where credentials are persisted and
//! the last email used to sign in.
//!
//! Configuration is stored at `~/.config/omeife/config.json`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionConfig, TokenStore,
    DEFAULT_MAX_AUTH_RETRIES, DEFAULT_SWEEP_INTERVAL,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "omeife";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the bearer token and API key are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::File => "file",
            StorageBackend::Keyring => "keyring",
            StorageBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_auth_retries: u32,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL.as_secs(),
            max_auth_retries: DEFAULT_MAX_AUTH_RETRIES,
            storage: StorageBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Storage scope for the configured API origin, e.g. `apis.omeife.ai`
    /// or `localhost_8080`.
    pub fn origin_scope(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.api_url))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("API URL has no host: {}", self.api_url))?;
        Ok(match url.port() {
            Some(port) => format!("{}_{}", host, port),
            None => host.to_string(),
        })
    }

    /// Per-origin directory for the file token store.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(self.origin_scope()?))
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            max_auth_retries: self.max_auth_retries,
        }
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::with_base_url(&self.api_url, self.request_timeout())
            .context("Failed to build HTTP client")
    }

    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.storage {
            StorageBackend::File => Arc::new(FileTokenStore::new(self.storage_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringTokenStore::new(self.origin_scope()?)),
            StorageBackend::Memory => Arc::new(MemoryTokenStore::new()),
        };
        Ok(store)
    }
}
