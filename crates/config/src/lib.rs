//! Configuration management for modelvault
//!
//! Loads and saves storage, model source and download settings as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, default_data_root, expand_tilde, safe_filename};

/// Errors loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which storage layout the process runs under
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Plain desktop filesystem, no permission gate
    #[default]
    Desktop,
    /// Mobile-style storage behind a capability gate
    Restricted,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub profile: ProfileKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_package_name")]
    pub package_name: String,
    /// Shared cache directory offered by the platform under the restricted profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_cache_dir: Option<String>,
    #[serde(default = "default_permission_timeout_secs")]
    pub permission_timeout_secs: u64,
    #[serde(default = "default_permission_poll_ms")]
    pub permission_poll_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profile: ProfileKind::default(),
            data_dir: default_data_dir(),
            package_name: default_package_name(),
            shared_cache_dir: None,
            permission_timeout_secs: default_permission_timeout_secs(),
            permission_poll_ms: default_permission_poll_ms(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.modelvault/data".to_string()
}

fn default_package_name() -> String {
    "com.modelvault.app".to_string()
}

fn default_permission_timeout_secs() -> u64 {
    5
}

fn default_permission_poll_ms() -> u64 {
    500
}

/// Model bundle settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsConfig {
    /// Models root; defaults to `<data_dir>/models`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Known bundle codes and their download URLs
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}

/// Download and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Longest gap allowed between body chunks
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_secs: default_backoff_step_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step_secs() -> u64 {
    2
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    30
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Data root with `~` expanded; an empty setting means the default root
    pub fn data_root(&self) -> PathBuf {
        if self.storage.data_dir.trim().is_empty() {
            return default_data_root();
        }
        expand_tilde(&self.storage.data_dir)
    }

    /// Models root with `~` expanded
    pub fn models_root(&self) -> PathBuf {
        match &self.models.root {
            Some(root) if !root.is_empty() => expand_tilde(root),
            _ => self.data_root().join(paths::MODELS_DIR_NAME),
        }
    }

    /// Download URL configured for a bundle code
    pub fn source_url(&self, code: &str) -> Option<String> {
        self.models
            .sources
            .get(code)
            .filter(|url| !url.is_empty())
            .cloned()
    }

    /// Capability poll timeout
    pub fn permission_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.permission_timeout_secs)
    }

    /// Capability poll interval; never zero
    pub fn permission_poll_interval(&self) -> Duration {
        Duration::from_millis(self.storage.permission_poll_ms.max(1))
    }

    /// Wait unit for linear retry backoff
    pub fn backoff_step(&self) -> Duration {
        Duration::from_secs(self.download.backoff_step_secs)
    }

    /// HTTP connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.download.connect_timeout_secs)
    }

    /// Idle timeout while streaming a download body; never zero
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.download.read_timeout_secs.max(1))
    }
}

/// Write a default config if none exists and create the data root
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("config already present at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("config written to {:?}", config_path);
    }

    let config = Config::load().await?;
    let data_root = config.data_root();
    paths::ensure_dir(&data_root).await?;
    info!("data root ready at {:?}", data_root);

    Ok(config)
}
