//! Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "diigo-sync.yaml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Where the graph store keeps its data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory that receives ingested media files.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            media_dir: default_media_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".diigo-sync/graph.db")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from(".diigo-sync/media")
}

/// Remote endpoints and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base of the versioned bookmarks API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base of the session-authenticated outliner feed.
    #[serde(default = "default_feed_base")]
    pub feed_base: String,

    /// Connect/read timeout applied to every request.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            feed_base: default_feed_base(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://secure.diigo.com".to_string()
}

fn default_feed_base() -> String {
    "https://www.diigo.com".to_string()
}

fn default_timeout() -> u64 {
    20 // between the store's default (10) and Diigo's upper limit (30)
}

/// Settings of the sync job itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Records requested per page in paged-API mode.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Attempts per attachment download.
    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,

    /// Directory for scoped download temp files (system temp dir when unset).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Prefix of download temp file names.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    /// Optional YAML mapping table replacing the built-in one.
    #[serde(default)]
    pub mapping_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            download_attempts: default_download_attempts(),
            temp_dir: None,
            temp_prefix: default_temp_prefix(),
            mapping_path: None,
        }
    }
}

fn default_page_size() -> u64 {
    100
}

fn default_download_attempts() -> u32 {
    3
}

fn default_temp_prefix() -> String {
    "diigo-".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from default locations or return defaults.
    pub fn load_or_default() -> Self {
        // Try ./diigo-sync.yaml
        if let Ok(config) = Self::load(CONFIG_FILE_NAME) {
            return config;
        }

        // Try the user config dir
        if let Some(dir) = dirs::config_dir()
            && let Ok(config) = Self::load(dir.join("diigo-sync").join("config.yaml"))
        {
            return config;
        }

        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("DIIGO_SYNC_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Ok(media_dir) = std::env::var("DIIGO_SYNC_MEDIA_DIR") {
            self.store.media_dir = PathBuf::from(media_dir);
        }

        if let Ok(timeout) = std::env::var("DIIGO_SYNC_TIMEOUT")
            && let Ok(timeout) = timeout.parse()
        {
            self.http.timeout_seconds = timeout;
        }
    }

    /// Ensure the database and media directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.store.media_dir)?;
        Ok(())
    }

    /// Directory used for download temp files.
    pub fn temp_dir(&self) -> PathBuf {
        self.sync
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
