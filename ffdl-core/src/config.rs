//! Updater configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration. Environment variables override file values:
//!
//! - `FFDL_INDEX_URL` - version index endpoint
//! - `FFDL_MAX_RETRIES` - extra download attempts per file
//! - `FFDL_TEMP_DIR` - where archives are downloaded before extraction

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default endpoint of the version index.
pub const DEFAULT_INDEX_URL: &str = "https://ffbinaries.com/api/v1/version/latest";

/// Extra attempts per file after the first one fails.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Subdirectory of the OS temp folder used for downloads.
const TEMP_SUBDIR: &str = "ffdl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// URL of the version index.
    pub index_url: String,
    /// Extra attempts per file download.
    pub max_retries: u32,
    /// Base delay between attempts; attempt `n` waits `n` times this.
    pub retry_delay_ms: u64,
    /// Per-request timeout. `None` means no wall-clock limit.
    pub request_timeout_secs: Option<u64>,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Download directory. `None` means `{temp}/ffdl/downloads`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            request_timeout_secs: None,
            user_agent: format!("ffdl/{}", crate::VERSION),
            temp_dir: None,
        }
    }
}

impl UpdaterConfig {
    /// Loads the configuration from a JSON file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Default config file location: `{config dir}/ffdl/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(TEMP_SUBDIR).join("config.json"))
    }

    /// Applies `FFDL_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("FFDL_INDEX_URL") {
            self.index_url = url;
        }

        if let Some(raw) = lookup("FFDL_MAX_RETRIES") {
            match raw.trim().parse() {
                Ok(retries) => self.max_retries = retries,
                Err(e) => warn!("Ignoring FFDL_MAX_RETRIES={:?}: {}", raw, e),
            }
        }

        if let Some(dir) = lookup("FFDL_TEMP_DIR") {
            self.temp_dir = Some(PathBuf::from(dir));
        }

        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Resolved download directory.
    pub fn download_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir()
                .join(TEMP_SUBDIR)
                .join("downloads")
        })
    }
}
