//! Application configuration management.
//!
//! This module handles loading and saving the configuration: where the remote
//! API lives, the sync engine's throttling and retry timings, and how person
//! relations are resolved.
//!
//! Configuration is stored at `~/.config/holocache/config.json`. Every field
//! has a default, so a missing or partial file is fine.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "holocache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides `api.base_url`
pub const ENV_BASE_URL: &str = "HOLOCACHE_BASE_URL";

/// Overrides `cache_dir`
pub const ENV_CACHE_DIR: &str = "HOLOCACHE_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub relations: RelationConfig,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Items requested per listing page.
    pub page_size: u32,
    /// 30s allows for slow API responses while failing fast enough for good UX.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.swapi.tech/api".to_string(),
            page_size: 10,
            request_timeout_secs: 30,
        }
    }
}

/// What to do when a listing page cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingFailurePolicy {
    /// Treat the failed page as the last one and keep what was listed so far.
    #[default]
    Truncate,
    /// Abort the whole sync.
    Fail,
}

/// Throttling and retry timings for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Detail requests per batch, also the cap on requests in flight.
    pub batch_size: usize,
    /// Pause after a successful batch when more batches remain.
    pub batch_delay_ms: u64,
    /// Pause before retrying a failed batch.
    pub retry_base_delay_ms: u64,
    /// Added to the retry pause once consecutive failures exceed the threshold.
    pub retry_escalation_ms: u64,
    pub escalation_threshold: u32,
    /// Pause between listing pages.
    pub page_delay_ms: u64,
    /// Pause after a failed listing page under the truncate policy.
    pub page_failure_delay_ms: u64,
    pub listing_failure: ListingFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 4000,
            retry_base_delay_ms: 10_000,
            retry_escalation_ms: 20_000,
            escalation_threshold: 2,
            page_delay_ms: 1500,
            page_failure_delay_ms: 3000,
            listing_failure: ListingFailurePolicy::Truncate,
        }
    }
}

impl SyncConfig {
    /// Batch size, never zero.
    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn page_failure_delay(&self) -> Duration {
        Duration::from_millis(self.page_failure_delay_ms)
    }

    /// Pause before retrying a batch after `consecutive_failures` failed
    /// attempts in a row. The escalation is added once, not per failure.
    pub fn retry_delay(&self, consecutive_failures: u32) -> Duration {
        let mut ms = self.retry_base_delay_ms;
        if consecutive_failures > self.escalation_threshold {
            ms += self.retry_escalation_ms;
        }
        Duration::from_millis(ms)
    }

    /// All pauses zeroed. Handy for tests and local mirrors of the API.
    pub fn without_delays(mut self) -> Self {
        self.batch_delay_ms = 0;
        self.retry_base_delay_ms = 0;
        self.retry_escalation_ms = 0;
        self.page_delay_ms = 0;
        self.page_failure_delay_ms = 0;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelationConfig {
    /// Collapse films reached through both the forward and the back reference
    /// into one entry per uid. Off by default: the union keeps duplicates.
    pub dedupe_films: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
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

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply environment overrides on top of the loaded file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var(ENV_CACHE_DIR) {
            if !dir.trim().is_empty() {
                self.cache_dir = Some(PathBuf::from(dir.trim()));
            }
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
