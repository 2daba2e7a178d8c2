//! Cache and filler configuration

use core_runtime::config::PlayerConfig;
use core_runtime::Error as RuntimeError;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Configuration for the cache store.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Flat directory holding cached `.mp4` files (default: `cache`)
    pub cache_dir: PathBuf,

    /// Upper bound on tracked items, played and unplayed (default: 55)
    pub max_total: usize,

    /// Unplayed watermark used by the filler (default: 10)
    pub max_unplayed: usize,

    /// Longest a download may stall, waiting for the response or for the
    /// next chunk (default: 60s). Slow but steady transfers are not cut off.
    pub download_timeout: Duration,

    /// `User-Agent` sent with media downloads; the client's own when `None`
    pub user_agent: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            max_total: 55,
            max_unplayed: 10,
            download_timeout: Duration::from_secs(60),
            user_agent: None,
        }
    }
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_total(mut self, max_total: usize) -> Self {
        self.max_total = max_total;
        self
    }

    pub fn with_max_unplayed(mut self, max_unplayed: usize) -> Self {
        self.max_unplayed = max_unplayed;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(config_error("cache_dir must not be empty"));
        }

        if self.max_total == 0 {
            return Err(config_error("max_total must be at least 1"));
        }

        if self.max_unplayed == 0 || self.max_unplayed > self.max_total {
            return Err(config_error(format!(
                "max_unplayed must be between 1 and max_total ({}), got {}",
                self.max_total, self.max_unplayed
            )));
        }

        if self.download_timeout.is_zero() {
            return Err(config_error("download_timeout must be greater than zero"));
        }

        Ok(())
    }
}

impl From<&PlayerConfig> for CacheConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            max_total: config.max_total,
            max_unplayed: config.max_unplayed,
            download_timeout: config.download_timeout,
            user_agent: Some(config.user_agent.clone()),
        }
    }
}

/// Pacing of the background cache filler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillerConfig {
    /// Acquire only while the unplayed queue is below this
    pub max_unplayed: usize,
    /// Wait once the watermark is satisfied
    pub idle_wait: Duration,
    /// Wait after a failed acquisition or admission
    pub failure_wait: Duration,
    /// Wait after an iteration aborted unexpectedly
    pub error_wait: Duration,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            max_unplayed: 10,
            idle_wait: Duration::from_secs(10),
            failure_wait: Duration::from_secs(5),
            error_wait: Duration::from_secs(5),
        }
    }
}

impl FillerConfig {
    pub fn with_max_unplayed(mut self, max_unplayed: usize) -> Self {
        self.max_unplayed = max_unplayed;
        self
    }

    /// Zero all waits. Useful for tests.
    pub fn without_waits(mut self) -> Self {
        self.idle_wait = Duration::ZERO;
        self.failure_wait = Duration::ZERO;
        self.error_wait = Duration::ZERO;
        self
    }
}

impl From<&PlayerConfig> for FillerConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            max_unplayed: config.max_unplayed,
            idle_wait: config.filler.idle_wait,
            failure_wait: config.filler.failure_wait,
            error_wait: config.filler.error_wait,
        }
    }
}

fn config_error(message: impl Into<String>) -> crate::error::PlaybackError {
    RuntimeError::Config(message.into()).into()
}
