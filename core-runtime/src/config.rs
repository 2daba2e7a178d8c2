//! # Player Configuration
//!
//! A [`PlayerConfig`] holds every setting and host bridge the clipfeed core
//! needs. Build it with [`PlayerConfig::builder`]; validation is fail-fast and
//! errors name the offending setting.
//!
//! ## Bridges
//!
//! - `HttpClient` - link-list requests and downloads (desktop default: reqwest)
//! - `FileSystemAccess` - cache directory I/O (desktop default: tokio fs)
//!
//! With the `desktop-shims` feature the desktop defaults are injected when no
//! bridge is provided. Without it a missing bridge is a
//! [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::PlayerConfig;
//!
//! let config = PlayerConfig::builder()
//!     .cache_dir("/home/me/.cache/clipfeed")
//!     .max_total(30)
//!     .api_key_from_env()
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::{FileSystemAccess, HttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Upstream link-list endpoints used when none are configured.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://api.dwo.cc/api/miss?type=json",
    "https://api.kuleu.com/api/xjj?type=json",
];

/// Browser-like agent sent to upstream endpoints.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Environment variable holding the optional bearer token for upstream endpoints.
pub const API_KEY_ENV: &str = "VIDEO_API_KEY";

/// Waits used by the background cache filler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillerTimings {
    /// Wait when the unplayed watermark is satisfied.
    pub idle_wait: Duration,
    /// Wait after a failed acquisition or download.
    pub failure_wait: Duration,
    /// Wait after an unexpected error inside an iteration.
    pub error_wait: Duration,
}

impl Default for FillerTimings {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_secs(10),
            failure_wait: Duration::from_secs(5),
            error_wait: Duration::from_secs(5),
        }
    }
}

/// Complete configuration for the player core.
#[derive(Clone)]
pub struct PlayerConfig {
    /// Ordered upstream link-list endpoints
    pub endpoints: Vec<String>,
    /// Optional bearer token for upstream endpoints
    pub api_key: Option<String>,
    pub user_agent: String,
    /// Attempts per acquisition
    pub max_retries: u32,
    /// Consecutive failures before rotating to the next endpoint
    pub switch_threshold: u32,
    /// Timeout for link-list requests and each redirect hop
    pub request_timeout: Duration,
    pub max_redirects: usize,

    /// Flat directory holding cached `.mp4` files
    pub cache_dir: PathBuf,
    /// Upper bound on tracked items (played + unplayed)
    pub max_total: usize,
    /// Watermark below which the filler acquires more content
    pub max_unplayed: usize,
    /// Longest a media download may go without receiving data
    pub download_timeout: Duration,

    pub filler: FillerTimings,
    /// Status polling interval
    pub monitor_interval: Duration,
    /// Pause between the end of one video and the start of the next
    pub autoplay_delay: Duration,

    /// Global subscriber installed when the service starts
    pub logging: Option<LoggingConfig>,

    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
}

impl std::fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("endpoints", &self.endpoints)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_retries", &self.max_retries)
            .field("switch_threshold", &self.switch_threshold)
            .field("request_timeout", &self.request_timeout)
            .field("max_redirects", &self.max_redirects)
            .field("cache_dir", &self.cache_dir)
            .field("max_total", &self.max_total)
            .field("max_unplayed", &self.max_unplayed)
            .field("download_timeout", &self.download_timeout)
            .field("filler", &self.filler)
            .field("monitor_interval", &self.monitor_interval)
            .field("autoplay_delay", &self.autoplay_delay)
            .field("logging", &self.logging)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .finish()
    }
}

impl PlayerConfig {
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        validate_endpoints(&self.endpoints)?;

        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }

        if self.switch_threshold == 0 {
            return Err(Error::Config(
                "switch_threshold must be at least 1".to_string(),
            ));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.max_total == 0 {
            return Err(Error::Config("max_total must be at least 1".to_string()));
        }

        if self.max_unplayed == 0 || self.max_unplayed > self.max_total {
            return Err(Error::Config(format!(
                "max_unplayed must be between 1 and max_total ({}), got {}",
                self.max_total, self.max_unplayed
            )));
        }

        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("download_timeout", self.download_timeout),
            ("monitor_interval", self.monitor_interval),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user_agent cannot be empty".to_string()));
        }

        if let Some(logging) = &self.logging {
            logging.validate()?;
        }

        Ok(())
    }
}

/// Check that an endpoint list is non-empty and holds absolute http(s) URLs.
///
/// Shared with the runtime endpoint setter of the acquisition service.
pub fn validate_endpoints(endpoints: &[String]) -> Result<()> {
    if endpoints.is_empty() {
        return Err(Error::Config(
            "At least one endpoint is required. Use .endpoints() to set them.".to_string(),
        ));
    }

    for endpoint in endpoints {
        let parsed = url::Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Endpoint '{}' must use http or https",
                endpoint
            )));
        }
    }

    Ok(())
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Other hosts: inject an HttpClient with .http_client()."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "No file system implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Other hosts: inject a FileSystemAccess with .file_system()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new().map_err(|e| {
        Error::Internal(format!("Failed to create default HttpClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

/// Builder for [`PlayerConfig`]. Unset values take the documented defaults.
#[derive(Default)]
pub struct PlayerConfigBuilder {
    endpoints: Option<Vec<String>>,
    api_key: Option<String>,
    user_agent: Option<String>,
    max_retries: Option<u32>,
    switch_threshold: Option<u32>,
    request_timeout: Option<Duration>,
    max_redirects: Option<usize>,
    cache_dir: Option<PathBuf>,
    max_total: Option<usize>,
    max_unplayed: Option<usize>,
    download_timeout: Option<Duration>,
    filler: Option<FillerTimings>,
    monitor_interval: Option<Duration>,
    autoplay_delay: Option<Duration>,
    logging: Option<LoggingConfig>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl PlayerConfigBuilder {
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some(endpoints.into_iter().map(Into::into).collect());
        self
    }

    /// Set the bearer token. Empty strings are treated as "no key".
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    /// Read the bearer token from `VIDEO_API_KEY`, if set.
    pub fn api_key_from_env(self) -> Self {
        match std::env::var(API_KEY_ENV) {
            Ok(key) => self.api_key(key),
            Err(_) => self,
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn switch_threshold(mut self, threshold: u32) -> Self {
        self.switch_threshold = Some(threshold);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = Some(max);
        self
    }

    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn max_total(mut self, max: usize) -> Self {
        self.max_total = Some(max);
        self
    }

    pub fn max_unplayed(mut self, max: usize) -> Self {
        self.max_unplayed = Some(max);
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    pub fn filler_timings(mut self, timings: FillerTimings) -> Self {
        self.filler = Some(timings);
        self
    }

    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = Some(interval);
        self
    }

    pub fn autoplay_delay(mut self, delay: Duration) -> Self {
        self.autoplay_delay = Some(delay);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a bridge is absent and no default exists
    /// - [`Error::Config`] when a setting is out of range
    pub fn build(self) -> Result<PlayerConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = PlayerConfig {
            endpoints: self.endpoints.unwrap_or_else(|| {
                DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
            }),
            api_key: self.api_key,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_retries: self.max_retries.unwrap_or(3),
            switch_threshold: self.switch_threshold.unwrap_or(2),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(10)),
            max_redirects: self.max_redirects.unwrap_or(5),
            cache_dir: self.cache_dir.unwrap_or_else(|| PathBuf::from("cache")),
            max_total: self.max_total.unwrap_or(55),
            max_unplayed: self.max_unplayed.unwrap_or(10),
            download_timeout: self.download_timeout.unwrap_or(Duration::from_secs(60)),
            filler: self.filler.unwrap_or_default(),
            monitor_interval: self
                .monitor_interval
                .unwrap_or(Duration::from_millis(500)),
            autoplay_delay: self.autoplay_delay.unwrap_or(Duration::from_secs(1)),
            logging: self.logging,
            http_client,
            file_system,
        };

        config.validate()?;

        Ok(config)
    }
}
