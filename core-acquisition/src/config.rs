//! Acquisition settings.

use core_runtime::config::{self, PlayerConfig, DEFAULT_ENDPOINTS, DEFAULT_USER_AGENT};
use std::time::Duration;

use crate::error::Result;

/// Settings for [`AcquisitionService`](crate::AcquisitionService).
#[derive(Clone)]
pub struct AcquisitionConfig {
    pub endpoints: Vec<String>,
    pub api_key: Option<String>,
    pub user_agent: String,
    pub max_retries: u32,
    pub switch_threshold: u32,
    /// Timeout for link-list requests and each redirect hop
    pub request_timeout: Duration,
    pub max_redirects: usize,
}

impl std::fmt::Debug for AcquisitionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionConfig")
            .field("endpoints", &self.endpoints)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_retries", &self.max_retries)
            .field("switch_threshold", &self.switch_threshold)
            .field("request_timeout", &self.request_timeout)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: 3,
            switch_threshold: 2,
            request_timeout: Duration::from_secs(10),
            max_redirects: 5,
        }
    }
}

impl AcquisitionConfig {
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_switch_threshold(mut self, threshold: u32) -> Self {
        self.switch_threshold = threshold;
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        config::validate_endpoints(&self.endpoints)?;
        if self.max_retries == 0 {
            return Err(core_runtime::Error::Config("max_retries must be at least 1".to_string()).into());
        }
        if self.switch_threshold == 0 {
            return Err(
                core_runtime::Error::Config("switch_threshold must be at least 1".to_string()).into(),
            );
        }
        Ok(())
    }
}

impl From<&PlayerConfig> for AcquisitionConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            api_key: config.api_key.clone(),
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            switch_threshold: config.switch_threshold,
            request_timeout: config.request_timeout,
            max_redirects: config.max_redirects,
        }
    }
}
