//! Endpoint rotation and link-list fetching.

use bridge_traits::http::{HttpClient, HttpRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AcquisitionError, Result};
use crate::resolver::UrlResolver;

/// A switch from one endpoint to the next after repeated failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    pub from_index: usize,
    pub to_index: usize,
}

/// Ordered upstream endpoints with a cursor and a failure streak.
///
/// `current_index` always lies in `0..endpoints.len()`. Once the streak
/// reaches `switch_threshold` the cursor advances by one (wrapping) and the
/// streak resets to zero.
#[derive(Debug, Clone)]
pub struct EndpointRotation {
    endpoints: Vec<String>,
    current_index: usize,
    consecutive_failures: u32,
    switch_threshold: u32,
}

impl EndpointRotation {
    /// `endpoints` must be non-empty; callers validate before constructing.
    pub fn new(endpoints: Vec<String>, switch_threshold: u32) -> Self {
        Self {
            endpoints,
            current_index: 0,
            consecutive_failures: 0,
            switch_threshold: switch_threshold.max(1),
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> &str {
        &self.endpoints[self.current_index]
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn switch_threshold(&self) -> u32 {
        self.switch_threshold
    }

    /// Count a failure of the endpoint at `index`, rotating if the streak
    /// reached the threshold. With a single endpoint the streak resets but no
    /// rotation is reported.
    ///
    /// A failure reported for an endpoint the cursor already left is ignored,
    /// so concurrent attempts on the same endpoint advance the cursor once.
    pub fn record_failure(&mut self, index: usize) -> Option<Rotation> {
        if index != self.current_index {
            debug!(
                failed = index,
                current = self.current_index,
                "Ignoring failure of an endpoint already rotated away from"
            );
            return None;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures < self.switch_threshold {
            return None;
        }

        self.consecutive_failures = 0;
        if self.endpoints.len() < 2 {
            return None;
        }

        let from_index = self.current_index;
        self.current_index = (self.current_index + 1) % self.endpoints.len();
        info!(
            from = from_index,
            to = self.current_index,
            endpoint = %self.current(),
            "Switching to next endpoint"
        );
        Some(Rotation {
            from_index,
            to_index: self.current_index,
        })
    }

    /// Clear the streak if `index` is still the current endpoint.
    pub fn record_success(&mut self, index: usize) {
        if index == self.current_index {
            self.consecutive_failures = 0;
        }
    }

    pub fn set_switch_threshold(&mut self, threshold: u32) {
        self.switch_threshold = threshold.max(1);
    }

    /// Replace the endpoint list and restart from its first entry.
    pub fn replace_endpoints(&mut self, endpoints: Vec<String>) {
        self.endpoints = endpoints;
        self.current_index = 0;
        self.consecutive_failures = 0;
    }
}

/// Performs one link-list request and extracts a candidate URL from it.
pub struct LinkFetcher {
    http_client: Arc<dyn HttpClient>,
    resolver: UrlResolver,
    user_agent: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl LinkFetcher {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        user_agent: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            resolver: UrlResolver,
            user_agent: user_agent.into(),
            api_key,
            timeout,
        }
    }

    fn build_request(&self, endpoint: &str) -> HttpRequest {
        let request = HttpRequest::get(endpoint)
            .header("User-Agent", self.user_agent.as_str())
            .header("Accept", "application/json, */*")
            .header("Content-Type", "application/json")
            .timeout(self.timeout);

        match &self.api_key {
            Some(key) => request.bearer_token(key.as_str()),
            None => request,
        }
    }

    /// Request `endpoint` and extract a candidate media URL.
    ///
    /// # Errors
    ///
    /// - [`AcquisitionError::Network`] on connection failure or timeout
    /// - [`AcquisitionError::Status`] on any status other than 200
    /// - [`AcquisitionError::Parse`] / [`AcquisitionError::EmptyResult`] when no URL is found
    pub async fn fetch(&self, endpoint: &str) -> Result<String> {
        let response = self.http_client.execute(self.build_request(endpoint)).await?;

        if response.status != 200 {
            return Err(AcquisitionError::Status {
                endpoint: endpoint.to_string(),
                status: response.status,
            });
        }

        let url = self.resolver.extract(&response.text(), endpoint)?;
        debug!(endpoint, candidate = %url, "Extracted candidate URL");
        Ok(url)
    }
}
