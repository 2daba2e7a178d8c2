//! # Acquisition Service
//!
//! Composes [`LinkFetcher`] and [`RedirectResolver`] into a single
//! `acquire()` call with retry, backoff and endpoint failover.

use async_trait::async_trait;
use bridge_traits::HttpClient;
use core_runtime::config::validate_endpoints;
use core_runtime::events::{AcquisitionEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::config::AcquisitionConfig;
use crate::error::{AcquisitionError, NetworkErrorKind, Result};
use crate::fetcher::{EndpointRotation, LinkFetcher};
use crate::redirect::RedirectResolver;

/// Anything that can produce a playable video URL on demand.
#[async_trait]
pub trait VideoLinkSource: Send + Sync {
    async fn acquire(&self) -> Result<String>;
}

/// Waits between failed attempts.
///
/// Status, parse and empty-result failures wait `min(base * 2^retries, max)`.
/// Connection errors, timeouts and unclassified failures use fixed waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub connection_wait: Duration,
    pub timeout_wait: Duration,
    pub unknown_wait: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(8),
            connection_wait: Duration::from_secs(2),
            timeout_wait: Duration::from_secs(3),
            unknown_wait: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// No waiting at all.
    pub fn immediate() -> Self {
        Self {
            base: Duration::ZERO,
            max: Duration::ZERO,
            connection_wait: Duration::ZERO,
            timeout_wait: Duration::ZERO,
            unknown_wait: Duration::ZERO,
        }
    }

    /// Wait after the `retries`-th failed attempt.
    pub fn delay_for(&self, error: &AcquisitionError, retries: u32) -> Duration {
        match error {
            AcquisitionError::Network {
                kind: NetworkErrorKind::Connection,
                ..
            } => self.connection_wait,
            AcquisitionError::Network {
                kind: NetworkErrorKind::Timeout,
                ..
            } => self.timeout_wait,
            AcquisitionError::Request(_) | AcquisitionError::Config(_) => self.unknown_wait,
            _ => self
                .base
                .saturating_mul(2u32.saturating_pow(retries))
                .min(self.max),
        }
    }
}

struct PolicyState {
    rotation: EndpointRotation,
    max_retries: u32,
}

/// Resilient acquisition of a final, playable video URL.
///
/// The endpoint cursor and retry limit sit behind one lock that is never held
/// across an await, so concurrent `acquire()` calls cannot corrupt rotation.
pub struct AcquisitionService {
    fetcher: LinkFetcher,
    redirects: RedirectResolver,
    state: Mutex<PolicyState>,
    backoff: BackoffPolicy,
    event_bus: Option<EventBus>,
}

impl AcquisitionService {
    /// # Errors
    ///
    /// Returns [`AcquisitionError::Config`] if the configuration is invalid.
    pub fn new(config: AcquisitionConfig, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        config.validate()?;

        let fetcher = LinkFetcher::new(
            Arc::clone(&http_client),
            config.user_agent,
            config.api_key,
            config.request_timeout,
        );
        let redirects =
            RedirectResolver::new(http_client, config.max_redirects, config.request_timeout);

        Ok(Self {
            fetcher,
            redirects,
            state: Mutex::new(PolicyState {
                rotation: EndpointRotation::new(config.endpoints, config.switch_threshold),
                max_retries: config.max_retries,
            }),
            backoff: BackoffPolicy::default(),
            event_bus: None,
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: AcquisitionEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Acquisition(event));
        }
    }

    /// Obtain a final video URL.
    ///
    /// Up to `max_retries` attempts are made against the current endpoint,
    /// rotating after `switch_threshold` consecutive failures. A successful
    /// extraction is passed through the redirect resolver and returned at once.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError::Exhausted`] when every attempt failed.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<String> {
        let max_retries = self.state.lock().max_retries;
        let mut retries = 0u32;

        while retries < max_retries {
            let (endpoint_index, endpoint) = {
                let state = self.state.lock();
                (
                    state.rotation.current_index(),
                    state.rotation.current().to_string(),
                )
            };
            info!(endpoint = %endpoint, attempt = retries + 1, "Requesting video link");

            match self.fetcher.fetch(&endpoint).await {
                Ok(candidate) => {
                    let url = self.redirects.resolve(&candidate).await;
                    self.state.lock().rotation.record_success(endpoint_index);
                    self.emit(AcquisitionEvent::Acquired {
                        url: url.clone(),
                        endpoint_index,
                    });
                    return Ok(url);
                }
                Err(err) => {
                    retries += 1;
                    warn!(
                        error = %err,
                        endpoint = %endpoint,
                        attempt = retries,
                        max_retries,
                        "Video link attempt failed"
                    );
                    self.emit(AcquisitionEvent::AttemptFailed {
                        endpoint_index,
                        attempt: retries,
                        reason: err.to_string(),
                    });

                    if err.counts_toward_rotation() {
                        let rotated = self.state.lock().rotation.record_failure(endpoint_index);
                        if let Some(rotation) = rotated {
                            let endpoint = self.current_endpoint();
                            self.emit(AcquisitionEvent::EndpointRotated {
                                from_index: rotation.from_index,
                                to_index: rotation.to_index,
                                endpoint,
                            });
                        }
                    }

                    if retries < max_retries {
                        let wait = self.backoff.delay_for(&err, retries);
                        info!(wait_ms = wait.as_millis() as u64, "Retrying after backoff");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        error!(attempts = retries, "All video link attempts failed");
        self.emit(AcquisitionEvent::Failed { attempts: retries });
        Err(AcquisitionError::Exhausted { attempts: retries })
    }

    pub fn current_endpoint(&self) -> String {
        self.state.lock().rotation.current().to_string()
    }

    pub fn current_endpoint_index(&self) -> usize {
        self.state.lock().rotation.current_index()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.state.lock().rotation.endpoints().to_vec()
    }

    pub fn max_retries(&self) -> u32 {
        self.state.lock().max_retries
    }

    pub fn switch_threshold(&self) -> u32 {
        self.state.lock().rotation.switch_threshold()
    }

    /// Change the attempt limit; takes effect on the next `acquire()`.
    pub fn set_max_retries(&self, max_retries: u32) -> Result<()> {
        if max_retries == 0 {
            return Err(
                core_runtime::Error::Config("max_retries must be at least 1".to_string()).into(),
            );
        }
        self.state.lock().max_retries = max_retries;
        info!(max_retries, "Updated retry limit");
        Ok(())
    }

    pub fn set_switch_threshold(&self, threshold: u32) -> Result<()> {
        if threshold == 0 {
            return Err(
                core_runtime::Error::Config("switch_threshold must be at least 1".to_string())
                    .into(),
            );
        }
        self.state.lock().rotation.set_switch_threshold(threshold);
        info!(threshold, "Updated endpoint switch threshold");
        Ok(())
    }

    /// Replace the endpoint list. The cursor restarts at the first entry.
    pub fn set_endpoints(&self, endpoints: Vec<String>) -> Result<()> {
        validate_endpoints(&endpoints)?;
        let count = endpoints.len();
        self.state.lock().rotation.replace_endpoints(endpoints);
        info!(count, "Replaced endpoint list");
        Ok(())
    }
}

#[async_trait]
impl VideoLinkSource for AcquisitionService {
    async fn acquire(&self) -> Result<String> {
        AcquisitionService::acquire(self).await
    }
}
