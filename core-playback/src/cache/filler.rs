//! Background producer that keeps the unplayed queue topped up.

use crate::cache::{config::FillerConfig, store::CacheStore};
use core_acquisition::VideoLinkSource;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of a single filler iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// A new video was cached.
    Admitted(PathBuf),
    /// The unplayed watermark was already met.
    Saturated,
    /// No URL could be acquired.
    AcquireFailed,
    /// A URL was acquired but the download did not make it into the cache.
    AdmitFailed,
}

/// Repeatedly acquires and admits videos while the cache is below its
/// unplayed watermark.
pub struct CacheFiller {
    source: Arc<dyn VideoLinkSource>,
    store: Arc<CacheStore>,
    config: FillerConfig,
}

impl CacheFiller {
    pub fn new(
        source: Arc<dyn VideoLinkSource>,
        store: Arc<CacheStore>,
        config: FillerConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Run one iteration without waiting.
    pub async fn fill_once(&self) -> FillOutcome {
        let unplayed = self.store.count_unplayed();
        if unplayed >= self.config.max_unplayed {
            debug!(
                unplayed,
                max_unplayed = self.config.max_unplayed,
                "Cache filler: watermark satisfied"
            );
            return FillOutcome::Saturated;
        }

        info!(
            unplayed,
            max_unplayed = self.config.max_unplayed,
            "Cache filler: fetching another video"
        );

        let url = match self.source.acquire().await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cache filler: no video link");
                return FillOutcome::AcquireFailed;
            }
        };

        match self.store.admit(&url).await {
            Ok(path) => FillOutcome::Admitted(path),
            Err(e) => {
                warn!(error = %e, "Cache filler: download failed");
                FillOutcome::AdmitFailed
            }
        }
    }

    fn wait_after(&self, outcome: &FillOutcome) -> Duration {
        match outcome {
            FillOutcome::Admitted(_) => Duration::ZERO,
            FillOutcome::Saturated => self.config.idle_wait,
            FillOutcome::AcquireFailed | FillOutcome::AdmitFailed => self.config.failure_wait,
        }
    }

    /// Loop until `cancel` fires.
    ///
    /// Cancellation is observed between iterations and during waits; an
    /// in-flight acquisition or download always runs to completion. A panic
    /// inside an iteration is logged and followed by `error_wait`.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Cache filler started");

        while !cancel.is_cancelled() {
            let wait = match AssertUnwindSafe(self.fill_once()).catch_unwind().await {
                Ok(outcome) => self.wait_after(&outcome),
                Err(_) => {
                    error!("Cache filler iteration aborted unexpectedly");
                    self.config.error_wait
                }
            };

            if wait.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Cache filler stopped");
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(self) -> FillerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        FillerHandle { cancel, task }
    }
}

/// Handle to a spawned [`CacheFiller`].
pub struct FillerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FillerHandle {
    /// Raise the stop signal without waiting.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the filler and wait up to `grace` for it to exit.
    ///
    /// Returns `false` if the loop was still busy when the grace period ran
    /// out; the task is left to finish on its own.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Cache filler task failed");
                true
            }
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "Cache filler did not stop in time");
                false
            }
        }
    }
}
