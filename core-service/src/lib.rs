//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`PlayerConfig`] (with its HTTP and filesystem bridges)
//! and a host-provided [`VideoPlayer`] into the shared core: acquisition,
//! the video cache, its background filler, the playback controller and the
//! status monitor. Desktop apps typically enable the `desktop-shims` feature,
//! which lets the configuration fall back to the `bridge-desktop` adapters.
//!
//! ```rust,ignore
//! use core_service::{PlayerConfig, VideoFeedService};
//!
//! let config = PlayerConfig::builder().api_key_from_env().build()?;
//! let service = VideoFeedService::start(config, player).await?;
//! service.controller().play_next().await?;
//! // ...
//! service.shutdown().await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_runtime::config::{FillerTimings, PlayerConfig, PlayerConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventBus, EventStream};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

use bridge_traits::playback::VideoPlayer;
use core_acquisition::{AcquisitionConfig, AcquisitionService};
use core_playback::{
    CacheConfig, CacheFiller, CacheStats, CacheStore, ControllerConfig, FillerConfig,
    FillerHandle, PlaybackController, StatusMonitor, StatusSnapshot,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// How long shutdown waits for the filler to finish its current iteration.
pub const FILLER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_BUS_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
///
/// Owns the background filler and status monitor; both stop on
/// [`shutdown`](Self::shutdown).
pub struct VideoFeedService {
    config: PlayerConfig,
    event_bus: EventBus,
    player: Arc<dyn VideoPlayer>,
    acquisition: Arc<AcquisitionService>,
    store: Arc<CacheStore>,
    controller: Arc<PlaybackController>,
    filler: Mutex<Option<FillerHandle>>,
    monitor_cancel: CancellationToken,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
    status: watch::Receiver<StatusSnapshot>,
}

impl VideoFeedService {
    /// Build every component and start the background tasks.
    ///
    /// Installs the configured global subscriber first; one already installed
    /// by the host is kept. Opening the cache reconciles it with the files already on disk before
    /// the filler starts.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the cache directory cannot be
    /// prepared, or no tokio runtime is running.
    #[instrument(skip_all)]
    pub async fn start(config: PlayerConfig, player: Arc<dyn VideoPlayer>) -> Result<Self> {
        config.validate()?;
        if let Some(logging) = config.logging.clone() {
            if let Err(e) = init_logging(logging) {
                warn!(error = %e, "Keeping the existing log subscriber");
            }
        }

        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

        let acquisition = Arc::new(
            AcquisitionService::new(AcquisitionConfig::from(&config), config.http_client.clone())?
                .with_event_bus(event_bus.clone()),
        );

        let store = Arc::new(
            CacheStore::builder(
                CacheConfig::from(&config),
                config.file_system.clone(),
                config.http_client.clone(),
            )
            .event_bus(event_bus.clone())
            .open()
            .await?,
        );

        let controller = PlaybackController::new(
            player.clone(),
            store.clone(),
            acquisition.clone(),
            ControllerConfig::from(&config),
            Some(event_bus.clone()),
        )?;

        let filler = CacheFiller::new(
            acquisition.clone(),
            store.clone(),
            FillerConfig::from(&config),
        )
        .spawn();

        let monitor_cancel = CancellationToken::new();
        let (status, monitor_task) =
            StatusMonitor::new(player.clone(), store.clone(), config.monitor_interval)
                .with_controller(controller.clone())
                .spawn(monitor_cancel.clone());

        info!(
            endpoints = config.endpoints.len(),
            cache_dir = ?config.cache_dir,
            cached = store.count_total(),
            unplayed = store.count_unplayed(),
            "Video feed service started"
        );

        Ok(Self {
            config,
            event_bus,
            player,
            acquisition,
            store,
            controller,
            filler: Mutex::new(Some(filler)),
            monitor_cancel,
            monitor_task: Mutex::new(Some(monitor_task)),
            status,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn controller(&self) -> Arc<PlaybackController> {
        Arc::clone(&self.controller)
    }

    pub fn cache(&self) -> Arc<CacheStore> {
        Arc::clone(&self.store)
    }

    /// Live acquisition policy; its retry and endpoint settings can be
    /// changed while running.
    pub fn acquisition(&self) -> Arc<AcquisitionService> {
        Arc::clone(&self.acquisition)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Latest status snapshot, refreshed every `monitor_interval`.
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.store.stats().await
    }

    /// Stop playback and delete every cached video.
    pub async fn clear_cache(&self) -> Result<usize> {
        self.controller.stop().await?;
        Ok(self.store.clear().await)
    }

    /// Stop background tasks and the player.
    ///
    /// Waits up to [`FILLER_JOIN_TIMEOUT`] for an in-flight acquisition or
    /// download to finish. Calling it twice is harmless.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.monitor_cancel.cancel();

        let filler = self.filler.lock().take();
        if let Some(filler) = filler {
            if !filler.shutdown(FILLER_JOIN_TIMEOUT).await {
                warn!("Cache filler still busy after shutdown timeout");
            }
        }

        let monitor = self.monitor_task.lock().take();
        if let Some(task) = monitor {
            if let Err(e) = task.await {
                warn!(error = %e, "Status monitor task failed");
            }
        }

        if let Err(e) = self.controller.stop().await {
            warn!(error = %e, "Failed to stop player");
        }

        info!("Video feed service stopped");
    }

    pub fn player(&self) -> Arc<dyn VideoPlayer> {
        Arc::clone(&self.player)
    }
}
