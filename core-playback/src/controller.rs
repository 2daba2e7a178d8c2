//! # Playback Controller
//!
//! Drives the host [`VideoPlayer`] from the cache.
//!
//! `play_next()` prefers cached videos and falls back to acquiring one on
//! demand when the cache is empty. Files the player refuses to load are
//! removed from the cache and the next one is tried. When a video ends the
//! controller waits `autoplay_delay` and plays the next one.

use crate::cache::CacheStore;
use crate::error::{PlaybackError, Result};
use bridge_traits::playback::VideoPlayer;
use core_acquisition::VideoLinkSource;
use core_runtime::config::PlayerConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument, warn};

/// Controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Pause between the end of one video and the start of the next
    pub autoplay_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            autoplay_delay: Duration::from_secs(1),
        }
    }
}

impl From<&PlayerConfig> for ControllerConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            autoplay_delay: config.autoplay_delay,
        }
    }
}

/// The video currently loaded in the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub path: PathBuf,
    /// `false` for files opened with [`PlaybackController::open_local`]
    pub cached: bool,
}

/// Resets the loading flag when a `play_next` call finishes.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PlaybackController {
    player: Arc<dyn VideoPlayer>,
    store: Arc<CacheStore>,
    source: Arc<dyn VideoLinkSource>,
    config: ControllerConfig,
    event_bus: Option<EventBus>,
    loading: AtomicBool,
    current: Mutex<Option<NowPlaying>>,
}

impl PlaybackController {
    /// Create a controller and register its end-of-media callback.
    ///
    /// Must be called from within a tokio runtime; autoplay tasks are spawned
    /// on that runtime from the player's callback thread.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Config`] when no runtime is available.
    pub fn new(
        player: Arc<dyn VideoPlayer>,
        store: Arc<CacheStore>,
        source: Arc<dyn VideoLinkSource>,
        config: ControllerConfig,
        event_bus: Option<EventBus>,
    ) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| {
            core_runtime::Error::Internal(format!("Playback controller needs a tokio runtime: {}", e))
        })?;

        let controller = Arc::new(Self {
            player,
            store,
            source,
            config,
            event_bus,
            loading: AtomicBool::new(false),
            current: Mutex::new(None),
        });

        Self::install_end_callback(&controller, runtime);
        Ok(controller)
    }

    fn install_end_callback(controller: &Arc<Self>, runtime: Handle) {
        let weak: Weak<Self> = Arc::downgrade(controller);
        controller.player.set_end_callback(Box::new(move || {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            runtime.spawn(async move {
                controller.on_media_end().await;
            });
        }));
    }

    async fn on_media_end(&self) {
        let finished = self.current.lock().clone();
        if let Some(finished) = finished {
            info!(path = ?finished.path, "Video finished, playing next");
            self.emit(PlaybackEvent::Completed {
                path: finished.path.display().to_string(),
            });
        }

        tokio::time::sleep(self.config.autoplay_delay).await;
        if let Err(e) = self.play_next().await {
            warn!(error = %e, "Autoplay failed");
            self.emit(PlaybackEvent::Error {
                path: None,
                message: e.to_string(),
                recoverable: e.is_transient(),
            });
        }
    }

    /// Play the next video.
    ///
    /// Returns `Ok(None)` if another `play_next` is already loading.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NothingToPlay`] when the cache is empty and no video
    /// could be acquired on demand; [`PlaybackError::PlayerError`] for engine
    /// failures.
    #[instrument(skip(self))]
    pub async fn play_next(&self) -> Result<Option<PathBuf>> {
        if self.loading.swap(true, Ordering::AcqRel) {
            debug!("Already loading a video");
            return Ok(None);
        }
        let _guard = LoadingGuard(&self.loading);

        while let Some(path) = self.store.take_next().await {
            match self.start(&path, true).await {
                Ok(()) => return Ok(Some(path)),
                Err(PlaybackError::LoadFailed(reason)) => {
                    warn!(path = ?path, "Dropping cached video the player rejected");
                    self.store.remove(&path).await;
                    self.emit(PlaybackEvent::Error {
                        path: Some(path.display().to_string()),
                        message: reason,
                        recoverable: true,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!("No cached video, fetching one on demand");
        let path = self.fetch_on_demand().await?;
        match self.start(&path, true).await {
            Ok(()) => Ok(Some(path)),
            Err(PlaybackError::LoadFailed(reason)) => {
                self.store.remove(&path).await;
                self.emit(PlaybackEvent::Error {
                    path: Some(path.display().to_string()),
                    message: reason,
                    recoverable: true,
                });
                Err(PlaybackError::NothingToPlay)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_on_demand(&self) -> Result<PathBuf> {
        let url = self.source.acquire().await.map_err(|e| {
            error!(error = %e, "Could not get a video link");
            PlaybackError::NothingToPlay
        })?;

        let path = self.store.admit(&url).await.map_err(|e| {
            error!(error = %e, "Could not cache the video");
            PlaybackError::NothingToPlay
        })?;

        self.store.mark_played(&path).await;
        Ok(path)
    }

    /// Play a file chosen by the user. It is not tracked by the cache.
    #[instrument(skip(self))]
    pub async fn open_local(&self, path: &Path) -> Result<()> {
        self.start(path, false).await
    }

    async fn start(&self, path: &Path, cached: bool) -> Result<()> {
        self.player.stop().await.map_err(player_error)?;

        let loaded = match self.player.load(path).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(path = ?path, error = %e, "Player failed to load video");
                false
            }
        };
        if !loaded {
            *self.current.lock() = None;
            return Err(PlaybackError::LoadFailed(path.display().to_string()));
        }

        self.player.play().await.map_err(player_error)?;
        *self.current.lock() = Some(NowPlaying {
            path: path.to_path_buf(),
            cached,
        });

        info!(path = ?path, cached, "Playing video");
        self.emit(PlaybackEvent::Started {
            path: path.display().to_string(),
            cached,
        });
        Ok(())
    }

    /// Pause or resume. With nothing loaded, behaves like [`play_next`](Self::play_next).
    pub async fn toggle_pause(&self) -> Result<()> {
        let Some(now) = self.current() else {
            return self.play_next().await.map(|_| ());
        };

        let position_ms = self.player.current_time_ms();
        let path = now.path.display().to_string();

        if self.player.is_playing() {
            self.player.pause().await.map_err(player_error)?;
            self.emit(PlaybackEvent::Paused { path, position_ms });
        } else {
            self.player.play().await.map_err(player_error)?;
            self.emit(PlaybackEvent::Resumed { path, position_ms });
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.player.stop().await.map_err(player_error)?;
        *self.current.lock() = None;
        self.emit(PlaybackEvent::Stopped);
        Ok(())
    }

    /// Set the volume, clamped to `0..=100`. Returns the applied value.
    pub async fn set_volume(&self, volume: i32) -> Result<u8> {
        let volume = volume.clamp(0, 100) as u8;
        self.player.set_volume(volume).await.map_err(player_error)?;
        debug!(volume, "Volume set");
        Ok(volume)
    }

    /// Seek to a fraction of the video, clamped to `0.0..=1.0`.
    ///
    /// Ignored unless something is playing; returns whether the seek was sent.
    pub async fn seek(&self, fraction: f32) -> Result<bool> {
        if self.current().is_none() || !self.player.is_playing() {
            return Ok(false);
        }

        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.player
            .set_position(fraction)
            .await
            .map_err(player_error)?;
        Ok(true)
    }

    pub fn current(&self) -> Option<NowPlaying> {
        self.current.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}

fn player_error(e: bridge_traits::BridgeError) -> PlaybackError {
    PlaybackError::PlayerError(e.to_string())
}
