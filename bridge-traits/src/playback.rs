//! Video playback bridge.
//!
//! The core never decodes or renders media itself. Hosts provide a
//! [`VideoPlayer`] wrapping their native engine (libVLC, AVPlayer, ExoPlayer,
//! ...) and the core drives it through this contract.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Callback fired by the player when the current media reaches its end.
///
/// Invoked from the host engine's own thread; implementations of the callback
/// must not block.
pub type EndCallback = Box<dyn Fn() + Send + Sync>;

/// Trait for platform-specific video engines.
#[async_trait]
pub trait VideoPlayer: Send + Sync {
    /// Load a local media file. Returns `Ok(false)` when the engine rejects
    /// the file (corrupted, unsupported), `Err` for engine failures.
    async fn load(&self, path: &Path) -> Result<bool>;

    /// Begin or resume playback of the loaded media.
    async fn play(&self) -> Result<()>;

    /// Pause playback without unloading.
    async fn pause(&self) -> Result<()>;

    /// Stop playback and unload the current media.
    async fn stop(&self) -> Result<()>;

    /// Set output volume in the range `0..=100`.
    async fn set_volume(&self, volume: u8) -> Result<()>;

    /// Seek to a fraction of the media length in `0.0..=1.0`.
    async fn set_position(&self, fraction: f32) -> Result<()>;

    /// Current position in milliseconds, or a negative value when unknown.
    fn current_time_ms(&self) -> i64;

    /// Media length in milliseconds, or a non-positive value when unknown.
    fn length_ms(&self) -> i64;

    fn is_playing(&self) -> bool;

    /// Register the end-of-media callback, replacing any previous one.
    fn set_end_callback(&self, callback: EndCallback);
}
