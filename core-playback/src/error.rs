//! # Playback Error Types
//!
//! Errors raised by the cache store and the playback controller.

use thiserror::Error;

/// Errors that can occur during caching and playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Download Errors
    // ========================================================================
    /// The media transfer failed or timed out.
    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    /// The transfer finished but left a missing or zero-byte file.
    #[error("Download incomplete: {0}")]
    DownloadIncomplete(String),

    /// A cache directory or file operation failed.
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    // ========================================================================
    // Player Errors
    // ========================================================================
    /// The player refused to load the file.
    #[error("Player could not load {0}")]
    LoadFailed(String),

    /// The player engine reported an error.
    #[error("Player error: {0}")]
    PlayerError(String),

    /// Neither the cache nor an on-demand acquisition produced a video.
    #[error("No video available, retry later")]
    NothingToPlay,

    // ========================================================================
    // Upstream Errors
    // ========================================================================
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] core_acquisition::AcquisitionError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl PlaybackError {
    /// Returns `true` if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::DownloadFailed { .. }
                | PlaybackError::DownloadIncomplete(_)
                | PlaybackError::NothingToPlay
                | PlaybackError::Acquisition(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
