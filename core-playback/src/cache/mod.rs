//! # Video Cache Module
//!
//! Bounded, ordered on-disk cache of downloaded videos.
//!
//! ## Overview
//!
//! - Flat directory of `video_<unix-seconds>.mp4` files, no sidecar metadata
//! - Two ordered queues (unplayed, played) behind one lock
//! - Eviction after every admission: played oldest-first, then unplayed
//! - Startup reconciliation from file modification times
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │       CacheFiller        │  background producer
//! └────────┬─────────────────┘
//!          │ acquire() + admit()
//!          v
//! ┌──────────────────────────┐
//! │        CacheStore        │
//! │  - admit()               │
//! │  - take_next()           │
//! │  - mark_played()         │
//! │  - remove()              │
//! └────────┬─────────────────┘
//!          │
//!          ├──> FileSystemAccess (cache directory)
//!          └──> HttpClient (media download)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, CacheStore};
//!
//! let store = CacheStore::open(CacheConfig::default(), fs, http).await?;
//! if let Some(path) = store.take_next().await {
//!     player.load(&path).await?;
//! }
//! ```

pub mod config;
pub mod filler;
pub mod state;
pub mod stats;
pub mod store;

use std::path::PathBuf;

pub use config::{CacheConfig, FillerConfig};
pub use filler::{CacheFiller, FillOutcome, FillerHandle};
pub use state::CacheState;
pub use stats::{format_size, CacheStats};
pub use store::{CacheStore, CacheStoreBuilder};

/// A fully downloaded file tracked by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedItem {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl CachedItem {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }
}
