//! # Playback & Cache Module
//!
//! Bounded local cache of downloaded videos and the coordination that plays
//! them back.
//!
//! ## Overview
//!
//! This module handles:
//! - `CacheStore`: admission, ordered unplayed/played queues, eviction and
//!   startup reconciliation of the cache directory
//! - `CacheFiller`: background producer keeping the unplayed queue topped up
//! - `PlaybackController`: drives the host `VideoPlayer`, with autoplay on end
//! - `StatusMonitor`: periodic read-only snapshots of player and cache state

pub mod cache;
pub mod controller;
pub mod error;
pub mod monitor;

pub use cache::{
    CacheConfig, CacheFiller, CacheStats, CacheStore, CachedItem, FillOutcome, FillerConfig,
    FillerHandle,
};
pub use controller::{ControllerConfig, NowPlaying, PlaybackController};
pub use error::{PlaybackError, Result};
pub use monitor::{format_clock, StatusMonitor, StatusSnapshot};
