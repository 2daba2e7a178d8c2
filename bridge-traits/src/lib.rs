//! # Host Bridge Traits
//!
//! Capability contracts that the clipfeed core consumes and each host platform
//! implements.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - link-list requests, redirect probing, media downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - cache directory I/O
//! - [`VideoPlayer`](playback::VideoPlayer) - the host's media engine (load/play/pause/seek/volume)
//! - [`Clock`](time::Clock) - wall clock used for cache file names and stats
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | HTTP + filesystem; player supplied by the host |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should distinguish timeouts and connection failures from other errors, since
//! the acquisition policy waits differently for each.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so the background cache filler and
//! the playback controller can share them.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use playback::{EndCallback, VideoPlayer};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
