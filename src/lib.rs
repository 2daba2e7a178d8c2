//! Workspace umbrella crate.
//!
//! Exposes feature flags that map to the individual workspace crates
//! (`core-service`, `core-acquisition`, `core-playback`). Host applications can
//! depend on `clipfeed-workspace` and enable the documented features without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "acquisition")]
pub use core_acquisition as acquisition;

#[cfg(feature = "playback")]
pub use core_playback as playback;
