//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the clipfeed crates:
//! - Logging and tracing infrastructure
//! - Player configuration and bridge wiring
//! - Event bus system

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
