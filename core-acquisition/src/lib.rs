//! # Video Link Acquisition
//!
//! Obtains playable video URLs from unreliable upstream link-list endpoints.
//!
//! ```text
//! AcquisitionService::acquire()
//!   ├─> LinkFetcher      GET endpoints[current] (headers, bearer token, 10s timeout)
//!   │     └─> UrlResolver  JSON key probing, then text fallback
//!   ├─> EndpointRotation  failover after consecutive failures
//!   └─> RedirectResolver  manual redirect walk, at most 5 hops
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_acquisition::{AcquisitionConfig, AcquisitionService};
//!
//! let service = AcquisitionService::new(AcquisitionConfig::default(), http_client)?;
//! let url = service.acquire().await?;
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod redirect;
pub mod resolver;
pub mod service;

pub use config::AcquisitionConfig;
pub use error::{AcquisitionError, NetworkErrorKind, Result};
pub use fetcher::{EndpointRotation, LinkFetcher, Rotation};
pub use redirect::RedirectResolver;
pub use resolver::UrlResolver;
pub use service::{AcquisitionService, BackoffPolicy, VideoLinkSource};
