//! # Event Bus System
//!
//! Decoupled notifications between the acquisition service, the cache and the
//! playback controller, built on `tokio::sync::broadcast`.
//!
//! ```text
//! ┌──────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Acquisition  ├─────────>│           ├────────────>│ UI / host  │
//! ├──────────────┤          │ EventBus  │             └────────────┘
//! │ CacheStore   ├─────────>│ (broadcast│  subscribe  ┌────────────┐
//! ├──────────────┤          │  channel) ├────────────>│ Tests      │
//! │ Playback     ├─────────>│           │             └────────────┘
//! └──────────────┘          └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus, EventStream};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Cache(_)));
//!
//! bus.emit(CoreEvent::Cache(CacheEvent::Cleared { removed: 3 })).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event, CoreEvent::Cache(CacheEvent::Cleared { removed: 3 }));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns an error. Services ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Acquisition(AcquisitionEvent),
    Cache(CacheEvent),
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Short human-readable description
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Acquisition(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Acquisition(AcquisitionEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::AdmissionFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::StaleSkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Acquisition(AcquisitionEvent::EndpointRotated { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Acquisition(AcquisitionEvent::Acquired { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Admitted { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Acquisition Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AcquisitionEvent {
    /// A playable URL was obtained.
    Acquired { url: String, endpoint_index: usize },
    /// One attempt failed; more may follow.
    AttemptFailed {
        endpoint_index: usize,
        attempt: u32,
        reason: String,
    },
    /// The active endpoint changed after repeated failures.
    EndpointRotated {
        from_index: usize,
        to_index: usize,
        endpoint: String,
    },
    /// Every attempt was used up without a URL.
    Failed { attempts: u32 },
}

impl AcquisitionEvent {
    fn description(&self) -> &str {
        match self {
            AcquisitionEvent::Acquired { .. } => "Video link acquired",
            AcquisitionEvent::AttemptFailed { .. } => "Acquisition attempt failed",
            AcquisitionEvent::EndpointRotated { .. } => "Switched to next endpoint",
            AcquisitionEvent::Failed { .. } => "Acquisition failed",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    Admitted { path: String, size_bytes: u64 },
    AdmissionFailed { source_url: String, message: String },
    Evicted { path: String, was_played: bool },
    /// A queued file was missing or empty and its record was dropped.
    StaleSkipped { path: String },
    Cleared { removed: usize },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Admitted { .. } => "Video cached",
            CacheEvent::AdmissionFailed { .. } => "Video download failed",
            CacheEvent::Evicted { .. } => "Cached video evicted",
            CacheEvent::StaleSkipped { .. } => "Skipped invalid cached video",
            CacheEvent::Cleared { .. } => "Cache cleared",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    Started { path: String, cached: bool },
    Paused { path: String, position_ms: i64 },
    Resumed { path: String, position_ms: i64 },
    Stopped,
    Completed { path: String },
    Error {
        path: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Video finished",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cheap to clone; clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning the number of subscribers that received it.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Wait for the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn admitted(n: u64) -> CoreEvent {
        CoreEvent::Cache(CacheEvent::Admitted {
            path: format!("cache/video_{}.mp4", n),
            size_bytes: 1024,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(admitted(1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Acquisition(AcquisitionEvent::EndpointRotated {
            from_index: 0,
            to_index: 1,
            endpoint: "https://b.example.com".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Playback(_)));

        bus.emit(admitted(1)).ok();
        let playback = CoreEvent::Playback(PlaybackEvent::Started {
            path: "cache/video_1.mp4".to_string(),
            cached: true,
        });
        bus.emit(playback.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), playback);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(admitted(i)).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Acquisition(AcquisitionEvent::Failed { attempts: 3 });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(admitted(1).severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Cache(CacheEvent::Evicted {
                path: "a".to_string(),
                was_played: true
            })
            .severity(),
            EventSeverity::Debug
        );
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Cache(CacheEvent::Cleared { removed: 2 });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Cache");
        assert_eq!(json["payload"]["event"], "Cleared");
        assert_eq!(json["payload"]["removed"], 2);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.description(), "Cache cleared");
    }
}
