//! Periodic, read-only status snapshots of the player and the cache.

use crate::cache::CacheStore;
use crate::controller::PlaybackController;
use bridge_traits::playback::VideoPlayer;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// What a status bar needs to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub position_ms: i64,
    pub length_ms: i64,
    pub is_playing: bool,
    /// 0.0..=100.0, or 0.0 when the length is unknown
    pub progress_percent: f64,
    /// `MM:SS/MM:SS`
    pub time_label: String,
    pub cache_total: usize,
    pub cache_unplayed: usize,
    pub current: Option<PathBuf>,
}

impl StatusSnapshot {
    /// One-line cache status, e.g. `Cache: 12 total, 4 unplayed`.
    pub fn cache_label(&self) -> String {
        format!(
            "Cache: {} total, {} unplayed",
            self.cache_total, self.cache_unplayed
        )
    }
}

/// Format milliseconds as `MM:SS`. Negative values render as `00:00`.
pub fn format_clock(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Polls player position and cache counters on a fixed interval.
///
/// Only counters are read from the cache, so polling never contends with
/// admissions or playback for the cache lock.
pub struct StatusMonitor {
    player: Arc<dyn VideoPlayer>,
    store: Arc<CacheStore>,
    controller: Option<Arc<PlaybackController>>,
    interval: Duration,
}

impl StatusMonitor {
    pub fn new(player: Arc<dyn VideoPlayer>, store: Arc<CacheStore>, interval: Duration) -> Self {
        Self {
            player,
            store,
            controller: None,
            interval,
        }
    }

    /// Include the controller's current video in snapshots.
    pub fn with_controller(mut self, controller: Arc<PlaybackController>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let position_ms = self.player.current_time_ms().max(0);
        let length_ms = self.player.length_ms();

        let progress_percent = if length_ms > 0 {
            (position_ms as f64 / length_ms as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        StatusSnapshot {
            position_ms,
            length_ms,
            is_playing: self.player.is_playing(),
            progress_percent,
            time_label: format!(
                "{}/{}",
                format_clock(position_ms),
                format_clock(length_ms)
            ),
            cache_total: self.store.count_total(),
            cache_unplayed: self.store.count_unplayed(),
            current: self
                .controller
                .as_ref()
                .and_then(|c| c.current())
                .map(|now| now.path),
        }
    }

    /// Spawn the polling loop. Stops when `cancel` fires.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (watch::Receiver<StatusSnapshot>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(self.snapshot());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match std::panic::catch_unwind(AssertUnwindSafe(|| self.snapshot())) {
                    Ok(snapshot) => {
                        tx.send_replace(snapshot);
                    }
                    Err(_) => error!("Status poll failed"),
                }
            }

            debug!("Status monitor stopped");
        });

        (rx, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(-500), "00:00");
        assert_eq!(format_clock(59_999), "00:59");
        assert_eq!(format_clock(61_000), "01:01");
        assert_eq!(format_clock(3_600_000), "60:00");
    }

    #[test]
    fn test_cache_label() {
        let snapshot = StatusSnapshot {
            cache_total: 12,
            cache_unplayed: 4,
            ..Default::default()
        };
        assert_eq!(snapshot.cache_label(), "Cache: 12 total, 4 unplayed");
    }
}
