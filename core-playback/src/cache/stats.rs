//! Cache statistics and reporting

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Point-in-time statistics about the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of tracked items (unplayed + played)
    pub total_items: usize,

    /// Items waiting to be played
    pub unplayed_items: usize,

    /// Items already handed to the player
    pub played_items: usize,

    /// Sum of the tracked files' sizes; missing files count as 0
    pub total_bytes: u64,

    pub max_total: usize,
    pub max_unplayed: usize,
    pub cache_dir: PathBuf,

    /// Unix timestamp when stats were calculated
    pub calculated_at: i64,
}

impl CacheStats {
    /// Total size formatted as `B`, `KB`, `MB` or `GB`.
    pub fn human_size(&self) -> String {
        format_size(self.total_bytes)
    }

    /// Fill level relative to `max_total`, as a percentage.
    pub fn usage_percentage(&self) -> f64 {
        if self.max_total == 0 {
            return 0.0;
        }

        (self.total_items as f64 / self.max_total as f64) * 100.0
    }

    /// Returns true when another admission will trigger eviction.
    pub fn is_full(&self) -> bool {
        self.total_items >= self.max_total
    }

    /// Returns true while the filler should keep acquiring.
    pub fn below_watermark(&self) -> bool {
        self.unplayed_items < self.max_unplayed
    }

    /// Multi-line report of the cache state.
    pub fn summary(&self) -> String {
        format!(
            "Total cached: {}\nUnplayed: {}\nTotal size: {}\nCache directory: {}\nMax cached: {}\nMax unplayed: {}",
            self.total_items,
            self.unplayed_items,
            self.human_size(),
            self.cache_dir.display(),
            self.max_total,
            self.max_unplayed,
        )
    }
}

/// Format a byte count with two decimals above one kilobyte.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    }
}
