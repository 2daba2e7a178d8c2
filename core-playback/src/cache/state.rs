//! Ordered queue state of the cache.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::CachedItem;

/// The unplayed and played queues.
///
/// An item lives in exactly one queue or in neither. Both queues are kept in
/// insertion order, oldest at the front.
#[derive(Debug, Default)]
pub struct CacheState {
    unplayed: VecDeque<CachedItem>,
    played: VecDeque<CachedItem>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.unplayed.len() + self.played.len()
    }

    pub fn unplayed_len(&self) -> usize {
        self.unplayed.len()
    }

    pub fn played_len(&self) -> usize {
        self.played.len()
    }

    pub fn push_unplayed(&mut self, item: CachedItem) {
        self.unplayed.push_back(item);
    }

    pub fn pop_unplayed(&mut self) -> Option<CachedItem> {
        self.unplayed.pop_front()
    }

    pub fn push_played(&mut self, item: CachedItem) {
        self.played.push_back(item);
    }

    /// Move `path` from unplayed to the back of played.
    ///
    /// Returns `false` if it was not waiting in unplayed.
    pub fn move_to_played(&mut self, path: &Path) -> bool {
        match self.unplayed.iter().position(|item| item.path == path) {
            Some(index) => {
                if let Some(item) = self.unplayed.remove(index) {
                    self.played.push_back(item);
                }
                true
            }
            None => false,
        }
    }

    /// Remove `path` from whichever queue holds it.
    ///
    /// The flag is `true` when the item came from the played queue.
    pub fn remove(&mut self, path: &Path) -> Option<(CachedItem, bool)> {
        if let Some(index) = self.unplayed.iter().position(|item| item.path == path) {
            return self.unplayed.remove(index).map(|item| (item, false));
        }
        if let Some(index) = self.played.iter().position(|item| item.path == path) {
            return self.played.remove(index).map(|item| (item, true));
        }
        None
    }

    /// Next eviction victim: oldest played, otherwise oldest unplayed.
    pub fn pop_eviction_candidate(&mut self) -> Option<(CachedItem, bool)> {
        if let Some(item) = self.played.pop_front() {
            return Some((item, true));
        }
        self.unplayed.pop_front().map(|item| (item, false))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.unplayed.iter().chain(self.played.iter()).any(|item| item.path == path)
    }

    pub fn unplayed_paths(&self) -> Vec<PathBuf> {
        self.unplayed.iter().map(|item| item.path.clone()).collect()
    }

    pub fn played_paths(&self) -> Vec<PathBuf> {
        self.played.iter().map(|item| item.path.clone()).collect()
    }

    /// Every tracked path, unplayed first.
    pub fn all_paths(&self) -> Vec<PathBuf> {
        self.unplayed
            .iter()
            .chain(self.played.iter())
            .map(|item| item.path.clone())
            .collect()
    }

    /// Empty both queues, returning everything that was tracked.
    pub fn drain(&mut self) -> Vec<CachedItem> {
        self.unplayed.drain(..).chain(self.played.drain(..)).collect()
    }
}
