//! # Cache Store
//!
//! Owns the cache directory and the unplayed/played queues.
//!
//! All queue mutation happens under one async lock, so an item is never
//! observable in both queues or missing mid-call. Item counts are mirrored
//! into atomics after every mutation so observers can read them without
//! taking the lock.

use crate::cache::{
    config::CacheConfig,
    state::CacheState,
    stats::CacheStats,
    CachedItem,
};
use crate::error::{PlaybackError, Result};
use bridge_traits::{
    http::{HttpClient, HttpRequest},
    storage::FileSystemAccess,
    time::{Clock, SystemClock},
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

const MEDIA_EXTENSION: &str = "mp4";
const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Builder used to attach optional collaborators before the store is opened.
pub struct CacheStoreBuilder {
    config: CacheConfig,
    fs: Arc<dyn FileSystemAccess>,
    http_client: Arc<dyn HttpClient>,
    event_bus: Option<EventBus>,
    clock: Arc<dyn Clock>,
}

impl CacheStoreBuilder {
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Time source for file stamps and stats. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create the cache directory and reconcile it with the queues.
    pub async fn open(self) -> Result<CacheStore> {
        self.config.validate()?;

        let store = CacheStore {
            config: self.config,
            fs: self.fs,
            http_client: self.http_client,
            event_bus: self.event_bus,
            clock: self.clock,
            state: Mutex::new(CacheState::new()),
            total: AtomicUsize::new(0),
            unplayed: AtomicUsize::new(0),
            last_stamp: parking_lot::Mutex::new(0),
        };

        store
            .fs
            .create_dir_all(&store.config.cache_dir)
            .await
            .map_err(|e| {
                error!("Failed to create cache directory: {}", e);
                PlaybackError::Filesystem(format!("Failed to create cache directory: {}", e))
            })?;

        store.reconcile().await?;
        Ok(store)
    }
}

/// Bounded, ordered on-disk cache of downloaded videos.
pub struct CacheStore {
    config: CacheConfig,
    fs: Arc<dyn FileSystemAccess>,
    http_client: Arc<dyn HttpClient>,
    event_bus: Option<EventBus>,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
    total: AtomicUsize,
    unplayed: AtomicUsize,
    last_stamp: parking_lot::Mutex<i64>,
}

impl CacheStore {
    pub fn builder(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        http_client: Arc<dyn HttpClient>,
    ) -> CacheStoreBuilder {
        CacheStoreBuilder {
            config,
            fs,
            http_client,
            event_bus: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Open a store without an event bus.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use core_playback::cache::{CacheConfig, CacheStore};
    ///
    /// let store = CacheStore::open(CacheConfig::new("cache"), fs, http).await?;
    /// println!("{} videos waiting", store.count_unplayed());
    /// ```
    pub async fn open(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        Self::builder(config, fs, http_client).open().await
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Seed `unplayed` with existing media files, oldest modification first,
    /// then enforce the size bound.
    #[instrument(skip(self))]
    async fn reconcile(&self) -> Result<()> {
        let entries = self
            .fs
            .list_directory(&self.config.cache_dir)
            .await
            .map_err(|e| {
                PlaybackError::Filesystem(format!("Failed to scan cache directory: {}", e))
            })?;

        let mut found = Vec::new();
        for path in entries {
            if !is_media_file(&path) {
                continue;
            }
            match self.fs.metadata(&path).await {
                Ok(meta) if !meta.is_directory => {
                    let modified = meta.modified.unwrap_or(SystemTime::UNIX_EPOCH);
                    found.push((modified, CachedItem::new(path, meta.size)));
                }
                Ok(_) => {}
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable cache entry"),
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.path.cmp(&b.1.path)));

        let mut state = self.state.lock().await;
        for (_, item) in found {
            state.push_unplayed(item);
        }
        let evicted = self.evict_locked(&mut state).await;
        self.publish_counts(&state);

        info!(
            cache_dir = ?self.config.cache_dir,
            total = state.total(),
            unplayed = state.unplayed_len(),
            evicted,
            "Cache reconciled"
        );
        Ok(())
    }

    /// Download `source_url` into the cache and queue it as unplayed.
    ///
    /// The file is streamed to a fresh `video_<unix-seconds>.mp4` and must be
    /// non-empty afterwards. Partial files are deleted on failure. Eviction
    /// runs after the item is queued.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::DownloadFailed`] for transfer errors and timeouts,
    /// [`PlaybackError::DownloadIncomplete`] for a missing or empty result,
    /// [`PlaybackError::Filesystem`] if the file cannot be created.
    #[instrument(skip(self))]
    pub async fn admit(&self, source_url: &str) -> Result<PathBuf> {
        let path = self.allocate_path().await;
        info!(path = ?path, "Caching video");

        let result = match self.download_to(source_url, &path).await {
            Ok(written) => {
                let size = self.fs.file_size_or_zero(&path).await;
                if size == 0 {
                    Err(PlaybackError::DownloadIncomplete(format!(
                        "{} is missing or empty after writing {} bytes",
                        path.display(),
                        written
                    )))
                } else {
                    Ok(size)
                }
            }
            Err(e) => Err(e),
        };

        let size = match result {
            Ok(size) => size,
            Err(e) => {
                error!(error = %e, "Failed to cache video");
                self.delete_backing_file(&path).await;
                self.emit(CacheEvent::AdmissionFailed {
                    source_url: source_url.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        {
            let mut state = self.state.lock().await;
            state.push_unplayed(CachedItem::new(path.clone(), size));
            self.evict_locked(&mut state).await;
            self.publish_counts(&state);
        }

        info!(path = ?path, size_bytes = size, "Video cached");
        self.emit(CacheEvent::Admitted {
            path: path.display().to_string(),
            size_bytes: size,
        });
        Ok(path)
    }

    /// Stream the resource into `path`, returning the bytes written.
    ///
    /// `download_timeout` bounds each wait for the response and for every
    /// chunk, not the transfer as a whole.
    async fn download_to(&self, source_url: &str, path: &Path) -> Result<u64> {
        let stall = self.config.download_timeout;
        let download_error = |message: String| PlaybackError::DownloadFailed {
            url: source_url.to_string(),
            message,
        };
        let stalled = |_| download_error(format!("stalled for {:?}", stall));

        let mut request = HttpRequest::get(source_url).timeout(stall);
        if let Some(user_agent) = &self.config.user_agent {
            request = request.header("User-Agent", user_agent.as_str());
        }

        let mut reader = timeout(stall, self.http_client.download_stream(request))
            .await
            .map_err(stalled)?
            .map_err(|e| download_error(e.to_string()))?;

        let mut writer = self.fs.open_write_stream(path).await.map_err(|e| {
            PlaybackError::Filesystem(format!("Failed to create {}: {}", path.display(), e))
        })?;

        let mut chunk = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = timeout(stall, reader.read(&mut chunk))
                .await
                .map_err(stalled)?
                .map_err(|e| download_error(e.to_string()))?;
            if read == 0 {
                break;
            }
            writer.write_all(&chunk[..read]).await.map_err(|e| {
                PlaybackError::Filesystem(format!("Failed to write {}: {}", path.display(), e))
            })?;
            written += read as u64;
        }
        writer
            .shutdown()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        debug!(path = ?path, bytes = written, "Download finished");
        Ok(written)
    }

    /// Pick a file name whose stamp is strictly greater than any issued
    /// before and that does not exist yet.
    async fn allocate_path(&self) -> PathBuf {
        loop {
            let stamp = {
                let mut last = self.last_stamp.lock();
                let stamp = self.clock.unix_seconds().max(*last + 1);
                *last = stamp;
                stamp
            };

            let path = self
                .config
                .cache_dir
                .join(format!("video_{}.{}", stamp, MEDIA_EXTENSION));
            if !matches!(self.fs.exists(&path).await, Ok(true)) {
                return path;
            }
        }
    }

    /// Pop the oldest valid unplayed item and move it to played.
    ///
    /// Missing or zero-length files are dropped along the way. Returns `None`
    /// once the unplayed queue is exhausted.
    #[instrument(skip(self))]
    pub async fn take_next(&self) -> Option<PathBuf> {
        let mut state = self.state.lock().await;

        let next = loop {
            let Some(item) = state.pop_unplayed() else {
                break None;
            };

            if self.is_playable(&item.path).await {
                let path = item.path.clone();
                state.push_played(item);
                break Some(path);
            }

            warn!(path = ?item.path, "Skipping invalid cached video");
            self.delete_backing_file(&item.path).await;
            self.emit(CacheEvent::StaleSkipped {
                path: item.path.display().to_string(),
            });
        };

        self.publish_counts(&state);
        match &next {
            Some(path) => info!(path = ?path, "Next cached video"),
            None => warn!("No cached video available"),
        }
        next
    }

    /// Move an admitted item from unplayed to played.
    ///
    /// Paths not waiting in unplayed are ignored.
    pub async fn mark_played(&self, path: &Path) -> bool {
        let mut state = self.state.lock().await;
        let moved = state.move_to_played(path);
        self.publish_counts(&state);
        if moved {
            debug!(path = ?path, "Marked as played");
        }
        moved
    }

    /// Drop a tracked item and delete its file.
    ///
    /// Untracked paths are logged and left alone.
    #[instrument(skip(self))]
    pub async fn remove(&self, path: &Path) -> bool {
        let mut state = self.state.lock().await;
        match state.remove(path) {
            Some((item, was_played)) => {
                self.delete_backing_file(&item.path).await;
                self.publish_counts(&state);
                info!(path = ?path, was_played, "Removed cached video");
                true
            }
            None => {
                warn!(path = ?path, "Video is not tracked by the cache");
                false
            }
        }
    }

    /// Remove every tracked item and its file.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let items = state.drain();
        for item in &items {
            self.delete_backing_file(&item.path).await;
        }
        self.publish_counts(&state);

        info!(removed = items.len(), "Cache cleared");
        self.emit(CacheEvent::Cleared {
            removed: items.len(),
        });
        items.len()
    }

    pub fn count_total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    pub fn count_unplayed(&self) -> usize {
        self.unplayed.load(Ordering::Acquire)
    }

    /// Sum of the tracked files' sizes; missing files contribute 0.
    pub async fn total_bytes_on_disk(&self) -> u64 {
        let paths = self.state.lock().await.all_paths();
        let mut total = 0u64;
        for path in &paths {
            total += self.fs.file_size_or_zero(path).await;
        }
        total
    }

    pub async fn unplayed_paths(&self) -> Vec<PathBuf> {
        self.state.lock().await.unplayed_paths()
    }

    pub async fn played_paths(&self) -> Vec<PathBuf> {
        self.state.lock().await.played_paths()
    }

    pub async fn stats(&self) -> CacheStats {
        let (unplayed_items, played_items) = {
            let state = self.state.lock().await;
            (state.unplayed_len(), state.played_len())
        };

        CacheStats {
            total_items: unplayed_items + played_items,
            unplayed_items,
            played_items,
            total_bytes: self.total_bytes_on_disk().await,
            max_total: self.config.max_total,
            max_unplayed: self.config.max_unplayed,
            cache_dir: self.config.cache_dir.clone(),
            calculated_at: self.clock.unix_seconds(),
        }
    }

    /// Evict until the bound holds: played oldest-first, then unplayed.
    async fn evict_locked(&self, state: &mut CacheState) -> usize {
        let mut evicted = 0usize;

        if state.total() > self.config.max_total {
            info!(
                total = state.total(),
                max_total = self.config.max_total,
                "Cache over limit, evicting"
            );
        }

        while state.total() > self.config.max_total {
            let Some((item, was_played)) = state.pop_eviction_candidate() else {
                break;
            };

            self.delete_backing_file(&item.path).await;
            info!(path = ?item.path, size_bytes = item.size_bytes, was_played, "Evicted cached video");
            self.emit(CacheEvent::Evicted {
                path: item.path.display().to_string(),
                was_played,
            });
            evicted += 1;
        }

        evicted
    }

    async fn is_playable(&self, path: &Path) -> bool {
        match self.fs.metadata(path).await {
            Ok(meta) => !meta.is_directory && meta.size > 0,
            Err(_) => false,
        }
    }

    /// Best-effort delete. Failures are logged, never returned.
    async fn delete_backing_file(&self, path: &Path) {
        if let Ok(false) = self.fs.exists(path).await {
            return;
        }
        if let Err(e) = self.fs.delete_file(path).await {
            warn!(path = ?path, error = %e, "Failed to delete cache file");
        }
    }

    fn publish_counts(&self, state: &CacheState) {
        self.total.store(state.total(), Ordering::Release);
        self.unplayed.store(state.unplayed_len(), Ordering::Release);
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MEDIA_EXTENSION))
}
