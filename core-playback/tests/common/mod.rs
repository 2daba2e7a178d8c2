//! Scripted fakes shared by the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{EndCallback, VideoPlayer};
use bridge_traits::BridgeError;
use core_acquisition::{AcquisitionError, VideoLinkSource};
use core_playback::cache::{CacheConfig, CacheStore};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Serves fixed bodies for media downloads; unknown URLs fail to connect.
#[derive(Default)]
pub struct FakeHttp {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    paced: Mutex<HashMap<String, (Vec<Vec<u8>>, Duration)>>,
    requests: Mutex<Vec<HttpRequest>>,
    downloads: AtomicUsize,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies.lock().insert(url.to_string(), body.to_vec());
    }

    /// Serve `chunks` one at a time, waiting `gap` before each.
    pub fn serve_paced(&self, url: &str, chunks: Vec<Vec<u8>>, gap: Duration) {
        self.paced.lock().insert(url.to_string(), (chunks, gap));
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable(format!(
            "no route for {}",
            request.url
        )))
    }

    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let url = request.url.clone();
        self.requests.lock().push(request);

        if let Some((chunks, gap)) = self.paced.lock().get(&url).cloned() {
            let (mut tx, rx) = tokio::io::duplex(1024);
            tokio::spawn(async move {
                for chunk in chunks {
                    tokio::time::sleep(gap).await;
                    if tx.write_all(&chunk).await.is_err() {
                        return;
                    }
                }
            });
            return Ok(Box::new(rx));
        }

        match self.bodies.lock().get(&url) {
            Some(body) => Ok(Box::new(std::io::Cursor::new(body.clone()))),
            None => Err(BridgeError::Connection(format!("refused: {}", url))),
        }
    }
}

// ---------------------------------------------------------------------------
// Link source
// ---------------------------------------------------------------------------

/// Hands out queued URLs; fails once the queue is empty.
#[derive(Default)]
pub struct FakeSource {
    urls: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: Mutex::new(urls.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoLinkSource for FakeSource {
    async fn acquire(&self) -> core_acquisition::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls
            .lock()
            .pop_front()
            .ok_or(AcquisitionError::Exhausted { attempts: 3 })
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Records what the controller asks for. Files named in `reject` fail to load.
#[derive(Default)]
pub struct FakePlayer {
    pub loaded: Mutex<Vec<PathBuf>>,
    pub reject: Mutex<HashSet<PathBuf>>,
    pub volume: Mutex<Option<u8>>,
    pub position: Mutex<Option<f32>>,
    pub time_ms: Mutex<(i64, i64)>,
    playing: AtomicBool,
    stops: AtomicUsize,
    callback: Mutex<Option<EndCallback>>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, path: &Path) {
        self.reject.lock().insert(path.to_path_buf());
    }

    pub fn loaded(&self) -> Vec<PathBuf> {
        self.loaded.lock().clone()
    }

    pub fn is_playing_now(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn set_times(&self, position_ms: i64, length_ms: i64) {
        *self.time_ms.lock() = (position_ms, length_ms);
    }

    /// Simulate the engine reaching the end of the media.
    pub fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        if let Some(callback) = self.callback.lock().as_ref() {
            callback();
        }
    }
}

#[async_trait]
impl VideoPlayer for FakePlayer {
    async fn load(&self, path: &Path) -> BridgeResult<bool> {
        if self.reject.lock().contains(path) {
            return Ok(false);
        }
        self.loaded.lock().push(path.to_path_buf());
        Ok(true)
    }

    async fn play(&self) -> BridgeResult<()> {
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> BridgeResult<()> {
        *self.volume.lock() = Some(volume);
        Ok(())
    }

    async fn set_position(&self, fraction: f32) -> BridgeResult<()> {
        *self.position.lock() = Some(fraction);
        Ok(())
    }

    fn current_time_ms(&self) -> i64 {
        self.time_ms.lock().0
    }

    fn length_ms(&self) -> i64 {
        self.time_ms.lock().1
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn set_end_callback(&self, callback: EndCallback) {
        *self.callback.lock() = Some(callback);
    }
}

// ---------------------------------------------------------------------------
// Store helpers
// ---------------------------------------------------------------------------

pub fn media_url(n: usize) -> String {
    format!("https://cdn.example.com/{}.mp4", n)
}

/// FakeHttp serving `count` non-empty videos at `media_url(0..count)`.
pub fn http_with_videos(count: usize) -> Arc<FakeHttp> {
    let http = FakeHttp::new();
    for n in 0..count {
        http.serve(&media_url(n), format!("video-bytes-{}", n).as_bytes());
    }
    Arc::new(http)
}

pub fn cache_config(dir: &Path, max_total: usize) -> CacheConfig {
    CacheConfig::new(dir)
        .with_max_total(max_total)
        .with_max_unplayed(max_total.min(10))
        .with_download_timeout(Duration::from_secs(5))
}

pub async fn open_store(dir: &Path, max_total: usize, http: Arc<FakeHttp>) -> CacheStore {
    CacheStore::open(
        cache_config(dir, max_total),
        Arc::new(TokioFileSystem::new()),
        http,
    )
    .await
    .unwrap()
}
