//! Cache store behaviour against a real temporary directory.

mod common;

use bridge_desktop::TokioFileSystem;
use bridge_traits::time::ManualClock;
use common::{cache_config, http_with_videos, media_url, open_store, FakeHttp};
use core_playback::cache::CacheStore;
use core_playback::PlaybackError;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, EventStream};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn write_file(dir: &Path, name: &str, body: &[u8], modified: SystemTime) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
    path
}

fn assert_disjoint(unplayed: &[PathBuf], played: &[PathBuf]) {
    let unplayed: HashSet<_> = unplayed.iter().collect();
    assert!(played.iter().all(|path| !unplayed.contains(path)));
}

#[tokio::test]
async fn test_admit_writes_named_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, http_with_videos(1)).await;

    let path = store.admit(&media_url(0)).await.unwrap();

    let name = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("video_") && name.ends_with(".mp4"), "{}", name);
    assert_eq!(std::fs::read(&path).unwrap(), b"video-bytes-0");
    assert_eq!(store.count_total(), 1);
    assert_eq!(store.count_unplayed(), 1);
}

#[tokio::test]
async fn test_rapid_admissions_get_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 10, http_with_videos(3)).await;

    let mut paths = HashSet::new();
    for n in 0..3 {
        paths.insert(store.admit(&media_url(n)).await.unwrap());
    }

    assert_eq!(paths.len(), 3);
    assert_eq!(store.count_unplayed(), 3);
}

#[tokio::test]
async fn test_names_follow_clock_and_skip_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "video_1001.mp4", b"old", SystemTime::now());
    let clock = Arc::new(ManualClock::at(1000));

    let store = CacheStore::builder(
        cache_config(dir.path(), 10),
        Arc::new(TokioFileSystem::new()),
        http_with_videos(3),
    )
    .clock(clock.clone())
    .open()
    .await
    .unwrap();

    let first = store.admit(&media_url(0)).await.unwrap();
    // Same second: the stamp still moves forward, past the file already on disk.
    let second = store.admit(&media_url(1)).await.unwrap();
    clock.set(2000);
    let third = store.admit(&media_url(2)).await.unwrap();

    assert_eq!(first, dir.path().join("video_1000.mp4"));
    assert_eq!(second, dir.path().join("video_1002.mp4"));
    assert_eq!(third, dir.path().join("video_2000.mp4"));
    assert_eq!(store.stats().await.calculated_at, 2000);
}

#[tokio::test]
async fn test_admit_beyond_limit_evicts_oldest_unplayed() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 3, http_with_videos(4)).await;

    let mut admitted = Vec::new();
    for n in 0..4 {
        admitted.push(store.admit(&media_url(n)).await.unwrap());
    }

    assert_eq!(store.count_total(), 3);
    assert_eq!(store.unplayed_paths().await, admitted[1..].to_vec());
    assert!(!admitted[0].exists());
}

#[tokio::test]
async fn test_eviction_prefers_played_items() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 3, http_with_videos(4)).await;

    let mut admitted = Vec::new();
    for n in 0..3 {
        admitted.push(store.admit(&media_url(n)).await.unwrap());
    }
    // Play the newest item; it becomes the first eviction candidate.
    assert!(store.mark_played(&admitted[2]).await);

    let fourth = store.admit(&media_url(3)).await.unwrap();

    assert_eq!(store.count_total(), 3);
    assert!(store.played_paths().await.is_empty());
    assert_eq!(
        store.unplayed_paths().await,
        vec![admitted[0].clone(), admitted[1].clone(), fourth]
    );
    assert!(!admitted[2].exists());
}

#[tokio::test]
async fn test_startup_reconciliation_keeps_newest() {
    let dir = tempfile::tempdir().unwrap();
    let base = SystemTime::now() - Duration::from_secs(3600);

    let mut files = Vec::new();
    for n in 0..5u64 {
        files.push(write_file(
            dir.path(),
            &format!("clip_{}.mp4", 4 - n),
            b"frames",
            base + Duration::from_secs(n * 10),
        ));
    }
    write_file(dir.path(), "notes.txt", b"ignored", base);

    let store = open_store(dir.path(), 3, http_with_videos(0)).await;

    assert_eq!(store.count_total(), 3);
    assert_eq!(store.count_unplayed(), 3);
    assert_eq!(store.unplayed_paths().await, files[2..].to_vec());
    assert!(!files[0].exists());
    assert!(!files[1].exists());
    assert!(dir.path().join("notes.txt").exists());
}

#[tokio::test]
async fn test_take_next_skips_deleted_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, http_with_videos(2)).await;

    let first = store.admit(&media_url(0)).await.unwrap();
    let second = store.admit(&media_url(1)).await.unwrap();
    std::fs::remove_file(&first).unwrap();

    assert_eq!(store.take_next().await, Some(second.clone()));
    assert_eq!(store.take_next().await, None);
    assert_eq!(store.count_total(), 1);
    assert_eq!(store.played_paths().await, vec![second]);
}

#[tokio::test]
async fn test_take_next_skips_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, http_with_videos(2)).await;

    let first = store.admit(&media_url(0)).await.unwrap();
    let second = store.admit(&media_url(1)).await.unwrap();
    std::fs::write(&first, b"").unwrap();

    assert_eq!(store.take_next().await, Some(second));
    assert!(!first.exists());
}

#[tokio::test]
async fn test_take_next_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, http_with_videos(0)).await;

    assert_eq!(store.take_next().await, None);
    assert_eq!(store.count_total(), 0);
}

#[tokio::test]
async fn test_take_next_never_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, http_with_videos(2)).await;
    store.admit(&media_url(0)).await.unwrap();
    store.admit(&media_url(1)).await.unwrap();

    let a = store.take_next().await.unwrap();
    let b = store.take_next().await.unwrap();

    assert_ne!(a, b);
    assert_eq!(store.count_unplayed(), 0);
    assert_eq!(store.count_total(), 2);
}

#[tokio::test]
async fn test_empty_download_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let http = Arc::new(FakeHttp::new());
    http.serve("https://cdn.example.com/empty.mp4", b"");
    let store = open_store(dir.path(), 5, http).await;

    let err = store
        .admit("https://cdn.example.com/empty.mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::DownloadIncomplete(_)));
    assert_eq!(store.count_total(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, Arc::new(FakeHttp::new())).await;

    let err = store
        .admit("https://cdn.example.com/missing.mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::DownloadFailed { .. }));
    assert_eq!(store.count_total(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_slow_but_steady_download_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let http = Arc::new(FakeHttp::new());
    let url = "https://cdn.example.com/long.mp4";
    http.serve_paced(url, vec![b"frame".to_vec(); 6], Duration::from_millis(100));
    let store = CacheStore::open(
        cache_config(dir.path(), 5).with_download_timeout(Duration::from_millis(300)),
        Arc::new(TokioFileSystem::new()),
        http,
    )
    .await
    .unwrap();

    // Six chunks take ~600ms in total, twice the per-chunk limit.
    let path = store.admit(url).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"frame".repeat(6));
    assert_eq!(store.count_unplayed(), 1);
}

#[tokio::test]
async fn test_stalled_download_is_abandoned() {
    let dir = tempfile::tempdir().unwrap();
    let http = Arc::new(FakeHttp::new());
    let url = "https://cdn.example.com/stuck.mp4";
    http.serve_paced(
        url,
        vec![b"head".to_vec(), b"tail".to_vec()],
        Duration::from_millis(400),
    );
    let store = CacheStore::open(
        cache_config(dir.path(), 5).with_download_timeout(Duration::from_millis(150)),
        Arc::new(TokioFileSystem::new()),
        http,
    )
    .await
    .unwrap();

    let err = store.admit(url).await.unwrap_err();

    match err {
        PlaybackError::DownloadFailed { message, .. } => {
            assert!(message.starts_with("stalled"), "{}", message)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count_total(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_download_sends_configured_user_agent() {
    let dir = tempfile::tempdir().unwrap();
    let http = http_with_videos(1);
    let store = CacheStore::open(
        cache_config(dir.path(), 5).with_user_agent("Mozilla/5.0 (X11; Linux x86_64)"),
        Arc::new(TokioFileSystem::new()),
        http.clone(),
    )
    .await
    .unwrap();

    store.admit(&media_url(0)).await.unwrap();

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, media_url(0));
    assert_eq!(
        requests[0].headers.get("User-Agent").map(String::as_str),
        Some("Mozilla/5.0 (X11; Linux x86_64)")
    );
}

#[tokio::test]
async fn test_remove_and_mark_played() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, http_with_videos(2)).await;
    let first = store.admit(&media_url(0)).await.unwrap();
    let second = store.admit(&media_url(1)).await.unwrap();

    assert!(store.mark_played(&first).await);
    assert!(!store.mark_played(&first).await);
    assert!(!store.mark_played(Path::new("/elsewhere/local.mp4")).await);

    assert!(store.remove(&first).await);
    assert!(!first.exists());
    assert!(!store.remove(&first).await);

    let outside = dir.path().join("outside.mp4");
    std::fs::write(&outside, b"keep").unwrap();
    assert!(!store.remove(&outside).await);
    assert!(outside.exists());

    assert_eq!(store.count_total(), 1);
    assert_eq!(store.unplayed_paths().await, vec![second]);
}

#[tokio::test]
async fn test_clear_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 5, http_with_videos(3)).await;
    for n in 0..3 {
        store.admit(&media_url(n)).await.unwrap();
    }
    store.take_next().await.unwrap();

    let stats = store.stats().await;
    assert_eq!(stats.total_items, 3);
    assert_eq!(stats.unplayed_items, 2);
    assert_eq!(stats.played_items, 1);
    assert_eq!(stats.total_bytes, 3 * "video-bytes-0".len() as u64);
    assert_eq!(stats.max_total, 5);
    assert_eq!(stats.human_size(), "39 B");

    assert_eq!(store.clear().await, 3);
    assert_eq!(store.count_total(), 0);
    assert_eq!(store.total_bytes_on_disk().await, 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_bound_and_disjointness_hold_across_operations() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path(), 4, http_with_videos(12)).await;

    for n in 0..12 {
        store.admit(&media_url(n)).await.unwrap();
        if n % 3 == 0 {
            store.take_next().await;
        }
        if n % 5 == 4 {
            if let Some(path) = store.played_paths().await.first() {
                store.remove(path).await;
            }
        }

        let unplayed = store.unplayed_paths().await;
        let played = store.played_paths().await;
        assert!(store.count_total() <= 4);
        assert_eq!(store.count_total(), unplayed.len() + played.len());
        assert_disjoint(&unplayed, &played);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admit_and_drain_keep_invariants() {
    const VIDEOS: usize = 24;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(dir.path(), 4, http_with_videos(VIDEOS)).await);
    let producer_done = Arc::new(AtomicBool::new(false));

    let producer = tokio::spawn({
        let store = store.clone();
        let done = producer_done.clone();
        async move {
            for n in 0..VIDEOS {
                store.admit(&media_url(n)).await.unwrap();
                assert!(store.count_total() <= 4);
                tokio::task::yield_now().await;
            }
            done.store(true, Ordering::SeqCst);
        }
    });

    let consumer = tokio::spawn({
        let store = store.clone();
        let done = producer_done.clone();
        async move {
            let mut taken = HashSet::new();
            loop {
                match store.take_next().await {
                    Some(path) => {
                        assert!(taken.insert(path.clone()), "{:?} handed out twice", path);
                        if taken.len() % 2 == 0 {
                            // May already be gone if the producer evicted it.
                            store.remove(&path).await;
                        }
                    }
                    None if done.load(Ordering::SeqCst) => break,
                    None => tokio::task::yield_now().await,
                }

                // Only this task moves items between queues, so two
                // consecutive snapshots are still comparable.
                let unplayed = store.unplayed_paths().await;
                let played = store.played_paths().await;
                assert!(store.count_total() <= 4);
                assert!(unplayed.len() + played.len() <= 4);
                assert_disjoint(&unplayed, &played);
            }
            taken.len()
        }
    });

    producer.await.unwrap();
    let taken = consumer.await.unwrap();

    assert!(taken > 0);
    let unplayed = store.unplayed_paths().await;
    let played = store.played_paths().await;
    assert_disjoint(&unplayed, &played);
    assert_eq!(store.count_total(), unplayed.len() + played.len());
    assert!(store.count_total() <= 4);
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        store.count_total()
    );
}

#[tokio::test]
async fn test_events_are_published() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(32);
    let mut events = EventStream::new(bus.subscribe())
        .filter(|event| matches!(event, CoreEvent::Cache(_)));

    let store = CacheStore::builder(
        cache_config(dir.path(), 1),
        Arc::new(TokioFileSystem::new()),
        http_with_videos(2),
    )
    .event_bus(bus)
    .open()
    .await
    .unwrap();

    let first = store.admit(&media_url(0)).await.unwrap();
    store.admit(&media_url(1)).await.unwrap();

    let mut seen = Vec::new();
    while let Some(Ok(event)) = events.try_recv() {
        seen.push(event);
    }

    assert!(seen.contains(&CoreEvent::Cache(CacheEvent::Evicted {
        path: first.display().to_string(),
        was_played: false,
    })));
    assert_eq!(
        seen.iter()
            .filter(|e| matches!(e, CoreEvent::Cache(CacheEvent::Admitted { .. })))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = CacheStore::open(
        cache_config(dir.path(), 0),
        Arc::new(TokioFileSystem::new()),
        http_with_videos(0),
    )
    .await;

    assert!(matches!(result, Err(PlaybackError::Config(_))));
}
