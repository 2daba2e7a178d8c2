//! Background filler pacing and shutdown.

mod common;

use common::{http_with_videos, media_url, open_store, FakeSource};
use core_playback::cache::{CacheFiller, FillOutcome, FillerConfig};
use std::sync::Arc;
use std::time::Duration;

fn fast_config(max_unplayed: usize) -> FillerConfig {
    FillerConfig {
        max_unplayed,
        idle_wait: Duration::from_millis(20),
        failure_wait: Duration::from_millis(20),
        error_wait: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_fill_once_stops_at_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(dir.path(), 10, http_with_videos(3)).await);
    let source = Arc::new(FakeSource::with_urls([media_url(0), media_url(1), media_url(2)]));
    let filler = CacheFiller::new(source.clone(), store.clone(), fast_config(2));

    assert!(matches!(filler.fill_once().await, FillOutcome::Admitted(_)));
    assert!(matches!(filler.fill_once().await, FillOutcome::Admitted(_)));
    assert_eq!(filler.fill_once().await, FillOutcome::Saturated);

    assert_eq!(store.count_unplayed(), 2);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_fill_once_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(dir.path(), 10, http_with_videos(0)).await);

    let empty = CacheFiller::new(
        Arc::new(FakeSource::default()),
        store.clone(),
        fast_config(2),
    );
    assert_eq!(empty.fill_once().await, FillOutcome::AcquireFailed);

    // The URL resolves but the download is refused.
    let broken = CacheFiller::new(
        Arc::new(FakeSource::with_urls([media_url(7)])),
        store.clone(),
        fast_config(2),
    );
    assert_eq!(broken.fill_once().await, FillOutcome::AdmitFailed);
    assert_eq!(store.count_total(), 0);
}

#[tokio::test]
async fn test_spawned_filler_tops_up_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(dir.path(), 10, http_with_videos(5)).await);
    let source = Arc::new(FakeSource::with_urls((0..5).map(media_url)));

    let handle = CacheFiller::new(source.clone(), store.clone(), fast_config(3)).spawn();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.count_unplayed() < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.count_unplayed(), 3);

    // Draining one item lets the filler fetch another.
    store.take_next().await.unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.count_unplayed() < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.count_unplayed(), 3);
    assert_eq!(source.calls(), 4);

    assert!(handle.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_filler_survives_failures_until_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(dir.path(), 10, http_with_videos(0)).await);
    let source = Arc::new(FakeSource::default());

    let handle = CacheFiller::new(source.clone(), store.clone(), fast_config(3)).spawn();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while source.calls() < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(source.calls() >= 3);
    assert!(!handle.is_finished());

    handle.stop();
    assert!(handle.shutdown(Duration::from_secs(5)).await);
    assert_eq!(store.count_total(), 0);
}
