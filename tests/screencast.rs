//! Screencast pipeline behaviour against a scripted protocol client.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;

use chart_cdp::screencast::{FRAME_QUEUE_CAPACITY, frame_path};
use chart_cdp::{
    ChartId, ChartManager, ErrorCode, ImageFormat, ScreencastId, ScreencastOptions,
    ScreencastStatus,
};

use common::{ScriptedClient, init_tracing, target};

// ============================================================================
// Helpers
// ============================================================================

async fn setup(dir: &std::path::Path) -> anyhow::Result<(Arc<ScriptedClient>, ChartManager)> {
    init_tracing();
    let client = ScriptedClient::new(&[
        target("T1", "page", "https://charts.example.com/chart/abc123/"),
        target("T2", "page", "https://charts.example.com/chart/def456/"),
    ]);
    let manager = ChartManager::builder()
        .url_filter("chart")
        .screencast_dir(dir)
        .client(client.clone())
        .build()?;
    manager.connect().await?;
    Ok((client, manager))
}

fn frame_params(n: i64) -> serde_json::Value {
    json!({
        "data": BASE64.encode(format!("frame-{n}")),
        "metadata": { "deviceWidth": 800, "deviceHeight": 600, "timestamp": 1.5 },
        "sessionId": n,
    })
}

async fn wait_for_acks(client: &ScriptedClient, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while client.acks.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn abc() -> ChartId {
    ChartId::from("abc123")
}

// ============================================================================
// Frame Flow
// ============================================================================

#[tokio::test]
async fn test_frames_written_in_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    assert_eq!(info.status, ScreencastStatus::Active);
    assert_eq!(info.format, "png");
    assert!(info.output_dir.starts_with(dir.path()));

    let session = manager.session_for_chart(&abc()).await?;
    for n in 1..=5 {
        client.emit("Page.screencastFrame", session.as_str(), frame_params(n));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let stopped = manager.stop_screencast(info.id).await?;
    wait_for_acks(&client, 5).await;

    assert_eq!(stopped.status, ScreencastStatus::Stopped);
    assert_eq!(stopped.frame_count, 5);
    assert_eq!(stopped.dropped_frames, 0);
    assert!(stopped.stopped_at_ms.is_some());
    assert_eq!(client.acks.load(Ordering::SeqCst), 5);

    for n in 1..=5u64 {
        let path = frame_path(&stopped.output_dir, n, ImageFormat::Png);
        assert_eq!(std::fs::read(&path)?, format!("frame-{n}").into_bytes());
    }
    assert!(!frame_path(&stopped.output_dir, 6, ImageFormat::Png).exists());
    Ok(())
}

#[tokio::test]
async fn test_burst_never_blocks_and_every_frame_is_acked() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;
    *client.ack_delay.lock() = Duration::from_millis(5);

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new().format(ImageFormat::jpeg(70)))
        .await?;
    let session = manager.session_for_chart(&abc()).await?;

    const BURST: i64 = 200;
    let started = Instant::now();
    for n in 1..=BURST {
        client.emit("Page.screencastFrame", session.as_str(), frame_params(n));
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    let stopped = manager.stop_screencast(info.id).await?;
    wait_for_acks(&client, BURST as usize).await;

    assert_eq!(client.acks.load(Ordering::SeqCst), BURST as usize);
    assert_eq!(stopped.frame_count, FRAME_QUEUE_CAPACITY as u64);
    assert_eq!(
        stopped.frame_count + stopped.dropped_frames,
        BURST as u64
    );
    assert!(frame_path(&stopped.output_dir, stopped.frame_count, ImageFormat::jpeg(70)).exists());
    Ok(())
}

#[tokio::test]
async fn test_frames_from_other_sessions_are_ignored() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    client.emit("Page.screencastFrame", "someone-else", frame_params(1));

    let stopped = manager.stop_screencast(info.id).await?;
    assert_eq!(stopped.frame_count, 0);
    assert_eq!(client.acks.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_undecodable_frame_is_acked_but_not_counted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    let session = manager.session_for_chart(&abc()).await?;

    client.emit(
        "Page.screencastFrame",
        session.as_str(),
        json!({ "data": "%%% not base64 %%%", "sessionId": 1 }),
    );
    client.emit("Page.screencastFrame", session.as_str(), frame_params(2));

    let stopped = manager.stop_screencast(info.id).await?;
    wait_for_acks(&client, 2).await;

    assert_eq!(client.acks.load(Ordering::SeqCst), 2);
    assert_eq!(stopped.frame_count, 1);
    assert!(frame_path(&stopped.output_dir, 1, ImageFormat::Png).exists());
    Ok(())
}

#[tokio::test]
async fn test_failed_write_keeps_numbering_contiguous() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    let session = manager.session_for_chart(&abc()).await?;

    std::fs::remove_dir_all(&info.output_dir)?;
    client.emit("Page.screencastFrame", session.as_str(), frame_params(1));
    wait_for_acks(&client, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::create_dir_all(&info.output_dir)?;
    client.emit("Page.screencastFrame", session.as_str(), frame_params(2));

    let stopped = manager.stop_screencast(info.id).await?;
    wait_for_acks(&client, 2).await;

    assert_eq!(client.acks.load(Ordering::SeqCst), 2);
    assert_eq!(stopped.frame_count, 1);
    let first = frame_path(&stopped.output_dir, 1, ImageFormat::Png);
    assert_eq!(std::fs::read(&first)?, b"frame-2".to_vec());
    assert!(!frame_path(&stopped.output_dir, 2, ImageFormat::Png).exists());
    Ok(())
}

#[tokio::test]
async fn test_frames_past_drain_grace_are_still_acked() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;
    // 32 queued frames at 150 ms per ack outlast the drain grace.
    *client.ack_delay.lock() = Duration::from_millis(150);

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    let session = manager.session_for_chart(&abc()).await?;

    const BURST: i64 = 40;
    for n in 1..=BURST {
        client.emit("Page.screencastFrame", session.as_str(), frame_params(n));
    }

    let stopped = manager.stop_screencast(info.id).await?;
    wait_for_acks(&client, BURST as usize).await;

    assert_eq!(client.acks.load(Ordering::SeqCst), BURST as usize);
    assert!(stopped.frame_count < FRAME_QUEUE_CAPACITY as u64);
    assert_eq!(stopped.frame_count + stopped.dropped_frames, BURST as u64);
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_stop_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    let session = manager.session_for_chart(&abc()).await?;
    client.emit("Page.screencastFrame", session.as_str(), frame_params(1));

    let first = manager.stop_screencast(info.id).await?;
    let second = manager.stop_screencast(info.id).await?;

    assert_eq!(first, second);
    assert_eq!(first.frame_count, 1);
    assert_eq!(client.count("Page.stopScreencast"), 1);
    assert!(client.events.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_one_active_screencast_per_chart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (_client, manager) = setup(dir.path()).await?;

    let first = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    let err = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);

    // Another chart is independent.
    manager
        .start_screencast(&ChartId::from("def456"), ScreencastOptions::new())
        .await?;

    manager.stop_screencast(first.id).await?;
    let again = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    assert_ne!(again.id, first.id);

    let listed = manager.list_screencasts();
    assert_eq!(listed.len(), 3);
    assert_eq!(
        listed
            .iter()
            .filter(|s| s.status == ScreencastStatus::Active)
            .count(),
        2
    );
    manager.close().await;
    Ok(())
}

#[tokio::test]
async fn test_capture_session_detached_only_after_stop() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    assert!(manager.invalidate_chart_session(&abc()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.count("Target.detachFromTarget"), 0);

    manager.stop_screencast(info.id).await?;
    for _ in 0..200 {
        if client.count("Target.detachFromTarget") > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(client.count("Target.detachFromTarget"), 1);

    // A capture on the cached session leaves it attached.
    let second = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    manager.stop_screencast(second.id).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.count("Target.detachFromTarget"), 1);
    Ok(())
}

#[tokio::test]
async fn test_forget_removes_only_stopped_screencasts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (_client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    let err = manager.forget_screencast(info.id).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
    assert_eq!(manager.list_screencasts().len(), 1);

    let stopped = manager.stop_screencast(info.id).await?;
    let forgotten = manager.forget_screencast(info.id)?;
    assert_eq!(forgotten, stopped);
    assert!(manager.list_screencasts().is_empty());
    assert!(stopped.output_dir.is_dir());

    let err = manager.forget_screencast(info.id).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
    Ok(())
}

#[tokio::test]
async fn test_stop_unknown_screencast() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (_client, manager) = setup(dir.path()).await?;

    let err = manager
        .stop_screencast(ScreencastId::generate())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
    Ok(())
}

#[tokio::test]
async fn test_vanished_chart_stops_its_screencast() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(&abc(), ScreencastOptions::new())
        .await?;
    client.set_targets(&[target(
        "T2",
        "page",
        "https://charts.example.com/chart/def456/",
    )]);
    manager.list_charts().await?;

    let listed = manager.list_screencasts();
    let entry = listed.iter().find(|s| s.id == info.id).expect("listed");
    assert_eq!(entry.status, ScreencastStatus::Stopped);
    // Aborted without contacting the browser.
    assert_eq!(client.count("Page.stopScreencast"), 0);
    Ok(())
}

#[tokio::test]
async fn test_custom_output_dir() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let custom = tempfile::tempdir()?;
    let (_client, manager) = setup(dir.path()).await?;

    let info = manager
        .start_screencast(
            &abc(),
            ScreencastOptions::new().output_dir(custom.path().join("capture")),
        )
        .await?;
    assert_eq!(info.output_dir, custom.path().join("capture"));
    assert!(info.output_dir.is_dir());
    manager.stop_screencast(info.id).await?;
    Ok(())
}

#[tokio::test]
async fn test_start_on_missing_chart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (client, manager) = setup(dir.path()).await?;

    let err = manager
        .start_screencast(&ChartId::from("missing"), ScreencastOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ChartNotFound);
    assert_eq!(client.count("Page.startScreencast"), 0);
    Ok(())
}
