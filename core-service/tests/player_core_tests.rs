//! End-to-end tests of the control loop against scripted fake engines

use bridge_traits::testing::{EngineCall, FakeEngineFactory};
use bridge_traits::EngineEvent;
use core_metadata::ScanFailureKind;
use core_playback::PlaybackError;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventStream, PlayerEvent, ScanEvent};
use core_service::{CoreError, CoreHandle, PlayerCore};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

struct Running {
    handle: CoreHandle,
    events: EventStream,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    factory: FakeEngineFactory,
}

fn start(factory: FakeEngineFactory) -> Running {
    start_with(CoreConfig::default(), factory)
}

fn start_with(config: CoreConfig, factory: FakeEngineFactory) -> Running {
    let (core, handle) = PlayerCore::new(config, &factory).unwrap();
    let events = handle.subscribe();
    let shutdown = CancellationToken::new();
    let task = core.spawn(shutdown.clone()).unwrap();

    Running {
        handle,
        events,
        shutdown,
        task,
        factory,
    }
}

fn positions(events: &[CoreEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, CoreEvent::Player(PlayerEvent::PositionChanged { .. })))
        .count()
}

async fn next_scanned(events: &mut EventStream) -> (u64, Option<ScanFailureKind>) {
    loop {
        let event = time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("scan result in time")
            .expect("event bus open");
        if let CoreEvent::Scan(ScanEvent::UriScanned { job_id, error, .. }) = event {
            return (job_id, error.map(|e| e.kind));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_unload_stops_position_ticks() {
    let mut core = start(FakeEngineFactory::new());

    core.handle.load(Some("track1.mp3")).await.unwrap();
    core.handle.set_playing(true).await.unwrap();
    core.events.drain();

    time::sleep(Duration::from_millis(1_250)).await;
    assert_eq!(positions(&core.events.drain()), 2);

    core.handle.load(None).await.unwrap();
    let status = core.handle.status().await.unwrap();
    assert!(!status.playing);
    assert_eq!(status.uri, None);
    core.events.drain();

    time::sleep(Duration::from_secs(3)).await;
    assert_eq!(positions(&core.events.drain()), 0);

    core.shutdown.cancel();
    core.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_tick_follows_configured_interval() {
    let config = CoreConfig::builder()
        .tick_interval(Duration::from_millis(200))
        .build()
        .unwrap();
    let mut core = start_with(config, FakeEngineFactory::new());

    core.handle.load(Some("track1.mp3")).await.unwrap();
    core.events.drain();

    time::sleep(Duration::from_millis(1_050)).await;
    assert_eq!(positions(&core.events.drain()), 5);

    core.shutdown.cancel();
    core.task.await.unwrap();
}

#[tokio::test]
async fn test_scan_batch_through_control_loop() {
    let mut core = start(FakeEngineFactory::new());
    let probe = core.factory.probe().unwrap();

    let a = core.handle.submit("file:///music/a.flac").await.unwrap();
    let b = core.handle.submit("file:///music/b.flac").await.unwrap();
    let c = core.handle.submit("file:///music/c.flac").await.unwrap();

    probe.post(EngineEvent::FirstPayload);
    assert_eq!(next_scanned(&mut core.events).await, (a.get(), None));
    core.handle.status().await.unwrap();

    probe.post(EngineEvent::Error {
        detail: "Could not decode stream".to_string(),
    });
    assert_eq!(
        next_scanned(&mut core.events).await,
        (b.get(), Some(ScanFailureKind::Engine))
    );
    core.handle.status().await.unwrap();

    probe.post(EngineEvent::EndOfStream);
    assert_eq!(next_scanned(&mut core.events).await, (c.get(), None));

    assert_eq!(core.handle.status().await.unwrap().pending_scans, 0);
}

#[tokio::test]
async fn test_scan_playlist_submits_entries_in_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let playlist = dir.path().join("mix.m3u");
    std::fs::write(&playlist, "#EXTM3U\n/music/one.ogg\n/music/two.ogg\n").unwrap();

    let core = start(FakeEngineFactory::new());
    let probe = core.factory.probe().unwrap();

    let ids = core
        .handle
        .scan_playlist(format!("file://{}", playlist.display()))
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    assert!(ids[0] < ids[1]);
    assert_eq!(probe.uri().as_deref(), Some("file:///music/one.ogg"));
    assert_eq!(core.handle.status().await.unwrap().pending_scans, 2);
}

#[tokio::test]
async fn test_playlist_errors_reach_caller() {
    let core = start(FakeEngineFactory::new());

    let err = core
        .handle
        .scan_playlist("http://example.com/list.m3u")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Library(_)));
}

#[tokio::test]
async fn test_invalid_volume_is_reported() {
    let core = start(FakeEngineFactory::new());

    let err = core.handle.set_volume(4.5).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Playback(PlaybackError::InvalidVolume(v)) if v == 4.5
    ));
    assert_eq!(core.handle.get_volume().await.unwrap(), 1.0);
}

#[tokio::test]
async fn test_degraded_core_keeps_running() {
    let mut core = start(FakeEngineFactory::unavailable());

    core.handle.load(Some("file:///music/a.ogg")).await.unwrap();
    core.handle.set_playing(true).await.unwrap();
    assert!(!core.handle.get_playing().await.unwrap());
    assert_eq!(core.handle.get_position().await.unwrap(), 0);

    let id = core.handle.submit("file:///music/a.ogg").await.unwrap();
    assert_eq!(
        next_scanned(&mut core.events).await,
        (id.get(), Some(ScanFailureKind::NotReady))
    );
}

#[tokio::test]
async fn test_shutdown_releases_engines() {
    let core = start(FakeEngineFactory::new());
    let playback = core.factory.playback().unwrap();
    let probe = core.factory.probe().unwrap();

    core.handle.load(Some("file:///music/a.ogg")).await.unwrap();
    core.handle.submit("file:///music/b.ogg").await.unwrap();

    core.shutdown.cancel();
    core.task.await.unwrap();

    assert_eq!(playback.calls().last(), Some(&EngineCall::Dropped));
    assert_eq!(probe.calls().last(), Some(&EngineCall::Dropped));
    assert!(core.handle.is_closed());
    assert!(matches!(
        core.handle.get_playing().await,
        Err(CoreError::Shutdown)
    ));
}

#[tokio::test]
async fn test_dropping_every_handle_stops_loop() {
    let core = start(FakeEngineFactory::new());
    let playback = core.factory.playback().unwrap();

    drop(core.handle);
    core.task.await.unwrap();

    assert_eq!(playback.calls().last(), Some(&EngineCall::Dropped));
}

#[test]
fn test_invalid_config_is_rejected() {
    let factory = FakeEngineFactory::new();
    let config = CoreConfig {
        tick_interval: Duration::ZERO,
        ..CoreConfig::default()
    };

    let err = PlayerCore::new(config, &factory).unwrap_err();
    assert!(matches!(err, CoreError::Runtime(_)));
}
