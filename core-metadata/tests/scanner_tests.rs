//! Behavioural tests for the metadata scan engine
//!
//! Drives a `ScanEngine` against the scripted fake probe engine and checks the
//! order and content of the `UriScanned` notifications.

use bridge_traits::engine::tags;
use bridge_traits::testing::{EngineCall, FakeEngineControl, FakeEngineFactory};
use bridge_traits::{BusReceiver, EngineEvent, EngineState, TagList};
use core_metadata::{ScanEngine, ScanFailureKind, ScanJobId, ScanResult};
use core_runtime::events::{CoreEvent, EventBus, EventStream, ScanEvent};
use std::time::Duration;

/// One delivered result, flattened for assertions.
#[derive(Debug, Clone, PartialEq)]
struct Scanned {
    job_id: u64,
    uri: String,
    error: Option<ScanFailureKind>,
    tags: TagList,
    duration_secs: Option<u64>,
}

struct Harness {
    engine: ScanEngine,
    bus: BusReceiver,
    probe: FakeEngineControl,
    events: EventStream,
    _factory: FakeEngineFactory,
}

impl Harness {
    fn new() -> Self {
        let factory = FakeEngineFactory::new();
        let events = EventBus::new(128);
        let stream = EventStream::new(events.subscribe());
        let (engine, bus) = ScanEngine::new(&factory, events);
        let probe = factory.probe().expect("probe created");

        Self {
            engine,
            bus,
            probe,
            events: stream,
            _factory: factory,
        }
    }

    fn pump(&mut self) {
        while let Ok(message) = self.bus.try_recv() {
            self.engine.handle_message(message);
        }
    }

    /// Post `event` for the live source and dispatch everything queued.
    fn deliver(&mut self, event: EngineEvent) {
        self.probe.post(event);
        self.pump();
    }

    fn scanned(&mut self) -> Vec<Scanned> {
        self.events
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                CoreEvent::Scan(ScanEvent::UriScanned {
                    job_id,
                    uri,
                    error,
                    tags,
                    duration_secs,
                }) => Some(Scanned {
                    job_id,
                    uri,
                    error: error.map(|e| e.kind),
                    tags,
                    duration_secs,
                }),
                _ => None,
            })
            .collect()
    }

    fn scanned_ids(&mut self) -> Vec<u64> {
        self.scanned().into_iter().map(|s| s.job_id).collect()
    }
}

fn tag_list(pairs: &[(&str, &str)]) -> TagList {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_results_arrive_in_submission_order() {
    let mut h = Harness::new();
    let ids: Vec<ScanJobId> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| h.engine.submit(format!("file:///music/{}.flac", name)))
        .collect();

    for _ in 0..ids.len() {
        h.deliver(EngineEvent::FirstPayload);
    }

    assert_eq!(
        h.scanned_ids(),
        ids.iter().map(ScanJobId::get).collect::<Vec<_>>()
    );
    assert!(h.engine.is_idle());
}

#[test]
fn test_failure_in_the_middle_does_not_block_batch() {
    let mut h = Harness::new();
    h.probe.set_duration(Some(Duration::from_secs(200)));

    let a = h.engine.submit("file:///music/a.flac");
    let b = h.engine.submit("file:///music/b.flac");
    let c = h.engine.submit("file:///music/c.flac");

    h.deliver(EngineEvent::Tags(tag_list(&[(tags::TITLE, "Alpha")])));
    h.deliver(EngineEvent::FirstPayload);

    h.deliver(EngineEvent::Tags(tag_list(&[(tags::TITLE, "Bravo")])));
    h.deliver(EngineEvent::Error {
        detail: "Could not demultiplex stream".to_string(),
    });

    h.deliver(EngineEvent::Tags(tag_list(&[(tags::TITLE, "Charlie")])));
    h.deliver(EngineEvent::FirstPayload);

    let results = h.scanned();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0].job_id, a.get());
    assert_eq!(results[0].error, None);
    assert_eq!(results[0].tags[tags::TITLE], "Alpha");
    assert_eq!(results[0].duration_secs, Some(200));

    assert_eq!(results[1].job_id, b.get());
    assert_eq!(results[1].uri, "file:///music/b.flac");
    assert_eq!(results[1].error, Some(ScanFailureKind::Engine));
    assert_eq!(results[1].tags[tags::TITLE], "Bravo");

    assert_eq!(results[2].job_id, c.get());
    assert_eq!(results[2].error, None);
    assert_eq!(results[2].tags[tags::TITLE], "Charlie");
}

#[test]
fn test_tags_merge_last_write_wins() {
    let mut h = Harness::new();
    h.engine.submit("file:///music/a.flac");

    h.deliver(EngineEvent::Tags(tag_list(&[
        (tags::TITLE, "Untitled"),
        (tags::ARTIST, "Someone"),
    ])));
    h.deliver(EngineEvent::Tags(tag_list(&[
        (tags::TITLE, "Real Title"),
        (tags::ALBUM, "Record"),
    ])));
    h.deliver(EngineEvent::EndOfStream);

    let results = h.scanned();
    assert_eq!(
        results[0].tags,
        tag_list(&[
            (tags::TITLE, "Real Title"),
            (tags::ARTIST, "Someone"),
            (tags::ALBUM, "Record"),
        ])
    );
    assert_eq!(results[0].duration_secs, None);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancel_queued_job_is_silent() {
    let mut h = Harness::new();
    let a = h.engine.submit("file:///music/a.flac");
    let b = h.engine.submit("file:///music/b.flac");
    let c = h.engine.submit("file:///music/c.flac");
    h.probe.clear_calls();

    h.engine.cancel(b).unwrap();
    assert!(h.probe.calls().is_empty());
    assert_eq!(h.engine.pending(), 2);

    h.deliver(EngineEvent::FirstPayload);
    h.deliver(EngineEvent::FirstPayload);

    assert_eq!(h.scanned_ids(), vec![a.get(), c.get()]);
}

#[test]
fn test_cancel_live_job_discards_result_and_advances() {
    let mut h = Harness::new();
    let a = h.engine.submit("file:///music/a.flac");
    let b = h.engine.submit("file:///music/b.flac");
    let a_stage = h.probe.stage();

    h.deliver(EngineEvent::Tags(tag_list(&[(tags::TITLE, "Partial")])));
    h.probe.clear_calls();
    h.engine.cancel(a).unwrap();

    let calls = h.probe.calls();
    assert_eq!(calls[0], EngineCall::SetState(EngineState::Stopped));
    assert_eq!(calls[1], EngineCall::DetachSource(a_stage));
    assert!(matches!(
        &calls[2],
        EngineCall::AttachSource { uri, .. } if uri == "file:///music/b.flac"
    ));
    assert_eq!(h.engine.current().map(|job| job.id()), Some(b));

    // The cancelled source's late messages must not touch the new job.
    h.probe.post_with_stage(a_stage, EngineEvent::EndOfStream);
    h.pump();
    assert!(h.scanned().is_empty());

    h.deliver(EngineEvent::FirstPayload);
    assert_eq!(h.scanned_ids(), vec![b.get()]);
}

#[test]
fn test_cancel_after_finish_is_unknown() {
    let mut h = Harness::new();
    let a = h.engine.submit("file:///music/a.flac");
    h.deliver(EngineEvent::EndOfStream);

    let err = h.engine.cancel(a).unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(h.scanned_ids(), vec![a.get()]);
}

// ============================================================================
// Pipeline interaction
// ============================================================================

#[test]
fn test_second_source_created_only_after_first_flush() {
    let mut h = Harness::new();
    h.engine.submit("file:///music/a.flac");
    h.engine.submit("file:///music/b.flac");

    let attaches_before: Vec<_> = h
        .probe
        .calls()
        .into_iter()
        .filter(|c| matches!(c, EngineCall::AttachSource { .. }))
        .collect();
    assert_eq!(attaches_before.len(), 1);

    h.deliver(EngineEvent::FirstPayload);

    let calls = h.probe.calls();
    let first_detach = calls
        .iter()
        .position(|c| matches!(c, EngineCall::DetachSource(_)))
        .expect("first source detached");
    let second_attach = calls
        .iter()
        .position(|c| matches!(c, EngineCall::AttachSource { uri, .. } if uri.ends_with("b.flac")))
        .expect("second source attached");

    assert!(second_attach > first_detach);
    assert_eq!(
        calls[first_detach - 1],
        EngineCall::SetState(EngineState::Stopped)
    );
}

#[test]
fn test_refused_stop_does_not_block_later_jobs() {
    let mut h = Harness::new();
    let a = h.engine.submit("file:///music/a.flac");
    let b = h.engine.submit("file:///music/b.flac");
    let c = h.engine.submit("file:///music/c.flac");

    h.probe.refuse_stops(1);
    h.deliver(EngineEvent::EndOfStream);
    h.deliver(EngineEvent::EndOfStream);
    h.deliver(EngineEvent::EndOfStream);

    let results = h.scanned();
    assert_eq!(
        results.iter().map(|s| (s.job_id, s.error)).collect::<Vec<_>>(),
        vec![(a.get(), None), (b.get(), None), (c.get(), None)]
    );
    assert!(h.engine.is_idle());
    assert_eq!(h.probe.attached(), None);

    // A stop refused on the last job leaves its source attached until the
    // next submission flushes it.
    let d = h.engine.submit("file:///music/d.flac");
    h.probe.refuse_stops(1);
    h.deliver(EngineEvent::EndOfStream);
    assert!(h.engine.is_idle());

    let e = h.engine.submit("file:///music/e.flac");
    assert_eq!(
        h.probe.uri().as_deref(),
        Some("file:///music/e.flac")
    );
    h.deliver(EngineEvent::EndOfStream);

    assert_eq!(h.scanned_ids(), vec![d.get(), e.get()]);
    assert_eq!(h.probe.attached(), None);
}

#[test]
fn test_idle_engine_ignores_messages() {
    let mut h = Harness::new();
    h.deliver(EngineEvent::EndOfStream);
    h.deliver(EngineEvent::FirstPayload);

    assert!(h.scanned().is_empty());
    assert!(h.engine.is_idle());
}

#[test]
fn test_result_snapshot_serializes() {
    let result = ScanResult {
        job_id: ScanJobId::new(3),
        uri: "file:///music/a.flac".to_string(),
        error: None,
        tags: tag_list(&[(tags::GENRE, "Jazz")]),
        duration: Some(Duration::from_secs(61)),
    };

    let json = serde_json::to_string(&result).unwrap();
    let back: ScanResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
    assert!(json.contains("\"genre\":\"Jazz\""));
}
