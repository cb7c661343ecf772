//! Scripted engine for tests.
//!
//! [`FakeEngine`] implements both [`PlaybackEngine`] and [`ProbeEngine`]. It
//! records every command it receives and posts the state-change messages a
//! real pipeline would, stamped with the correct [`StageId`]. Decode results
//! (tags, end of stream, errors) are injected by the test through the
//! [`FakeEngineControl`] that shares its state.

use crate::bus::EngineBus;
use crate::engine::{
    EngineEvent, EngineFactory, EngineState, MediaEngine, PlaybackEngine, ProbeEngine,
    SourceKind, StageId, StateSnapshot,
};
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// A command received by a fake engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetUri(Option<String>),
    SetState(EngineState),
    Seek { position: Duration, flushing: bool },
    SetVolume(f64),
    AttachSource { uri: String, stage: StageId },
    DetachSource(StageId),
    Dropped,
}

const LADDER: [EngineState; 4] = [
    EngineState::Stopped,
    EngineState::Ready,
    EngineState::Paused,
    EngineState::Playing,
];

fn rung(state: EngineState) -> usize {
    LADDER.iter().position(|s| *s == state).unwrap_or(0)
}

/// Each single-step transition between `from` and `to`, in order.
fn transitions(from: EngineState, to: EngineState) -> Vec<(EngineState, EngineState)> {
    let (a, b) = (rung(from), rung(to));
    if a < b {
        (a..b).map(|i| (LADDER[i], LADDER[i + 1])).collect()
    } else {
        (b..a).rev().map(|i| (LADDER[i + 1], LADDER[i])).collect()
    }
}

#[derive(Debug)]
struct Inner {
    kind: SourceKind,
    calls: Vec<EngineCall>,
    state: StateSnapshot,
    defer_transitions: bool,
    stage: StageId,
    attached: Option<StageId>,
    uri: Option<String>,
    volume: f64,
    position: Option<Duration>,
    duration: Option<Duration>,
    seekable: Option<bool>,
    rejected_uris: HashSet<String>,
    refuse_start: bool,
    refused_stops: usize,
}

impl Inner {
    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            calls: Vec::new(),
            state: StateSnapshot::default(),
            defer_transitions: false,
            stage: StageId::default(),
            attached: None,
            uri: None,
            volume: 1.0,
            position: None,
            duration: None,
            seekable: None,
            rejected_uris: HashSet::new(),
            refuse_start: false,
            refused_stops: 0,
        }
    }
}

/// Engine half handed to the code under test.
#[derive(Debug)]
pub struct FakeEngine {
    inner: Arc<Mutex<Inner>>,
    bus: EngineBus,
}

/// Test half: inspects calls and injects engine behaviour.
#[derive(Debug, Clone)]
pub struct FakeEngineControl {
    inner: Arc<Mutex<Inner>>,
    bus: EngineBus,
}

impl FakeEngine {
    pub fn new(kind: SourceKind, bus: EngineBus) -> (Self, FakeEngineControl) {
        let inner = Arc::new(Mutex::new(Inner::new(kind)));
        let control = FakeEngineControl {
            inner: Arc::clone(&inner),
            bus: bus.clone(),
        };
        (Self { inner, bus }, control)
    }

    fn post_transitions(&self, from: EngineState, to: EngineState, stage: StageId) {
        for (old, new) in transitions(from, to) {
            self.bus.post(stage, EngineEvent::StateChanged { old, new });
        }
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.inner.lock().calls.push(EngineCall::Dropped);
    }
}

impl MediaEngine for FakeEngine {
    fn kind(&self) -> SourceKind {
        self.inner.lock().kind
    }

    fn set_state(&mut self, target: EngineState) -> Result<()> {
        let (from, stage) = {
            let mut inner = self.inner.lock();
            inner.calls.push(EngineCall::SetState(target));

            if target == EngineState::Stopped {
                if inner.refused_stops > 0 {
                    inner.refused_stops -= 1;
                    return Err(BridgeError::InvalidState(
                        "refused transition to Stopped".to_string(),
                    ));
                }
                if inner.kind == SourceKind::Playback {
                    inner.stage = inner.stage.next();
                }
                inner.state = StateSnapshot::settled(EngineState::Stopped);
                return Ok(());
            }

            if inner.refuse_start {
                return Err(BridgeError::InvalidState(format!(
                    "refused transition to {:?}",
                    target
                )));
            }

            if inner.kind == SourceKind::Probe && inner.attached.is_none() {
                return Err(BridgeError::InvalidState(
                    "probe pipeline has no source stage".to_string(),
                ));
            }

            if inner.defer_transitions {
                inner.state.pending = Some(target);
                return Ok(());
            }

            let from = inner.state.current;
            inner.state = StateSnapshot::settled(target);
            (from, inner.stage)
        };

        self.post_transitions(from, target, stage);
        Ok(())
    }

    fn state(&self) -> StateSnapshot {
        self.inner.lock().state
    }

    fn query_position(&self) -> Option<Duration> {
        self.inner.lock().position
    }

    fn query_duration(&self) -> Option<Duration> {
        self.inner.lock().duration
    }
}

impl PlaybackEngine for FakeEngine {
    fn set_uri(&mut self, uri: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SetUri(uri.map(str::to_owned)));
        inner.uri = uri.map(str::to_owned);
        Ok(())
    }

    fn query_seekable(&self) -> Option<bool> {
        self.inner.lock().seekable
    }

    fn seek(&mut self, position: Duration, flushing: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Seek { position, flushing });
        inner.position = Some(position);
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SetVolume(volume));
        inner.volume = volume;
        Ok(())
    }

    fn volume(&self) -> f64 {
        self.inner.lock().volume
    }

    fn stage(&self) -> StageId {
        self.inner.lock().stage
    }
}

impl ProbeEngine for FakeEngine {
    fn attach_source(&mut self, uri: &str) -> Result<StageId> {
        let mut inner = self.inner.lock();
        if inner.rejected_uris.contains(uri) {
            return Err(BridgeError::UnsupportedUri(uri.to_string()));
        }
        if inner.attached.is_some() {
            return Err(BridgeError::InvalidState(
                "a source stage is already attached".to_string(),
            ));
        }

        let stage = inner.stage.next();
        inner.stage = stage;
        inner.attached = Some(stage);
        inner.uri = Some(uri.to_string());
        inner.calls.push(EngineCall::AttachSource {
            uri: uri.to_string(),
            stage,
        });
        Ok(stage)
    }

    fn detach_source(&mut self, stage: StageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::DetachSource(stage));

        if inner.state.current != EngineState::Stopped {
            return Err(BridgeError::InvalidState(
                "source detached from a running pipeline".to_string(),
            ));
        }
        if inner.attached != Some(stage) {
            return Err(BridgeError::InvalidState(format!("{} is not attached", stage)));
        }

        inner.attached = None;
        inner.uri = None;
        Ok(())
    }
}

impl FakeEngineControl {
    /// Every command received so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn state(&self) -> StateSnapshot {
        self.inner.lock().state
    }

    /// Stage messages posted through [`FakeEngineControl::post`] carry.
    pub fn stage(&self) -> StageId {
        self.inner.lock().stage
    }

    pub fn attached(&self) -> Option<StageId> {
        self.inner.lock().attached
    }

    pub fn uri(&self) -> Option<String> {
        self.inner.lock().uri.clone()
    }

    pub fn volume(&self) -> f64 {
        self.inner.lock().volume
    }

    pub fn set_position(&self, position: Option<Duration>) {
        self.inner.lock().position = position;
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        self.inner.lock().duration = duration;
    }

    pub fn set_seekable(&self, seekable: Option<bool>) {
        self.inner.lock().seekable = seekable;
    }

    /// When set, state requests stay pending until
    /// [`FakeEngineControl::complete_transition`] is called.
    pub fn defer_transitions(&self, defer: bool) {
        self.inner.lock().defer_transitions = defer;
    }

    /// Make every non-stop state request fail synchronously.
    pub fn refuse_start(&self, refuse: bool) {
        self.inner.lock().refuse_start = refuse;
    }

    /// Make the next `count` stop requests fail synchronously.
    pub fn refuse_stops(&self, count: usize) {
        self.inner.lock().refused_stops = count;
    }

    /// Make `attach_source` fail for `uri`.
    pub fn reject_uri(&self, uri: impl Into<String>) {
        self.inner.lock().rejected_uris.insert(uri.into());
    }

    /// Finish an in-flight transition and post its state changes.
    pub fn complete_transition(&self) {
        let (from, to, stage) = {
            let mut inner = self.inner.lock();
            let Some(to) = inner.state.pending else {
                return;
            };
            let from = inner.state.current;
            inner.state = StateSnapshot::settled(to);
            (from, to, inner.stage)
        };

        for (old, new) in transitions(from, to) {
            self.bus.post(stage, EngineEvent::StateChanged { old, new });
        }
    }

    /// Post `event` stamped with the live stage.
    pub fn post(&self, event: EngineEvent) -> bool {
        let stage = self.stage();
        self.bus.post(stage, event)
    }

    /// Post `event` stamped with an explicit stage.
    pub fn post_with_stage(&self, stage: StageId, event: EngineEvent) -> bool {
        self.bus.post(stage, event)
    }
}

/// Factory handing out [`FakeEngine`]s and keeping their controls.
#[derive(Debug, Default)]
pub struct FakeEngineFactory {
    playback: Mutex<Option<FakeEngineControl>>,
    probe: Mutex<Option<FakeEngineControl>>,
    fail_playback: bool,
    fail_probe: bool,
}

impl FakeEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose engine construction always fails.
    pub fn unavailable() -> Self {
        Self {
            fail_playback: true,
            fail_probe: true,
            ..Self::default()
        }
    }

    /// Control of the most recently created playback engine.
    pub fn playback(&self) -> Option<FakeEngineControl> {
        self.playback.lock().clone()
    }

    /// Control of the most recently created probe engine.
    pub fn probe(&self) -> Option<FakeEngineControl> {
        self.probe.lock().clone()
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create_playback(&self, bus: EngineBus) -> Result<Box<dyn PlaybackEngine>> {
        if self.fail_playback {
            return Err(BridgeError::NotAvailable("playback pipeline".to_string()));
        }
        let (engine, control) = FakeEngine::new(SourceKind::Playback, bus);
        *self.playback.lock() = Some(control);
        Ok(Box::new(engine))
    }

    fn create_probe(&self, bus: EngineBus) -> Result<Box<dyn ProbeEngine>> {
        if self.fail_probe {
            return Err(BridgeError::NotAvailable("probe pipeline".to_string()));
        }
        let (engine, control) = FakeEngine::new(SourceKind::Probe, bus);
        *self.probe.lock() = Some(control);
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusMessage;

    #[test]
    fn transitions_walk_the_ladder() {
        assert_eq!(
            transitions(EngineState::Stopped, EngineState::Playing),
            vec![
                (EngineState::Stopped, EngineState::Ready),
                (EngineState::Ready, EngineState::Paused),
                (EngineState::Paused, EngineState::Playing),
            ]
        );
        assert_eq!(
            transitions(EngineState::Playing, EngineState::Paused),
            vec![(EngineState::Playing, EngineState::Paused)]
        );
        assert!(transitions(EngineState::Paused, EngineState::Paused).is_empty());
    }

    #[test]
    fn playback_stop_advances_stage() {
        let (bus, _rx) = EngineBus::channel();
        let (mut engine, control) = FakeEngine::new(SourceKind::Playback, bus);

        let before = engine.stage();
        engine.set_state(EngineState::Stopped).unwrap();
        assert_eq!(engine.stage(), before.next());
        assert_eq!(control.stage(), engine.stage());
    }

    #[test]
    fn deferred_transition_is_pending_until_completed() {
        let (bus, mut rx) = EngineBus::channel();
        let (mut engine, control) = FakeEngine::new(SourceKind::Playback, bus);
        control.defer_transitions(true);

        engine.set_state(EngineState::Paused).unwrap();
        assert_eq!(engine.state().pending, Some(EngineState::Paused));
        assert!(rx.try_recv().is_err());

        control.complete_transition();
        assert_eq!(engine.state(), StateSnapshot::settled(EngineState::Paused));
        let stage = engine.stage();
        assert_eq!(
            rx.try_recv().unwrap(),
            BusMessage::new(
                stage,
                EngineEvent::StateChanged {
                    old: EngineState::Stopped,
                    new: EngineState::Ready
                }
            )
        );
    }

    #[test]
    fn probe_refuses_detach_while_running() {
        let (bus, _rx) = EngineBus::channel();
        let (mut engine, _control) = FakeEngine::new(SourceKind::Probe, bus);

        let stage = engine.attach_source("file:///a.ogg").unwrap();
        engine.set_state(EngineState::Playing).unwrap();
        assert!(engine.detach_source(stage).is_err());

        engine.set_state(EngineState::Stopped).unwrap();
        engine.detach_source(stage).unwrap();
    }

    #[test]
    fn dropped_engine_is_recorded() {
        let factory = FakeEngineFactory::new();
        let (bus, _rx) = EngineBus::channel();
        let engine = factory.create_playback(bus).unwrap();
        drop(engine);

        let control = factory.playback().unwrap();
        assert_eq!(control.calls(), vec![EngineCall::Dropped]);
    }
}
