//! # Playback Controller
//!
//! Wraps one audio-rendering engine and keeps a [`PlaybackSession`] in step
//! with it.
//!
//! Transport calls (`load`, `set_playing`, `seek`, `set_volume`) translate to
//! engine state requests and publish property-change notifications right
//! away. Those notifications may be stale: the engine settles asynchronously
//! and reports back through its bus, which the owner drains into
//! [`PlaybackController::handle_message`]. Seekability and duration are only
//! known once the pipeline has prerolled, so they are derived from the
//! `Ready -> Paused` transition rather than computed on load.
//!
//! The controller never locks and never spawns. Its owner drives it from a
//! single task: commands, bus messages and [`PlaybackController::on_tick`]
//! (every `tick_interval` while [`PlaybackController::tick_active`]).

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use bridge_traits::{
    BusMessage, BusReceiver, EngineBus, EngineEvent, EngineFactory, EngineHandle, EngineState,
    PlaybackEngine,
};
use core_runtime::config::MAX_VOLUME;
use core_runtime::events::{CoreEvent, EventBus, PlayerEvent};
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Owned handle to the playback engine. Dropping it stops the engine first.
pub type PipelineHandle = EngineHandle<dyn PlaybackEngine>;

/// Derived state of the loaded track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSession {
    uri: Option<String>,
    can_seek: bool,
    duration_secs: Option<u64>,
    buffer_percent: u8,
    tick_active: bool,
}

impl PlaybackSession {
    /// Point the session at a new URI, forgetting everything derived from
    /// the previous one.
    fn reset(&mut self, uri: Option<&str>) {
        *self = Self {
            uri: uri.map(str::to_owned),
            tick_active: uri.is_some(),
            ..Self::default()
        };
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn can_seek(&self) -> bool {
        self.can_seek
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration_secs
    }

    pub fn buffer_percent(&self) -> u8 {
        self.buffer_percent
    }

    pub fn tick_active(&self) -> bool {
        self.tick_active
    }
}

/// Transport controls over one long-lived playback engine.
pub struct PlaybackController {
    pipeline: Option<PipelineHandle>,
    session: PlaybackSession,
    events: EventBus,
    config: PlayerConfig,
}

impl PlaybackController {
    /// Build the controller and its engine.
    ///
    /// Returns the receiving end of the engine bus; the owner feeds every
    /// message from it into [`handle_message`](Self::handle_message). If the
    /// factory cannot build an engine the controller still works, but every
    /// transport call is a no-op.
    pub fn new(
        factory: &dyn EngineFactory,
        events: EventBus,
        config: PlayerConfig,
    ) -> (Self, BusReceiver) {
        let (bus, receiver) = EngineBus::channel();

        let pipeline = match factory.create_playback(bus) {
            Ok(engine) => {
                let mut pipeline = PipelineHandle::new(engine);
                if let Err(e) = pipeline.set_volume(config.default_volume) {
                    warn!(error = %e, "Failed to apply default volume");
                }
                Some(pipeline)
            }
            Err(e) => {
                warn!(error = %e, "No playback engine available, playback will not work");
                None
            }
        };

        let controller = Self {
            pipeline,
            session: PlaybackSession::default(),
            events,
            config,
        };

        (controller, receiver)
    }

    /// Returns `true` if an engine was built.
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Load `uri`, or unload with `None`.
    ///
    /// The engine is reset to `Stopped` and, when a URI is given, brought
    /// back to the state it was in (or heading to) before the call.
    /// Notifications for uri, can-seek, duration and position are published
    /// even if the engine refuses a step.
    #[instrument(skip(self))]
    pub fn load(&mut self, uri: Option<&str>) -> Result<()> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            trace!("load ignored, no playback engine");
            return Ok(());
        };

        let previous = pipeline.state().target();
        self.session.reset(uri);

        let outcome = pipeline
            .set_state(EngineState::Stopped)
            .and_then(|_| pipeline.set_uri(uri))
            .and_then(|_| match uri {
                Some(_) if previous != EngineState::Stopped => pipeline.set_state(previous),
                _ => Ok(()),
            });

        match uri {
            Some(uri) => info!(uri, restore = ?previous, "Loaded track"),
            None => info!("Unloaded track"),
        }

        self.notify(PlayerEvent::UriChanged {
            uri: self.session.uri.clone(),
        });
        self.notify(PlayerEvent::CanSeekChanged { can_seek: false });
        self.notify(PlayerEvent::DurationChanged {
            duration_secs: None,
        });
        self.notify_position();

        outcome.map_err(PlaybackError::from)
    }

    /// Request playing or paused.
    ///
    /// Asking to play with nothing loaded logs a warning and changes nothing.
    pub fn set_playing(&mut self, playing: bool) -> Result<()> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            trace!("set_playing ignored, no playback engine");
            return Ok(());
        };

        let outcome = if self.session.uri.is_some() {
            let target = if playing {
                EngineState::Playing
            } else {
                EngineState::Paused
            };
            debug!(?target, "Changing playback state");
            pipeline.set_state(target)
        } else {
            if playing {
                warn!("Tried to play, but no URI is loaded");
            }
            Ok(())
        };

        let playing = self.get_playing();
        self.notify(PlayerEvent::PlayingChanged { playing });
        self.notify_position();

        outcome.map_err(PlaybackError::from)
    }

    /// The state the engine is in, or heading to if a transition is in flight.
    pub fn get_playing(&self) -> bool {
        self.pipeline
            .as_ref()
            .map(|p| p.state().target() == EngineState::Playing)
            .unwrap_or(false)
    }

    /// Flushing seek to an absolute position.
    ///
    /// The engine is paused for the seek and then returned to the state it
    /// was in (or heading to) before the call.
    #[instrument(skip(self))]
    pub fn seek(&mut self, position_secs: u64) -> Result<()> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            trace!("seek ignored, no playback engine");
            return Ok(());
        };

        if self.session.uri.is_none() {
            debug!("seek ignored, no URI loaded");
            return Ok(());
        }

        let previous = pipeline.state().target();
        let outcome = pipeline
            .set_state(EngineState::Paused)
            .and_then(|_| pipeline.seek(Duration::from_secs(position_secs), true))
            .and_then(|_| pipeline.set_state(previous));

        debug!(restore = ?previous, "Seek issued");
        self.notify_position();

        outcome.map_err(PlaybackError::from)
    }

    /// Position in whole seconds; 0 whenever the engine cannot answer.
    pub fn get_position(&self) -> u64 {
        self.pipeline
            .as_ref()
            .and_then(|p| p.query_position())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Set the output volume.
    ///
    /// Values outside `[0.0, 4.0]` (and NaN) are rejected and the current
    /// volume is left unchanged.
    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        if !(0.0..=MAX_VOLUME).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }

        let Some(pipeline) = self.pipeline.as_mut() else {
            trace!("set_volume ignored, no playback engine");
            return Ok(());
        };

        pipeline.set_volume(volume)?;
        self.notify(PlayerEvent::VolumeChanged { volume });
        Ok(())
    }

    pub fn get_volume(&self) -> f64 {
        self.pipeline
            .as_ref()
            .map(|p| p.volume())
            .unwrap_or(self.config.default_volume)
    }

    pub fn uri(&self) -> Option<&str> {
        self.session.uri()
    }

    pub fn can_seek(&self) -> bool {
        self.session.can_seek
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.session.duration_secs
    }

    pub fn buffer_percent(&self) -> u8 {
        self.session.buffer_percent
    }

    /// Whether the owner should be calling [`on_tick`](Self::on_tick).
    pub fn tick_active(&self) -> bool {
        self.session.tick_active
    }

    // ========================================================================
    // Asynchronous updates
    // ========================================================================

    /// Periodic position refresh.
    pub fn on_tick(&mut self) {
        if self.session.tick_active {
            self.notify_position();
        }
    }

    /// Apply one engine bus message. Messages from a previous stage are dropped.
    pub fn handle_message(&mut self, message: BusMessage) {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return;
        };

        if message.stage != pipeline.stage() {
            trace!(
                stage = %message.stage,
                live = %pipeline.stage(),
                event = message.event.name(),
                "Dropping stale playback message"
            );
            return;
        }

        debug!(event = message.event.name(), "Playback engine message");

        match message.event {
            EngineEvent::StateChanged { old, new } => self.on_state_changed(old, new),
            EngineEvent::Error { detail } => {
                warn!(error = %detail, "Playback engine error");
                self.notify(PlayerEvent::Error { message: detail });
            }
            EngineEvent::EndOfStream => {
                self.notify_position();
                self.notify(PlayerEvent::EndOfStream);
            }
            EngineEvent::Tags(tags) => self.notify(PlayerEvent::TagsAvailable { tags }),
            EngineEvent::DurationKnown(duration) => {
                self.session.duration_secs = Some(duration.as_secs());
                self.notify(PlayerEvent::DurationChanged {
                    duration_secs: self.session.duration_secs,
                });
            }
            EngineEvent::Buffering { percent } => {
                self.session.buffer_percent = percent.clamp(0, 100) as u8;
                self.notify(PlayerEvent::BufferPercentChanged {
                    percent: self.session.buffer_percent,
                });
            }
            EngineEvent::UnknownType { caps } => {
                warn!(%caps, "Playback engine cannot decode stream");
                self.notify(PlayerEvent::Error {
                    message: format!("Unsupported stream type: {}", caps),
                });
            }
            EngineEvent::FirstPayload => {}
        }
    }

    fn on_state_changed(&mut self, old: EngineState, new: EngineState) {
        if old == EngineState::Ready && new == EngineState::Paused {
            self.derive_stream_properties();
        }

        if old == EngineState::Playing || new == EngineState::Playing {
            self.notify(PlayerEvent::PlayingChanged {
                playing: new == EngineState::Playing,
            });
        }
    }

    /// First point at which the engine can answer seek and duration queries.
    fn derive_stream_properties(&mut self) {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return;
        };

        let seekable = pipeline.query_seekable();
        let duration = pipeline.query_duration();

        self.session.can_seek = match seekable {
            Some(seekable) => seekable,
            None => self
                .session
                .uri
                .as_deref()
                .map(|uri| self.config.assume_seekable(uri))
                .unwrap_or(false),
        };
        self.notify(PlayerEvent::CanSeekChanged {
            can_seek: self.session.can_seek,
        });

        if let Some(duration) = duration {
            self.session.duration_secs = Some(duration.as_secs());
            self.notify(PlayerEvent::DurationChanged {
                duration_secs: self.session.duration_secs,
            });
        }

        debug!(
            can_seek = self.session.can_seek,
            duration_secs = ?self.session.duration_secs,
            "Stream prerolled"
        );
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Stop the tick, stop the engine and release it.
    pub fn shutdown(&mut self) {
        self.session.tick_active = false;

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.release() {
                warn!(error = %e, "Playback engine refused to stop");
            }
            info!("Playback engine released");
        }
    }

    fn notify_position(&self) {
        self.notify(PlayerEvent::PositionChanged {
            position_secs: self.get_position(),
        });
    }

    fn notify(&self, event: PlayerEvent) {
        self.events.publish(CoreEvent::Player(event));
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("pipeline", &self.pipeline)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::testing::{EngineCall, FakeEngineFactory};
    use bridge_traits::{BridgeError, ProbeEngine};
    use core_runtime::events::EventStream;
    use mockall::mock;

    mock! {
        Factory {}

        impl EngineFactory for Factory {
            fn create_playback(
                &self,
                bus: EngineBus,
            ) -> bridge_traits::error::Result<Box<dyn PlaybackEngine>>;

            fn create_probe(
                &self,
                bus: EngineBus,
            ) -> bridge_traits::error::Result<Box<dyn ProbeEngine>>;
        }
    }

    fn controller() -> (PlaybackController, BusReceiver, FakeEngineFactory, EventStream) {
        let factory = FakeEngineFactory::new();
        let events = EventBus::new(64);
        let stream = EventStream::new(events.subscribe());
        let (controller, rx) = PlaybackController::new(&factory, events, PlayerConfig::default());
        (controller, rx, factory, stream)
    }

    fn pump(controller: &mut PlaybackController, rx: &mut BusReceiver) {
        while let Ok(message) = rx.try_recv() {
            controller.handle_message(message);
        }
    }

    #[test]
    fn test_default_volume_applied() {
        let (controller, _rx, factory, _events) = controller();
        let control = factory.playback().unwrap();

        assert_eq!(control.calls(), vec![EngineCall::SetVolume(1.0)]);
        assert_eq!(controller.get_volume(), 1.0);
    }

    #[test]
    fn test_load_restores_previous_intent() {
        let (mut controller, mut rx, factory, _events) = controller();
        let control = factory.playback().unwrap();

        controller.load(Some("file:///a.ogg")).unwrap();
        controller.set_playing(true).unwrap();
        pump(&mut controller, &mut rx);
        control.clear_calls();

        controller.load(Some("file:///b.ogg")).unwrap();
        assert_eq!(
            control.calls(),
            vec![
                EngineCall::SetState(EngineState::Stopped),
                EngineCall::SetUri(Some("file:///b.ogg".to_string())),
                EngineCall::SetState(EngineState::Playing),
            ]
        );
        assert!(controller.get_playing());
    }

    #[test]
    fn test_unload_leaves_engine_stopped() {
        let (mut controller, _rx, factory, _events) = controller();
        let control = factory.playback().unwrap();

        controller.load(Some("file:///a.ogg")).unwrap();
        controller.set_playing(true).unwrap();
        control.clear_calls();

        controller.load(None).unwrap();
        assert_eq!(
            control.calls(),
            vec![
                EngineCall::SetState(EngineState::Stopped),
                EngineCall::SetUri(None),
            ]
        );
        assert!(!controller.tick_active());
        assert_eq!(controller.uri(), None);
    }

    #[test]
    fn test_prerolled_state_derives_properties() {
        let (mut controller, mut rx, factory, mut events) = controller();
        let control = factory.playback().unwrap();
        control.set_seekable(None);
        control.set_duration(Some(Duration::from_secs(212)));

        controller.load(Some("http://radio.example/live")).unwrap();
        controller.set_playing(false).unwrap();
        events.drain();
        pump(&mut controller, &mut rx);

        assert!(!controller.can_seek());
        assert_eq!(controller.duration_secs(), Some(212));
        let received = events.drain();
        assert!(received.contains(&CoreEvent::Player(PlayerEvent::CanSeekChanged {
            can_seek: false
        })));
        assert!(received.contains(&CoreEvent::Player(PlayerEvent::DurationChanged {
            duration_secs: Some(212)
        })));
    }

    #[test]
    fn test_buffering_is_clamped() {
        let (mut controller, mut rx, factory, _events) = controller();
        let control = factory.playback().unwrap();
        controller.load(Some("http://radio.example/live")).unwrap();

        control.post(EngineEvent::Buffering { percent: 140 });
        pump(&mut controller, &mut rx);
        assert_eq!(controller.buffer_percent(), 100);

        control.post(EngineEvent::Buffering { percent: -3 });
        pump(&mut controller, &mut rx);
        assert_eq!(controller.buffer_percent(), 0);
    }

    #[test]
    fn test_error_does_not_stop_playback() {
        let (mut controller, mut rx, factory, mut events) = controller();
        let control = factory.playback().unwrap();
        controller.load(Some("file:///a.ogg")).unwrap();
        controller.set_playing(true).unwrap();
        pump(&mut controller, &mut rx);
        events.drain();
        control.clear_calls();

        control.post(EngineEvent::Error {
            detail: "corrupt frame".to_string(),
        });
        pump(&mut controller, &mut rx);

        assert!(controller.get_playing());
        assert!(control.calls().is_empty());
        assert_eq!(
            events.drain(),
            vec![CoreEvent::Player(PlayerEvent::Error {
                message: "corrupt frame".to_string()
            })]
        );
    }

    #[test]
    fn test_synchronous_refusal_still_notifies() {
        let (mut controller, _rx, factory, mut events) = controller();
        let control = factory.playback().unwrap();
        controller.load(Some("file:///a.ogg")).unwrap();
        events.drain();

        control.refuse_start(true);
        let err = controller.set_playing(true).unwrap_err();
        assert!(matches!(err, PlaybackError::Bridge(BridgeError::InvalidState(_))));
        assert_eq!(
            events.drain(),
            vec![
                CoreEvent::Player(PlayerEvent::PlayingChanged { playing: false }),
                CoreEvent::Player(PlayerEvent::PositionChanged { position_secs: 0 }),
            ]
        );
    }

    #[test]
    fn test_degraded_controller_is_inert() {
        let mut factory = MockFactory::new();
        factory
            .expect_create_playback()
            .times(1)
            .returning(|_| Err(BridgeError::NotAvailable("playbin".to_string())));

        let events = EventBus::new(8);
        let mut stream = EventStream::new(events.subscribe());
        let (mut controller, _rx) =
            PlaybackController::new(&factory, events, PlayerConfig::default());

        assert!(!controller.is_ready());
        controller.load(Some("file:///a.ogg")).unwrap();
        controller.set_playing(true).unwrap();
        controller.seek(10).unwrap();
        controller.set_volume(2.0).unwrap();
        controller.on_tick();

        assert!(!controller.get_playing());
        assert_eq!(controller.get_position(), 0);
        assert_eq!(controller.get_volume(), 1.0);
        assert!(stream.drain().is_empty());
        assert!(controller.set_volume(9.0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_shutdown_stops_before_release() {
        let (mut controller, _rx, factory, _events) = controller();
        let control = factory.playback().unwrap();
        controller.load(Some("file:///a.ogg")).unwrap();
        controller.set_playing(true).unwrap();
        control.clear_calls();

        controller.shutdown();
        assert_eq!(
            control.calls(),
            vec![
                EngineCall::SetState(EngineState::Stopped),
                EngineCall::Dropped,
            ]
        );
        assert!(!controller.tick_active());
        assert!(!controller.is_ready());
    }

    #[test]
    fn test_drop_stops_engine() {
        let (mut controller, _rx, factory, _events) = controller();
        let control = factory.playback().unwrap();
        controller.load(Some("file:///a.ogg")).unwrap();
        control.clear_calls();

        drop(controller);
        assert_eq!(
            control.calls(),
            vec![
                EngineCall::SetState(EngineState::Stopped),
                EngineCall::Dropped,
            ]
        );
    }
}
