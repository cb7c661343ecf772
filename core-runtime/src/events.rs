//! # Events
//!
//! Typed notifications from the player core, fanned out to any number of
//! listeners over a `tokio::sync::broadcast` channel.
//!
//! The playback controller publishes [`PlayerEvent`]s as its observable
//! properties change; the scan engine publishes one [`ScanEvent::UriScanned`]
//! per finished job, in submission order. Property notifications carry the
//! new value, but listeners should treat them as hints and read the property
//! back when exact state matters.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, PlayerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut volume = EventStream::new(bus.subscribe())
//!     .filter(|e| matches!(e, CoreEvent::Player(PlayerEvent::VolumeChanged { .. })));
//!
//! bus.publish(CoreEvent::Player(PlayerEvent::PlayingChanged { playing: true }));
//! bus.publish(CoreEvent::Player(PlayerEvent::VolumeChanged { volume: 0.5 }));
//!
//! let event = volume.recv().await.unwrap();
//! assert_eq!(event.description(), "Volume changed");
//! # }
//! ```
//!
//! A listener that falls more than the bus capacity behind gets
//! [`RecvError::Lagged`] once and then resumes with the oldest retained event.

use bridge_traits::TagList;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

pub use tokio::sync::broadcast::error::RecvError;
pub use tokio::sync::broadcast::Receiver;

use tokio::sync::broadcast::error::TryRecvError;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback controller notifications
    Player(PlayerEvent),
    /// Metadata scan engine notifications
    Scan(ScanEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Player(e) => e.description(),
            CoreEvent::Scan(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Player(PlayerEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Scan(ScanEvent::UriScanned { error: Some(_), .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Player(PlayerEvent::UriChanged { .. })
            | CoreEvent::Player(PlayerEvent::EndOfStream)
            | CoreEvent::Scan(ScanEvent::UriScanned { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Player Events
// ============================================================================

/// Notifications published by the playback controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// The loaded URI changed. `None` means no track is loaded.
    UriChanged { uri: Option<String> },
    /// The run/pause intent changed.
    PlayingChanged { playing: bool },
    /// Playback position, in whole seconds.
    PositionChanged { position_secs: u64 },
    /// Output volume, in `[0.0, 4.0]`.
    VolumeChanged { volume: f64 },
    /// Whether the loaded stream supports seeking.
    CanSeekChanged { can_seek: bool },
    /// Network buffer fill level, in `[0, 100]`.
    BufferPercentChanged { percent: u8 },
    /// Stream duration in whole seconds, `None` while unknown.
    DurationChanged { duration_secs: Option<u64> },
    /// A batch of stream tags was read. Not retained by the controller.
    TagsAvailable { tags: TagList },
    /// The stream ran out of data.
    EndOfStream,
    /// The engine reported a failure. Playback state is left untouched.
    Error { message: String },
}

impl PlayerEvent {
    fn description(&self) -> &str {
        match self {
            PlayerEvent::UriChanged { .. } => "Track URI changed",
            PlayerEvent::PlayingChanged { .. } => "Playing state changed",
            PlayerEvent::PositionChanged { .. } => "Playback position changed",
            PlayerEvent::VolumeChanged { .. } => "Volume changed",
            PlayerEvent::CanSeekChanged { .. } => "Seekability changed",
            PlayerEvent::BufferPercentChanged { .. } => "Buffer level changed",
            PlayerEvent::DurationChanged { .. } => "Duration changed",
            PlayerEvent::TagsAvailable { .. } => "Tags available",
            PlayerEvent::EndOfStream => "End of stream",
            PlayerEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Scan Events
// ============================================================================

/// Category of a scan failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanFailureKind {
    /// Decode, demux or I/O failure reported by the engine.
    Engine,
    /// The probe could not identify the stream type.
    UnsupportedType,
    /// No source stage can be built for the URI.
    UnsupportedUri,
    /// No probe engine is available.
    NotReady,
}

/// Failure attached to a scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub kind: ScanFailureKind,
    pub message: String,
}

impl ScanFailure {
    pub fn new(kind: ScanFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Notifications published by the metadata scan engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ScanEvent {
    /// A scan job finished. Tags and duration may be partial when `error` is set.
    UriScanned {
        job_id: u64,
        uri: String,
        error: Option<ScanFailure>,
        tags: TagList,
        duration_secs: Option<u64>,
    },
}

impl ScanEvent {
    fn description(&self) -> &str {
        match self {
            ScanEvent::UriScanned { error: None, .. } => "URI scanned",
            ScanEvent::UriScanned { .. } => "URI scan failed",
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Cloneable publishing side. Every clone feeds the same set of listeners.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is how far a listener may fall behind before it lags.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Deliver `event` to every current listener and return how many there
    /// were. Having none is normal.
    pub fn publish(&self, event: CoreEvent) -> usize {
        match self.sender.send(event) {
            Ok(listeners) => listeners,
            Err(broadcast::error::SendError(dropped)) => {
                trace!(event = dropped.description(), "Event had no listeners");
                0
            }
        }
    }

    /// Listen for events published from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// Stream
// ============================================================================

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A listener that can skip events it is not interested in.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    predicate: Option<Predicate>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            predicate: None,
        }
    }

    /// Keep only events for which `predicate` holds.
    pub fn filter(self, predicate: impl Fn(&CoreEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Some(Box::new(predicate)),
            ..self
        }
    }

    fn wants(&self, event: &CoreEvent) -> bool {
        self.predicate.as_ref().map_or(true, |keep| keep(event))
    }

    /// Wait for the next wanted event.
    ///
    /// # Errors
    ///
    /// [`RecvError::Lagged`] after falling behind, [`RecvError::Closed`] once
    /// every [`EventBus`] clone is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// Next wanted event already buffered, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.wants(&event) {
                return Some(Ok(event));
            }
        }
    }

    /// Take every wanted event already buffered. Lag gaps are skipped over.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        std::iter::from_fn(|| loop {
            match self.try_recv()? {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        })
        .collect()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.predicate.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
