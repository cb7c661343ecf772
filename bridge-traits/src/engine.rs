//! Media engine bridge traits and supporting types.
//!
//! The core never decodes or renders audio itself. It drives an external
//! streaming media engine that is handed a URI, runs its decode graph on its
//! own worker threads, and reports progress asynchronously through an
//! [`EngineBus`](crate::bus::EngineBus). These traits describe the command and
//! query surface of that engine.
//!
//! Two configurations exist:
//!
//! - [`PlaybackEngine`]: a full decode/render pipeline with audio output.
//! - [`ProbeEngine`]: a decode-only pipeline whose output is discarded. Its
//!   decode and sink stages are long-lived; only the source stage is swapped
//!   per URI via [`ProbeEngine::attach_source`] / [`ProbeEngine::detach_source`].
//!
//! ## Threading
//!
//! All methods are called from the single control task. Implementations must
//! marshal every notification onto the bus rather than calling back into the
//! core.

use crate::bus::EngineBus;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Tag name to value mapping reported by the engine (`title`, `artist`, ...).
///
/// Merging follows last-write-wins per tag name.
pub type TagList = BTreeMap<String, String>;

/// Well-known tag names.
pub mod tags {
    pub const TITLE: &str = "title";
    pub const ARTIST: &str = "artist";
    pub const ALBUM: &str = "album";
    pub const GENRE: &str = "genre";
    pub const TRACK_NUMBER: &str = "track-number";
}

/// Which pipeline configuration an engine instance was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Audio-rendering pipeline.
    Playback,
    /// Decode-only pipeline with a discarding sink.
    Probe,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Playback => f.write_str("playback"),
            SourceKind::Probe => f.write_str("probe"),
        }
    }
}

/// Pipeline state, ordered from fully torn down to rendering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum EngineState {
    /// No resources allocated, no URI opened.
    #[default]
    Stopped,
    /// Resources allocated; the "paused-start" state a pipeline passes through
    /// before it has prerolled.
    Ready,
    /// Prerolled, clock stopped.
    Paused,
    /// Clock running.
    Playing,
}

impl EngineState {
    /// Returns `true` if the engine can answer seek and duration queries.
    pub fn is_prerolled(&self) -> bool {
        matches!(self, EngineState::Paused | EngineState::Playing)
    }
}

/// Result of a state query: the state reached so far and the one being
/// transitioned to, if a transition is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    pub current: EngineState,
    pub pending: Option<EngineState>,
}

impl StateSnapshot {
    pub fn settled(state: EngineState) -> Self {
        Self {
            current: state,
            pending: None,
        }
    }

    /// The state the caller asked for: pending if in flight, else current.
    pub fn target(&self) -> EngineState {
        self.pending.unwrap_or(self.current)
    }
}

/// Identifies the source configuration a bus message belongs to.
///
/// A playback engine moves to a new stage every time it is reset to
/// [`EngineState::Stopped`]; a probe engine allocates one per attached source.
/// Consumers drop messages whose stage is not the live one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct StageId(u64);

impl StageId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage#{}", self.0)
    }
}

/// Asynchronous notifications emitted by an engine.
///
/// The set is closed; consumers match it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The pipeline finished a state transition.
    StateChanged { old: EngineState, new: EngineState },
    /// Decode, demux or I/O failure.
    Error { detail: String },
    /// The source ran out of data.
    EndOfStream,
    /// A batch of stream tags was read.
    Tags(TagList),
    /// The engine learned the stream duration.
    DurationKnown(Duration),
    /// Network buffer fill level, in percent.
    Buffering { percent: i32 },
    /// The decoder could not identify the stream type (probe only).
    UnknownType { caps: String },
    /// The discarding sink received its first decoded buffer (probe only).
    FirstPayload,
}

impl EngineEvent {
    /// Short name used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged { .. } => "state-changed",
            EngineEvent::Error { .. } => "error",
            EngineEvent::EndOfStream => "eos",
            EngineEvent::Tags(_) => "tag",
            EngineEvent::DurationKnown(_) => "duration",
            EngineEvent::Buffering { .. } => "buffering",
            EngineEvent::UnknownType { .. } => "unknown-type",
            EngineEvent::FirstPayload => "first-payload",
        }
    }
}

/// Command and query surface shared by both pipeline configurations.
pub trait MediaEngine: Send {
    /// Which configuration this engine was built for.
    fn kind(&self) -> SourceKind;

    /// Request a state transition. The transition may complete asynchronously;
    /// completion is reported with [`EngineEvent::StateChanged`].
    fn set_state(&mut self, state: EngineState) -> Result<()>;

    /// Current and pending state, without blocking.
    fn state(&self) -> StateSnapshot;

    /// Playback position, when the pipeline can answer.
    fn query_position(&self) -> Option<Duration>;

    /// Stream duration, when the pipeline can answer.
    fn query_duration(&self) -> Option<Duration>;
}

/// Audio-rendering pipeline.
pub trait PlaybackEngine: MediaEngine {
    /// Assign the URI the next preroll will open. `None` clears it.
    fn set_uri(&mut self, uri: Option<&str>) -> Result<()>;

    /// Whether the current stream supports seeking, when the pipeline can answer.
    fn query_seekable(&self) -> Option<bool>;

    /// Seek to an absolute position. A flushing seek discards decoded data
    /// that has not been rendered yet.
    fn seek(&mut self, position: Duration, flushing: bool) -> Result<()>;

    fn set_volume(&mut self, volume: f64) -> Result<()>;

    fn volume(&self) -> f64;

    /// Stage stamped onto messages posted right now.
    fn stage(&self) -> StageId;
}

/// Decode-only pipeline with a discarding sink.
pub trait ProbeEngine: MediaEngine {
    /// Build a source stage for `uri` and link it to the shared decode stage.
    /// Messages caused by this source carry the returned stage.
    fn attach_source(&mut self, uri: &str) -> Result<StageId>;

    /// Unlink and discard a source stage. The pipeline must be stopped first.
    fn detach_source(&mut self, stage: StageId) -> Result<()>;
}

/// Creates engine instances. Each instance posts to the bus it was built with.
#[cfg_attr(test, mockall::automock)]
pub trait EngineFactory: Send + Sync {
    fn create_playback(&self, bus: EngineBus) -> Result<Box<dyn PlaybackEngine>>;

    fn create_probe(&self, bus: EngineBus) -> Result<Box<dyn ProbeEngine>>;
}

/// Owned engine handle.
///
/// Dropping or releasing the handle forces the engine to
/// [`EngineState::Stopped`] before the engine itself is released, so callers
/// cannot tear a pipeline down out of order.
pub struct EngineHandle<E: ?Sized + MediaEngine> {
    engine: Box<E>,
    released: bool,
}

impl<E: ?Sized + MediaEngine> EngineHandle<E> {
    pub fn new(engine: Box<E>) -> Self {
        Self {
            engine,
            released: false,
        }
    }

    /// Stop the engine and release it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.engine.set_state(EngineState::Stopped)
    }
}

impl<E: ?Sized + MediaEngine> std::ops::Deref for EngineHandle<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}

impl<E: ?Sized + MediaEngine> std::ops::DerefMut for EngineHandle<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: ?Sized + MediaEngine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        if !self.released {
            // Nothing useful can be done with a failure while dropping.
            let _ = self.engine.set_state(EngineState::Stopped);
        }
    }
}

impl<E: ?Sized + MediaEngine> fmt::Debug for EngineHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("kind", &self.engine.kind())
            .field("state", &self.engine.state())
            .finish()
    }
}
