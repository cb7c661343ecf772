//! # Media Engine Bridge Traits
//!
//! Contract between the player core and the streaming media engine that does
//! the actual decoding and rendering.
//!
//! ## Overview
//!
//! The core hands the engine URIs and state requests; the engine runs its
//! decode graph on its own threads and reports back through an
//! [`EngineBus`](bus::EngineBus). Everything the core knows about a stream
//! (position, duration, tags, errors) arrives either as a synchronous query
//! answer or as a [`BusMessage`](bus::BusMessage).
//!
//! ## Traits
//!
//! - [`MediaEngine`](engine::MediaEngine) - State control and position/duration queries
//! - [`PlaybackEngine`](engine::PlaybackEngine) - Audio-rendering pipeline
//! - [`ProbeEngine`](engine::ProbeEngine) - Decode-only pipeline with swappable sources
//! - [`EngineFactory`](engine::EngineFactory) - Builds engines wired to a bus
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Stale Messages
//!
//! Every bus message carries the [`StageId`](engine::StageId) that was live
//! when it was posted. After a reset or a source swap the consumer drops
//! anything stamped with an older stage.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Engine
//! implementations should convert their native failures into it and keep the
//! URI or stage in the message.
//!
//! ## Testing
//!
//! The `test-utils` feature exposes [`testing::FakeEngineFactory`], a scripted
//! engine that records every command and posts realistic state changes.

pub mod bus;
pub mod engine;
pub mod error;
pub mod logging;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::BridgeError;

// Re-export commonly used types
pub use bus::{BusMessage, BusReceiver, EngineBus};
pub use engine::{
    EngineEvent, EngineFactory, EngineHandle, EngineState, MediaEngine, PlaybackEngine,
    ProbeEngine, SourceKind, StageId, StateSnapshot, TagList,
};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
