//! # Playback Module
//!
//! Transport controls over the external media engine.
//!
//! ## Overview
//!
//! This module handles:
//! - Loading, pausing, resuming and seeking one track at a time
//! - Volume control within `[0.0, 4.0]`
//! - Keeping derived properties (seekability, duration, buffering) in step
//!   with asynchronous engine messages
//! - Publishing every change as a `PlayerEvent` on the core event bus

pub mod config;
pub mod controller;
pub mod error;

pub use config::PlayerConfig;
pub use controller::{PipelineHandle, PlaybackController, PlaybackSession};
pub use error::{PlaybackError, Result};
