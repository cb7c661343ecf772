//! # Playback Error Types
//!
//! Errors returned synchronously by the playback controller. Asynchronous
//! engine failures are not errors here; they are republished as
//! `PlayerEvent::Error` notifications.

use bridge_traits::BridgeError;
use core_runtime::config::MAX_VOLUME;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// Volume outside `[0.0, MAX_VOLUME]`, or not a number.
    #[error("Invalid volume: {0} (must be between 0.0 and {max})", max = MAX_VOLUME)]
    InvalidVolume(f64),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine refused a command synchronously.
    #[error("Engine error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the caller passed an invalid argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, PlaybackError::InvalidVolume(_))
    }

    /// Returns `true` if the engine rejected the URI it was given.
    pub fn is_unsupported_uri(&self) -> bool {
        matches!(self, PlaybackError::Bridge(BridgeError::UnsupportedUri(_)))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
