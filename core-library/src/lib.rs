//! # Library Module
//!
//! Turns playlist files into the URIs the player and scanner consume.
//!
//! ## Overview
//!
//! This module handles:
//! - Recognising M3U playlists by extension
//! - Resolving absolute and relative entries to `file://` URIs
//! - Yielding entries lazily as the file is read

pub mod error;
pub mod playlist;

pub use error::{LibraryError, Result};
pub use playlist::{PlaylistEntries, PlaylistParser};
