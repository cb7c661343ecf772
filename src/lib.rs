//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `core-library`). Host applications
//! can depend on `player-core-workspace` and enable the documented features
//! without needing to wire each crate individually.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "playlists")]
pub use core_library as library;
