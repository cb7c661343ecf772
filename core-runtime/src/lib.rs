//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the player core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus carrying player and scan notifications
//!
//! ## Overview
//!
//! The playback and metadata crates depend on this one for their ambient
//! concerns. It establishes the logging conventions and the broadcast
//! mechanism through which engine state reaches the UI.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::CoreConfig;
pub use error::{Error, Result};
