//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every tunable the playback controller and the scan engine
//! read at construction. Values are validated once in
//! [`build()`](CoreConfigBuilder::build) so the engines never see an invalid
//! setting.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .tick_interval(Duration::from_millis(250))
//!     .default_volume(0.8)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.tick_interval, Duration::from_millis(250));
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use std::time::Duration;

/// Upper bound of the output volume. `1.0` is unity gain.
pub const MAX_VOLUME: f64 = 4.0;

/// Interval of the position-refresh tick while a track is loaded.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// URI schemes the seekability heuristic treats as live network sources.
pub const DEFAULT_NETWORK_SCHEMES: &[&str] = &["http", "https", "mms", "rtsp", "rtmp"];

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Position-refresh period while a URI is loaded
    pub tick_interval: Duration,

    /// Volume applied to the playback engine at construction
    pub default_volume: f64,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    /// Schemes assumed non-seekable when the engine cannot answer
    pub network_schemes: Vec<String>,

    /// Logging setup
    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            default_volume: 1.0,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            network_schemes: DEFAULT_NETWORK_SCHEMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The tick interval is non-zero
    /// - The default volume lies within `[0.0, MAX_VOLUME]`
    /// - The event buffer can hold at least one event
    /// - Network schemes are non-empty lowercase names
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(Error::Config(
                "Tick interval must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=MAX_VOLUME).contains(&self.default_volume) {
            return Err(Error::Config(format!(
                "Default volume must be between 0.0 and {}, got {}",
                MAX_VOLUME, self.default_volume
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if let Some(scheme) = self
            .network_schemes
            .iter()
            .find(|s| s.is_empty() || s.chars().any(|c| c.is_ascii_uppercase() || c == ':'))
        {
            return Err(Error::Config(format!(
                "Invalid network scheme '{}': use a bare lowercase name such as \"http\"",
                scheme
            )));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Unset fields fall back to the [`Default`] values.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    tick_interval: Option<Duration>,
    default_volume: Option<f64>,
    event_buffer_size: Option<usize>,
    network_schemes: Option<Vec<String>>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the position-refresh period.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    /// Sets the initial playback volume.
    pub fn default_volume(mut self, volume: f64) -> Self {
        self.default_volume = Some(volume);
        self
    }

    /// Sets the event bus capacity.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Replaces the set of schemes treated as live network sources.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let config = CoreConfig::builder()
    ///     .network_schemes(["http", "https", "icy"])
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.network_schemes.len(), 3);
    /// ```
    pub fn network_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.network_schemes = Some(schemes.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or [`Error::Config`] naming the
    /// offending value.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();

        let config = CoreConfig {
            tick_interval: self.tick_interval.unwrap_or(defaults.tick_interval),
            default_volume: self.default_volume.unwrap_or(defaults.default_volume),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
            network_schemes: self.network_schemes.unwrap_or(defaults.network_schemes),
            logging: self.logging.unwrap_or(defaults.logging),
        };

        config.validate()?;

        Ok(config)
    }
}
