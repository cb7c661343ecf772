//! # Player Configuration
//!
//! Settings the playback controller reads at construction.

use core_runtime::config::{CoreConfig, DEFAULT_NETWORK_SCHEMES, DEFAULT_TICK_INTERVAL};
use std::time::Duration;

/// Playback controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Position-refresh period while a URI is loaded.
    ///
    /// Default: 500 ms.
    pub tick_interval: Duration,

    /// Volume applied to the engine at construction, and reported while no
    /// engine is available.
    ///
    /// Default: 1.0 (unity gain).
    pub default_volume: f64,

    /// Schemes treated as live network sources when the engine cannot say
    /// whether a stream is seekable.
    pub network_schemes: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            default_volume: 1.0,
            network_schemes: DEFAULT_NETWORK_SCHEMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl From<&CoreConfig> for PlayerConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            tick_interval: config.tick_interval,
            default_volume: config.default_volume,
            network_schemes: config.network_schemes.clone(),
        }
    }
}

impl PlayerConfig {
    /// Returns `true` if `uri` uses one of the configured network schemes.
    pub fn is_network_uri(&self, uri: &str) -> bool {
        match uri.split_once(':') {
            Some((scheme, _)) => self
                .network_schemes
                .iter()
                .any(|s| s.eq_ignore_ascii_case(scheme)),
            None => false,
        }
    }

    /// Fallback answer for "can this stream seek?".
    pub fn assume_seekable(&self, uri: &str) -> bool {
        !self.is_network_uri(uri)
    }
}
