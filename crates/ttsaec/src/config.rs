//! Session configuration.

use ttsaec_engine::AecConfig;

use crate::{DEFAULT_STREAM_DELAY_MS, REQUIRED_SAMPLE_RATE};

/// Parameters of a [`Session`](crate::Session).
///
/// The stream parameters mirror the `create` call of the binding surface;
/// everything else has a default that suits TTS playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Sample rate of both streams. Must be [`REQUIRED_SAMPLE_RATE`].
    pub sample_rate_hz: i32,
    /// Channels per stream. Must be 1.
    pub num_channels: i32,
    /// Use the reduced-cost tuning ([`AecConfig::mobile`]).
    pub mobile_mode: bool,
    /// Initial render-to-capture delay in milliseconds (default: 100).
    pub stream_delay_ms: i32,
    /// High-pass the capture before echo cancellation (default: on).
    pub high_pass_filter: bool,
    /// Full engine tuning. When set it replaces the preset chosen by
    /// [`mobile_mode`](Self::mobile_mode).
    pub tuning: Option<AecConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate_hz: REQUIRED_SAMPLE_RATE as i32,
            num_channels: 1,
            mobile_mode: false,
            stream_delay_ms: DEFAULT_STREAM_DELAY_MS,
            high_pass_filter: true,
            tuning: None,
        }
    }
}

impl Config {
    /// Configuration for the given stream parameters with default tuning.
    pub fn new(sample_rate_hz: i32, num_channels: i32, mobile_mode: bool) -> Self {
        Self {
            sample_rate_hz,
            num_channels,
            mobile_mode,
            ..Self::default()
        }
    }

    /// Engine tuning this configuration resolves to.
    pub fn aec_config(&self) -> AecConfig {
        match &self.tuning {
            Some(tuning) => tuning.clone(),
            None if self.mobile_mode => AecConfig::mobile(),
            None => AecConfig::default(),
        }
    }
}
