//! Handle with the call surface of the mobile binding.
//!
//! Every call succeeds or fails with a `bool` and getters return a sentinel
//! instead of an error, so a JNI or C shim can forward to it one-to-one.
//! Failures are logged.

use crate::config::Config;
use crate::error::Error;
use crate::session::Session;
use crate::stats::Statistics;

/// Boolean-returning wrapper around an optional [`Session`].
///
/// ```
/// use ttsaec::{EchoCanceller, REQUIRED_FRAME_SIZE};
///
/// let mut aec = EchoCanceller::new();
/// assert!(!aec.create(44_100, 1, false));
/// assert!(aec.create(48_000, 1, false));
///
/// let mut out = [0.0f32; REQUIRED_FRAME_SIZE];
/// assert!(aec.analyze_render(&[0.0; REQUIRED_FRAME_SIZE]));
/// assert!(aec.process_capture(&[0.0; REQUIRED_FRAME_SIZE], &mut out, false));
/// assert!(!aec.process_capture(&[0.0; 10], &mut out, false));
///
/// aec.destroy();
/// assert_eq!(aec.get_erle(), 0.0);
/// ```
#[derive(Debug, Default)]
pub struct EchoCanceller {
    session: Option<Session>,
}

impl EchoCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the underlying session, replacing any existing one.
    /// Returns `false` unless the stream is mono at 48 kHz.
    pub fn create(&mut self, sample_rate_hz: i32, num_channels: i32, mobile_mode: bool) -> bool {
        self.create_with_config(Config::new(sample_rate_hz, num_channels, mobile_mode))
    }

    /// Like [`create`](Self::create) with a full configuration.
    pub fn create_with_config(&mut self, config: Config) -> bool {
        if self.session.take().is_some() {
            tracing::info!("echo canceller replaced");
        }
        match Session::new(config) {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(err) => {
                tracing::error!(%err, "echo canceller creation rejected");
                false
            }
        }
    }

    /// Whether a session exists.
    pub fn is_created(&self) -> bool {
        self.session.is_some()
    }

    /// Seeds the delay estimator. Ignored when no session exists.
    pub fn set_stream_delay(&mut self, delay_ms: i32) {
        match &mut self.session {
            Some(session) => session.set_stream_delay(delay_ms),
            None => log_rejected("set_stream_delay", Error::NotInitialized),
        }
    }

    pub fn analyze_render(&mut self, render: &[f32]) -> bool {
        let result = match &mut self.session {
            Some(session) => session.analyze_render(render),
            None => Err(Error::NotInitialized),
        };
        check("analyze_render", result)
    }

    /// Writes the echo-free frame to `output`. On `false` the contents of
    /// `output` are unchanged.
    pub fn process_capture(&mut self, capture: &[f32], output: &mut [f32], level_change: bool) -> bool {
        let result = match &mut self.session {
            Some(session) => session.process_capture(capture, output, level_change),
            None => Err(Error::NotInitialized),
        };
        check("process_capture", result)
    }

    /// ERLE in dB; 0.0 without a session or before it is measured.
    pub fn get_erle(&self) -> f32 {
        self.session.as_ref().map_or(0.0, Session::erle_db)
    }

    /// Detected delay in milliseconds; 0 without a session.
    pub fn get_detected_delay(&self) -> i32 {
        self.session.as_ref().map_or(0, Session::detected_delay_ms)
    }

    /// Statistics of the session; all `None` without one.
    pub fn statistics(&self) -> Statistics {
        self.session
            .as_ref()
            .map(Session::statistics)
            .unwrap_or_default()
    }

    pub fn reset(&mut self) {
        match &mut self.session {
            Some(session) => session.reset(),
            None => log_rejected("reset", Error::NotInitialized),
        }
    }

    /// Drops the session. Later calls fail until the next `create`.
    pub fn destroy(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("echo canceller destroyed");
        }
    }
}

fn check(call: &'static str, result: Result<(), Error>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            log_rejected(call, err);
            false
        }
    }
}

fn log_rejected(call: &'static str, err: Error) {
    match err {
        Error::NotInitialized => tracing::warn!(call, %err, "call rejected"),
        _ => tracing::error!(call, %err, "call rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::REQUIRED_FRAME_SIZE;

    #[test]
    fn calls_before_create_fail() {
        let mut aec = EchoCanceller::new();
        let mut output = [0.5f32; REQUIRED_FRAME_SIZE];
        assert!(!aec.is_created());
        assert!(!aec.analyze_render(&[0.0; REQUIRED_FRAME_SIZE]));
        assert!(!aec.process_capture(&[0.0; REQUIRED_FRAME_SIZE], &mut output, false));
        assert_eq!(output, [0.5; REQUIRED_FRAME_SIZE]);
        assert_eq!(aec.get_erle(), 0.0);
        assert_eq!(aec.get_detected_delay(), 0);
        assert_eq!(aec.statistics(), Statistics::default());
        aec.set_stream_delay(50);
        aec.reset();
    }

    #[test]
    fn failed_create_drops_the_previous_session() {
        let mut aec = EchoCanceller::new();
        assert!(aec.create(48_000, 1, false));
        assert!(!aec.create(48_000, 2, false));
        assert!(!aec.is_created());
    }

    #[test]
    fn create_reports_the_default_delay() {
        let mut aec = EchoCanceller::new();
        assert!(aec.create(48_000, 1, true));
        assert_eq!(aec.get_detected_delay(), crate::DEFAULT_STREAM_DELAY_MS);
        aec.set_stream_delay(20);
        assert_eq!(aec.get_detected_delay(), 20);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut aec = EchoCanceller::new();
        assert!(aec.create(48_000, 1, false));
        aec.destroy();
        aec.destroy();
        assert!(!aec.analyze_render(&[0.0; REQUIRED_FRAME_SIZE]));
        assert!(aec.create(48_000, 1, false));
        assert!(aec.analyze_render(&[0.0; REQUIRED_FRAME_SIZE]));
    }
}
