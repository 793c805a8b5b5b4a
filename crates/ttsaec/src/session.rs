//! One echo cancellation session: a render stream and a capture stream
//! sharing a single clock.

use ttsaec_common_audio::audio_util::sanitize;
use ttsaec_engine::common::FRAME_SIZE;
use ttsaec_engine::{AecConfig, EchoRemover};

use crate::config::Config;
use crate::error::Error;
use crate::frame::{check_frame, is_valid_sample_rate};
use crate::high_pass_filter::HighPassFilter;
use crate::stats::Statistics;

/// Echo canceller for one mono 48 kHz stream pair.
///
/// Call [`analyze_render`](Self::analyze_render) with every frame sent to
/// the loudspeaker and [`process_capture`](Self::process_capture) with every
/// microphone frame. Frames hold exactly
/// [`REQUIRED_FRAME_SIZE`](crate::REQUIRED_FRAME_SIZE) samples; anything
/// else is rejected before any state is touched.
///
/// All buffers are allocated in [`Session::new`]; neither per-frame call
/// allocates.
#[derive(derive_more::Debug)]
pub struct Session {
    config: Config,
    remover: EchoRemover,
    high_pass: Option<HighPassFilter>,
    /// Non-finite capture samples removed ahead of the high-pass filter.
    filtered_non_finite: u64,
    #[debug(skip)]
    capture: [f32; FRAME_SIZE],
}

impl Session {
    /// Creates a session. Fails unless the sample rate is 48000 and the
    /// stream is mono.
    pub fn new(config: Config) -> Result<Self, Error> {
        if !is_valid_sample_rate(config.sample_rate_hz) {
            return Err(Error::BadSampleRate {
                sample_rate_hz: config.sample_rate_hz,
            });
        }
        if config.num_channels != 1 {
            return Err(Error::BadNumberChannels {
                num_channels: config.num_channels,
            });
        }

        let remover = EchoRemover::new(
            config.aec_config(),
            clamp_delay_ms(config.stream_delay_ms),
        );
        tracing::info!(
            mobile_mode = config.mobile_mode,
            stream_delay_ms = config.stream_delay_ms,
            filter_blocks = remover.config().filter.length_blocks,
            high_pass_filter = config.high_pass_filter,
            "echo canceller created"
        );
        Ok(Self {
            high_pass: config.high_pass_filter.then(HighPassFilter::new),
            remover,
            filtered_non_finite: 0,
            capture: [0.0; FRAME_SIZE],
            config,
        })
    }

    /// The configuration the session was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The engine tuning in use, after validation.
    pub fn tuning(&self) -> &AecConfig {
        self.remover.config()
    }

    /// Seeds the delay estimator with a known render-to-capture delay.
    /// Negative values are treated as zero; values beyond the maximum delay
    /// are capped. The estimator keeps refining from the new seed.
    pub fn set_stream_delay(&mut self, delay_ms: i32) {
        self.config.stream_delay_ms = delay_ms;
        self.remover.set_stream_delay(clamp_delay_ms(delay_ms));
        tracing::debug!(delay_ms, "stream delay set");
    }

    /// Feeds one frame of the signal played on the loudspeaker.
    pub fn analyze_render(&mut self, render: &[f32]) -> Result<(), Error> {
        check_frame(render)?;
        self.remover.analyze_render(render);
        Ok(())
    }

    /// Removes echo from one microphone frame and writes the cleaned frame
    /// to `output`, one frame behind the input. Set `level_change` when the
    /// capture gain jumped right before this frame.
    pub fn process_capture(
        &mut self,
        capture: &[f32],
        output: &mut [f32],
        level_change: bool,
    ) -> Result<(), Error> {
        check_frame(capture)?;
        check_frame(output)?;

        let capture = match &mut self.high_pass {
            Some(high_pass) => {
                self.capture.copy_from_slice(capture);
                // A non-finite sample would stay in the filter state for good.
                self.filtered_non_finite += sanitize(&mut self.capture) as u64;
                high_pass.process(&mut self.capture);
                &self.capture[..]
            }
            None => capture,
        };
        self.remover.process_capture(capture, output, level_change);
        Ok(())
    }

    /// Smoothed ERLE in dB; 0 until measured.
    pub fn erle_db(&self) -> f32 {
        self.remover.erle_db()
    }

    /// Detected render-to-capture delay in milliseconds.
    pub fn detected_delay_ms(&self) -> i32 {
        self.remover.delay_estimate().delay_ms() as i32
    }

    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics::from(self.remover.stats());
        stats.non_finite_samples = stats
            .non_finite_samples
            .map(|n| n + self.filtered_non_finite);
        stats
    }

    /// Clears all adaptive state. The configuration and the last stream
    /// delay are kept.
    pub fn reset(&mut self) {
        self.remover.reset();
        if let Some(high_pass) = &mut self.high_pass {
            high_pass.reset();
        }
        self.filtered_non_finite = 0;
        tracing::info!("echo canceller reset");
    }
}

fn clamp_delay_ms(delay_ms: i32) -> usize {
    delay_ms.max(0) as usize
}
