//! Canceller statistics.

use ttsaec_engine::{DoubleTalkState, EchoRemoverStats};

/// Snapshot of the canceller's state, from
/// [`Session::statistics`](crate::Session::statistics).
///
/// All fields are `Option`; `None` means the value has not been measured
/// yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    /// Echo return loss enhancement of the whole canceller in dB:
    /// `ERLE = 10 log10(P_echo / P_out)`, smoothed over far-end-only frames.
    pub erle_db: Option<f32>,
    /// ERLE of the linear filter alone, before residual suppression.
    pub linear_erle_db: Option<f32>,
    /// Detected render-to-capture delay in milliseconds.
    pub delay_ms: Option<i32>,
    /// Normalized correlation of the detected delay in `[0, 1]`; `None`
    /// while the delay is still the configured stream delay.
    pub delay_confidence: Option<f32>,
    /// Tracked echo path gain (capture over render power) in dB.
    pub echo_path_gain_db: Option<f32>,
    /// Classification of the last capture frame.
    pub double_talk: Option<DoubleTalkState>,
    /// Filter sub-bands reset after diverging.
    pub filter_divergence_resets: Option<u64>,
    /// Capture frames processed without their render frame.
    pub buffer_underruns: Option<u64>,
    /// Capture frames processed since creation or the last reset.
    pub frames_processed: Option<u64>,
    /// Render frames analysed since creation or the last reset.
    pub render_frames: Option<u64>,
    /// Non-finite input samples replaced by zero.
    pub non_finite_samples: Option<u64>,
    /// Mean-square power of the last linear echo estimate.
    pub echo_estimate_power: Option<f32>,
}

impl From<EchoRemoverStats> for Statistics {
    fn from(stats: EchoRemoverStats) -> Self {
        let delay_confidence = stats.delay.confidence;
        Self {
            erle_db: stats.erle_db,
            linear_erle_db: stats.linear_erle_db,
            delay_ms: Some(stats.delay.delay_ms() as i32),
            delay_confidence: (delay_confidence > 0.0).then_some(delay_confidence),
            echo_path_gain_db: (stats.frames_processed > 0).then_some(stats.echo_path_gain_db),
            double_talk: (stats.frames_processed > 0).then_some(stats.double_talk),
            filter_divergence_resets: Some(stats.filter_divergence_resets),
            buffer_underruns: Some(stats.buffer_underruns),
            frames_processed: Some(stats.frames_processed),
            render_frames: Some(stats.render_frames),
            non_finite_samples: Some(stats.non_finite_samples),
            echo_estimate_power: (stats.frames_processed > 0).then_some(stats.echo_estimate_power),
        }
    }
}
