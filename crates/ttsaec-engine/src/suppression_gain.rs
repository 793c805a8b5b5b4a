//! Per-band gains that remove the echo the linear filter left behind.
//!
//! In each band the suppressor works on the linear filter output unless its
//! smoothed power exceeds the capture's, in which case the filter is making
//! that band worse and the capture is used instead. The residual echo is the
//! echo estimate scaled down by the band's ERLE (or not at all when the
//! capture is used), and the gain is a Wiener-like `1 - overdrive * R2 / S2`.

use ttsaec_common_audio::audio_util::MIN_DBFS;

use crate::aec_fft::WINDOW_ENERGY;
use crate::common::{FFT_LENGTH_BY_2_PLUS_1, bin_power_for_dbfs};
use crate::config::AecConfig;

const SPECTRUM_SMOOTHING: f32 = 0.1;

/// Power spectra of one frame as seen by the suppressor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SuppressorSpectra<'a> {
    /// Linear filter output.
    pub(crate) e2: &'a [f32; FFT_LENGTH_BY_2_PLUS_1],
    /// Capture.
    pub(crate) y2: &'a [f32; FFT_LENGTH_BY_2_PLUS_1],
    /// Linear echo estimate.
    pub(crate) s2: &'a [f32; FFT_LENGTH_BY_2_PLUS_1],
}

#[derive(derive_more::Debug)]
pub(crate) struct SuppressionGain {
    overdrive: f32,
    level_change_overdrive: f32,
    floor_gain: f32,
    gain_release: f32,
    level_change_hold_frames: usize,
    hold_frames_left: usize,
    silent_bin_power: f32,

    #[debug(skip)]
    e2_smoothed: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    y2_smoothed: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    use_capture: [bool; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    residual2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    gain: [f32; FFT_LENGTH_BY_2_PLUS_1],
}

impl SuppressionGain {
    pub(crate) fn new(config: &AecConfig) -> Self {
        Self {
            overdrive: config.suppressor.overdrive,
            level_change_overdrive: config.level_change.overdrive,
            floor_gain: config.suppressor.floor_gain,
            gain_release: config.suppressor.gain_release,
            level_change_hold_frames: config.level_change.hold_frames,
            hold_frames_left: 0,
            silent_bin_power: bin_power_for_dbfs(MIN_DBFS, WINDOW_ENERGY),
            e2_smoothed: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            y2_smoothed: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            use_capture: [false; FFT_LENGTH_BY_2_PLUS_1],
            residual2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            gain: [1.0; FFT_LENGTH_BY_2_PLUS_1],
        }
    }

    fn current_overdrive(&self) -> f32 {
        if self.hold_frames_left > 0 {
            self.level_change_overdrive
        } else {
            self.overdrive
        }
    }

    /// Computes the gains for one frame. `erle` is the per-band ERLE of the
    /// linear filter.
    pub(crate) fn compute(&mut self, spectra: SuppressorSpectra<'_>, erle: &[f32; FFT_LENGTH_BY_2_PLUS_1]) {
        let overdrive = self.current_overdrive();
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            self.e2_smoothed[k] += SPECTRUM_SMOOTHING * (spectra.e2[k] - self.e2_smoothed[k]);
            self.y2_smoothed[k] += SPECTRUM_SMOOTHING * (spectra.y2[k] - self.y2_smoothed[k]);
            let use_capture = self.e2_smoothed[k] > self.y2_smoothed[k];
            self.use_capture[k] = use_capture;

            let (signal2, echo2) = if use_capture {
                (spectra.y2[k], spectra.s2[k])
            } else {
                (spectra.e2[k], spectra.s2[k] / erle[k].max(1.0))
            };
            self.residual2[k] = signal2;

            let target = if signal2 <= self.silent_bin_power {
                1.0
            } else {
                (1.0 - overdrive * echo2 / signal2).clamp(self.floor_gain, 1.0)
            };

            let gain = &mut self.gain[k];
            if target < *gain {
                *gain = target;
            } else {
                *gain += self.gain_release * (target - *gain);
            }
        }
    }

    /// Gains of the last frame, in `[floor_gain, 1]`.
    pub(crate) fn gain(&self) -> &[f32; FFT_LENGTH_BY_2_PLUS_1] {
        &self.gain
    }

    /// Bands where the capture replaces the linear filter output.
    pub(crate) fn use_capture(&self) -> &[bool; FFT_LENGTH_BY_2_PLUS_1] {
        &self.use_capture
    }

    /// Power of the signal each band's gain was applied to.
    pub(crate) fn residual_spectrum(&self) -> &[f32; FFT_LENGTH_BY_2_PLUS_1] {
        &self.residual2
    }

    pub(crate) fn handle_level_change(&mut self) {
        self.hold_frames_left = self.level_change_hold_frames;
    }

    /// Advances the level-change hold by one capture frame.
    pub(crate) fn tick(&mut self) {
        self.hold_frames_left = self.hold_frames_left.saturating_sub(1);
    }

    pub(crate) fn reset(&mut self) {
        self.hold_frames_left = 0;
        self.e2_smoothed.fill(0.0);
        self.y2_smoothed.fill(0.0);
        self.use_capture.fill(false);
        self.residual2.fill(0.0);
        self.gain.fill(1.0);
    }
}
