//! NLMS step computation for the adaptive filter.
//!
//! The gain applied to the error spectrum in sub-band `k` is
//! `mu / (sum_p |X_p[k]|^2 + delta)`, zero below the render noise gate. A
//! signalled capture level change scales `mu` down for a hold period.

use crate::common::{FFT_LENGTH, FFT_LENGTH_BY_2_PLUS_1, bin_power_for_dbfs};
use crate::config::AecConfig;
use crate::fft_data::FftData;

#[derive(Debug)]
pub(crate) struct FilterUpdateGain {
    step_size: f32,
    level_change_scale: f32,
    level_change_hold_frames: usize,
    hold_frames_left: usize,
    noise_gate: f32,
}

impl FilterUpdateGain {
    pub(crate) fn new(config: &AecConfig) -> Self {
        let num_partitions = config.filter.length_blocks as f32;
        Self {
            step_size: config.filter.step_size,
            level_change_scale: config.level_change.step_size_scale,
            level_change_hold_frames: config.level_change.hold_frames,
            hold_frames_left: 0,
            noise_gate: num_partitions
                * bin_power_for_dbfs(config.filter.noise_gate_dbfs, FFT_LENGTH as f32),
        }
    }

    /// Step size in effect for the current frame.
    pub(crate) fn step_size(&self) -> f32 {
        if self.hold_frames_left > 0 {
            self.step_size * self.level_change_scale
        } else {
            self.step_size
        }
    }

    /// Computes `G = mu_k * E` from the summed render power `x2`.
    pub(crate) fn compute(
        &self,
        x2: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        e: &FftData,
        g: &mut FftData,
    ) {
        let mu = self.step_size();
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            if x2[k] < self.noise_gate {
                g.re[k] = 0.0;
                g.im[k] = 0.0;
            } else {
                let mu_k = mu / (x2[k] + self.noise_gate);
                g.re[k] = mu_k * e.re[k];
                g.im[k] = mu_k * e.im[k];
            }
        }
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
    }
}
