//! Per-band echo return loss enhancement of the linear filter.
//!
//! Capture and error spectra are summed over a few far-end-only frames and
//! their ratio is folded into each band's estimate. Bands where the capture
//! stayed below the activity limit during the accumulation are left alone.

use crate::aec_fft::WINDOW_ENERGY;
use crate::common::{FFT_LENGTH_BY_2_PLUS_1, bin_power_for_dbfs};
use crate::config::AecConfig;

#[derive(derive_more::Debug)]
pub(crate) struct SubbandErleEstimator {
    min_erle: f32,
    max_erle: f32,
    update_rate: f32,
    points_to_accumulate: usize,
    low_energy_threshold: f32,

    num_points: usize,
    #[debug(skip)]
    accum_y2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    accum_e2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    low_energy: [bool; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    erle: [f32; FFT_LENGTH_BY_2_PLUS_1],
}

impl SubbandErleEstimator {
    pub(crate) fn new(config: &AecConfig) -> Self {
        Self {
            min_erle: config.erle.min,
            max_erle: config.erle.max,
            update_rate: config.erle.update_rate,
            points_to_accumulate: config.erle.accumulation_frames,
            low_energy_threshold: bin_power_for_dbfs(
                config.render_levels.active_capture_limit_dbfs,
                WINDOW_ENERGY,
            ),
            num_points: 0,
            accum_y2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            accum_e2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            low_energy: [false; FFT_LENGTH_BY_2_PLUS_1],
            erle: [config.erle.min; FFT_LENGTH_BY_2_PLUS_1],
        }
    }

    /// Adds one far-end-only frame of capture (`y2`) and linear-filter error
    /// (`e2`) power spectra.
    pub(crate) fn update(
        &mut self,
        y2: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        e2: &[f32; FFT_LENGTH_BY_2_PLUS_1],
    ) {
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            self.accum_y2[k] += y2[k];
            self.accum_e2[k] += e2[k];
            self.low_energy[k] |= y2[k] < self.low_energy_threshold;
        }
        self.num_points += 1;
        if self.num_points < self.points_to_accumulate {
            return;
        }

        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            if self.low_energy[k] || self.accum_e2[k] <= 0.0 {
                continue;
            }
            let new_erle = self.accum_y2[k] / self.accum_e2[k];
            self.erle[k] = (self.erle[k] + self.update_rate * (new_erle - self.erle[k]))
                .clamp(self.min_erle, self.max_erle);
        }
        self.reset_accumulation();
    }

    pub(crate) fn erle(&self) -> &[f32; FFT_LENGTH_BY_2_PLUS_1] {
        &self.erle
    }

    fn reset_accumulation(&mut self) {
        self.num_points = 0;
        self.accum_y2.fill(0.0);
        self.accum_e2.fill(0.0);
        self.low_energy.fill(false);
    }

    pub(crate) fn reset(&mut self) {
        self.erle.fill(self.min_erle);
        self.reset_accumulation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erle_starts_at_min() {
        let config = AecConfig::default();
        let estimator = SubbandErleEstimator::new(&config);
        assert!(estimator.erle().iter().all(|&v| v == config.erle.min));
    }

    #[test]
    fn erle_converges_to_the_power_ratio() {
        let mut estimator = SubbandErleEstimator::new(&AecConfig::default());
        let y2 = [1.0f32; FFT_LENGTH_BY_2_PLUS_1];
        let e2 = [0.1f32; FFT_LENGTH_BY_2_PLUS_1];
        for _ in 0..400 {
            estimator.update(&y2, &e2);
        }
        for &erle in estimator.erle() {
            assert!((erle - 10.0).abs() < 0.1, "{erle}");
        }
    }

    #[test]
    fn erle_bounded_by_max() {
        let config = AecConfig::default();
        let mut estimator = SubbandErleEstimator::new(&config);
        let y2 = [1.0f32; FFT_LENGTH_BY_2_PLUS_1];
        let e2 = [1e-9f32; FFT_LENGTH_BY_2_PLUS_1];
        for _ in 0..400 {
            estimator.update(&y2, &e2);
        }
        assert!(estimator.erle().iter().all(|&v| v <= config.erle.max));
    }

    #[test]
    fn quiet_bands_are_not_updated() {
        let config = AecConfig::default();
        let mut estimator = SubbandErleEstimator::new(&config);
        let mut y2 = [1.0f32; FFT_LENGTH_BY_2_PLUS_1];
        y2[7] = 0.0;
        let e2 = [0.1f32; FFT_LENGTH_BY_2_PLUS_1];
        for _ in 0..40 {
            estimator.update(&y2, &e2);
        }
        assert_eq!(estimator.erle()[7], config.erle.min);
        assert!(estimator.erle()[8] > 2.0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let config = AecConfig::default();
        let mut estimator = SubbandErleEstimator::new(&config);
        for _ in 0..40 {
            estimator.update(&[1.0; FFT_LENGTH_BY_2_PLUS_1], &[0.01; FFT_LENGTH_BY_2_PLUS_1]);
        }
        estimator.reset();
        assert!(estimator.erle().iter().all(|&v| v == config.erle.min));
    }
}
