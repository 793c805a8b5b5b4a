//! Echo remover quality metrics: smoothed ERLE of the whole canceller and of
//! the linear filter alone, and frame counters.

use ttsaec_common_audio::audio_util::{MIN_DBFS, dbfs_to_power};

const ENERGY_SMOOTHING: f32 = 0.95;

/// Exponentially smoothed ratio of echo energy in to echo energy out.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ErleTracker {
    input_energy: f32,
    output_energy: f32,
    updated: bool,
}

impl ErleTracker {
    pub(crate) fn update(&mut self, input_power: f32, output_power: f32) {
        if self.updated {
            self.input_energy =
                ENERGY_SMOOTHING * self.input_energy + (1.0 - ENERGY_SMOOTHING) * input_power;
            self.output_energy =
                ENERGY_SMOOTHING * self.output_energy + (1.0 - ENERGY_SMOOTHING) * output_power;
        } else {
            self.input_energy = input_power;
            self.output_energy = output_power;
            self.updated = true;
        }
    }

    /// ERLE as a power ratio, 1 before the first update.
    pub(crate) fn ratio(&self) -> f32 {
        if !self.updated {
            return 1.0;
        }
        let floor = dbfs_to_power(MIN_DBFS);
        self.input_energy.max(floor) / self.output_energy.max(floor)
    }

    /// ERLE in dB, `None` before the first update.
    pub(crate) fn db(&self) -> Option<f32> {
        self.updated.then(|| 10.0 * self.ratio().log10())
    }
}

#[derive(Debug, Default)]
pub(crate) struct EchoRemoverMetrics {
    erle: ErleTracker,
    linear_erle: ErleTracker,
    previous_capture_power: f32,
    previous_frame_measurable: bool,
    pub(crate) frames_processed: u64,
    pub(crate) render_frames: u64,
    pub(crate) buffer_underruns: u64,
    pub(crate) non_finite_samples: u64,
}

impl EchoRemoverMetrics {
    /// Updates the linear-filter ERLE from the capture and the filter error
    /// of the same frame.
    pub(crate) fn update_linear(&mut self, measurable: bool, capture_power: f32, error_power: f32) {
        if measurable {
            self.linear_erle.update(capture_power, error_power);
        }
    }

    /// Updates the overall ERLE. The suppressor output lags the capture by a
    /// frame, so `output_power` is paired with the previous frame's capture.
    pub(crate) fn update(&mut self, measurable: bool, capture_power: f32, output_power: f32) {
        if self.previous_frame_measurable {
            self.erle.update(self.previous_capture_power, output_power);
        }
        self.previous_capture_power = capture_power;
        self.previous_frame_measurable = measurable;
        self.frames_processed += 1;
    }

    /// Forgets the linear-filter ERLE, which no longer describes the filter
    /// after a capture gain jump.
    pub(crate) fn handle_level_change(&mut self) {
        self.linear_erle = ErleTracker::default();
    }

    pub(crate) fn erle_db(&self) -> Option<f32> {
        self.erle.db()
    }

    pub(crate) fn linear_erle_db(&self) -> Option<f32> {
        self.linear_erle.db()
    }

    pub(crate) fn linear_erle(&self) -> f32 {
        self.linear_erle.ratio()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_erle_before_first_update() {
        let metrics = EchoRemoverMetrics::default();
        assert_eq!(metrics.erle_db(), None);
        assert_eq!(metrics.linear_erle(), 1.0);
    }

    #[test]
    fn output_is_paired_with_previous_capture() {
        let mut metrics = EchoRemoverMetrics::default();
        metrics.update(true, 1.0, 0.5);
        assert_eq!(metrics.erle_db(), None);
        metrics.update(false, 0.0, 0.01);
        let erle = metrics.erle_db().unwrap();
        assert!((erle - 20.0).abs() < 1e-3);
        // The previous frame was not measurable.
        metrics.update(false, 0.0, 1.0);
        assert!((metrics.erle_db().unwrap() - 20.0).abs() < 1e-3);
        assert_eq!(metrics.frames_processed, 3);
    }

    #[test]
    fn tracker_smooths_towards_new_ratio() {
        let mut tracker = ErleTracker::default();
        tracker.update(1.0, 1.0);
        for _ in 0..400 {
            tracker.update(1.0, 0.001);
        }
        assert!((tracker.db().unwrap() - 30.0).abs() < 0.1);
    }

    #[test]
    fn level_change_forgets_linear_erle_only() {
        let mut metrics = EchoRemoverMetrics::default();
        metrics.update_linear(true, 1.0, 0.01);
        metrics.update(true, 1.0, 0.01);
        metrics.update(true, 1.0, 0.01);
        metrics.handle_level_change();
        assert_eq!(metrics.linear_erle(), 1.0);
        assert!(metrics.erle_db().is_some());
    }

    #[test]
    fn reset_clears_everything() {
        let mut metrics = EchoRemoverMetrics::default();
        metrics.update_linear(true, 1.0, 0.1);
        metrics.update(true, 1.0, 0.1);
        metrics.render_frames = 4;
        metrics.reset();
        assert_eq!(metrics.linear_erle_db(), None);
        assert_eq!(metrics.render_frames, 0);
        assert_eq!(metrics.frames_processed, 0);
    }
}
