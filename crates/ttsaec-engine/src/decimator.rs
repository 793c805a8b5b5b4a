//! Anti-aliased down-sampling for the delay estimator.

use ttsaec_common_audio::cascaded_biquad_filter::{CascadedBiQuadFilter, butterworth_low_pass_4};

use crate::common::{FRAME_SIZE, SAMPLE_RATE_HZ};

#[derive(Debug)]
pub(crate) struct Decimator {
    down_sampling_factor: usize,
    low_pass: CascadedBiQuadFilter,
    filtered: [f32; FRAME_SIZE],
}

impl Decimator {
    pub(crate) fn new(down_sampling_factor: usize) -> Self {
        debug_assert!(down_sampling_factor == 4 || down_sampling_factor == 8);
        let output_rate = SAMPLE_RATE_HZ as f32 / down_sampling_factor as f32;
        let cutoff_hz = 0.42 * output_rate;
        Self {
            down_sampling_factor,
            low_pass: CascadedBiQuadFilter::new(&butterworth_low_pass_4(
                SAMPLE_RATE_HZ as f32,
                cutoff_hz,
            )),
            filtered: [0.0; FRAME_SIZE],
        }
    }

    /// Output samples per input frame.
    pub(crate) fn output_len(&self) -> usize {
        FRAME_SIZE / self.down_sampling_factor
    }

    /// Low-pass filters `frame` and keeps every n-th sample in `out`.
    pub(crate) fn decimate(&mut self, frame: &[f32], out: &mut [f32]) {
        debug_assert_eq!(frame.len(), FRAME_SIZE);
        debug_assert_eq!(out.len(), self.output_len());
        self.low_pass.process(frame, &mut self.filtered);
        for (o, v) in out
            .iter_mut()
            .zip(self.filtered.iter().step_by(self.down_sampling_factor))
        {
            *o = *v;
        }
    }

    pub(crate) fn reset(&mut self) {
        self.low_pass.reset();
    }
}
