//! Linear echo subtraction: runs the adaptive filter on the aligned render,
//! subtracts the echo estimate from the capture and, when allowed, adapts.
//!
//! Bands that diverge are handled here: a band whose error stays well above
//! the capture is reset to zero, and any band whose error exceeds the capture
//! leaks faster than the rest.

use ttsaec_common_audio::audio_util::power;

use crate::adaptive_filter::AdaptiveFilter;
use crate::aec_fft::AecFft;
use crate::common::{FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1, FRAME_SIZE};
use crate::config::AecConfig;
use crate::fft_data::FftData;
use crate::filter_update_gain::FilterUpdateGain;

const SPECTRUM_SMOOTHING: f32 = 0.1;

#[derive(derive_more::Debug)]
pub(crate) struct Subtractor {
    filter: AdaptiveFilter,
    gain: FilterUpdateGain,
    leakage: f32,
    diverging_leakage: f32,
    divergence_factor: f32,
    divergence_hold_frames: usize,
    max_partition_gain: f32,

    #[debug(skip)]
    y: [f32; FRAME_SIZE],
    #[debug(skip)]
    s: [f32; FRAME_SIZE],
    #[debug(skip)]
    e: [f32; FRAME_SIZE],
    #[debug(skip)]
    time: [f32; FFT_LENGTH],
    #[debug(skip)]
    s_fft: FftData,
    #[debug(skip)]
    e_fft: FftData,
    #[debug(skip)]
    y_fft: FftData,
    #[debug(skip)]
    g: FftData,
    #[debug(skip)]
    x2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    e2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    y2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    e2_smoothed: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    y2_smoothed: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    diverged_frames: [usize; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    leak_rates: [f32; FFT_LENGTH_BY_2_PLUS_1],

    divergence_resets: u64,
}

impl Subtractor {
    pub(crate) fn new(config: &AecConfig) -> Self {
        Self {
            filter: AdaptiveFilter::new(config.filter.length_blocks),
            gain: FilterUpdateGain::new(config),
            leakage: config.filter.leakage,
            diverging_leakage: config.filter.diverging_leakage,
            divergence_factor: config.filter.divergence_factor,
            divergence_hold_frames: config.filter.divergence_hold_frames,
            max_partition_gain: config.filter.max_partition_gain,
            y: [0.0; FRAME_SIZE],
            s: [0.0; FRAME_SIZE],
            e: [0.0; FRAME_SIZE],
            time: [0.0; FFT_LENGTH],
            s_fft: FftData::default(),
            e_fft: FftData::default(),
            y_fft: FftData::default(),
            g: FftData::default(),
            x2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            e2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            y2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            e2_smoothed: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            y2_smoothed: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            diverged_frames: [0; FFT_LENGTH_BY_2_PLUS_1],
            leak_rates: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            divergence_resets: 0,
        }
    }

    /// Computes the echo estimate and error for capture `y`. With `underrun`
    /// set the estimate is forced to zero.
    pub(crate) fn process(&mut self, x: &[FftData], y: &[f32], underrun: bool, fft: &mut AecFft) {
        self.y.copy_from_slice(y);
        if underrun {
            self.s.fill(0.0);
        } else {
            self.filter.apply(x, &mut self.s_fft);
            fft.ifft(&self.s_fft, &mut self.time);
            let scale = 1.0 / FFT_LENGTH as f32;
            for (s, &t) in self.s.iter_mut().zip(&self.time[FFT_LENGTH_BY_2..]) {
                *s = t * scale;
            }
        }
        for ((e, &y), &s) in self.e.iter_mut().zip(&self.y).zip(&self.s) {
            *e = y - s;
        }
        fft.zero_padded_fft(&self.e, &mut self.e_fft);
    }

    /// Adapts the filter towards the error of the last [`process`](Self::process)
    /// call and applies leakage and divergence control.
    pub(crate) fn adapt(&mut self, x: &[FftData], fft: &mut AecFft) {
        self.x2.fill(0.0);
        for x_p in x {
            for (k, x2) in self.x2.iter_mut().enumerate() {
                *x2 += x_p.re[k] * x_p.re[k] + x_p.im[k] * x_p.im[k];
            }
        }
        self.gain.compute(&self.x2, &self.e_fft, &mut self.g);
        self.filter.adapt(x, &self.g);
        self.filter.constrain_next(fft);

        fft.zero_padded_fft(&self.y, &mut self.y_fft);
        self.e_fft.spectrum(&mut self.e2);
        self.y_fft.spectrum(&mut self.y2);

        let mut num_reset = 0;
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            self.e2_smoothed[k] += SPECTRUM_SMOOTHING * (self.e2[k] - self.e2_smoothed[k]);
            self.y2_smoothed[k] += SPECTRUM_SMOOTHING * (self.y2[k] - self.y2_smoothed[k]);

            let diverging = self.e2_smoothed[k] > self.y2_smoothed[k];
            self.leak_rates[k] = if diverging {
                self.diverging_leakage
            } else {
                self.leakage
            };

            if self.e2_smoothed[k] > self.divergence_factor * self.y2_smoothed[k] {
                self.diverged_frames[k] += 1;
            } else {
                self.diverged_frames[k] = 0;
            }

            if self.diverged_frames[k] >= self.divergence_hold_frames
                || self.filter.peak_gain(k) > self.max_partition_gain
            {
                self.filter.reset_band(k);
                self.diverged_frames[k] = 0;
                self.e2_smoothed[k] = 0.0;
                num_reset += 1;
            }
        }
        self.filter.leak(&self.leak_rates);

        if num_reset > 0 {
            self.divergence_resets += num_reset;
            tracing::warn!(bands = num_reset, "adaptive filter diverged, bands reset");
        }
    }

    /// Moves the filter partitions after an alignment change.
    pub(crate) fn shift(&mut self, shift: isize) {
        self.filter.shift(shift);
    }

    pub(crate) fn handle_level_change(&mut self) {
        self.gain.handle_level_change();
    }

    /// Advances per-frame timers; call once per capture frame.
    pub(crate) fn tick(&mut self) {
        self.gain.tick();
    }

    /// Echo estimate of the last processed frame.
    pub(crate) fn echo_estimate(&self) -> &[f32; FRAME_SIZE] {
        &self.s
    }

    /// Capture minus echo estimate of the last processed frame.
    pub(crate) fn error(&self) -> &[f32; FRAME_SIZE] {
        &self.e
    }

    pub(crate) fn echo_estimate_power(&self) -> f32 {
        power(&self.s)
    }

    pub(crate) fn error_power(&self) -> f32 {
        power(&self.e)
    }

    pub(crate) fn filter(&self) -> &AdaptiveFilter {
        &self.filter
    }

    pub(crate) fn divergence_resets(&self) -> u64 {
        self.divergence_resets
    }

    pub(crate) fn reset(&mut self) {
        self.filter.clear();
        self.gain.reset();
        self.y.fill(0.0);
        self.s.fill(0.0);
        self.e.fill(0.0);
        self.e2_smoothed.fill(0.0);
        self.y2_smoothed.fill(0.0);
        self.diverged_frames.fill(0);
        self.divergence_resets = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_history::ReferenceHistory;

    struct Noise(u32);

    impl Noise {
        fn frame(&mut self, gain: f32) -> [f32; FRAME_SIZE] {
            let mut frame = [0.0f32; FRAME_SIZE];
            for v in &mut frame {
                self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                *v = gain * ((self.0 >> 8) as f32 / (1u32 << 24) as f32 - 0.5);
            }
            frame
        }
    }

    /// Feeds render frames into a history and returns the aligned partitions
    /// for alignment zero.
    fn partitions(history: &ReferenceHistory, n: usize) -> Vec<FftData> {
        (0..n)
            .map(|p| {
                history
                    .get(p)
                    .map(|slot| slot.spectrum.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn converges_on_a_pure_delay_echo() {
        let config = AecConfig::default();
        let mut fft = AecFft::new();
        let mut subtractor = Subtractor::new(&config);
        let mut history = ReferenceHistory::new(config.filter.length_blocks + 1);
        let mut noise = Noise(3);
        let mut previous = [0.0f32; FRAME_SIZE];

        let mut first_power = 0.0;
        let mut last_power = 0.0;
        let mut capture_power = 0.0;
        for frame_index in 0..150 {
            let render = noise.frame(0.6);
            history.push(&render, &mut fft);
            // Echo is the render delayed by 100 samples at half amplitude.
            let mut capture = [0.0f32; FRAME_SIZE];
            for i in 0..FRAME_SIZE {
                capture[i] = 0.5
                    * if i >= 100 {
                        render[i - 100]
                    } else {
                        previous[FRAME_SIZE - 100 + i]
                    };
            }
            previous = render;

            let x = partitions(&history, config.filter.length_blocks);
            subtractor.process(&x, &capture, false, &mut fft);
            if frame_index == 5 {
                first_power = subtractor.error_power();
            }
            if frame_index >= 140 {
                last_power += subtractor.error_power();
                capture_power += power(&capture);
            }
            subtractor.adapt(&x, &mut fft);
        }

        assert!(last_power < 0.05 * capture_power, "{last_power} vs {capture_power}");
        assert!(last_power / 10.0 < first_power);
        assert_eq!(subtractor.divergence_resets(), 0);
    }

    #[test]
    fn underrun_passes_capture_through() {
        let config = AecConfig::default();
        let mut fft = AecFft::new();
        let mut subtractor = Subtractor::new(&config);
        let x = vec![FftData::default(); config.filter.length_blocks];
        let capture = Noise(5).frame(0.2);
        subtractor.process(&x, &capture, true, &mut fft);
        assert_eq!(subtractor.error(), &capture);
        assert_eq!(subtractor.echo_estimate_power(), 0.0);
    }

    #[test]
    fn non_finite_taps_are_reset() {
        let config = AecConfig::default();
        let mut fft = AecFft::new();
        let mut subtractor = Subtractor::new(&config);
        let mut poisoned = FftData::default();
        poisoned.re[20] = f32::INFINITY;
        let mut x = vec![FftData::default(); config.filter.length_blocks];
        x[0].re[20] = 1.0;
        subtractor.filter.adapt(&x, &poisoned);
        assert_eq!(subtractor.filter.peak_gain(20), f32::INFINITY);

        subtractor.process(&x, &[0.0; FRAME_SIZE], true, &mut fft);
        subtractor.adapt(&vec![FftData::default(); config.filter.length_blocks], &mut fft);
        assert_eq!(subtractor.filter.peak_gain(20), 0.0);
        assert!(subtractor.divergence_resets() >= 1);
    }
}
