//! Windowed analysis and overlap-add synthesis around the suppression gains.
//!
//! Every frame is analysed together with the previous one under a sqrt-Hann
//! window. The gained spectrum plus comfort noise is transformed back,
//! windowed again and overlap-added, so the output lags the input by one
//! frame.

use crate::aec_fft::AecFft;
use crate::common::{FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1, FRAME_SIZE};
use crate::fft_data::FftData;
use crate::suppression_gain::SuppressorSpectra;

#[derive(derive_more::Debug)]
pub(crate) struct SuppressionFilter {
    #[debug(skip)]
    e_old: [f32; FRAME_SIZE],
    #[debug(skip)]
    y_old: [f32; FRAME_SIZE],
    #[debug(skip)]
    s_old: [f32; FRAME_SIZE],
    #[debug(skip)]
    e_fft: FftData,
    #[debug(skip)]
    y_fft: FftData,
    #[debug(skip)]
    s_fft: FftData,
    #[debug(skip)]
    e2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    y2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    s2: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    out_fft: FftData,
    #[debug(skip)]
    time: [f32; FFT_LENGTH],
    #[debug(skip)]
    overlap: [f32; FFT_LENGTH_BY_2],
}

impl SuppressionFilter {
    pub(crate) fn new() -> Self {
        Self {
            e_old: [0.0; FRAME_SIZE],
            y_old: [0.0; FRAME_SIZE],
            s_old: [0.0; FRAME_SIZE],
            e_fft: FftData::default(),
            y_fft: FftData::default(),
            s_fft: FftData::default(),
            e2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            y2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            s2: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            out_fft: FftData::default(),
            time: [0.0; FFT_LENGTH],
            overlap: [0.0; FFT_LENGTH_BY_2],
        }
    }

    /// Transforms the current linear filter output `e`, capture `y` and echo
    /// estimate `s`.
    pub(crate) fn analyze(&mut self, e: &[f32], y: &[f32], s: &[f32], fft: &mut AecFft) {
        fft.windowed_fft(e, &self.e_old, &mut self.e_fft);
        fft.windowed_fft(y, &self.y_old, &mut self.y_fft);
        fft.windowed_fft(s, &self.s_old, &mut self.s_fft);
        self.e_fft.spectrum(&mut self.e2);
        self.y_fft.spectrum(&mut self.y2);
        self.s_fft.spectrum(&mut self.s2);
        self.e_old.copy_from_slice(e);
        self.y_old.copy_from_slice(y);
        self.s_old.copy_from_slice(s);
    }

    /// Power spectra from the last [`analyze`](Self::analyze) call.
    pub(crate) fn spectra(&self) -> SuppressorSpectra<'_> {
        SuppressorSpectra {
            e2: &self.e2,
            y2: &self.y2,
            s2: &self.s2,
        }
    }

    /// Applies `gain` to the analysed spectrum, mixing in `noise` where the
    /// gain removed signal, and writes one frame of output.
    pub(crate) fn synthesize(
        &mut self,
        gain: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        use_capture: &[bool; FFT_LENGTH_BY_2_PLUS_1],
        noise: &FftData,
        fft: &mut AecFft,
        output: &mut [f32],
    ) {
        debug_assert_eq!(output.len(), FRAME_SIZE);
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            let source = if use_capture[k] { &self.y_fft } else { &self.e_fft };
            let g = gain[k];
            let noise_gain = (1.0 - g * g).max(0.0).sqrt();
            self.out_fft.re[k] = g * source.re[k] + noise_gain * noise.re[k];
            self.out_fft.im[k] = g * source.im[k] + noise_gain * noise.im[k];
        }

        fft.ifft(&self.out_fft, &mut self.time);
        let scale = 1.0 / FFT_LENGTH as f32;
        for (t, &w) in self.time.iter_mut().zip(fft.window()) {
            *t *= scale * w;
        }

        for ((out, &overlap), &t) in output.iter_mut().zip(&self.overlap).zip(&self.time) {
            *out = overlap + t;
        }
        self.overlap.copy_from_slice(&self.time[FFT_LENGTH_BY_2..]);
    }

    pub(crate) fn reset(&mut self) {
        self.e_old.fill(0.0);
        self.y_old.fill(0.0);
        self.s_old.fill(0.0);
        self.overlap.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_gain_reconstructs_with_one_frame_delay() {
        let mut fft = AecFft::new();
        let mut filter = SuppressionFilter::new();
        let gain = [1.0f32; FFT_LENGTH_BY_2_PLUS_1];
        let use_capture = [false; FFT_LENGTH_BY_2_PLUS_1];
        let noise = FftData::default();
        let zeros = [0.0f32; FRAME_SIZE];

        let frames: Vec<Vec<f32>> = (0..4)
            .map(|f| {
                (0..FRAME_SIZE)
                    .map(|i| (((f * FRAME_SIZE + i) as f32) * 0.013).sin() * 0.5)
                    .collect()
            })
            .collect();
        let mut output = [0.0f32; FRAME_SIZE];
        for f in 0..frames.len() {
            filter.analyze(&frames[f], &zeros, &zeros, &mut fft);
            filter.synthesize(&gain, &use_capture, &noise, &mut fft, &mut output);
            if f >= 1 {
                for i in 0..FRAME_SIZE {
                    assert!((output[i] - frames[f - 1][i]).abs() < 1e-4);
                }
            }
        }
    }

    #[test]
    fn silence_stays_silent() {
        let mut fft = AecFft::new();
        let mut filter = SuppressionFilter::new();
        let zeros = [0.0f32; FRAME_SIZE];
        let mut noise = FftData::default();
        noise.re.fill(1.0);
        let mut output = [1.0f32; FRAME_SIZE];
        filter.analyze(&zeros, &zeros, &zeros, &mut fft);
        filter.synthesize(
            &[1.0; FFT_LENGTH_BY_2_PLUS_1],
            &[false; FFT_LENGTH_BY_2_PLUS_1],
            &noise,
            &mut fft,
            &mut output,
        );
        assert!(output.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn capture_bands_are_taken_from_the_capture() {
        let mut fft = AecFft::new();
        let mut filter = SuppressionFilter::new();
        let y: Vec<f32> = (0..FRAME_SIZE).map(|i| (i as f32 * 0.1).sin()).collect();
        let zeros = [0.0f32; FRAME_SIZE];
        filter.analyze(&zeros, &y, &zeros, &mut fft);
        let spectra = filter.spectra();
        assert!(spectra.e2.iter().all(|&v| v == 0.0));
        assert!(spectra.y2.iter().sum::<f32>() > 0.0);

        let mut output = [0.0f32; FRAME_SIZE];
        filter.synthesize(
            &[1.0; FFT_LENGTH_BY_2_PLUS_1],
            &[true; FFT_LENGTH_BY_2_PLUS_1],
            &FftData::default(),
            &mut fft,
            &mut output,
        );
        // Only the zero head of the first block is out yet.
        assert!(output.iter().all(|&v| v.abs() < 1e-5));
        filter.analyze(&zeros, &zeros, &zeros, &mut fft);
        filter.synthesize(
            &[1.0; FFT_LENGTH_BY_2_PLUS_1],
            &[true; FFT_LENGTH_BY_2_PLUS_1],
            &FftData::default(),
            &mut fft,
            &mut output,
        );
        for i in 0..FRAME_SIZE {
            assert!((output[i] - y[i]).abs() < 1e-4);
        }
    }
}
