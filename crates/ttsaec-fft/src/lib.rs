#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod window;

use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// Real FFT of a fixed length with pre-allocated work buffers.
#[derive(derive_more::Debug)]
pub struct RealFft {
    len: usize,
    #[debug(skip)]
    forward: Arc<dyn RealToComplex<f32>>,
    #[debug(skip)]
    inverse: Arc<dyn ComplexToReal<f32>>,
    #[debug(skip)]
    time: Vec<f32>,
    #[debug(skip)]
    freq: Vec<Complex32>,
    #[debug(skip)]
    forward_scratch: Vec<Complex32>,
    #[debug(skip)]
    inverse_scratch: Vec<Complex32>,
}

impl RealFft {
    /// Plans forward and inverse transforms of `len` points.
    ///
    /// `len` must be even and non-zero.
    pub fn new(len: usize) -> Self {
        assert!(len >= 2 && len % 2 == 0, "FFT length must be even, got {len}");
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let forward_scratch = forward.make_scratch_vec();
        let inverse_scratch = inverse.make_scratch_vec();
        let time = forward.make_input_vec();
        let freq = forward.make_output_vec();
        Self {
            len,
            forward,
            inverse,
            time,
            freq,
            forward_scratch,
            inverse_scratch,
        }
    }

    /// Transform length in samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; a zero-length transform cannot be planned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of frequency bins, DC through Nyquist.
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.len / 2 + 1
    }

    /// Forward transform of `input` into split `re`/`im` bins.
    ///
    /// `input` must hold `len()` samples, `re` and `im` `num_bins()` values.
    pub fn forward(&mut self, input: &[f32], re: &mut [f32], im: &mut [f32]) {
        debug_assert_eq!(input.len(), self.len);
        debug_assert_eq!(re.len(), self.num_bins());
        debug_assert_eq!(im.len(), self.num_bins());

        self.time.copy_from_slice(input);
        let result = self.forward.process_with_scratch(
            &mut self.time,
            &mut self.freq,
            &mut self.forward_scratch,
        );
        debug_assert!(result.is_ok(), "forward FFT failed: {result:?}");

        for ((c, r), i) in self.freq.iter().zip(re.iter_mut()).zip(im.iter_mut()) {
            *r = c.re;
            *i = c.im;
        }
    }

    /// Inverse transform of split `re`/`im` bins into `output`.
    ///
    /// The imaginary parts of the DC and Nyquist bins are ignored. The result
    /// is not scaled by `1 / len`.
    pub fn inverse(&mut self, re: &[f32], im: &[f32], output: &mut [f32]) {
        debug_assert_eq!(output.len(), self.len);
        debug_assert_eq!(re.len(), self.num_bins());
        debug_assert_eq!(im.len(), self.num_bins());

        for ((c, &r), &i) in self.freq.iter_mut().zip(re).zip(im) {
            *c = Complex32::new(r, i);
        }
        let last = self.freq.len() - 1;
        self.freq[0].im = 0.0;
        self.freq[last].im = 0.0;

        let result = self.inverse.process_with_scratch(
            &mut self.freq,
            output,
            &mut self.inverse_scratch,
        );
        debug_assert!(result.is_ok(), "inverse FFT failed: {result:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    #[test]
    fn dc_input_lands_in_bin_zero() {
        let mut fft = RealFft::new(16);
        let input = [0.5f32; 16];
        let mut re = [0.0f32; 9];
        let mut im = [0.0f32; 9];
        fft.forward(&input, &mut re, &mut im);
        assert!((re[0] - 8.0).abs() < 1e-5);
        for k in 1..9 {
            assert!(re[k].abs() < 1e-5 && im[k].abs() < 1e-5, "bin {k}");
        }
    }

    #[test]
    fn inverse_ignores_dc_and_nyquist_imaginary_parts() {
        let mut fft = RealFft::new(8);
        let re = [1.0f32, 0.0, 0.0, 0.0, 0.0];
        let im = [3.0f32, 0.0, 0.0, 0.0, -2.0];
        let mut out = [0.0f32; 8];
        fft.inverse(&re, &im, &mut out);
        for v in out {
            assert!((v - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn num_bins_matches_half_length() {
        assert_eq!(RealFft::new(960).num_bins(), 481);
        assert_eq!(RealFft::new(8192).num_bins(), 4097);
    }

    #[proptest]
    fn inverse_undoes_forward_up_to_length(
        #[strategy(1..=64usize)] half: usize,
        seed: u32,
    ) {
        let len = 2 * half;
        let mut fft = RealFft::new(len);
        let mut state = seed;
        let input: Vec<f32> = (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();

        let mut re = vec![0.0f32; fft.num_bins()];
        let mut im = vec![0.0f32; fft.num_bins()];
        let mut output = vec![0.0f32; len];
        fft.forward(&input, &mut re, &mut im);
        fft.inverse(&re, &im, &mut output);

        for (x, y) in input.iter().zip(&output) {
            prop_assert!((x - y / len as f32).abs() < 1e-4);
        }
    }
}
