//! 960-point transforms of frame pairs as used by the filter and suppressor.

use ttsaec_fft::RealFft;
use ttsaec_fft::window::sqrt_hann;

use crate::common::{FFT_LENGTH, FFT_LENGTH_BY_2, FRAME_SIZE};
use crate::fft_data::FftData;

/// Energy of the sqrt-Hann window (sum of squares), which equals the energy of
/// a rectangular half window.
pub(crate) const WINDOW_ENERGY: f32 = FFT_LENGTH_BY_2 as f32;

#[derive(derive_more::Debug)]
pub(crate) struct AecFft {
    fft: RealFft,
    #[debug(skip)]
    window: Vec<f32>,
    #[debug(skip)]
    buffer: [f32; FFT_LENGTH],
}

impl AecFft {
    pub(crate) fn new() -> Self {
        Self {
            fft: RealFft::new(FFT_LENGTH),
            window: sqrt_hann(FFT_LENGTH),
            buffer: [0.0; FFT_LENGTH],
        }
    }

    /// Transform of a full 960-sample buffer.
    pub(crate) fn fft(&mut self, x: &[f32; FFT_LENGTH], out: &mut FftData) {
        self.fft.forward(x, &mut out.re, &mut out.im);
    }

    /// Transform of `[0; 480] ++ x`.
    pub(crate) fn zero_padded_fft(&mut self, x: &[f32], out: &mut FftData) {
        debug_assert_eq!(x.len(), FRAME_SIZE);
        self.buffer[..FFT_LENGTH_BY_2].fill(0.0);
        self.buffer[FFT_LENGTH_BY_2..].copy_from_slice(x);
        self.fft.forward(&self.buffer, &mut out.re, &mut out.im);
    }

    /// Transform of `x_old ++ x`.
    pub(crate) fn padded_fft(&mut self, x: &[f32], x_old: &[f32], out: &mut FftData) {
        debug_assert_eq!(x.len(), FRAME_SIZE);
        debug_assert_eq!(x_old.len(), FRAME_SIZE);
        self.buffer[..FFT_LENGTH_BY_2].copy_from_slice(x_old);
        self.buffer[FFT_LENGTH_BY_2..].copy_from_slice(x);
        self.fft.forward(&self.buffer, &mut out.re, &mut out.im);
    }

    /// Transform of `x_old ++ x` under the sqrt-Hann analysis window.
    pub(crate) fn windowed_fft(&mut self, x: &[f32], x_old: &[f32], out: &mut FftData) {
        let (first, second) = self.buffer.split_at_mut(FFT_LENGTH_BY_2);
        let (w_first, w_second) = self.window.split_at(FFT_LENGTH_BY_2);
        for ((b, &v), &w) in first.iter_mut().zip(x_old).zip(w_first) {
            *b = v * w;
        }
        for ((b, &v), &w) in second.iter_mut().zip(x).zip(w_second) {
            *b = v * w;
        }
        self.fft.forward(&self.buffer, &mut out.re, &mut out.im);
    }

    /// Unscaled inverse transform.
    pub(crate) fn ifft(&mut self, x: &FftData, out: &mut [f32; FFT_LENGTH]) {
        self.fft.inverse(&x.re, &x.im, out);
    }

    /// Synthesis window, identical to the analysis window.
    pub(crate) fn window(&self) -> &[f32] {
        &self.window
    }
}
