//! Split-complex spectrum of one 960-point real transform.

use crate::common::{FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1};

/// Real and imaginary parts of the 481 bins of a 960-point real FFT.
///
/// The DC and Nyquist bins are real-valued; `im[0]` and `im[480]` are kept at
/// zero by [`assign`](Self::assign).
#[derive(Clone, PartialEq)]
pub struct FftData {
    pub re: [f32; FFT_LENGTH_BY_2_PLUS_1],
    pub im: [f32; FFT_LENGTH_BY_2_PLUS_1],
}

impl Default for FftData {
    fn default() -> Self {
        Self {
            re: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            im: [0.0; FFT_LENGTH_BY_2_PLUS_1],
        }
    }
}

impl std::fmt::Debug for FftData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftData")
            .field("re[0..4]", &&self.re[..4])
            .field("im[0..4]", &&self.im[..4])
            .finish_non_exhaustive()
    }
}

impl FftData {
    /// Copies `src`, forcing the DC and Nyquist imaginary parts to zero.
    pub fn assign(&mut self, src: &Self) {
        self.re = src.re;
        self.im = src.im;
        self.im[0] = 0.0;
        self.im[FFT_LENGTH_BY_2] = 0.0;
    }

    /// Sets all bins to zero.
    pub fn clear(&mut self) {
        self.re.fill(0.0);
        self.im.fill(0.0);
    }

    /// Power spectrum: `out[k] = re[k]^2 + im[k]^2`.
    pub fn spectrum(&self, out: &mut [f32; FFT_LENGTH_BY_2_PLUS_1]) {
        for ((o, &re), &im) in out.iter_mut().zip(&self.re).zip(&self.im) {
            *o = re * re + im * im;
        }
    }

    /// Adds `a * b` bin by bin.
    pub(crate) fn multiply_accumulate(&mut self, a: &Self, b: &Self) {
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            self.re[k] += a.re[k] * b.re[k] - a.im[k] * b.im[k];
            self.im[k] += a.re[k] * b.im[k] + a.im[k] * b.re[k];
        }
    }

    /// Adds `conj(a) * b` bin by bin.
    pub(crate) fn conjugate_multiply_accumulate(&mut self, a: &Self, b: &Self) {
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            self.re[k] += a.re[k] * b.re[k] + a.im[k] * b.im[k];
            self.im[k] += a.re[k] * b.im[k] - a.im[k] * b.re[k];
        }
    }
}
