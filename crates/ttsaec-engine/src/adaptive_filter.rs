//! Partitioned-block frequency-domain adaptive FIR filter.
//!
//! Each partition holds the transfer function of 480 taps of the echo path
//! in all 481 sub-bands. Filtering is overlap-save: the echo estimate for a
//! frame is the second half of the inverse transform of `sum_p H_p * X_p`.

use crate::aec_fft::AecFft;
use crate::common::{FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1};
use crate::fft_data::FftData;

#[derive(derive_more::Debug)]
pub(crate) struct AdaptiveFilter {
    #[debug(skip)]
    h: Vec<FftData>,
    partition_to_constrain: usize,
    #[debug(skip)]
    impulse_response: [f32; FFT_LENGTH],
}

impl AdaptiveFilter {
    pub(crate) fn new(num_partitions: usize) -> Self {
        debug_assert!(num_partitions > 0);
        Self {
            h: vec![FftData::default(); num_partitions],
            partition_to_constrain: 0,
            impulse_response: [0.0; FFT_LENGTH],
        }
    }

    /// Transfer functions of all partitions.
    pub(crate) fn partitions(&self) -> &[FftData] {
        &self.h
    }

    /// Echo estimate spectrum `S = sum_p H_p * X_p`.
    pub(crate) fn apply(&self, x: &[FftData], s: &mut FftData) {
        debug_assert_eq!(x.len(), self.h.len());
        s.clear();
        for (h_p, x_p) in self.h.iter().zip(x) {
            s.multiply_accumulate(h_p, x_p);
        }
    }

    /// Gradient step `H_p += conj(X_p) * G` for every partition.
    pub(crate) fn adapt(&mut self, x: &[FftData], g: &FftData) {
        debug_assert_eq!(x.len(), self.h.len());
        for (h_p, x_p) in self.h.iter_mut().zip(x) {
            h_p.conjugate_multiply_accumulate(x_p, g);
        }
    }

    /// Forces one partition back to a causal 480-tap response. Partitions are
    /// visited round-robin, one per call.
    pub(crate) fn constrain_next(&mut self, fft: &mut AecFft) {
        let p = self.partition_to_constrain;
        fft.ifft(&self.h[p], &mut self.impulse_response);
        let scale = 1.0 / FFT_LENGTH as f32;
        for v in &mut self.impulse_response[..FFT_LENGTH_BY_2] {
            *v *= scale;
        }
        self.impulse_response[FFT_LENGTH_BY_2..].fill(0.0);
        fft.fft(&self.impulse_response, &mut self.h[p]);
        self.partition_to_constrain = (p + 1) % self.h.len();
    }

    /// Scales each sub-band by `1 - rates[k]` in every partition.
    pub(crate) fn leak(&mut self, rates: &[f32; FFT_LENGTH_BY_2_PLUS_1]) {
        for h_p in &mut self.h {
            for ((re, im), &rate) in h_p.re.iter_mut().zip(h_p.im.iter_mut()).zip(rates) {
                let keep = 1.0 - rate;
                *re *= keep;
                *im *= keep;
            }
        }
    }

    /// Largest tap magnitude of sub-band `k` over all partitions, or infinity
    /// if any is not finite.
    pub(crate) fn peak_gain(&self, k: usize) -> f32 {
        let mut peak2 = 0.0f32;
        for h_p in &self.h {
            let g2 = h_p.re[k] * h_p.re[k] + h_p.im[k] * h_p.im[k];
            if !g2.is_finite() {
                return f32::INFINITY;
            }
            peak2 = peak2.max(g2);
        }
        peak2.sqrt()
    }

    /// Zeroes sub-band `k` in every partition.
    pub(crate) fn reset_band(&mut self, k: usize) {
        for h_p in &mut self.h {
            h_p.re[k] = 0.0;
            h_p.im[k] = 0.0;
        }
    }

    /// Re-indexes partitions after the render alignment moved by `shift`
    /// frames so that each tap keeps modelling the same acoustic lag.
    /// Partitions that fall outside the filter are dropped; vacated ones are
    /// zeroed.
    pub(crate) fn shift(&mut self, shift: isize) {
        let n = self.h.len();
        let amount = shift.unsigned_abs();
        if amount >= n {
            self.clear();
            return;
        }
        if shift > 0 {
            self.h.rotate_left(amount);
            for h_p in &mut self.h[n - amount..] {
                h_p.clear();
            }
        } else if shift < 0 {
            self.h.rotate_right(amount);
            for h_p in &mut self.h[..amount] {
                h_p.clear();
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        for h_p in &mut self.h {
            h_p.clear();
        }
        self.partition_to_constrain = 0;
    }
}
