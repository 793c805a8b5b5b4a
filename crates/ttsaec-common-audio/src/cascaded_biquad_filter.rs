//! Cascaded biquad (IIR) filter in direct form 1.

use std::f32::consts::PI;

/// Coefficients for one second-order section, normalized so that `a0 == 1`.
///
/// `a` holds `[a1, a2]`; the recursion is
/// `y[n] = b0 x[n] + b1 x[n-1] + b2 x[n-2] - a1 y[n-1] - a2 y[n-2]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiQuadCoefficients {
    pub b: [f32; 3],
    pub a: [f32; 2],
}

impl BiQuadCoefficients {
    /// Second-order low-pass section (RBJ cookbook) with quality factor `q`.
    pub fn low_pass(sample_rate_hz: f32, cutoff_hz: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate_hz;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;
        let b1 = (1.0 - cos_w0) / a0;
        Self {
            b: [0.5 * b1, b1, 0.5 * b1],
            a: [-2.0 * cos_w0 / a0, (1.0 - alpha) / a0],
        }
    }

    /// DC gain of the section.
    pub fn dc_gain(&self) -> f32 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }
}

/// Fourth-order Butterworth low-pass as two cascaded sections.
pub fn butterworth_low_pass_4(sample_rate_hz: f32, cutoff_hz: f32) -> [BiQuadCoefficients; 2] {
    const Q: [f32; 2] = [0.541_196_1, 1.306_563];
    [
        BiQuadCoefficients::low_pass(sample_rate_hz, cutoff_hz, Q[0]),
        BiQuadCoefficients::low_pass(sample_rate_hz, cutoff_hz, Q[1]),
    ]
}

#[derive(Debug, Clone)]
struct BiQuad {
    coefficients: BiQuadCoefficients,
    x: [f32; 2],
    y: [f32; 2],
}

impl BiQuad {
    fn new(coefficients: BiQuadCoefficients) -> Self {
        Self {
            coefficients,
            x: [0.0; 2],
            y: [0.0; 2],
        }
    }

    fn apply(&mut self, samples: &mut [f32]) {
        let BiQuadCoefficients { b, a } = self.coefficients;
        let [mut x0, mut x1] = self.x;
        let [mut y0, mut y1] = self.y;
        for v in samples.iter_mut() {
            let input = *v;
            let output = b[0] * input + b[1] * x0 + b[2] * x1 - a[0] * y0 - a[1] * y1;
            x1 = x0;
            x0 = input;
            y1 = y0;
            y0 = output;
            *v = output;
        }
        self.x = [x0, x1];
        self.y = [y0, y1];
    }
}

/// Second-order sections applied in series, each keeping its own state.
#[derive(Debug, Clone)]
pub struct CascadedBiQuadFilter {
    biquads: Vec<BiQuad>,
}

impl CascadedBiQuadFilter {
    pub fn new(coefficients: &[BiQuadCoefficients]) -> Self {
        Self {
            biquads: coefficients.iter().copied().map(BiQuad::new).collect(),
        }
    }

    /// Filters `x` into `y`. Both slices must have the same length.
    pub fn process(&mut self, x: &[f32], y: &mut [f32]) {
        debug_assert_eq!(x.len(), y.len());
        y.copy_from_slice(x);
        self.process_in_place(y);
    }

    /// Filters `samples` in place through all sections.
    pub fn process_in_place(&mut self, samples: &mut [f32]) {
        for biquad in &mut self.biquads {
            biquad.apply(samples);
        }
    }

    /// Clears the filter memory, keeping the coefficients.
    pub fn reset(&mut self) {
        for biquad in &mut self.biquads {
            biquad.x = [0.0; 2];
            biquad.y = [0.0; 2];
        }
    }
}
