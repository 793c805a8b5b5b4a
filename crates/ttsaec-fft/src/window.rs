//! Analysis and synthesis windows.

use std::f32::consts::PI;

/// Periodic square-root Hann window of `len` points.
///
/// Applied once at analysis and once at synthesis, the product is a Hann
/// window, which sums to one under 50 % overlap-add.
pub fn sqrt_hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| (PI * n as f32 / len as f32).sin())
        .collect()
}
