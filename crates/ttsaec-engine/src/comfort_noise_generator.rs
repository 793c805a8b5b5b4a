//! Comfort noise generator: tracks the background noise spectrum and
//! synthesizes noise with that shape to fill in suppressed bands.

use std::f32::consts;

use crate::aec_fft::WINDOW_ENERGY;
use crate::common::{FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1, bin_power_for_dbfs};
use crate::config::AecConfig;
use crate::fft_data::FftData;

const SQRT2: f32 = consts::SQRT_2;

/// Table of sqrt(2) * sin(2*pi*i/32).
const SQRT2_SIN: [f32; 32] = [
    0.0000000, 0.2758994, 0.5411961, 0.7856950, 1.0000000, 1.1758756, 1.3065630, 1.3870398, SQRT2,
    1.3870398, 1.3065630, 1.1758756, 1.0000000, 0.7856950, 0.5411961, 0.2758994, 0.0000000,
    -0.2758994, -0.5411961, -0.7856950, -1.0000000, -1.1758756, -1.3065630, -1.3870398, -SQRT2,
    -1.3870398, -1.3065630, -1.1758756, -1.0000000, -0.7856950, -0.5411961, -0.2758994,
];

const INITIAL_SEED: u32 = 42;
/// Level the noise estimate starts from before any update.
const INITIAL_NOISE_DBFS: f32 = -60.0;
/// Updates before the estimate starts tracking the input.
const STARTUP_UPDATES: u32 = 50;
/// Updates during which the slowly rising initial estimate is used.
const INITIAL_PHASE_UPDATES: u32 = 1000;

/// Fills `noise` with random-phase noise whose magnitude follows `n2`.
fn generate_comfort_noise(n2: &[f32; FFT_LENGTH_BY_2_PLUS_1], seed: &mut u32, noise: &mut FftData) {
    const INDEX_MASK: usize = 32 - 1;

    noise.re[0] = 0.0;
    noise.im[0] = 0.0;
    noise.re[FFT_LENGTH_BY_2] = 0.0;
    noise.im[FFT_LENGTH_BY_2] = 0.0;
    for k in 1..FFT_LENGTH_BY_2 {
        // 31-bit LCG, reduced to a 5-bit phase index.
        *seed = seed.wrapping_mul(69069).wrapping_add(1) & (0x8000_0000 - 1);
        let i = (*seed >> 26) as usize;
        let n = n2[k].sqrt();
        noise.re[k] = n * SQRT2_SIN[i];
        noise.im[k] = n * SQRT2_SIN[(i + 8) & INDEX_MASK];
    }
}

#[derive(derive_more::Debug)]
pub(crate) struct ComfortNoiseGenerator {
    seed: u32,
    noise_floor: f32,
    initial_noise: f32,
    num_updates: u32,
    #[debug(skip)]
    n2_initial: Option<[f32; FFT_LENGTH_BY_2_PLUS_1]>,
    #[debug(skip)]
    y2_smoothed: [f32; FFT_LENGTH_BY_2_PLUS_1],
    #[debug(skip)]
    n2: [f32; FFT_LENGTH_BY_2_PLUS_1],
}

impl ComfortNoiseGenerator {
    pub(crate) fn new(config: &AecConfig) -> Self {
        let noise_floor = bin_power_for_dbfs(config.comfort_noise.noise_floor_dbfs, WINDOW_ENERGY);
        let initial_noise = bin_power_for_dbfs(INITIAL_NOISE_DBFS, WINDOW_ENERGY).max(noise_floor);
        Self {
            seed: INITIAL_SEED,
            noise_floor,
            initial_noise,
            num_updates: 0,
            n2_initial: Some([0.0; FFT_LENGTH_BY_2_PLUS_1]),
            y2_smoothed: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            n2: [initial_noise; FFT_LENGTH_BY_2_PLUS_1],
        }
    }

    /// Updates the noise estimate from `y2` when `update` is set, then
    /// writes a fresh noise spectrum to `noise`.
    pub(crate) fn compute(
        &mut self,
        update: bool,
        y2: &[f32; FFT_LENGTH_BY_2_PLUS_1],
        noise: &mut FftData,
    ) {
        if update {
            for (smoothed, &y2) in self.y2_smoothed.iter_mut().zip(y2) {
                *smoothed += 0.1 * (y2 - *smoothed);
            }

            if self.num_updates > STARTUP_UPDATES {
                for (n2, &b) in self.n2.iter_mut().zip(&self.y2_smoothed) {
                    let a = *n2;
                    *n2 = if b < a {
                        (0.9 * b + 0.1 * a) * 1.0002
                    } else {
                        a * 1.0002
                    };
                }
            }

            if let Some(n2_initial) = &mut self.n2_initial {
                self.num_updates += 1;
                if self.num_updates == INITIAL_PHASE_UPDATES {
                    self.n2_initial = None;
                } else {
                    for (initial, &a) in n2_initial.iter_mut().zip(&self.n2) {
                        let b = *initial;
                        *initial = if a > b { b + 0.001 * (a - b) } else { a };
                    }
                }
            }

            for n in &mut self.n2 {
                *n = n.max(self.noise_floor);
            }
            if let Some(n2_initial) = &mut self.n2_initial {
                for n in n2_initial.iter_mut() {
                    *n = n.max(self.noise_floor);
                }
            }
        }

        let n2 = self.n2_initial.as_ref().unwrap_or(&self.n2);
        generate_comfort_noise(n2, &mut self.seed, noise);
    }

    pub(crate) fn reset(&mut self) {
        self.seed = INITIAL_SEED;
        self.num_updates = 0;
        self.n2_initial = Some([0.0; FFT_LENGTH_BY_2_PLUS_1]);
        self.y2_smoothed.fill(0.0);
        self.n2.fill(self.initial_noise);
    }
}
