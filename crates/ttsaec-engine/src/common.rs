//! Constants and small helpers shared across the engine.

use ttsaec_common_audio::audio_util::dbfs_to_power;

/// The only supported sample rate.
pub const SAMPLE_RATE_HZ: usize = 48_000;
/// Samples per 10 ms frame. Frames are also the filter's block size.
pub const FRAME_SIZE: usize = 480;
/// Frames per second.
pub const NUM_FRAMES_PER_SECOND: usize = SAMPLE_RATE_HZ / FRAME_SIZE;
/// Samples per millisecond.
pub const SAMPLES_PER_MS: usize = SAMPLE_RATE_HZ / 1000;

pub const FFT_LENGTH: usize = 2 * FRAME_SIZE;
pub const FFT_LENGTH_BY_2: usize = FRAME_SIZE;
pub const FFT_LENGTH_BY_2_PLUS_1: usize = FFT_LENGTH_BY_2 + 1;

/// Any capture sample at or above this magnitude marks the frame saturated.
pub(crate) const SATURATION_THRESHOLD: f32 = 32_700.0 / 32_768.0;

/// Converts a mean-square frame power (dBFS) to the expected per-bin power of
/// a 960-point transform whose window energy is `window_energy`.
#[inline]
pub(crate) fn bin_power_for_dbfs(dbfs: f32, window_energy: f32) -> f32 {
    window_energy * dbfs_to_power(dbfs)
}

/// Returns `true` if any sample is clipped.
#[inline]
pub(crate) fn is_saturated(frame: &[f32]) -> bool {
    frame.iter().any(|v| v.abs() >= SATURATION_THRESHOLD)
}

#[inline]
pub(crate) fn ms_to_samples(ms: usize) -> usize {
    ms * SAMPLES_PER_MS
}
