//! Sample format helpers.
//!
//! | Name  | Type  | Range             |
//! |-------|-------|-------------------|
//! | S16   | `i16` | \[-32768, 32767\] |
//! | Float | `f32` | \[-1.0, 1.0\]     |
//!
//! Powers are mean squares of Float samples, so a full-scale square wave has
//! power 1 (0 dBFS).

const S16_TO_FLOAT_SCALING: f32 = 1.0 / 32768.0;

/// Smallest power reported by [`power_to_dbfs`].
pub const MIN_DBFS: f32 = -150.0;

/// Convert a single S16 sample to Float \[-1.0, 1.0\].
#[inline]
pub fn s16_to_float(v: i16) -> f32 {
    f32::from(v) * S16_TO_FLOAT_SCALING
}

/// Convert a single Float \[-1.0, 1.0\] sample to S16, rounding to nearest.
#[inline]
pub fn float_to_s16(v: f32) -> i16 {
    let v = (v * 32768.0).clamp(-32768.0, 32767.0);
    (v + f32::copysign(0.5, v)) as i16
}

/// Replaces NaN and infinite samples with zero and clamps the rest to
/// \[-1.0, 1.0\]. Returns how many samples were non-finite.
pub fn sanitize(samples: &mut [f32]) -> usize {
    let mut replaced = 0;
    for v in samples.iter_mut() {
        if v.is_finite() {
            *v = v.clamp(-1.0, 1.0);
        } else {
            *v = 0.0;
            replaced += 1;
        }
    }
    replaced
}

/// Clamps every sample to \[-1.0, 1.0\].
pub fn clamp_to_unit(samples: &mut [f32]) {
    for v in samples {
        *v = v.clamp(-1.0, 1.0);
    }
}

/// Mean square of `samples`; zero for an empty slice.
#[inline]
pub fn power(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|v| v * v).sum::<f32>() / samples.len() as f32
}

/// Converts a mean-square power to dBFS, floored at [`MIN_DBFS`].
#[inline]
pub fn power_to_dbfs(power: f32) -> f32 {
    if power <= 0.0 {
        return MIN_DBFS;
    }
    (10.0 * power.log10()).max(MIN_DBFS)
}

/// Converts dBFS to a mean-square power.
#[inline]
pub fn dbfs_to_power(dbfs: f32) -> f32 {
    10.0f32.powf(dbfs / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    #[test]
    fn s16_extremes() {
        assert_eq!(float_to_s16(1.0), 32767);
        assert_eq!(float_to_s16(-1.0), -32768);
        assert_eq!(float_to_s16(0.0), 0);
        assert_eq!(s16_to_float(-32768), -1.0);
    }

    #[test]
    fn sanitize_counts_and_zeroes_non_finite() {
        let mut x = [0.5, f32::NAN, -0.25, f32::INFINITY, f32::NEG_INFINITY, 3.0, -1e30];
        assert_eq!(sanitize(&mut x), 3);
        assert_eq!(x, [0.5, 0.0, -0.25, 0.0, 0.0, 1.0, -1.0]);
    }

    #[test]
    fn dbfs_conversions() {
        assert!((power_to_dbfs(1.0)).abs() < 1e-6);
        assert!((power_to_dbfs(dbfs_to_power(-60.0)) + 60.0).abs() < 1e-3);
        assert_eq!(power_to_dbfs(0.0), MIN_DBFS);
    }

    #[proptest]
    fn s16_survives_float_conversion(v: i16) {
        prop_assert_eq!(float_to_s16(s16_to_float(v)), v);
    }

    #[proptest]
    fn clamp_keeps_samples_in_unit_range(#[strategy(-10.0f32..10.0)] v: f32) {
        let mut x = [v];
        clamp_to_unit(&mut x);
        prop_assert!((-1.0..=1.0).contains(&x[0]));
    }
}
