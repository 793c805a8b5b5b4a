//! Echo canceller tuning.
//!
//! Every field has a default suited to 48 kHz TTS playback on a loudspeaker
//! close to the microphone. [`AecConfig::mobile`] trades filter length and
//! delay range for CPU. Call [`AecConfig::validate`] after editing fields by
//! hand; out-of-range values are clamped.

/// Full tuning of the echo canceller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AecConfig {
    /// Adaptive filter settings.
    pub filter: Filter,
    /// Delay estimation and alignment settings.
    pub delay: Delay,
    /// Double-talk detector settings.
    pub double_talk: DoubleTalk,
    /// Activity limits for render and capture.
    pub render_levels: RenderLevels,
    /// Sub-band ERLE estimation settings.
    pub erle: Erle,
    /// Residual echo suppressor settings.
    pub suppressor: Suppressor,
    /// Comfort noise settings.
    pub comfort_noise: ComfortNoise,
    /// Reaction to capture gain jumps signalled by the caller.
    pub level_change: LevelChange,
}

impl AecConfig {
    /// Reduced-cost preset: half the filter length, 300 ms delay range, a
    /// shorter correlation window and less frequent delay estimation.
    pub fn mobile() -> Self {
        let mut config = Self::default();
        config.filter.length_blocks = 5;
        config.delay.max_delay_ms = 300;
        config.delay.headroom_samples = 64;
        config.delay.correlation_window_ms = 250;
        config.delay.estimation_interval_frames = 10;
        config
    }

    /// Validates and clamps config parameters to reasonable ranges.
    /// Returns `true` if no changes were needed.
    pub fn validate(&mut self) -> bool {
        let mut ok = true;

        let f = &mut self.filter;
        ok &= limit_usize(&mut f.length_blocks, 1, 50);
        ok &= limit_f32(&mut f.step_size, 0.01, 1.0);
        ok &= limit_f32(&mut f.leakage, 0.0, 0.1);
        ok &= limit_f32(&mut f.diverging_leakage, 0.0, 0.1);
        ok &= limit_f32(&mut f.noise_gate_dbfs, -150.0, 0.0);
        ok &= limit_f32(&mut f.divergence_factor, 1.0, 100.0);
        ok &= limit_usize(&mut f.divergence_hold_frames, 1, 1000);
        ok &= limit_f32(&mut f.max_partition_gain, 1.0, 1000.0);

        let d = &mut self.delay;
        if d.down_sampling_factor != 4 && d.down_sampling_factor != 8 {
            d.down_sampling_factor = 8;
            ok = false;
        }
        ok &= limit_usize(&mut d.max_delay_ms, 10, 1000);
        ok &= limit_usize(&mut d.headroom_samples, 0, 960);
        ok &= limit_usize(&mut d.correlation_window_ms, 50, 1000);
        ok &= limit_usize(&mut d.estimation_interval_frames, 1, 100);
        ok &= limit_f32(&mut d.confidence_threshold, 0.0, 1.0);
        ok &= limit_usize(&mut d.required_confirmations, 1, 10);
        ok &= limit_usize(&mut d.change_confirmations, d.required_confirmations, 20);
        ok &= limit_usize(&mut d.candidate_tolerance, 0, 16);

        let t = &mut self.double_talk;
        ok &= limit_f32(&mut t.nearend_threshold, 1.0, 100.0);
        ok &= limit_f32(&mut t.residual_threshold, 1.0, 100.0);
        ok &= limit_f32(&mut t.converged_erle_db, 0.0, 60.0);
        ok &= limit_f32(&mut t.power_smoothing, 0.0, 0.99);
        ok &= limit_usize(&mut t.hangover_frames, 0, 100);
        ok &= limit_f32(&mut t.echo_path_gain_creep, 1.0, 2.0);
        ok &= limit_f32(&mut t.min_echo_path_gain, 1e-4, 1.0);
        ok &= limit_f32(&mut t.max_echo_path_gain, 1.0, 100.0);

        let r = &mut self.render_levels;
        ok &= limit_f32(&mut r.active_render_limit_dbfs, -150.0, 0.0);
        ok &= limit_f32(&mut r.active_capture_limit_dbfs, -150.0, 0.0);

        let e = &mut self.erle;
        ok &= limit_f32(&mut e.max, 1.0, 1e5);
        ok &= limit_f32(&mut e.min, 1.0, e.max);
        ok &= limit_f32(&mut e.update_rate, 0.001, 1.0);
        ok &= limit_usize(&mut e.accumulation_frames, 1, 100);

        let s = &mut self.suppressor;
        ok &= limit_f32(&mut s.overdrive, 0.5, 10.0);
        ok &= limit_f32(&mut s.floor_gain, 0.0, 1.0);
        ok &= limit_f32(&mut s.gain_release, 0.01, 1.0);

        ok &= limit_f32(&mut self.comfort_noise.noise_floor_dbfs, -150.0, 0.0);

        let l = &mut self.level_change;
        ok &= limit_usize(&mut l.hold_frames, 0, 1000);
        ok &= limit_f32(&mut l.step_size_scale, 0.0, 1.0);
        ok &= limit_f32(&mut l.overdrive, 0.5, 10.0);

        ok
    }
}

fn limit_f32(value: &mut f32, min: f32, max: f32) -> bool {
    let clamped = if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    };
    let unchanged = *value == clamped;
    *value = clamped;
    unchanged
}

fn limit_usize(value: &mut usize, min: usize, max: usize) -> bool {
    let clamped = (*value).clamp(min, max);
    let unchanged = *value == clamped;
    *value = clamped;
    unchanged
}

/// Partitioned frequency-domain NLMS filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Number of 10 ms partitions, i.e. the echo tail covered (default: 10).
    pub length_blocks: usize,
    /// Normalized step size in `(0, 1]` (default: 0.5).
    pub step_size: f32,
    /// Per-frame tap leakage (default: 1e-5).
    pub leakage: f32,
    /// Leakage for bands whose error exceeds the capture (default: 1e-3).
    pub diverging_leakage: f32,
    /// Render level per partition below which a band is not adapted
    /// (default: -70 dBFS).
    pub noise_gate_dbfs: f32,
    /// Error-to-capture power ratio that marks a band as diverged (default: 4).
    pub divergence_factor: f32,
    /// Consecutive diverged frames before a band is reset (default: 10).
    pub divergence_hold_frames: usize,
    /// Largest tap magnitude per band and partition (default: 10).
    pub max_partition_gain: f32,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            length_blocks: 10,
            step_size: 0.5,
            leakage: 1e-5,
            diverging_leakage: 1e-3,
            noise_gate_dbfs: -70.0,
            divergence_factor: 4.0,
            divergence_hold_frames: 10,
            max_partition_gain: 10.0,
        }
    }
}

/// Delay estimation and render/capture alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    /// Largest delay searched (default: 500 ms).
    pub max_delay_ms: usize,
    /// Samples of the estimated delay left in front of the filter so that
    /// early echo is still covered (default: 240).
    pub headroom_samples: usize,
    /// Decimation factor of the correlator; 4 or 8 (default: 8).
    pub down_sampling_factor: usize,
    /// Capture history correlated per estimate (default: 340 ms).
    pub correlation_window_ms: usize,
    /// Capture frames between estimates (default: 5).
    pub estimation_interval_frames: usize,
    /// Normalized correlation needed to consider a lag (default: 0.35).
    pub confidence_threshold: f32,
    /// Consecutive agreeing estimates needed to confirm the current delay
    /// (default: 2).
    pub required_confirmations: usize,
    /// Consecutive agreeing estimates needed to move the delay away from
    /// its current value; at least `required_confirmations` (default: 4).
    pub change_confirmations: usize,
    /// Decimated samples within which two estimates agree (default: 2).
    pub candidate_tolerance: usize,
}

impl Default for Delay {
    fn default() -> Self {
        Self {
            max_delay_ms: 500,
            headroom_samples: 240,
            down_sampling_factor: 8,
            correlation_window_ms: 340,
            estimation_interval_frames: 5,
            confidence_threshold: 0.35,
            required_confirmations: 2,
            change_confirmations: 4,
            candidate_tolerance: 2,
        }
    }
}

/// Double-talk detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleTalk {
    /// Capture-to-expected-echo power ratio that flags near-end speech
    /// (default: 2).
    pub nearend_threshold: f32,
    /// Residual-to-expected-residual power ratio that flags near-end speech
    /// once the filter has converged (default: 8).
    pub residual_threshold: f32,
    /// Linear ERLE at which the filter counts as converged (default: 6 dB).
    pub converged_erle_db: f32,
    /// Per-frame smoothing of the detector powers (default: 0.6).
    pub power_smoothing: f32,
    /// Frames near-end stays flagged after the last detection (default: 2).
    pub hangover_frames: usize,
    /// Per-frame growth of the echo path gain while near-end is flagged
    /// (default: 1.01).
    pub echo_path_gain_creep: f32,
    /// Lower bound of the tracked echo path gain (default: 0.01).
    pub min_echo_path_gain: f32,
    /// Upper bound of the tracked echo path gain (default: 4).
    pub max_echo_path_gain: f32,
}

impl Default for DoubleTalk {
    fn default() -> Self {
        Self {
            nearend_threshold: 2.0,
            residual_threshold: 8.0,
            converged_erle_db: 6.0,
            power_smoothing: 0.6,
            hangover_frames: 2,
            echo_path_gain_creep: 1.01,
            min_echo_path_gain: 0.01,
            max_echo_path_gain: 4.0,
        }
    }
}

/// Activity limits.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderLevels {
    /// Render frame power below which render counts as silent (default: -60 dBFS).
    pub active_render_limit_dbfs: f32,
    /// Capture frame power below which capture counts as silent (default: -65 dBFS).
    pub active_capture_limit_dbfs: f32,
}

impl Default for RenderLevels {
    fn default() -> Self {
        Self {
            active_render_limit_dbfs: -60.0,
            active_capture_limit_dbfs: -65.0,
        }
    }
}

/// Sub-band ERLE estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct Erle {
    /// Lower bound (default: 1).
    pub min: f32,
    /// Upper bound (default: 1000, i.e. 30 dB).
    pub max: f32,
    /// Smoothing rate towards each new measurement (default: 0.1).
    pub update_rate: f32,
    /// Frames accumulated per measurement (default: 4).
    pub accumulation_frames: usize,
}

impl Default for Erle {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 1000.0,
            update_rate: 0.1,
            accumulation_frames: 4,
        }
    }
}

/// Residual echo suppressor.
#[derive(Debug, Clone, PartialEq)]
pub struct Suppressor {
    /// Scale applied to the residual echo estimate (default: 1.5).
    pub overdrive: f32,
    /// Smallest gain applied to any band (default: 0.01, -40 dB).
    pub floor_gain: f32,
    /// Per-frame recovery rate of a gain towards its target (default: 0.3).
    pub gain_release: f32,
}

impl Default for Suppressor {
    fn default() -> Self {
        Self {
            overdrive: 1.5,
            floor_gain: 0.01,
            gain_release: 0.3,
        }
    }
}

/// Comfort noise generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ComfortNoise {
    /// Lowest comfort noise level (default: -96.03 dBFS).
    pub noise_floor_dbfs: f32,
}

impl Default for ComfortNoise {
    fn default() -> Self {
        Self {
            noise_floor_dbfs: -96.03406,
        }
    }
}

/// Reaction to a capture level change signalled by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelChange {
    /// Frames the reaction lasts (default: 50).
    pub hold_frames: usize,
    /// Factor applied to the filter step size (default: 0.1).
    pub step_size_scale: f32,
    /// Suppressor overdrive used instead of the normal one (default: 3).
    pub overdrive: f32,
}

impl Default for LevelChange {
    fn default() -> Self {
        Self {
            hold_frames: 50,
            step_size_scale: 0.1,
            overdrive: 3.0,
        }
    }
}
