//! Classification of each capture frame by which talkers are active.
//!
//! Near-end speech is flagged by two power tests. The energy test compares
//! the smoothed capture power with the loudest aligned render frame scaled
//! by the tracked echo path gain. Once the linear filter has converged, the
//! residual test compares what is left after subtraction with what the
//! filter's ERLE predicts. A residual louder than the capture itself points
//! at a stale filter rather than near-end speech and skips that test, and
//! the ERLE the residual test relies on loses weight for as long as only
//! that test keeps firing, so a changed echo path cannot freeze adaptation
//! for good.
//!
//! The echo path gain is only learned while the render reaching the capture
//! directly is active. Around a render offset the peak still covers the
//! older partitions while the echo has already died away.

use ttsaec_common_audio::audio_util::dbfs_to_power;

use crate::config::AecConfig;

/// Per-frame decay of the linear ERLE trusted by the residual test while it
/// alone flags near-end. Far-end-only frames recover at the inverse rate.
const ERLE_TRUST_DECAY: f32 = 0.98;

/// Which talkers are active in a capture frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoubleTalkState {
    /// Neither render nor near-end speech.
    #[default]
    Silence,
    /// Only the echo of the render is present. The only state in which the
    /// adaptive filter learns.
    FarEndOnly,
    /// Near-end speech without render.
    NearEndOnly,
    /// Near-end speech on top of echo.
    DoubleTalk,
}

/// Per-frame powers the detector decides on. All powers are mean-square.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DetectorInput {
    pub(crate) render_peak_power: f32,
    pub(crate) direct_render_power: f32,
    pub(crate) capture_power: f32,
    pub(crate) residual_power: f32,
    /// Linear-filter ERLE as a power ratio.
    pub(crate) linear_erle: f32,
}

#[derive(Debug)]
pub(crate) struct DoubleTalkDetector {
    nearend_threshold: f32,
    residual_threshold: f32,
    converged_erle: f32,
    smoothing: f32,
    hangover_frames: usize,
    gain_creep: f32,
    min_gain: f32,
    max_gain: f32,
    render_limit: f32,
    capture_limit: f32,

    capture_smoothed: f32,
    residual_smoothed: f32,
    echo_path_gain: f32,
    erle_trust: f32,
    hangover_left: usize,
    capture_active: bool,
    state: DoubleTalkState,
}

impl DoubleTalkDetector {
    pub(crate) fn new(config: &AecConfig) -> Self {
        let dt = &config.double_talk;
        Self {
            nearend_threshold: dt.nearend_threshold,
            residual_threshold: dt.residual_threshold,
            converged_erle: 10f32.powf(dt.converged_erle_db / 10.0),
            smoothing: dt.power_smoothing,
            hangover_frames: dt.hangover_frames,
            gain_creep: dt.echo_path_gain_creep,
            min_gain: dt.min_echo_path_gain,
            max_gain: dt.max_echo_path_gain,
            render_limit: dbfs_to_power(config.render_levels.active_render_limit_dbfs),
            capture_limit: dbfs_to_power(config.render_levels.active_capture_limit_dbfs),
            capture_smoothed: 0.0,
            residual_smoothed: 0.0,
            echo_path_gain: 1.0,
            erle_trust: 1.0,
            hangover_left: 0,
            capture_active: false,
            state: DoubleTalkState::Silence,
        }
    }

    /// Classifies the current frame.
    pub(crate) fn update(&mut self, input: &DetectorInput) -> DoubleTalkState {
        let a = self.smoothing;
        self.capture_smoothed = a * self.capture_smoothed + (1.0 - a) * input.capture_power;
        self.residual_smoothed = a * self.residual_smoothed + (1.0 - a) * input.residual_power;

        let render_active = input.render_peak_power >= self.render_limit;
        self.capture_active = input.capture_power >= self.capture_limit;

        let detected = if render_active {
            let energy_test = self.capture_smoothed
                > self.nearend_threshold * self.echo_path_gain * input.render_peak_power;
            let erle = input.linear_erle * self.erle_trust;
            let residual_test = erle >= self.converged_erle
                && self.residual_smoothed < self.capture_smoothed
                && self.residual_smoothed > self.residual_threshold * self.capture_smoothed / erle;
            if self.capture_active && residual_test && !energy_test {
                self.erle_trust *= ERLE_TRUST_DECAY;
            }
            self.capture_active && (energy_test || residual_test)
        } else {
            self.capture_active
        };

        let nearend = if detected {
            self.hangover_left = self.hangover_frames;
            true
        } else if self.hangover_left > 0 {
            self.hangover_left -= 1;
            true
        } else {
            false
        };

        self.state = match (render_active, nearend) {
            (true, false) => DoubleTalkState::FarEndOnly,
            (true, true) => DoubleTalkState::DoubleTalk,
            (false, true) => DoubleTalkState::NearEndOnly,
            (false, false) => DoubleTalkState::Silence,
        };

        if self.state == DoubleTalkState::FarEndOnly {
            self.erle_trust = (self.erle_trust / ERLE_TRUST_DECAY).min(1.0);
        }
        let direct_active = input.direct_render_power >= self.render_limit;
        match self.state {
            DoubleTalkState::FarEndOnly if self.capture_active && direct_active => {
                let observed =
                    self.capture_smoothed.max(input.capture_power) / input.render_peak_power;
                let rate = if observed < self.echo_path_gain { 0.5 } else { 0.05 };
                self.echo_path_gain += rate * (observed - self.echo_path_gain);
            }
            DoubleTalkState::DoubleTalk => self.echo_path_gain *= self.gain_creep,
            _ => {}
        }
        self.echo_path_gain = self.echo_path_gain.clamp(self.min_gain, self.max_gain);

        self.state
    }

    pub(crate) fn state(&self) -> DoubleTalkState {
        self.state
    }

    /// Whether the last frame's capture was above the activity limit.
    pub(crate) fn capture_active(&self) -> bool {
        self.capture_active
    }

    /// Tracked capture-to-render power ratio of the echo path.
    pub(crate) fn echo_path_gain(&self) -> f32 {
        self.echo_path_gain
    }

    pub(crate) fn handle_level_change(&mut self) {
        self.echo_path_gain = 1.0;
        self.erle_trust = 1.0;
    }

    pub(crate) fn reset(&mut self) {
        self.capture_smoothed = 0.0;
        self.residual_smoothed = 0.0;
        self.echo_path_gain = 1.0;
        self.erle_trust = 1.0;
        self.hangover_left = 0;
        self.capture_active = false;
        self.state = DoubleTalkState::Silence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(render: f32, capture: f32, residual: f32, erle: f32) -> DetectorInput {
        DetectorInput {
            render_peak_power: render,
            direct_render_power: render,
            capture_power: capture,
            residual_power: residual,
            linear_erle: erle,
        }
    }

    fn run(detector: &mut DoubleTalkDetector, frame: DetectorInput, n: usize) -> DoubleTalkState {
        let mut state = DoubleTalkState::Silence;
        for _ in 0..n {
            state = detector.update(&frame);
        }
        state
    }

    #[test]
    fn silence_and_nearend_without_render() {
        let mut detector = DoubleTalkDetector::new(&AecConfig::default());
        assert_eq!(run(&mut detector, input(0.0, 0.0, 0.0, 1.0), 3), DoubleTalkState::Silence);
        assert_eq!(
            run(&mut detector, input(0.0, 0.01, 0.01, 1.0), 3),
            DoubleTalkState::NearEndOnly
        );
    }

    #[test]
    fn echo_alone_is_far_end_only() {
        let mut detector = DoubleTalkDetector::new(&AecConfig::default());
        let state = run(&mut detector, input(0.04, 0.01, 0.01, 1.0), 20);
        assert_eq!(state, DoubleTalkState::FarEndOnly);
        assert!((detector.echo_path_gain() - 0.25).abs() < 0.01);
    }

    #[test]
    fn loud_capture_during_render_is_double_talk() {
        let mut detector = DoubleTalkDetector::new(&AecConfig::default());
        run(&mut detector, input(0.04, 0.01, 0.01, 1.0), 20);
        assert_eq!(
            run(&mut detector, input(0.04, 0.1, 0.1, 1.0), 3),
            DoubleTalkState::DoubleTalk
        );
    }

    #[test]
    fn residual_test_catches_quiet_nearend_after_convergence() {
        let mut detector = DoubleTalkDetector::new(&AecConfig::default());
        // Converged filter, 20 dB ERLE: residual is 1 % of the capture.
        run(&mut detector, input(0.04, 0.01, 0.0001, 100.0), 20);
        assert_eq!(detector.state(), DoubleTalkState::FarEndOnly);
        // Near-end too quiet for the energy test but well above the
        // residual the filter explains.
        let state = run(&mut detector, input(0.04, 0.012, 0.002, 100.0), 5);
        assert_eq!(state, DoubleTalkState::DoubleTalk);
    }

    #[test]
    fn stale_filter_is_not_mistaken_for_nearend() {
        let mut detector = DoubleTalkDetector::new(&AecConfig::default());
        run(&mut detector, input(0.04, 0.01, 0.0001, 100.0), 20);
        // Echo path changed: the old taps now add energy instead of
        // removing it.
        let state = run(&mut detector, input(0.04, 0.01, 0.03, 100.0), 5);
        assert_eq!(state, DoubleTalkState::FarEndOnly);
    }

    #[test]
    fn residual_test_alone_cannot_hold_double_talk_forever() {
        let mut detector = DoubleTalkDetector::new(&AecConfig::default());
        run(&mut detector, input(0.04, 0.01, 0.0001, 100.0), 20);
        // Echo grew: the filter removes only part of it, and the stale
        // ERLE says the remainder must be near-end.
        let mut far_end_frames = 0;
        for _ in 0..400 {
            if detector.update(&input(0.04, 0.01, 0.003, 100.0)) == DoubleTalkState::FarEndOnly {
                far_end_frames += 1;
            }
        }
        assert!(far_end_frames > 50, "{far_end_frames}");
    }

    #[test]
    fn render_offset_does_not_pull_the_gain_down() {
        let mut detector = DoubleTalkDetector::new(&AecConfig::default());
        run(&mut detector, input(0.04, 0.01, 0.01, 1.0), 20);
        let settled = detector.echo_path_gain();

        // Render stopped: the older partitions keep the peak up while the
        // echo fades out of the capture.
        for capture in [0.005, 0.002, 0.0005, 0.0001] {
            let frame = DetectorInput {
                direct_render_power: 0.0,
                ..input(0.04, capture, capture, 1.0)
            };
            assert_eq!(detector.update(&frame), DoubleTalkState::FarEndOnly);
        }
        assert_eq!(detector.echo_path_gain(), settled);

        // Render resumes with the same echo path.
        let state = run(&mut detector, input(0.04, 0.01, 0.01, 1.0), 5);
        assert_eq!(state, DoubleTalkState::FarEndOnly);
    }

    #[test]
    fn hangover_holds_detection() {
        let config = AecConfig::default();
        let mut detector = DoubleTalkDetector::new(&config);
        run(&mut detector, input(0.04, 0.01, 0.01, 1.0), 20);
        detector.update(&input(0.04, 1.0, 1.0, 1.0));
        // Capture goes quiet below the activity limit: only the hangover
        // keeps the flag.
        for _ in 0..config.double_talk.hangover_frames {
            assert_eq!(
                detector.update(&input(0.04, 0.0, 0.0, 1.0)),
                DoubleTalkState::DoubleTalk
            );
        }
        assert_eq!(
            detector.update(&input(0.04, 0.0, 0.0, 1.0)),
            DoubleTalkState::FarEndOnly
        );
    }

    #[test]
    fn echo_path_gain_creeps_up_during_double_talk_and_resets() {
        let config = AecConfig::default();
        let mut detector = DoubleTalkDetector::new(&config);
        run(&mut detector, input(0.01, 0.5, 0.5, 1.0), 100);
        assert!(detector.echo_path_gain() > 2.0);
        assert!(detector.echo_path_gain() <= config.double_talk.max_echo_path_gain);
        detector.handle_level_change();
        assert_eq!(detector.echo_path_gain(), 1.0);
    }
}
