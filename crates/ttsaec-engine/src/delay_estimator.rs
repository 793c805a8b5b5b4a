//! Render-to-capture delay estimation.
//!
//! Both streams are decimated and kept in sliding windows. Every few capture
//! frames the capture window is cross-correlated with the render history over
//! all candidate lags using one FFT per signal, and each lag is normalized by
//! the energies of the two segments. A lag replaces the current estimate only
//! when its normalized correlation clears the confidence threshold and the
//! same lag wins on consecutive estimates; otherwise the previous estimate is
//! held. Moving the delay takes more agreeing estimates than confirming it,
//! so lags that trade places on a reverberant tail do not re-align the
//! filter back and forth.

use ttsaec_common_audio::audio_util::dbfs_to_power;
use ttsaec_fft::RealFft;

use crate::common::{FRAME_SIZE, ms_to_samples};
use crate::config::AecConfig;
use crate::decimator::Decimator;

const SILENT_FRAME: [f32; FRAME_SIZE] = [0.0; FRAME_SIZE];

/// Current delay between render and capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEstimate {
    /// Delay in samples at 48 kHz.
    pub delay_samples: usize,
    /// Normalized correlation of the lag that produced the estimate; zero
    /// while the estimate is still the seed.
    pub confidence: f32,
    /// Capture frames since the delay last changed.
    pub blocks_since_last_change: usize,
    /// Capture frames since an estimate last confirmed or changed the delay.
    pub blocks_since_last_update: usize,
}

impl DelayEstimate {
    fn seeded(delay_samples: usize) -> Self {
        Self {
            delay_samples,
            confidence: 0.0,
            blocks_since_last_change: 0,
            blocks_since_last_update: 0,
        }
    }

    /// Delay rounded to milliseconds.
    pub fn delay_ms(&self) -> usize {
        (self.delay_samples + 24) / 48
    }
}

#[derive(derive_more::Debug)]
pub(crate) struct DelayEstimator {
    down_sampling_factor: usize,
    max_lag: usize,
    estimation_interval_frames: usize,
    warmup_frames: usize,
    confidence_threshold: f32,
    required_confirmations: usize,
    change_confirmations: usize,
    candidate_tolerance: usize,
    render_activity_limit: f32,
    capture_activity_limit: f32,

    render_decimator: Decimator,
    capture_decimator: Decimator,
    #[debug(skip)]
    render_window: Vec<f32>,
    #[debug(skip)]
    capture_window: Vec<f32>,
    #[debug(skip)]
    decimated: Vec<f32>,

    fft: RealFft,
    #[debug(skip)]
    time: Vec<f32>,
    #[debug(skip)]
    render_re: Vec<f32>,
    #[debug(skip)]
    render_im: Vec<f32>,
    #[debug(skip)]
    capture_re: Vec<f32>,
    #[debug(skip)]
    capture_im: Vec<f32>,
    #[debug(skip)]
    render_energy: Vec<f64>,

    seed_samples: usize,
    estimate: DelayEstimate,
    candidate: Option<(usize, usize)>,
    num_capture_frames: usize,
    frames_since_estimate: usize,
}

impl DelayEstimator {
    pub(crate) fn new(config: &AecConfig, seed_samples: usize) -> Self {
        let factor = config.delay.down_sampling_factor;
        let decimator = Decimator::new(factor);
        let frame_len = decimator.output_len();
        let max_lag = ms_to_samples(config.delay.max_delay_ms) / factor;
        let window = ms_to_samples(config.delay.correlation_window_ms) / factor;
        let history = max_lag + window;
        let fft = RealFft::new(history.next_power_of_two());
        let num_bins = fft.num_bins();

        Self {
            down_sampling_factor: factor,
            max_lag,
            estimation_interval_frames: config.delay.estimation_interval_frames,
            warmup_frames: window.div_ceil(frame_len),
            confidence_threshold: config.delay.confidence_threshold,
            required_confirmations: config.delay.required_confirmations,
            change_confirmations: config.delay.change_confirmations,
            candidate_tolerance: config.delay.candidate_tolerance,
            render_activity_limit: dbfs_to_power(config.render_levels.active_render_limit_dbfs),
            capture_activity_limit: dbfs_to_power(config.render_levels.active_capture_limit_dbfs),
            render_decimator: Decimator::new(factor),
            capture_decimator: decimator,
            render_window: vec![0.0; history],
            capture_window: vec![0.0; window],
            decimated: vec![0.0; frame_len],
            time: vec![0.0; fft.len()],
            render_re: vec![0.0; num_bins],
            render_im: vec![0.0; num_bins],
            capture_re: vec![0.0; num_bins],
            capture_im: vec![0.0; num_bins],
            render_energy: vec![0.0; history + 1],
            fft,
            seed_samples,
            estimate: DelayEstimate::seeded(seed_samples),
            candidate: None,
            num_capture_frames: 0,
            frames_since_estimate: 0,
        }
    }

    pub(crate) fn estimate(&self) -> DelayEstimate {
        self.estimate
    }

    /// Replaces the current estimate with a caller-supplied delay.
    pub(crate) fn set_seed(&mut self, delay_samples: usize) {
        self.seed_samples = delay_samples;
        self.estimate = DelayEstimate::seeded(delay_samples);
        self.candidate = None;
    }

    pub(crate) fn push_render(&mut self, frame: &[f32]) {
        self.render_decimator.decimate(frame, &mut self.decimated);
        slide(&mut self.render_window, &self.decimated);
    }

    /// Advances the render window by a frame of silence.
    pub(crate) fn push_render_silence(&mut self) {
        self.push_render(&SILENT_FRAME);
    }

    /// Feeds one capture frame. Runs an estimate when one is due and
    /// `allow_estimation` is set. Returns the new delay when it changed.
    pub(crate) fn update(&mut self, capture: &[f32], allow_estimation: bool) -> Option<usize> {
        self.capture_decimator.decimate(capture, &mut self.decimated);
        slide(&mut self.capture_window, &self.decimated);
        self.num_capture_frames = self.num_capture_frames.saturating_add(1);
        self.frames_since_estimate = self.frames_since_estimate.saturating_add(1);
        self.estimate.blocks_since_last_change =
            self.estimate.blocks_since_last_change.saturating_add(1);
        self.estimate.blocks_since_last_update =
            self.estimate.blocks_since_last_update.saturating_add(1);

        if !allow_estimation
            || self.frames_since_estimate < self.estimation_interval_frames
            || self.num_capture_frames < self.warmup_frames
        {
            return None;
        }
        self.frames_since_estimate = 0;

        let Some((lag, confidence)) = self.correlate() else {
            self.candidate = None;
            return None;
        };
        self.accept(lag, confidence)
    }

    /// Applies the confirmation rules to one correlation result. Agreeing
    /// with the current delay needs `required_confirmations` consecutive
    /// estimates, moving away from it needs `change_confirmations`.
    fn accept(&mut self, lag: usize, confidence: f32) -> Option<usize> {
        if confidence < self.confidence_threshold {
            self.candidate = None;
            return None;
        }

        let confirmations = match self.candidate {
            Some((previous, count)) if previous.abs_diff(lag) <= self.candidate_tolerance => {
                count + 1
            }
            _ => 1,
        };
        self.candidate = Some((lag, confirmations));

        let delay_samples = lag * self.down_sampling_factor;
        let tolerance = self.candidate_tolerance * self.down_sampling_factor;
        if delay_samples.abs_diff(self.estimate.delay_samples) <= tolerance {
            if confirmations >= self.required_confirmations {
                self.estimate.confidence = confidence;
                self.estimate.blocks_since_last_update = 0;
            }
            return None;
        }
        if confirmations < self.change_confirmations {
            return None;
        }

        self.estimate.delay_samples = delay_samples;
        self.estimate.confidence = confidence;
        self.estimate.blocks_since_last_update = 0;
        self.estimate.blocks_since_last_change = 0;
        Some(delay_samples)
    }

    /// Best lag (in decimated samples) and its normalized correlation, or
    /// `None` if either window is inactive.
    fn correlate(&mut self) -> Option<(usize, f32)> {
        let window = self.capture_window.len();
        let history = self.render_window.len();

        let capture_energy: f32 = self.capture_window.iter().map(|v| v * v).sum();
        if capture_energy / (window as f32) < self.capture_activity_limit {
            return None;
        }

        self.time[..history].copy_from_slice(&self.render_window);
        self.time[history..].fill(0.0);
        self.fft
            .forward(&self.time, &mut self.render_re, &mut self.render_im);
        self.time[..window].copy_from_slice(&self.capture_window);
        self.time[window..].fill(0.0);
        self.fft
            .forward(&self.time, &mut self.capture_re, &mut self.capture_im);

        // conj(Y) * X, written over the render spectrum.
        for k in 0..self.render_re.len() {
            let (xr, xi) = (self.render_re[k], self.render_im[k]);
            let (yr, yi) = (self.capture_re[k], self.capture_im[k]);
            self.render_re[k] = yr * xr + yi * xi;
            self.render_im[k] = yr * xi - yi * xr;
        }
        self.fft
            .inverse(&self.render_re, &self.render_im, &mut self.time);

        self.render_energy[0] = 0.0;
        for (i, &v) in self.render_window.iter().enumerate() {
            self.render_energy[i + 1] = self.render_energy[i] + f64::from(v * v);
        }

        let scale = 1.0 / self.time.len() as f32;
        let min_render_energy = self.render_activity_limit * window as f32;
        let mut best: Option<(usize, f32)> = None;
        for m in 0..=self.max_lag {
            let render_energy = (self.render_energy[m + window] - self.render_energy[m]) as f32;
            if render_energy < min_render_energy {
                continue;
            }
            let ncc = self.time[m] * scale / (render_energy * capture_energy).sqrt();
            if best.is_none_or(|(_, b)| ncc.abs() > b) {
                best = Some((m, ncc.abs()));
            }
        }
        best.map(|(m, confidence)| (self.max_lag - m, confidence.min(1.0)))
    }

    /// Clears both windows and returns to the seed.
    pub(crate) fn reset(&mut self) {
        self.render_decimator.reset();
        self.capture_decimator.reset();
        self.render_window.fill(0.0);
        self.capture_window.fill(0.0);
        self.estimate = DelayEstimate::seeded(self.seed_samples);
        self.candidate = None;
        self.num_capture_frames = 0;
        self.frames_since_estimate = 0;
    }
}

/// Drops the oldest `new.len()` samples of `window` and appends `new`.
fn slide(window: &mut [f32], new: &[f32]) {
    let n = new.len();
    window.copy_within(n.., 0);
    let len = window.len();
    window[len - n..].copy_from_slice(new);
}
