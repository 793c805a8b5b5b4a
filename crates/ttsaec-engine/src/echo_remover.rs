//! The echo canceller pipeline for one mono 48 kHz stream.
//!
//! Render frames go into the synchronizer and the delay estimator. Each
//! capture frame then runs through delay tracking, alignment, linear echo
//! subtraction, double-talk classification, filter adaptation and residual
//! echo suppression with comfort noise, in that order.

use ttsaec_common_audio::audio_util::{clamp_to_unit, power, power_to_dbfs, sanitize};

use crate::aec_fft::AecFft;
use crate::comfort_noise_generator::ComfortNoiseGenerator;
use crate::common::{FRAME_SIZE, is_saturated, ms_to_samples};
use crate::config::AecConfig;
use crate::delay_estimator::{DelayEstimate, DelayEstimator};
use crate::double_talk_detector::{DetectorInput, DoubleTalkDetector, DoubleTalkState};
use crate::echo_remover_metrics::EchoRemoverMetrics;
use crate::fft_data::FftData;
use crate::subband_erle_estimator::SubbandErleEstimator;
use crate::subtractor::Subtractor;
use crate::suppression_filter::SuppressionFilter;
use crate::suppression_gain::SuppressionGain;
use crate::synchronizer::Synchronizer;

/// Snapshot of the canceller's internal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoRemoverStats {
    /// Smoothed echo return loss enhancement of the whole canceller, in dB.
    pub erle_db: Option<f32>,
    /// Smoothed ERLE of the linear filter alone, in dB.
    pub linear_erle_db: Option<f32>,
    /// Current delay estimate.
    pub delay: DelayEstimate,
    /// Tracked capture-to-render power ratio of the echo path, in dB.
    pub echo_path_gain_db: f32,
    /// Classification of the last capture frame.
    pub double_talk: DoubleTalkState,
    /// Sub-bands reset after the adaptive filter diverged.
    pub filter_divergence_resets: u64,
    /// Capture frames processed without the direct-path render frame.
    pub buffer_underruns: u64,
    /// Capture frames processed.
    pub frames_processed: u64,
    /// Render frames analysed.
    pub render_frames: u64,
    /// Non-finite input samples replaced by zero.
    pub non_finite_samples: u64,
    /// Mean-square power of the last linear echo estimate.
    pub echo_estimate_power: f32,
}

/// Removes the echo of a render stream from a capture stream.
///
/// Both streams are fed in 480-sample frames; every capture frame produces
/// one output frame, delayed by one frame.
#[derive(derive_more::Debug)]
pub struct EchoRemover {
    config: AecConfig,
    stream_delay_samples: usize,
    fft: AecFft,
    synchronizer: Synchronizer,
    delay_estimator: DelayEstimator,
    subtractor: Subtractor,
    detector: DoubleTalkDetector,
    erle_estimator: SubbandErleEstimator,
    suppression_gain: SuppressionGain,
    suppression_filter: SuppressionFilter,
    comfort_noise: ComfortNoiseGenerator,
    metrics: EchoRemoverMetrics,
    #[debug(skip)]
    aligned: Vec<FftData>,
    #[debug(skip)]
    render: [f32; FRAME_SIZE],
    #[debug(skip)]
    capture: [f32; FRAME_SIZE],
    #[debug(skip)]
    noise: FftData,
}

impl EchoRemover {
    /// Creates a canceller assuming an initial render-to-capture delay of
    /// `stream_delay_ms`. Out-of-range tuning in `config` is clamped.
    pub fn new(mut config: AecConfig, stream_delay_ms: usize) -> Self {
        if !config.validate() {
            tracing::warn!("echo canceller config out of range, clamped");
        }
        let stream_delay_samples = ms_to_samples(stream_delay_ms.min(config.delay.max_delay_ms));
        Self {
            fft: AecFft::new(),
            synchronizer: Synchronizer::new(&config, stream_delay_samples),
            delay_estimator: DelayEstimator::new(&config, stream_delay_samples),
            subtractor: Subtractor::new(&config),
            detector: DoubleTalkDetector::new(&config),
            erle_estimator: SubbandErleEstimator::new(&config),
            suppression_gain: SuppressionGain::new(&config),
            suppression_filter: SuppressionFilter::new(),
            comfort_noise: ComfortNoiseGenerator::new(&config),
            metrics: EchoRemoverMetrics::default(),
            aligned: vec![FftData::default(); config.filter.length_blocks],
            render: [0.0; FRAME_SIZE],
            capture: [0.0; FRAME_SIZE],
            noise: FftData::default(),
            stream_delay_samples,
            config,
        }
    }

    /// The validated tuning in use.
    pub fn config(&self) -> &AecConfig {
        &self.config
    }

    /// Replaces the delay estimate with `delay_ms`. The estimator keeps
    /// refining from there, and [`reset`](Self::reset) returns to it.
    pub fn set_stream_delay(&mut self, delay_ms: usize) {
        let delay_samples = ms_to_samples(delay_ms.min(self.config.delay.max_delay_ms));
        self.stream_delay_samples = delay_samples;
        self.delay_estimator.set_seed(delay_samples);
        self.apply_delay(delay_samples);
    }

    fn apply_delay(&mut self, delay_samples: usize) {
        if let Some(shift) = self.synchronizer.set_delay(delay_samples) {
            self.subtractor.shift(shift);
            tracing::debug!(
                shift,
                alignment_blocks = self.synchronizer.alignment_blocks(),
                "render alignment moved"
            );
        }
    }

    /// Feeds one render frame of [`FRAME_SIZE`] samples.
    pub fn analyze_render(&mut self, render: &[f32]) {
        debug_assert_eq!(render.len(), FRAME_SIZE);
        self.render.copy_from_slice(render);
        let replaced = sanitize(&mut self.render);
        self.metrics.non_finite_samples += replaced as u64;

        self.synchronizer.push_reference(&self.render, &mut self.fft);
        self.delay_estimator.push_render(&self.render);
        self.metrics.render_frames += 1;
    }

    /// Removes echo from one capture frame of [`FRAME_SIZE`] samples and
    /// writes the result to `output`. `level_change` signals that the
    /// capture gain changed abruptly just before this frame.
    pub fn process_capture(&mut self, capture: &[f32], output: &mut [f32], level_change: bool) {
        debug_assert_eq!(capture.len(), FRAME_SIZE);
        debug_assert_eq!(output.len(), FRAME_SIZE);
        self.capture.copy_from_slice(capture);
        let replaced = sanitize(&mut self.capture);
        self.metrics.non_finite_samples += replaced as u64;
        let saturated = is_saturated(&self.capture);
        let capture_power = power(&self.capture);

        if level_change {
            self.subtractor.handle_level_change();
            self.detector.handle_level_change();
            self.suppression_gain.handle_level_change();
            self.erle_estimator.reset();
            self.metrics.handle_level_change();
            tracing::debug!("capture level change");
        }

        let render_missing = self.synchronizer.prepare_capture();
        if render_missing {
            self.delay_estimator.push_render_silence();
        }
        if let Some(delay_samples) = self.delay_estimator.update(&self.capture, !render_missing) {
            tracing::debug!(
                delay_ms = self.delay_estimator.estimate().delay_ms(),
                "delay estimate changed"
            );
            self.apply_delay(delay_samples);
        }

        let alignment = self.synchronizer.aligned(&mut self.aligned);
        if alignment.underrun {
            self.metrics.buffer_underruns += 1;
            tracing::trace!("render underrun, echo estimate skipped");
        }

        self.subtractor
            .process(&self.aligned, &self.capture, alignment.underrun, &mut self.fft);

        let state = self.detector.update(&DetectorInput {
            render_peak_power: alignment.render_peak_power,
            direct_render_power: alignment.direct_render_power,
            capture_power,
            residual_power: self.subtractor.error_power(),
            linear_erle: self.metrics.linear_erle(),
        });
        let far_end_only = state == DoubleTalkState::FarEndOnly && !alignment.underrun;

        if far_end_only && !saturated {
            self.subtractor.adapt(&self.aligned, &mut self.fft);
        }
        self.metrics.update_linear(
            far_end_only && self.detector.capture_active(),
            capture_power,
            self.subtractor.error_power(),
        );

        self.suppression_filter.analyze(
            self.subtractor.error(),
            &self.capture,
            self.subtractor.echo_estimate(),
            &mut self.fft,
        );
        let spectra = self.suppression_filter.spectra();
        if far_end_only {
            self.erle_estimator.update(spectra.y2, spectra.e2);
        }
        self.suppression_gain
            .compute(spectra, self.erle_estimator.erle());

        let noise_only = matches!(state, DoubleTalkState::Silence | DoubleTalkState::NearEndOnly);
        self.comfort_noise.compute(
            noise_only && !saturated,
            self.suppression_gain.residual_spectrum(),
            &mut self.noise,
        );

        self.suppression_filter.synthesize(
            self.suppression_gain.gain(),
            self.suppression_gain.use_capture(),
            &self.noise,
            &mut self.fft,
            output,
        );
        clamp_to_unit(output);

        self.metrics.update(
            state == DoubleTalkState::FarEndOnly && self.detector.capture_active(),
            capture_power,
            power(output),
        );
        self.subtractor.tick();
        self.suppression_gain.tick();
    }

    /// Smoothed ERLE in dB; 0 until measured.
    pub fn erle_db(&self) -> f32 {
        self.metrics.erle_db().unwrap_or(0.0)
    }

    pub fn delay_estimate(&self) -> DelayEstimate {
        self.delay_estimator.estimate()
    }

    pub fn stats(&self) -> EchoRemoverStats {
        EchoRemoverStats {
            erle_db: self.metrics.erle_db(),
            linear_erle_db: self.metrics.linear_erle_db(),
            delay: self.delay_estimator.estimate(),
            echo_path_gain_db: power_to_dbfs(self.detector.echo_path_gain()),
            double_talk: self.detector.state(),
            filter_divergence_resets: self.subtractor.divergence_resets(),
            buffer_underruns: self.metrics.buffer_underruns,
            frames_processed: self.metrics.frames_processed,
            render_frames: self.metrics.render_frames,
            non_finite_samples: self.metrics.non_finite_samples,
            echo_estimate_power: self.subtractor.echo_estimate_power(),
        }
    }

    /// Transfer functions of the adaptive filter partitions.
    pub fn filter_partitions(&self) -> &[FftData] {
        self.subtractor.filter().partitions()
    }

    /// Forgets all adaptive state and returns to the last stream delay.
    /// Tuning and stream delay are kept, nothing is reallocated.
    pub fn reset(&mut self) {
        self.synchronizer.reset(self.stream_delay_samples);
        self.delay_estimator.reset();
        self.subtractor.reset();
        self.detector.reset();
        self.erle_estimator.reset();
        self.suppression_gain.reset();
        self.suppression_filter.reset();
        self.comfort_noise.reset();
        self.metrics.reset();
        for x in &mut self.aligned {
            x.clear();
        }
    }
}
