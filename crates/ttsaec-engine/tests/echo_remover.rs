//! End-to-end behaviour of the echo remover on synthetic echo paths.

use ttsaec_engine::common::FRAME_SIZE;
use ttsaec_engine::{AecConfig, DoubleTalkState, EchoRemover, FftData};

/// Deterministic white noise in `[-gain/2, gain/2)`.
struct Noise(u32);

impl Noise {
    fn frame(&mut self, gain: f32) -> Vec<f32> {
        (0..FRAME_SIZE)
            .map(|_| {
                self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                gain * ((self.0 >> 8) as f32 / (1u32 << 24) as f32 - 0.5)
            })
            .collect()
    }
}

/// Pure delay echo path with a scalar gain.
struct EchoPath {
    line: Vec<f32>,
    delay: usize,
    gain: f32,
}

impl EchoPath {
    fn new(delay: usize, gain: f32) -> Self {
        Self {
            line: vec![0.0; delay + FRAME_SIZE],
            delay,
            gain,
        }
    }

    fn echo(&mut self, render: &[f32]) -> Vec<f32> {
        self.line.copy_within(FRAME_SIZE.., 0);
        let len = self.line.len();
        self.line[len - FRAME_SIZE..].copy_from_slice(render);
        let start = len - FRAME_SIZE - self.delay;
        self.line[start..start + FRAME_SIZE]
            .iter()
            .map(|v| self.gain * v)
            .collect()
    }
}

fn power(x: &[f32]) -> f32 {
    x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32
}

/// Runs far-end-only frames through `remover` and returns the output power
/// of the last frame.
fn converge(remover: &mut EchoRemover, path: &mut EchoPath, noise: &mut Noise, frames: usize) -> f32 {
    let mut output = vec![0.0f32; FRAME_SIZE];
    for _ in 0..frames {
        let render = noise.frame(1.0);
        let capture = path.echo(&render);
        remover.analyze_render(&render);
        remover.process_capture(&capture, &mut output, false);
    }
    power(&output)
}

#[test]
fn taps_are_frozen_during_nearend_only() {
    let mut remover = EchoRemover::new(AecConfig::default(), 100);
    let mut path = EchoPath::new(4800, 0.5);
    let mut noise = Noise(11);
    converge(&mut remover, &mut path, &mut noise, 150);
    let taps: Vec<FftData> = remover.filter_partitions().to_vec();
    assert!(taps.iter().any(|h| h != &FftData::default()));

    let mut talker = Noise(12);
    let mut output = vec![0.0f32; FRAME_SIZE];
    let silence = vec![0.0f32; FRAME_SIZE];
    for _ in 0..60 {
        let echo = path.echo(&silence);
        let nearend = talker.frame(1.6);
        let capture: Vec<f32> = echo.iter().zip(&nearend).map(|(e, n)| e + n).collect();
        remover.analyze_render(&silence);
        remover.process_capture(&capture, &mut output, false);
        assert_ne!(remover.stats().double_talk, DoubleTalkState::FarEndOnly);
    }
    assert_eq!(remover.stats().double_talk, DoubleTalkState::NearEndOnly);
    assert_eq!(remover.filter_partitions(), &taps[..]);
}

#[test]
fn taps_are_frozen_during_double_talk() {
    let mut remover = EchoRemover::new(AecConfig::default(), 100);
    let mut path = EchoPath::new(4800, 0.5);
    let mut noise = Noise(13);
    converge(&mut remover, &mut path, &mut noise, 150);
    assert_eq!(remover.stats().double_talk, DoubleTalkState::FarEndOnly);
    let taps: Vec<FftData> = remover.filter_partitions().to_vec();

    let mut talker = Noise(14);
    let mut output = vec![0.0f32; FRAME_SIZE];
    for _ in 0..60 {
        let render = noise.frame(1.0);
        let echo = path.echo(&render);
        let nearend = talker.frame(1.0);
        let capture: Vec<f32> = echo.iter().zip(&nearend).map(|(e, n)| e + n).collect();
        remover.analyze_render(&render);
        remover.process_capture(&capture, &mut output, false);
        assert_eq!(remover.stats().double_talk, DoubleTalkState::DoubleTalk);
    }
    assert_eq!(remover.filter_partitions(), &taps[..]);
}

#[test]
fn pauses_in_the_render_do_not_stall_convergence() {
    // 15 ms path, render on for 60 frames and off for 30.
    let mut remover = EchoRemover::new(AecConfig::default(), 15);
    let mut path = EchoPath::new(720, 0.5);
    let mut noise = Noise(51);
    let mut output = vec![0.0f32; FRAME_SIZE];
    let silence = vec![0.0f32; FRAME_SIZE];
    let mut double_talk_frames = 0;
    for frame in 0..200 {
        let render = if frame % 90 < 60 { noise.frame(1.0) } else { silence.clone() };
        let capture = path.echo(&render);
        remover.analyze_render(&render);
        remover.process_capture(&capture, &mut output, false);
        if remover.stats().double_talk == DoubleTalkState::DoubleTalk {
            double_talk_frames += 1;
        }
    }
    let stats = remover.stats();
    assert!(stats.echo_path_gain_db > -9.0, "{stats:?}");
    assert!(double_talk_frames < 20, "{double_talk_frames} double-talk frames");
    assert!(remover.erle_db() > 15.0, "{}", remover.erle_db());
}

#[test]
fn level_change_spike_is_bounded() {
    let mut remover = EchoRemover::new(AecConfig::default(), 100);
    let mut path = EchoPath::new(4800, 0.5);
    let mut noise = Noise(21);
    converge(&mut remover, &mut path, &mut noise, 150);
    let settled = remover.stats().echo_estimate_power;
    assert!(settled > 0.0);

    // Capture gain doubles, signalled on the first frame at the new level.
    path.gain = 1.0;
    let mut output = vec![0.0f32; FRAME_SIZE];
    let mut peak = 0.0f32;
    let mut capture_power = 0.0f32;
    for frame in 0..60 {
        let render = noise.frame(1.0);
        let capture = path.echo(&render);
        capture_power = capture_power.max(power(&capture));
        remover.analyze_render(&render);
        remover.process_capture(&capture, &mut output, frame == 0);
        assert!(output.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
        peak = peak.max(remover.stats().echo_estimate_power);
    }
    assert!(peak.is_finite());
    assert!(peak <= 2.0 * capture_power, "{peak} vs {capture_power}");
}

#[test]
fn echo_path_flip_keeps_output_finite() {
    let mut remover = EchoRemover::new(AecConfig::default(), 100);
    let mut path = EchoPath::new(4800, 0.5);
    let mut noise = Noise(31);
    converge(&mut remover, &mut path, &mut noise, 100);

    path.gain = -0.25;
    let mut output = vec![0.0f32; FRAME_SIZE];
    for _ in 0..200 {
        let render = noise.frame(1.0);
        let capture = path.echo(&render);
        remover.analyze_render(&render);
        remover.process_capture(&capture, &mut output, false);
        assert!(output.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
    }
    let stats = remover.stats();
    assert!(stats.echo_estimate_power.is_finite());
    // The filter re-learns the new path instead of staying frozen.
    assert!(stats.linear_erle_db.is_some_and(|erle| erle > 3.0), "{stats:?}");
}

#[test]
fn silence_gives_silence() {
    let mut remover = EchoRemover::new(AecConfig::default(), 100);
    let silence = vec![0.0f32; FRAME_SIZE];
    let mut output = vec![1.0f32; FRAME_SIZE];
    for _ in 0..100 {
        remover.analyze_render(&silence);
        remover.process_capture(&silence, &mut output, false);
        assert!(output.iter().all(|&v| v == 0.0));
    }
    assert_eq!(remover.stats().double_talk, DoubleTalkState::Silence);
}

#[test]
fn mobile_preset_still_cancels() {
    let mut remover = EchoRemover::new(AecConfig::mobile(), 60);
    let mut path = EchoPath::new(2880, 0.5);
    let mut noise = Noise(41);
    converge(&mut remover, &mut path, &mut noise, 200);
    assert_eq!(remover.filter_partitions().len(), 5);
    assert!(remover.erle_db() > 15.0, "{}", remover.erle_db());
}
