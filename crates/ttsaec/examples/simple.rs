//! Minimal echo cancellation demo.
//!
//! Plays a synthetic TTS-like signal into a simulated room with a 120 ms
//! echo path, cancels the echo and prints how the canceller converges.
//!
//! ```sh
//! RUST_LOG=ttsaec=debug cargo run -p ttsaec --example simple
//! ```

use std::f32::consts::PI;

use tracing_subscriber::EnvFilter;
use ttsaec::{EchoCanceller, REQUIRED_FRAME_SIZE, REQUIRED_SAMPLE_RATE};

const ECHO_DELAY_SAMPLES: usize = 120 * 48;
const ECHO_GAIN: f32 = 0.4;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut aec = EchoCanceller::new();
    assert!(aec.create(REQUIRED_SAMPLE_RATE as i32, 1, false));

    let num_frames = 300;
    let render = tts_like(num_frames * REQUIRED_FRAME_SIZE);
    let mut out = vec![0.0f32; REQUIRED_FRAME_SIZE];

    for (f, render_frame) in render.chunks_exact(REQUIRED_FRAME_SIZE).enumerate() {
        // What the microphone hears: the loudspeaker, delayed and attenuated.
        let start = f * REQUIRED_FRAME_SIZE;
        let capture: Vec<f32> = (start..start + REQUIRED_FRAME_SIZE)
            .map(|n| n.checked_sub(ECHO_DELAY_SAMPLES).map_or(0.0, |m| ECHO_GAIN * render[m]))
            .collect();

        assert!(aec.analyze_render(render_frame));
        assert!(aec.process_capture(&capture, &mut out, false));

        if f % 50 == 49 {
            println!(
                "frame {:3}: ERLE {:5.1} dB, delay {} ms",
                f + 1,
                aec.get_erle(),
                aec.get_detected_delay()
            );
        }
    }

    println!("{:#?}", aec.statistics());
    aec.destroy();
}

/// Noise shaped by a slow syllable-rate envelope, loosely like speech.
fn tts_like(len: usize) -> Vec<f32> {
    let mut seed = 0x1234_5678u32;
    (0..len)
        .map(|n| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (seed >> 8) as f32 / (1u32 << 24) as f32 - 0.5;
            let envelope = 0.5 + 0.5 * (2.0 * PI * 4.0 * n as f32 / 48_000.0).sin();
            0.6 * envelope * noise
        })
        .collect()
}
