#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ttsaec::{Config, REQUIRED_FRAME_SIZE, Session};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    mobile_mode: bool,
    high_pass_filter: bool,
    stream_delay_ms: i16,
    /// Per frame: whether render is fed first and whether the level changed.
    frames: Vec<(bool, bool)>,
    /// Raw samples, NaN and out-of-range values included.
    samples: Vec<f32>,
}

fuzz_target!(|input: FuzzInput| {
    if input.samples.len() < 2 * REQUIRED_FRAME_SIZE {
        return;
    }
    let config = Config {
        mobile_mode: input.mobile_mode,
        high_pass_filter: input.high_pass_filter,
        stream_delay_ms: i32::from(input.stream_delay_ms),
        ..Config::default()
    };
    let Ok(mut session) = Session::new(config) else {
        return;
    };

    let chunks: Vec<&[f32]> = input.samples.chunks_exact(REQUIRED_FRAME_SIZE).collect();
    let mut output = vec![0.0f32; REQUIRED_FRAME_SIZE];
    for (i, &(with_render, level_change)) in input.frames.iter().take(500).enumerate() {
        let render = chunks[i % chunks.len()];
        let capture = chunks[(i + 1) % chunks.len()];
        if with_render {
            session.analyze_render(render).unwrap();
        }
        session.process_capture(capture, &mut output, level_change).unwrap();
        assert!(output.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
    }
    assert!(session.erle_db().is_finite());
});
