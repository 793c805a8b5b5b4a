//! The binding-shaped handle: boolean results and sentinels.

use ttsaec::{
    Config, DEFAULT_STREAM_DELAY_MS, EchoCanceller, REQUIRED_FRAME_SIZE, REQUIRED_SAMPLE_RATE,
    Statistics, is_valid_frame_size, is_valid_sample_rate,
};

#[test]
fn create_accepts_only_48khz_mono() {
    let mut aec = EchoCanceller::new();
    assert!(!aec.create(44_100, 1, false));
    assert!(!aec.create(16_000, 1, true));
    assert!(!aec.create(48_000, 2, false));
    assert!(!aec.create(48_000, 0, false));
    assert!(!aec.is_created());
    assert!(aec.create(REQUIRED_SAMPLE_RATE as i32, 1, false));
    assert!(aec.is_created());
    assert_eq!(aec.get_detected_delay(), DEFAULT_STREAM_DELAY_MS);
}

#[test]
fn wrong_frame_size_returns_false() {
    let mut aec = EchoCanceller::new();
    assert!(aec.create(48_000, 1, false));
    let mut out = vec![0.0f32; REQUIRED_FRAME_SIZE];
    assert!(!aec.analyze_render(&[0.0; 240]));
    assert!(!aec.process_capture(&[0.0; 960], &mut out, false));
    assert!(!aec.process_capture(&[0.0; REQUIRED_FRAME_SIZE], &mut [0.0; 479], false));
    assert_eq!(aec.statistics().frames_processed, Some(0));
    assert_eq!(aec.statistics().render_frames, Some(0));
}

#[test]
fn after_destroy_everything_fails_or_returns_sentinels() {
    let mut aec = EchoCanceller::new();
    assert!(aec.create(48_000, 1, true));
    let frame = [0.1f32; REQUIRED_FRAME_SIZE];
    let mut out = [0.0f32; REQUIRED_FRAME_SIZE];
    for _ in 0..10 {
        assert!(aec.analyze_render(&frame));
        assert!(aec.process_capture(&frame, &mut out, false));
    }
    aec.set_stream_delay(40);
    assert_eq!(aec.get_detected_delay(), 40);

    aec.destroy();
    assert!(!aec.is_created());
    assert!(!aec.analyze_render(&frame));
    out.fill(0.25);
    assert!(!aec.process_capture(&frame, &mut out, false));
    assert_eq!(out, [0.25; REQUIRED_FRAME_SIZE]);
    assert_eq!(aec.get_erle(), 0.0);
    assert_eq!(aec.get_detected_delay(), 0);
    assert_eq!(aec.statistics(), Statistics::default());
    aec.set_stream_delay(10);
    aec.reset();
    assert!(!aec.is_created());
}

#[test]
fn create_with_config_applies_the_stream_delay() {
    let mut aec = EchoCanceller::new();
    assert!(aec.create_with_config(Config {
        stream_delay_ms: 180,
        ..Config::default()
    }));
    assert_eq!(aec.get_detected_delay(), 180);
    aec.reset();
    assert_eq!(aec.get_detected_delay(), 180);
}

#[test]
fn validation_helpers_match_the_constants() {
    assert!(is_valid_sample_rate(48_000));
    assert!(!is_valid_sample_rate(44_100));
    assert!(is_valid_frame_size(REQUIRED_FRAME_SIZE));
    assert!(!is_valid_frame_size(REQUIRED_FRAME_SIZE + 1));
}
