#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ttsaec::EchoCanceller;

#[derive(Debug, Arbitrary)]
enum Call {
    Create { sample_rate_hz: i32, num_channels: i32, mobile_mode: bool },
    SetStreamDelay(i32),
    AnalyzeRender { len: u16, value: f32 },
    ProcessCapture { len: u16, out_len: u16, value: f32, level_change: bool },
    GetErle,
    GetDetectedDelay,
    Reset,
    Destroy,
}

fuzz_target!(|calls: Vec<Call>| {
    let mut aec = EchoCanceller::new();
    for call in calls.into_iter().take(200) {
        match call {
            Call::Create {
                sample_rate_hz,
                num_channels,
                mobile_mode,
            } => {
                let created = aec.create(sample_rate_hz, num_channels, mobile_mode);
                assert_eq!(created, sample_rate_hz == 48_000 && num_channels == 1);
            }
            Call::SetStreamDelay(delay_ms) => aec.set_stream_delay(delay_ms),
            Call::AnalyzeRender { len, value } => {
                let frame = vec![value; usize::from(len % 1024)];
                let ok = aec.analyze_render(&frame);
                assert!(!ok || (aec.is_created() && frame.len() == 480));
            }
            Call::ProcessCapture {
                len,
                out_len,
                value,
                level_change,
            } => {
                let frame = vec![value; usize::from(len % 1024)];
                let mut out = vec![0.0f32; usize::from(out_len % 1024)];
                if aec.process_capture(&frame, &mut out, level_change) {
                    assert!(out.iter().all(|v| v.is_finite()));
                }
            }
            Call::GetErle => assert!(aec.get_erle().is_finite()),
            Call::GetDetectedDelay => assert!(aec.get_detected_delay() >= 0),
            Call::Reset => aec.reset(),
            Call::Destroy => aec.destroy(),
        }
    }
});
