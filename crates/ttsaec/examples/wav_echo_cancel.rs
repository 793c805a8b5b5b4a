//! Remove TTS echo from a recorded microphone WAV file.
//!
//! Takes the TTS audio that was played (`--render`) and the microphone
//! recording made at the same time (`--capture`), both mono 48 kHz, and
//! writes the echo-cancelled capture.
//!
//! ```sh
//! cargo run -p ttsaec --features examples --example wav_echo_cancel -- \
//!     --render tts.wav --capture mic.wav --output clean.wav --delay-ms 80
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing_subscriber::EnvFilter;
use ttsaec::{Config, REQUIRED_FRAME_SIZE, REQUIRED_SAMPLE_RATE, Session};
use ttsaec_common_audio::audio_util::{float_to_s16, s16_to_float};

#[derive(Parser, Debug)]
#[command(about = "Cancel TTS echo in a microphone recording")]
struct Args {
    /// WAV file with the audio sent to the loudspeaker.
    #[arg(long)]
    render: PathBuf,

    /// WAV file recorded by the microphone.
    #[arg(long)]
    capture: PathBuf,

    /// Path for the echo-cancelled output (16-bit PCM).
    #[arg(long, default_value = "clean.wav")]
    output: PathBuf,

    /// Initial render-to-capture delay in milliseconds.
    #[arg(long, default_value_t = ttsaec::DEFAULT_STREAM_DELAY_MS)]
    delay_ms: i32,

    /// Use the reduced-cost tuning.
    #[arg(long)]
    mobile: bool,

    /// Skip the capture high-pass filter.
    #[arg(long)]
    no_high_pass: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let render = read_mono(&args.render)?;
    let capture = read_mono(&args.capture)?;

    let mut session = Session::new(Config {
        mobile_mode: args.mobile,
        stream_delay_ms: args.delay_ms,
        high_pass_filter: !args.no_high_pass,
        ..Config::default()
    })?;

    let spec = WavSpec {
        channels: 1,
        sample_rate: REQUIRED_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&args.output, spec)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let silence = [0.0f32; REQUIRED_FRAME_SIZE];
    let mut out = [0.0f32; REQUIRED_FRAME_SIZE];
    let frames = capture.len() / REQUIRED_FRAME_SIZE;
    for (f, capture_frame) in capture.chunks_exact(REQUIRED_FRAME_SIZE).enumerate() {
        let start = f * REQUIRED_FRAME_SIZE;
        let render_frame = render
            .get(start..start + REQUIRED_FRAME_SIZE)
            .unwrap_or(&silence);
        session.analyze_render(render_frame)?;
        session.process_capture(capture_frame, &mut out, false)?;
        for &v in &out {
            writer.write_sample(float_to_s16(v))?;
        }
    }
    writer.finalize()?;

    let stats = session.statistics();
    println!(
        "{frames} frames, ERLE {:.1} dB, delay {} ms",
        session.erle_db(),
        session.detected_delay_ms()
    );
    println!("{stats:#?}");
    Ok(())
}

fn read_mono(path: &Path) -> Result<Vec<f32>> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.sample_rate != REQUIRED_SAMPLE_RATE {
        bail!(
            "{}: need mono {REQUIRED_SAMPLE_RATE} Hz, got {} channels at {} Hz",
            path.display(),
            spec.channels,
            spec.sample_rate
        );
    }
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(s16_to_float))
            .collect::<Result<Vec<_>, _>>()?,
        (format, bits) => bail!("{}: unsupported {bits}-bit {format:?} samples", path.display()),
    };
    Ok(samples)
}
