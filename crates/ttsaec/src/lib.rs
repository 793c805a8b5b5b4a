#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod config;
mod echo_canceller;
mod error;
mod frame;
mod high_pass_filter;
mod session;
mod stats;

pub use config::Config;
pub use echo_canceller::EchoCanceller;
pub use error::Error;
pub use frame::{is_valid_frame_size, is_valid_sample_rate};
pub use session::Session;
pub use stats::Statistics;
pub use ttsaec_engine::config as tuning;
pub use ttsaec_engine::{AecConfig, DoubleTalkState};

/// The only sample rate the canceller accepts.
pub const REQUIRED_SAMPLE_RATE: u32 = 48_000;

/// Samples per frame: 10 ms at [`REQUIRED_SAMPLE_RATE`].
pub const REQUIRED_FRAME_SIZE: usize = ttsaec_engine::common::FRAME_SIZE;

/// Render-to-capture delay assumed until one is set or detected.
pub const DEFAULT_STREAM_DELAY_MS: i32 = 100;
