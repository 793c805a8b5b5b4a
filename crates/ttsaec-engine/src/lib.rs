#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod adaptive_filter;
mod aec_fft;
mod comfort_noise_generator;
pub mod common;
pub mod config;
mod decimator;
mod delay_estimator;
mod double_talk_detector;
mod echo_remover;
mod echo_remover_metrics;
pub mod fft_data;
mod filter_update_gain;
mod reference_history;
mod subband_erle_estimator;
mod subtractor;
mod suppression_filter;
mod suppression_gain;
mod synchronizer;

pub use config::AecConfig;
pub use delay_estimator::DelayEstimate;
pub use double_talk_detector::DoubleTalkState;
pub use echo_remover::{EchoRemover, EchoRemoverStats};
pub use fft_data::FftData;
