use std::{error, fmt};

use crate::REQUIRED_SAMPLE_RATE;

/// Errors returned by [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The sample rate is not [`REQUIRED_SAMPLE_RATE`].
    BadSampleRate { sample_rate_hz: i32 },
    /// Only mono streams are supported.
    BadNumberChannels { num_channels: i32 },
    /// A frame did not hold exactly [`REQUIRED_FRAME_SIZE`](crate::REQUIRED_FRAME_SIZE)
    /// samples.
    BadFrameSize { expected: usize, actual: usize },
    /// The canceller was used before `create` or after `destroy`.
    NotInitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BadSampleRate { sample_rate_hz } => write!(
                f,
                "unsupported sample rate {sample_rate_hz}; expected {REQUIRED_SAMPLE_RATE}",
            ),
            Self::BadNumberChannels { num_channels } => {
                write!(f, "unsupported channel count {num_channels}; expected 1")
            }
            Self::BadFrameSize { expected, actual } => {
                write!(f, "frame has {actual} samples; expected {expected}")
            }
            Self::NotInitialized => write!(f, "echo canceller is not initialized"),
        }
    }
}

impl error::Error for Error {}
