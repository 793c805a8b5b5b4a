use crate::error::Error;
use crate::{REQUIRED_FRAME_SIZE, REQUIRED_SAMPLE_RATE};

/// Whether `sample_rate_hz` is accepted by `create`.
pub fn is_valid_sample_rate(sample_rate_hz: i32) -> bool {
    sample_rate_hz == REQUIRED_SAMPLE_RATE as i32
}

/// Whether a frame of `len` samples is accepted.
pub fn is_valid_frame_size(len: usize) -> bool {
    len == REQUIRED_FRAME_SIZE
}

pub(crate) fn check_frame(frame: &[f32]) -> Result<(), Error> {
    if is_valid_frame_size(frame.len()) {
        Ok(())
    } else {
        Err(Error::BadFrameSize {
            expected: REQUIRED_FRAME_SIZE,
            actual: frame.len(),
        })
    }
}
