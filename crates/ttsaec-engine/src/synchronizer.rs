//! Alignment of render history with capture frames.
//!
//! Capture frames are timed against the most recently pushed render frame.
//! The current delay is turned into a whole-frame alignment; partition `p` of
//! the adaptive filter sees the render frame `alignment + p` frames older than
//! the newest one.

use crate::aec_fft::AecFft;
use crate::common::{FRAME_SIZE, ms_to_samples};
use crate::config::AecConfig;
use crate::fft_data::FftData;
use crate::reference_history::ReferenceHistory;

/// Render partitions lined up with the current capture frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Alignment {
    /// The partition carrying the direct path was unavailable. Its echo
    /// estimate must not be used and the filter must not adapt.
    pub(crate) underrun: bool,
    /// Largest render frame power over the aligned partitions.
    pub(crate) render_peak_power: f32,
    /// Smallest render frame power over the two partitions whose samples
    /// reach the current capture frame without reverberation. Zero around
    /// render onsets and offsets.
    pub(crate) direct_render_power: f32,
}

#[derive(Debug)]
pub(crate) struct Synchronizer {
    history: ReferenceHistory,
    num_partitions: usize,
    headroom_samples: usize,
    max_alignment_blocks: usize,
    alignment_blocks: usize,
    renders_since_capture: usize,
}

impl Synchronizer {
    pub(crate) fn new(config: &AecConfig, delay_samples: usize) -> Self {
        let max_alignment_blocks = ms_to_samples(config.delay.max_delay_ms) / FRAME_SIZE;
        let num_partitions = config.filter.length_blocks;
        let mut synchronizer = Self {
            history: ReferenceHistory::new(max_alignment_blocks + num_partitions + 2),
            num_partitions,
            headroom_samples: config.delay.headroom_samples,
            max_alignment_blocks,
            alignment_blocks: 0,
            renders_since_capture: 0,
        };
        synchronizer.alignment_blocks = synchronizer.alignment_for(delay_samples);
        synchronizer
    }

    fn alignment_for(&self, delay_samples: usize) -> usize {
        (delay_samples.saturating_sub(self.headroom_samples) / FRAME_SIZE)
            .min(self.max_alignment_blocks)
    }

    /// Appends a render frame to the history.
    pub(crate) fn push_reference(&mut self, frame: &[f32], fft: &mut AecFft) {
        self.history.push(frame, fft);
        self.renders_since_capture += 1;
    }

    /// Called once per capture frame before [`aligned`](Self::aligned).
    ///
    /// If no render frame arrived since the previous capture, a zero-filled
    /// placeholder keeps the history in step with the capture clock. Returns
    /// `true` in that case.
    pub(crate) fn prepare_capture(&mut self) -> bool {
        let missing = self.renders_since_capture == 0;
        if missing {
            self.history.push_missing();
        }
        self.renders_since_capture = 0;
        missing
    }

    /// Applies a new delay. Returns the change in alignment, in frames, when
    /// the alignment moved.
    pub(crate) fn set_delay(&mut self, delay_samples: usize) -> Option<isize> {
        let alignment = self.alignment_for(delay_samples);
        if alignment == self.alignment_blocks {
            return None;
        }
        let shift = alignment as isize - self.alignment_blocks as isize;
        self.alignment_blocks = alignment;
        Some(shift)
    }

    pub(crate) fn alignment_blocks(&self) -> usize {
        self.alignment_blocks
    }

    /// Copies the aligned render spectra into `partitions`, zero-filling any
    /// that are not available.
    pub(crate) fn aligned(&self, partitions: &mut [FftData]) -> Alignment {
        debug_assert_eq!(partitions.len(), self.num_partitions);
        let mut alignment = Alignment {
            underrun: false,
            render_peak_power: 0.0,
            direct_render_power: self.direct_power(),
        };
        for (p, partition) in partitions.iter_mut().enumerate() {
            match self.history.get(self.alignment_blocks + p) {
                Some(slot) => {
                    partition.assign(&slot.spectrum);
                    alignment.render_peak_power = alignment.render_peak_power.max(slot.power);
                }
                None => {
                    partition.clear();
                    if p == 0 {
                        alignment.underrun = true;
                    }
                }
            }
        }
        alignment
    }

    fn direct_power(&self) -> f32 {
        (0..2)
            .map(|p| {
                self.history
                    .get(self.alignment_blocks + p)
                    .map_or(0.0, |slot| slot.power)
            })
            .fold(f32::INFINITY, f32::min)
    }

    /// Forgets all render frames, keeping the alignment for `delay_samples`.
    pub(crate) fn reset(&mut self, delay_samples: usize) {
        self.history.clear();
        self.renders_since_capture = 0;
        self.alignment_blocks = self.alignment_for(delay_samples);
    }
}
