//! Ring of recent render frames in the form the adaptive filter consumes.

use ttsaec_common_audio::audio_util::power;

use crate::aec_fft::AecFft;
use crate::common::FRAME_SIZE;
use crate::fft_data::FftData;

/// One stored render frame.
#[derive(Debug, Clone)]
pub(crate) struct RenderSlot {
    /// Transform of `[previous frame, this frame]`.
    pub(crate) spectrum: FftData,
    /// Mean-square power of this frame.
    pub(crate) power: f32,
    /// `false` for frames that were zero-filled because render was missing.
    pub(crate) valid: bool,
}

impl Default for RenderSlot {
    fn default() -> Self {
        Self {
            spectrum: FftData::default(),
            power: 0.0,
            valid: false,
        }
    }
}

/// Circular index over `size` slots.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RingIndex {
    size: usize,
    newest: usize,
}

impl RingIndex {
    pub(crate) fn new(size: usize) -> Self {
        debug_assert!(size > 0);
        Self { size, newest: 0 }
    }

    /// Moves to the next slot and returns it.
    pub(crate) fn advance(&mut self) -> usize {
        self.newest = (self.newest + 1) % self.size;
        self.newest
    }

    /// Slot holding the frame `age` pushes older than the newest.
    pub(crate) fn slot(&self, age: usize) -> usize {
        debug_assert!(age < self.size);
        (self.newest + self.size - age) % self.size
    }

    pub(crate) fn reset(&mut self) {
        self.newest = 0;
    }
}

/// Bounded history of render frames, overwritten oldest-first.
#[derive(Debug)]
pub(crate) struct ReferenceHistory {
    slots: Vec<RenderSlot>,
    index: RingIndex,
    num_pushed: usize,
    previous_frame: [f32; FRAME_SIZE],
}

impl ReferenceHistory {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            slots: vec![RenderSlot::default(); depth],
            index: RingIndex::new(depth),
            num_pushed: 0,
            previous_frame: [0.0; FRAME_SIZE],
        }
    }

    /// Number of frames the history can hold.
    pub(crate) fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Stores `frame` as the newest render frame.
    pub(crate) fn push(&mut self, frame: &[f32], fft: &mut AecFft) {
        let slot = &mut self.slots[self.index.advance()];
        fft.padded_fft(frame, &self.previous_frame, &mut slot.spectrum);
        slot.power = power(frame);
        slot.valid = true;
        self.previous_frame.copy_from_slice(frame);
        self.num_pushed = self.num_pushed.saturating_add(1);
    }

    /// Stores a zero-filled placeholder for a render frame that never arrived.
    pub(crate) fn push_missing(&mut self) {
        let slot = &mut self.slots[self.index.advance()];
        slot.spectrum.clear();
        slot.power = 0.0;
        slot.valid = false;
        self.previous_frame.fill(0.0);
        self.num_pushed = self.num_pushed.saturating_add(1);
    }

    /// The frame `age` pushes older than the newest, if it is still stored and
    /// was not zero-filled.
    pub(crate) fn get(&self, age: usize) -> Option<&RenderSlot> {
        if age >= self.depth() || age >= self.num_pushed {
            return None;
        }
        let slot = &self.slots[self.index.slot(age)];
        slot.valid.then_some(slot)
    }

    pub(crate) fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = RenderSlot::default();
        }
        self.index.reset();
        self.num_pushed = 0;
        self.previous_frame.fill(0.0);
    }
}
