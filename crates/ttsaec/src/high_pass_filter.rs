//! Capture high-pass filter removing DC and rumble below roughly 80 Hz.

use ttsaec_common_audio::cascaded_biquad_filter::{BiQuadCoefficients, CascadedBiQuadFilter};

const COEFFICIENTS_48KHZ: [BiQuadCoefficients; 3] = [
    BiQuadCoefficients {
        b: [0.921_379, -1.842_755_2, 0.921_379],
        a: [-1.960_450, 0.961_186_3],
    },
    BiQuadCoefficients {
        b: [1.0, -1.999_979, 1.0],
        a: [-1.992_383_4, 0.992_600_1],
    },
    BiQuadCoefficients {
        b: [1.0, -1.999_963_3, 1.0],
        a: [-1.998_357, 0.998_492_8],
    },
];

#[derive(Debug)]
pub(crate) struct HighPassFilter {
    filter: CascadedBiQuadFilter,
}

impl HighPassFilter {
    pub(crate) fn new() -> Self {
        Self {
            filter: CascadedBiQuadFilter::new(&COEFFICIENTS_48KHZ),
        }
    }

    pub(crate) fn process(&mut self, samples: &mut [f32]) {
        self.filter.process_in_place(samples);
    }

    pub(crate) fn reset(&mut self) {
        self.filter.reset();
    }
}
