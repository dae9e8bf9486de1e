use std::f32::consts::PI;

use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

const MAX_CHANNELS: usize = 2;

/// Filter type encoding shared with the command boundary, which decodes
/// the string names to these values before ops reach the graph. Lowpass
/// is 0 and the fallback for out-of-range values.
const HIGHPASS: i32 = 1;
const BANDPASS: i32 = 2;
const NOTCH: i32 = 3;
const ALLPASS: i32 = 4;
const LOWSHELF: i32 = 5;
const HIGHSHELF: i32 = 6;
const PEAKING: i32 = 7;

#[derive(Default, Clone, Copy)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

/// Biquad filter with RBJ cookbook coefficients.
///
/// The six normalized coefficients are recomputed only when one of the
/// four inputs (`filterType`, `cutoff`, `resonance`, `gainDb`) moves past
/// a small epsilon, so parameter automation is tracked at block
/// granularity without per-sample trigonometry.
pub struct FilterNode {
    state: [BiquadState; MAX_CHANNELS],

    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    prev_cutoff: f32,
    prev_resonance: f32,
    prev_filter_type: f32,
    prev_gain_db: f32,
}

impl FilterNode {
    pub fn new() -> Self {
        Self {
            state: [BiquadState::default(); MAX_CHANNELS],
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            prev_cutoff: -1.0,
            prev_resonance: -1.0,
            prev_filter_type: -1.0,
            prev_gain_db: 0.0,
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[
            ("filterType", 0.0),
            ("cutoff", 1000.0),
            ("resonance", 0.707),
            ("gainDb", 0.0),
        ])
    }

    fn update_coefficients(&mut self, sample_rate: f64, params: &ParamSet) {
        // Stability: cutoff stays below Nyquist, Q stays positive.
        let cutoff = params
            .get("cutoff")
            .clamp(20.0, (sample_rate * 0.499) as f32);
        let q = params.get("resonance").max(0.1);
        let gain_db = params.get("gainDb");
        let type_id = params.get("filterType") as i32;

        let w0 = 2.0 * PI * cutoff / sample_rate as f32;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10.0f32.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2);
        match type_id {
            HIGHPASS => {
                b0 = (1.0 + cos_w0) / 2.0;
                b1 = -(1.0 + cos_w0);
                b2 = (1.0 + cos_w0) / 2.0;
                a0 = 1.0 + alpha;
                a1 = -2.0 * cos_w0;
                a2 = 1.0 - alpha;
            }
            BANDPASS => {
                b0 = alpha;
                b1 = 0.0;
                b2 = -alpha;
                a0 = 1.0 + alpha;
                a1 = -2.0 * cos_w0;
                a2 = 1.0 - alpha;
            }
            NOTCH => {
                b0 = 1.0;
                b1 = -2.0 * cos_w0;
                b2 = 1.0;
                a0 = 1.0 + alpha;
                a1 = -2.0 * cos_w0;
                a2 = 1.0 - alpha;
            }
            ALLPASS => {
                b0 = 1.0 - alpha;
                b1 = -2.0 * cos_w0;
                b2 = 1.0 + alpha;
                a0 = 1.0 + alpha;
                a1 = -2.0 * cos_w0;
                a2 = 1.0 - alpha;
            }
            LOWSHELF => {
                let sqrt_a = a.sqrt();
                b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha);
                b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
                b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha);
                a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha;
                a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
                a2 = (a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha;
            }
            HIGHSHELF => {
                let sqrt_a = a.sqrt();
                b0 = a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha);
                b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0);
                b2 = a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha);
                a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha;
                a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0);
                a2 = (a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha;
            }
            PEAKING => {
                b0 = 1.0 + alpha * a;
                b1 = -2.0 * cos_w0;
                b2 = 1.0 - alpha * a;
                a0 = 1.0 + alpha / a;
                a1 = -2.0 * cos_w0;
                a2 = 1.0 - alpha / a;
            }
            // LOWPASS and anything out of range.
            _ => {
                b0 = (1.0 - cos_w0) / 2.0;
                b1 = 1.0 - cos_w0;
                b2 = (1.0 - cos_w0) / 2.0;
                a0 = 1.0 + alpha;
                a1 = -2.0 * cos_w0;
                a2 = 1.0 - alpha;
            }
        }

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }
}

impl AudioGraphNode for FilterNode {
    fn type_tag(&self) -> &'static str {
        "filter"
    }

    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.state = [BiquadState::default(); MAX_CHANNELS];
        // Force coefficient recalculation on the next block.
        self.prev_cutoff = -1.0;
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        params: &ParamSet,
        inputs: &NodeInputs,
        output: &mut BlockBuffer,
    ) {
        let input = match inputs.get(0) {
            Some(input) => input,
            None => return,
        };
        let frames = info.frames();
        let channels = input.channels().min(output.channels()).min(MAX_CHANNELS);

        let cutoff = params.get("cutoff");
        let resonance = params.get("resonance");
        let filter_type = params.get("filterType");
        let gain_db = params.get("gainDb");

        if (cutoff - self.prev_cutoff).abs() > 1e-6
            || (resonance - self.prev_resonance).abs() > 1e-6
            || (filter_type - self.prev_filter_type).abs() > 0.5
            || (gain_db - self.prev_gain_db).abs() > 1e-6
        {
            self.update_coefficients(info.sample_rate, params);
            self.prev_cutoff = cutoff;
            self.prev_resonance = resonance;
            self.prev_filter_type = filter_type;
            self.prev_gain_db = gain_db;
        }

        let (b0, b1, b2, a1, a2) = (self.b0, self.b1, self.b2, self.a1, self.a2);

        for ch in 0..channels {
            let st = &mut self.state[ch];
            let src = input.channel(ch);
            let dst = output.channel_mut(ch);

            for s in 0..frames {
                let x = src[s];
                let y = b0 * x + b1 * st.x1 + b2 * st.x2 - a1 * st.y1 - a2 * st.y2;

                st.x2 = st.x1;
                st.x1 = x;
                st.y2 = st.y1;
                st.y1 = y;

                dst[s] = y;
            }
        }
    }
}
