use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::smooth::LinearSmoothed;
use super::{AudioGraphNode, NodeInputs, ProcInfo, PARAM_SMOOTH_SECS};

/// Scalar gain with an optional amplitude-modulation input.
///
/// Inlet 0 is audio; inlet 1, when wired, is a control signal (e.g. an
/// envelope or LFO) multiplied in sample-by-sample before the gain
/// parameter is applied.
pub struct GainNode {
    smoothed_gain: LinearSmoothed,
}

impl GainNode {
    pub fn new() -> Self {
        Self {
            smoothed_gain: LinearSmoothed::new(1.0),
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[("gain", 1.0)])
    }
}

impl AudioGraphNode for GainNode {
    fn type_tag(&self) -> &'static str {
        "gain"
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize, params: &ParamSet) {
        self.smoothed_gain.reset(sample_rate, PARAM_SMOOTH_SECS);
        self.smoothed_gain.set_current_and_target(params.get("gain"));
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
        let channels = input.channels().min(output.channels());

        self.smoothed_gain.set_target(params.get("gain"));

        if let Some(modulation) = inputs.get(1) {
            let m = modulation.channel(0);
            for s in 0..frames {
                let g = self.smoothed_gain.next() * m[s];
                for ch in 0..channels {
                    output.set_sample(ch, s, input.sample(ch, s) * g);
                }
            }
        } else if self.smoothed_gain.is_smoothing() {
            for s in 0..frames {
                let g = self.smoothed_gain.next();
                for ch in 0..channels {
                    output.set_sample(ch, s, input.sample(ch, s) * g);
                }
            }
        } else {
            // Constant gain: copy per channel and scale in one pass.
            let g = self.smoothed_gain.current();
            for ch in 0..channels {
                let src = input.channel(ch);
                let dst = output.channel_mut(ch);
                for s in 0..frames {
                    dst[s] = src[s] * g;
                }
            }
        }
    }
}
