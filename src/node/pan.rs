use std::f32::consts::FRAC_PI_4;

use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::smooth::LinearSmoothed;
use super::{AudioGraphNode, NodeInputs, ProcInfo, PARAM_SMOOTH_SECS};

/// Stereo panner. `pan` runs -1 (hard left) to +1 (hard right); `law`
/// selects 0 = linear or 1 = equal-power. Mono inputs are spread to
/// stereo, stereo inputs are balanced.
pub struct PanNode {
    smoothed_pan: LinearSmoothed,
}

impl PanNode {
    pub fn new() -> Self {
        Self {
            smoothed_pan: LinearSmoothed::new(0.0),
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[("pan", 0.0), ("law", 1.0)])
    }
}

impl AudioGraphNode for PanNode {
    fn type_tag(&self) -> &'static str {
        "pan"
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize, params: &ParamSet) {
        self.smoothed_pan.reset(sample_rate, PARAM_SMOOTH_SECS);
        self.smoothed_pan.set_current_and_target(params.get("pan"));
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

        if output.channels() < 2 {
            output.copy_channel_from(0, input, 0, frames);
            return;
        }

        let equal_power = params.get("law") as i32 != 0;
        self.smoothed_pan
            .set_target(params.get("pan").clamp(-1.0, 1.0));

        let mono = input.channels() == 1;

        for s in 0..frames {
            let pan = self.smoothed_pan.next();

            let (gain_l, gain_r) = if equal_power {
                let angle = (pan + 1.0) * FRAC_PI_4;
                (angle.cos(), angle.sin())
            } else {
                (0.5 * (1.0 - pan), 0.5 * (1.0 + pan))
            };

            if mono {
                let x = input.sample(0, s);
                output.set_sample(0, s, x * gain_l);
                output.set_sample(1, s, x * gain_r);
            } else {
                output.set_sample(0, s, input.sample(0, s) * gain_l);
                output.set_sample(1, s, input.sample(1, s) * gain_r);
            }
        }
    }
}
