use std::f32::consts::FRAC_2_PI;

use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

/// Waveshaping distortion with five transfer curves selected by the
/// `distortionType` parameter: 0 soft clip (cubic), 1 hard clip, 2 tanh,
/// 3 atan, 4 foldback.
pub struct DistortionNode;

impl DistortionNode {
    pub fn new() -> Self {
        Self
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[
            ("distortionType", 0.0),
            ("drive", 1.0),
            ("outputGain", 0.5),
            ("mix", 1.0),
        ])
    }
}

#[inline]
fn shape(curve: i32, x: f32) -> f32 {
    match curve {
        0 => {
            if x > 1.0 {
                2.0 / 3.0
            } else if x < -1.0 {
                -2.0 / 3.0
            } else {
                x - x * x * x / 3.0
            }
        }
        1 => x.clamp(-1.0, 1.0),
        3 => FRAC_2_PI * x.atan(),
        4 => {
            // Triangle fold of period 4 that is the identity on [-1, 1].
            let t = (x + 1.0).rem_euclid(4.0);
            if t <= 2.0 {
                t - 1.0
            } else {
                3.0 - t
            }
        }
        _ => x.tanh(),
    }
}

impl AudioGraphNode for DistortionNode {
    fn type_tag(&self) -> &'static str {
        "distortion"
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

        let curve = params.get("distortionType") as i32;
        let drive = params.get("drive").max(1.0);
        let output_gain = params.get("outputGain");
        let mix = params.get("mix").clamp(0.0, 1.0);

        for ch in 0..channels {
            let src = input.channel(ch);
            let dst = output.channel_mut(ch);
            for s in 0..frames {
                let dry = src[s];
                let wet = shape(curve, dry * drive);
                dst[s] = (dry * (1.0 - mix) + wet * mix) * output_gain;
            }
        }
    }
}
