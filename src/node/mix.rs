use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::smooth::LinearSmoothed;
use super::{AudioGraphNode, NodeInputs, ProcInfo, PARAM_SMOOTH_SECS};

/// Two-input crossfader: inlet 0 dry, inlet 1 wet, blended by the
/// smoothed `mix` coefficient. With either inlet unwired the output stays
/// silent.
pub struct MixNode {
    smoothed_mix: LinearSmoothed,
}

impl MixNode {
    pub fn new() -> Self {
        Self {
            smoothed_mix: LinearSmoothed::new(0.5),
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[("mix", 0.5)])
    }
}

impl AudioGraphNode for MixNode {
    fn type_tag(&self) -> &'static str {
        "mix"
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize, params: &ParamSet) {
        self.smoothed_mix.reset(sample_rate, PARAM_SMOOTH_SECS);
        self.smoothed_mix.set_current_and_target(params.get("mix"));
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        params: &ParamSet,
        inputs: &NodeInputs,
        output: &mut BlockBuffer,
    ) {
        let (dry, wet) = match (inputs.get(0), inputs.get(1)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        let frames = info.frames();
        let channels = dry.channels().min(wet.channels()).min(output.channels());

        self.smoothed_mix.set_target(params.get("mix"));

        for s in 0..frames {
            let m = self.smoothed_mix.next();
            for ch in 0..channels {
                output.set_sample(
                    ch,
                    s,
                    dry.sample(ch, s) * (1.0 - m) + wet.sample(ch, s) * m,
                );
            }
        }
    }
}
