use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

/// Split a stereo stream into its channels: input channel 0 goes to output
/// channel 0, input channel 1 (or a duplicate of channel 0 for mono input)
/// to output channel 1.
pub struct SplitNode;

impl SplitNode {
    pub fn new() -> Self {
        Self
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[])
    }
}

impl AudioGraphNode for SplitNode {
    fn type_tag(&self) -> &'static str {
        "split"
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        _params: &ParamSet,
        inputs: &NodeInputs,
        output: &mut BlockBuffer,
    ) {
        let input = match inputs.get(0) {
            Some(input) => input,
            None => return,
        };
        let frames = info.frames();

        if output.channels() > 0 && input.channels() > 0 {
            output.copy_channel_from(0, input, 0, frames);
        }

        if output.channels() > 1 {
            let src_ch = if input.channels() > 1 { 1 } else { 0 };
            output.copy_channel_from(1, input, src_ch, frames);
        }
    }
}
