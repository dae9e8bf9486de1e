use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

/// Merge two mono signals into one stereo stream: inlet 0 channel 0 feeds
/// the left output, inlet 1 channel 0 the right. With inlet 1 unwired the
/// left signal is duplicated.
pub struct MergeNode;

impl MergeNode {
    pub fn new() -> Self {
        Self
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[])
    }
}

impl AudioGraphNode for MergeNode {
    fn type_tag(&self) -> &'static str {
        "merge"
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        _params: &ParamSet,
        inputs: &NodeInputs,
        output: &mut BlockBuffer,
    ) {
        let frames = info.frames();
        let left_in = inputs.get(0);
        let right_in = inputs.get(1);

        if output.channels() > 0 {
            match left_in {
                Some(buf) => output.copy_channel_from(0, buf, 0, frames),
                None => output.clear_channel(0, frames),
            }
        }

        if output.channels() > 1 {
            match right_in.or(left_in) {
                Some(buf) => output.copy_channel_from(1, buf, 0, frames),
                None => output.clear_channel(1, frames),
            }
        }
    }
}
