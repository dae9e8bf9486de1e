use basedrop::Handle;

use crate::node::compressor::CompressorNode;
use crate::node::convolver::{ConvolverHandle, ConvolverNode};
use crate::node::delay::DelayNode;
use crate::node::distortion::DistortionNode;
use crate::node::envelope::EnvelopeNode;
use crate::node::filter::FilterNode;
use crate::node::gain::GainNode;
use crate::node::lfo::LfoNode;
use crate::node::merge::MergeNode;
use crate::node::meter::{MeterHandle, MeterNode};
use crate::node::midi_input::MidiInputNode;
use crate::node::mix::MixNode;
use crate::node::oscillator::OscillatorNode;
use crate::node::pan::PanNode;
use crate::node::reverb::ReverbNode;
use crate::node::spectrum::{SpectrumHandle, SpectrumNode};
use crate::node::split::SplitNode;
use crate::node::AudioGraphNode;
use crate::param::ParamSet;

/// Message-thread access to a node's readout or loader, for the node types
/// that have one. Owned by the graph interface and looked up by node id.
pub enum NodeHandle {
    None,
    Meter(MeterHandle),
    Spectrum(SpectrumHandle),
    Convolver(ConvolverHandle),
}

pub(crate) struct NodeSpawn {
    pub dsp: Box<dyn AudioGraphNode>,
    pub params: ParamSet,
    pub handle: NodeHandle,
}

fn plain(dsp: Box<dyn AudioGraphNode>, params: ParamSet) -> NodeSpawn {
    NodeSpawn {
        dsp,
        params,
        handle: NodeHandle::None,
    }
}

/// Instantiate a node by its catalogue tag.
///
/// Returns `None` for unknown tags; the `input` tag is not a node at all
/// and is handled by the graph interface before this is consulted.
pub(crate) fn create_node(node_type: &str, coll_handle: &Handle) -> Option<NodeSpawn> {
    let spawn = match node_type {
        "gain" => plain(Box::new(GainNode::new()), GainNode::params()),
        "delay" => plain(Box::new(DelayNode::new()), DelayNode::params()),
        "filter" => plain(Box::new(FilterNode::new()), FilterNode::params()),
        "mix" => plain(Box::new(MixNode::new()), MixNode::params()),
        "compressor" => plain(Box::new(CompressorNode::new()), CompressorNode::params()),
        "reverb" => plain(Box::new(ReverbNode::new()), ReverbNode::params()),
        "distortion" => plain(Box::new(DistortionNode::new()), DistortionNode::params()),
        "pan" => plain(Box::new(PanNode::new()), PanNode::params()),
        "oscillator" => plain(Box::new(OscillatorNode::new()), OscillatorNode::params()),
        "lfo" => plain(Box::new(LfoNode::new()), LfoNode::params()),
        "envelope" => plain(Box::new(EnvelopeNode::new()), EnvelopeNode::params()),
        "merge" => plain(Box::new(MergeNode::new()), MergeNode::params()),
        "split" => plain(Box::new(SplitNode::new()), SplitNode::params()),
        "midi_input" => plain(Box::new(MidiInputNode::new()), MidiInputNode::params()),
        "meter" => {
            let (node, handle) = MeterNode::new(coll_handle);
            NodeSpawn {
                dsp: Box::new(node),
                params: MeterNode::params(),
                handle: NodeHandle::Meter(handle),
            }
        }
        "spectrum" => {
            let (node, handle) = SpectrumNode::new(coll_handle);
            NodeSpawn {
                dsp: Box::new(node),
                params: SpectrumNode::params(),
                handle: NodeHandle::Spectrum(handle),
            }
        }
        "convolver" => {
            let (node, handle) = ConvolverNode::new(coll_handle);
            NodeSpawn {
                dsp: Box::new(node),
                params: ConvolverNode::params(),
                handle: NodeHandle::Convolver(handle),
            }
        }
        _ => return None,
    };
    Some(spawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;

    #[test]
    fn catalogue_covers_every_tag() {
        let collector = Collector::new();
        let tags = [
            "gain",
            "delay",
            "filter",
            "mix",
            "compressor",
            "reverb",
            "convolver",
            "distortion",
            "pan",
            "oscillator",
            "lfo",
            "envelope",
            "meter",
            "spectrum",
            "merge",
            "split",
            "midi_input",
        ];
        for tag in tags {
            let spawn = create_node(tag, &collector.handle())
                .unwrap_or_else(|| panic!("no constructor for {}", tag));
            assert_eq!(spawn.dsp.type_tag(), tag);
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let collector = Collector::new();
        assert!(create_node("theremin", &collector.handle()).is_none());
        assert!(create_node("input", &collector.handle()).is_none());
    }
}
