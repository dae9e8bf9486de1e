use atomic_refcell::AtomicRef;

use crate::buffer::BlockBuffer;
use crate::midi::{MidiEvent, Transport};
use crate::param::ParamSet;

pub mod smooth;

pub mod compressor;
pub mod convolver;
pub mod delay;
pub mod distortion;
pub mod envelope;
pub mod filter;
pub mod gain;
pub mod lfo;
pub mod merge;
pub mod meter;
pub mod midi_input;
pub mod mix;
pub mod oscillator;
pub mod pan;
pub mod reverb;
pub mod spectrum;
pub mod split;

/// Default smoothing time for parameter ramps, matching the feel of a
/// hardware pot without audible zipper noise.
pub(crate) const PARAM_SMOOTH_SECS: f64 = 0.02;

/// Per-block context handed to every node.
#[derive(Clone, Copy)]
pub struct ProcInfo<'a> {
    /// The sample rate of the stream. Constant between `prepare` calls.
    pub sample_rate: f64,

    /// 1.0 / sample_rate, provided for convenience.
    pub sample_rate_recip: f64,

    /// The block's timed MIDI events, sorted by frame offset.
    pub midi: &'a [MidiEvent],

    /// Host transport state.
    pub transport: Transport,

    frames: usize,
}

impl<'a> ProcInfo<'a> {
    pub(crate) fn new(
        sample_rate: f64,
        frames: usize,
        midi: &'a [MidiEvent],
        transport: Transport,
    ) -> Self {
        Self {
            sample_rate,
            sample_rate_recip: 1.0 / sample_rate,
            midi,
            transport,
            frames,
        }
    }

    /// The number of audio frames in the current block.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }
}

/// A node's wired inlets for the current block, resolved to the buffers
/// their upstream producers wrote. Unwired inlets read as `None`, which the
/// node treats as silence.
pub struct NodeInputs<'a, 'pool> {
    bufs: &'a [Option<AtomicRef<'pool, BlockBuffer>>],
}

impl<'a, 'pool> NodeInputs<'a, 'pool> {
    pub(crate) fn new(bufs: &'a [Option<AtomicRef<'pool, BlockBuffer>>]) -> Self {
        Self { bufs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    #[inline]
    pub fn get(&self, inlet: usize) -> Option<&BlockBuffer> {
        self.bufs.get(inlet).and_then(|guard| guard.as_deref())
    }
}

/// The DSP half of a node.
///
/// `prepare` runs on the message thread before the node is first visible to
/// a published snapshot (and again on sample-rate changes, with processing
/// stopped) and may allocate. `process` runs on the real-time thread at
/// most once per block and must not allocate, lock, or block. Parameters
/// live in the node's [`ParamSet`] and are read through the reference
/// passed to `process`, so the struct itself carries only DSP state.
pub trait AudioGraphNode: Send + Sync {
    /// The catalogue tag this node was created from.
    fn type_tag(&self) -> &'static str;

    fn prepare(&mut self, sample_rate: f64, max_block_size: usize, params: &ParamSet) {
        let _ = (sample_rate, max_block_size, params);
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        params: &ParamSet,
        inputs: &NodeInputs,
        output: &mut BlockBuffer,
    );

    /// Called instead of `process` while the `bypass` parameter exceeds
    /// 0.5: copies inlet 0 to the output unchanged.
    fn process_bypass(&mut self, frames: usize, inputs: &NodeInputs, output: &mut BlockBuffer) {
        copy_inlet0(frames, inputs, output);
    }
}

/// Copy inlet 0 to the output, clearing output channels the inlet does not
/// have. An unwired inlet 0 yields silence.
pub(crate) fn copy_inlet0(frames: usize, inputs: &NodeInputs, output: &mut BlockBuffer) {
    match inputs.get(0) {
        Some(input) => output.copy_from(input, frames),
        None => output.clear_frames(frames),
    }
}
