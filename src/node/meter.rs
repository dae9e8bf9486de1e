use basedrop::{Handle, Shared};

use crate::buffer::BlockBuffer;
use crate::param::{AtomicF32, ParamSet};

use super::{AudioGraphNode, NodeInputs, ProcInfo};

const MAX_CHANNELS: usize = 2;

pub(crate) struct MeterLevels {
    peak: [AtomicF32; MAX_CHANNELS],
    rms: [AtomicF32; MAX_CHANNELS],
}

impl MeterLevels {
    fn new() -> Self {
        Self {
            peak: [AtomicF32::new(0.0), AtomicF32::new(0.0)],
            rms: [AtomicF32::new(0.0), AtomicF32::new(0.0)],
        }
    }

    fn reset(&self) {
        for cell in self.peak.iter().chain(self.rms.iter()) {
            cell.store(0.0);
        }
    }
}

/// Message-thread view of a meter node's levels. Reads are single relaxed
/// atomic loads; poll at whatever cadence the UI wants.
pub struct MeterHandle {
    levels: Shared<MeterLevels>,
}

impl MeterHandle {
    pub fn peak(&self, channel: usize) -> f32 {
        if channel < MAX_CHANNELS {
            self.levels.peak[channel].load()
        } else {
            0.0
        }
    }

    pub fn rms(&self, channel: usize) -> f32 {
        if channel < MAX_CHANNELS {
            self.levels.rms[channel].load()
        } else {
            0.0
        }
    }
}

/// Passthrough node that publishes per-channel peak (with decay) and RMS
/// into atomic cells shared with its [`MeterHandle`].
pub struct MeterNode {
    levels: Shared<MeterLevels>,
}

impl MeterNode {
    pub fn new(coll_handle: &Handle) -> (Self, MeterHandle) {
        let levels = Shared::new(coll_handle, MeterLevels::new());
        (
            Self {
                levels: Shared::clone(&levels),
            },
            MeterHandle { levels },
        )
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[("meterType", 2.0)])
    }
}

impl AudioGraphNode for MeterNode {
    fn type_tag(&self) -> &'static str {
        "meter"
    }

    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.levels.reset();
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
        let channels = input.channels().min(output.channels()).min(MAX_CHANNELS);

        for ch in 0..channels {
            output.copy_channel_from(ch, input, ch, frames);

            let src = input.channel(ch);
            let mut peak = 0.0f32;
            let mut sum_squares = 0.0f32;
            for &x in &src[..frames] {
                peak = peak.max(x.abs());
                sum_squares += x * x;
            }

            // Peak falls back at ~0.95 per block (about 50 ms at typical
            // rates) so short transients stay visible.
            let prev = self.levels.peak[ch].load();
            self.levels.peak[ch].store(peak.max(prev * 0.95));

            self.levels.rms[ch].store((sum_squares / frames.max(1) as f32).sqrt());
        }
    }
}
