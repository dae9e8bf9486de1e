use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

// Freeverb tunings at the 44.1 kHz reference rate. The comb lengths are
// mutually prime to avoid stacked resonances; the right channel runs the
// same network offset by a small spread for decorrelation.
const COMB_TUNINGS_44K: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNINGS_44K: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const REFERENCE_RATE: f64 = 44_100.0;

const MAX_PREDELAY_MS: f64 = 200.0;
const FIXED_GAIN: f32 = 0.015;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;
const ALLPASS_FEEDBACK: f32 = 0.5;

fn scale_to_rate(samples: usize, rate: f64) -> usize {
    ((samples as f64 * rate / REFERENCE_RATE).round() as usize).max(1)
}

struct Comb {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            index: 0,
            filter_store: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.index];
        self.filter_store = output * (1.0 - damp) + self.filter_store * damp;
        self.buffer[self.index] = input + self.filter_store * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }
}

struct Allpass {
    buffer: Vec<f32>,
    index: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            index: 0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        self.buffer[self.index] = input + buffered * ALLPASS_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        buffered - input
    }
}

struct PreDelay {
    buffer: Vec<f32>,
    index: usize,
}

impl PreDelay {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32, delay: usize) -> f32 {
        let len = self.buffer.len();
        let read = (self.index + len - delay.min(len - 1)) % len;
        let output = self.buffer[read];
        self.buffer[self.index] = input;
        self.index = (self.index + 1) % len;
        output
    }
}

struct ReverbChannel {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
    predelay: PreDelay,
}

impl ReverbChannel {
    fn new(sample_rate: f64, spread: usize) -> Self {
        Self {
            combs: COMB_TUNINGS_44K
                .iter()
                .map(|&len| Comb::new(scale_to_rate(len + spread, sample_rate)))
                .collect(),
            allpasses: ALLPASS_TUNINGS_44K
                .iter()
                .map(|&len| Allpass::new(scale_to_rate(len + spread, sample_rate)))
                .collect(),
            predelay: PreDelay::new((MAX_PREDELAY_MS / 1000.0 * sample_rate) as usize + 1),
        }
    }

    #[inline]
    fn tick(&mut self, input: f32, feedback: f32, damp: f32, predelay: usize) -> f32 {
        let delayed = self.predelay.tick(input, predelay) * FIXED_GAIN;

        let mut wet = 0.0;
        for comb in &mut self.combs {
            wet += comb.tick(delayed, feedback, damp);
        }
        for allpass in &mut self.allpasses {
            wet = allpass.tick(wet);
        }
        wet
    }
}

/// Schroeder-style algorithmic reverb: per channel, a pre-delay line into
/// eight parallel damped combs and four series allpasses.
pub struct ReverbNode {
    channels: Vec<ReverbChannel>,
    sample_rate: f64,
}

impl ReverbNode {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            sample_rate: 0.0,
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[
            ("roomSize", 0.5),
            ("damping", 0.5),
            ("preDelay", 0.0),
            ("mix", 0.3),
        ])
    }
}

impl AudioGraphNode for ReverbNode {
    fn type_tag(&self) -> &'static str {
        "reverb"
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.sample_rate = sample_rate;
        self.channels = vec![
            ReverbChannel::new(sample_rate, 0),
            ReverbChannel::new(sample_rate, STEREO_SPREAD),
        ];
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
        if self.channels.is_empty() {
            return;
        }
        let frames = info.frames();
        let channels = input
            .channels()
            .min(output.channels())
            .min(self.channels.len());

        let feedback = params.get("roomSize").clamp(0.0, 1.0) * ROOM_SCALE + ROOM_OFFSET;
        let damp = params.get("damping").clamp(0.0, 1.0) * DAMP_SCALE;
        let mix = params.get("mix").clamp(0.0, 1.0);
        let predelay_samples = (params.get("preDelay").clamp(0.0, MAX_PREDELAY_MS as f32) as f64
            / 1000.0
            * self.sample_rate) as usize;

        for ch in 0..channels {
            let tank = &mut self.channels[ch];
            let src = input.channel(ch);
            let dst = output.channel_mut(ch);

            for s in 0..frames {
                let dry = src[s];
                let wet = tank.tick(dry, feedback, damp, predelay_samples);
                dst[s] = dry * (1.0 - mix) + wet * mix;
            }
        }
    }
}
