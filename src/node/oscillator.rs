use std::f64::consts::TAU;

use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::smooth::LinearSmoothed;
use super::{AudioGraphNode, NodeInputs, ProcInfo};

/// Audio-rate oscillator: sine, saw, square, triangle selected by
/// `waveform`, with `detune` in cents applied on top of `frequency`.
/// Writes the same signal to every output channel.
pub struct OscillatorNode {
    phase: f64,
    smoothed_freq: LinearSmoothed,
}

impl OscillatorNode {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            smoothed_freq: LinearSmoothed::new(440.0),
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[
            ("waveform", 0.0),
            ("frequency", 440.0),
            ("detune", 0.0),
            ("gain", 1.0),
        ])
    }
}

impl AudioGraphNode for OscillatorNode {
    fn type_tag(&self) -> &'static str {
        "oscillator"
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize, params: &ParamSet) {
        self.phase = 0.0;
        // Pitch moves faster than gain-like params; keep the ramp short.
        self.smoothed_freq.reset(sample_rate, 0.005);
        self.smoothed_freq
            .set_current_and_target(params.get("frequency"));
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        params: &ParamSet,
        _inputs: &NodeInputs,
        output: &mut BlockBuffer,
    ) {
        let frames = info.frames();
        let channels = output.channels();

        let waveform = params.get("waveform") as i32;
        let detune_cents = params.get("detune");
        let gain = params.get("gain");

        let detune_mult = (detune_cents / 1200.0).exp2();
        self.smoothed_freq
            .set_target(params.get("frequency") * detune_mult);

        for s in 0..frames {
            let freq = self.smoothed_freq.next();

            let sample = match waveform {
                1 => (2.0 * (self.phase - (self.phase + 0.5).floor())) as f32,
                2 => {
                    if self.phase < 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
                3 => (4.0 * (self.phase - 0.5).abs() - 1.0) as f32,
                _ => (self.phase * TAU).sin() as f32,
            } * gain;

            for ch in 0..channels {
                output.set_sample(ch, s, sample);
            }

            self.phase += freq as f64 * info.sample_rate_recip;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}
