use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR envelope generator.
///
/// The gate comes from inlet 0 when wired (any sample > 0.5 is "on"),
/// otherwise from the `gate` parameter. Attack ramps linearly to 1.0 over
/// `attack` ms, decay ramps linearly down to `sustain` over `decay` ms,
/// release ramps linearly from the level at gate-off to zero over
/// `release` ms. The output is a control signal on every channel.
pub struct EnvelopeNode {
    stage: Stage,
    envelope: f32,
    release_start: f32,
    was_gate_on: bool,
}

impl EnvelopeNode {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            envelope: 0.0,
            release_start: 0.0,
            was_gate_on: false,
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[
            ("attack", 10.0),
            ("decay", 100.0),
            ("sustain", 0.7),
            ("release", 200.0),
            ("gate", 0.0),
        ])
    }
}

impl AudioGraphNode for EnvelopeNode {
    fn type_tag(&self) -> &'static str {
        "envelope"
    }

    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.stage = Stage::Idle;
        self.envelope = 0.0;
        self.release_start = 0.0;
        self.was_gate_on = false;
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        params: &ParamSet,
        inputs: &NodeInputs,
        output: &mut BlockBuffer,
    ) {
        let frames = info.frames();
        let channels = output.channels();
        let sr = info.sample_rate as f32;

        let attack_ms = params.get("attack").max(0.1);
        let decay_ms = params.get("decay").max(0.1);
        let sustain = params.get("sustain").clamp(0.0, 1.0);
        let release_ms = params.get("release").max(0.1);

        let attack_step = 1.0 / (attack_ms * 0.001 * sr);
        let decay_step = (1.0 - sustain).max(0.0) / (decay_ms * 0.001 * sr);
        let release_samples = release_ms * 0.001 * sr;

        let gate_input = inputs.get(0);
        let gate_param = params.get("gate");

        for s in 0..frames {
            let gate_value = match gate_input {
                Some(input) => input.sample(0, s),
                None => gate_param,
            };
            let gate_on = gate_value > 0.5;

            if gate_on && !self.was_gate_on {
                self.stage = Stage::Attack;
            } else if !gate_on && self.was_gate_on {
                self.release_start = self.envelope;
                self.stage = Stage::Release;
            }
            self.was_gate_on = gate_on;

            match self.stage {
                Stage::Idle => {
                    self.envelope = 0.0;
                }
                Stage::Attack => {
                    self.envelope += attack_step;
                    if self.envelope >= 1.0 {
                        self.envelope = 1.0;
                        self.stage = Stage::Decay;
                    }
                }
                Stage::Decay => {
                    self.envelope -= decay_step;
                    if self.envelope <= sustain {
                        self.envelope = sustain;
                        self.stage = Stage::Sustain;
                    }
                }
                Stage::Sustain => {
                    self.envelope = sustain;
                }
                Stage::Release => {
                    self.envelope -= self.release_start / release_samples;
                    if self.envelope <= 1e-4 {
                        self.envelope = 0.0;
                        self.stage = Stage::Idle;
                    }
                }
            }

            for ch in 0..channels {
                output.set_sample(ch, s, self.envelope);
            }
        }
    }
}
