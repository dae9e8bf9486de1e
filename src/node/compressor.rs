use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

/// Feed-forward compressor with soft/hard knee and a one-pole
/// attack/release envelope in the dB domain. Inlet 0 is the program
/// signal; inlet 1, when wired, is the sidechain the detector listens to.
pub struct CompressorNode {
    envelope_db: f32,
}

impl CompressorNode {
    pub fn new() -> Self {
        Self { envelope_db: 0.0 }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[
            ("threshold", -20.0),
            ("ratio", 4.0),
            ("attack", 10.0),
            ("release", 100.0),
            ("knee", 0.0),
            ("makeupGain", 0.0),
        ])
    }
}

impl AudioGraphNode for CompressorNode {
    fn type_tag(&self) -> &'static str {
        "compressor"
    }

    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.envelope_db = 0.0;
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

        let threshold = params.get("threshold");
        let ratio = params.get("ratio").max(1.0);
        let attack_ms = params.get("attack").max(0.01);
        let release_ms = params.get("release").max(0.01);
        let knee_width = params.get("knee").max(0.0);
        let makeup = 10.0f32.powf(params.get("makeupGain") / 20.0);

        let sr = info.sample_rate as f32;
        let attack_coeff = (-1.0 / (sr * attack_ms / 1000.0)).exp();
        let release_coeff = (-1.0 / (sr * release_ms / 1000.0)).exp();

        let sidechain = inputs.get(1).unwrap_or(input);
        let detector_channels = sidechain.channels().min(channels.max(1));

        for s in 0..frames {
            let mut peak = 0.0f32;
            for ch in 0..detector_channels {
                peak = peak.max(sidechain.sample(ch, s).abs());
            }

            let input_db = if peak > 1e-10 {
                20.0 * peak.log10()
            } else {
                -100.0
            };

            let slope = 1.0 - 1.0 / ratio;
            let gain_reduction_db = if knee_width > 0.0 {
                let half_knee = knee_width / 2.0;
                if input_db < threshold - half_knee {
                    0.0
                } else if input_db > threshold + half_knee {
                    (input_db - threshold) * slope
                } else {
                    let x = input_db - threshold + half_knee;
                    slope * x * x / (2.0 * knee_width)
                }
            } else if input_db > threshold {
                (input_db - threshold) * slope
            } else {
                0.0
            };

            let target_db = -gain_reduction_db;
            let coeff = if target_db < self.envelope_db {
                attack_coeff
            } else {
                release_coeff
            };
            self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * target_db;

            let gain = 10.0f32.powf(self.envelope_db / 20.0) * makeup;
            for ch in 0..channels {
                output.set_sample(ch, s, input.sample(ch, s) * gain);
            }
        }
    }
}
