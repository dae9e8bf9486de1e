use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::smooth::LinearSmoothed;
use super::{AudioGraphNode, NodeInputs, ProcInfo};

const MAX_DELAY_MS: f32 = 5000.0;
const MAX_CHANNELS: usize = 2;

/// Feedback delay line with fractional-sample linear-interpolated reads.
///
/// `time` (ms) is smoothed over 50 ms so automation glides instead of
/// clicking; `feedback` is clamped below unity to keep the line stable.
pub struct DelayNode {
    lines: Vec<Vec<f32>>,
    write_pos: usize,
    line_len: usize,
    smoothed_time: LinearSmoothed,
}

impl DelayNode {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            write_pos: 0,
            line_len: 0,
            smoothed_time: LinearSmoothed::new(500.0),
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[("time", 500.0), ("feedback", 0.0), ("mix", 1.0)])
    }
}

impl AudioGraphNode for DelayNode {
    fn type_tag(&self) -> &'static str {
        "delay"
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize, params: &ParamSet) {
        self.line_len = (MAX_DELAY_MS as f64 * sample_rate / 1000.0).ceil() as usize + 1;
        self.lines = (0..MAX_CHANNELS).map(|_| vec![0.0; self.line_len]).collect();
        self.write_pos = 0;

        self.smoothed_time.reset(sample_rate, 0.05);
        self.smoothed_time.set_current_and_target(params.get("time"));
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
        if self.line_len == 0 {
            return;
        }
        let frames = info.frames();
        let channels = input.channels().min(output.channels()).min(MAX_CHANNELS);

        let feedback = params.get("feedback").clamp(0.0, 0.95);
        let mix = params.get("mix").clamp(0.0, 1.0);
        self.smoothed_time
            .set_target(params.get("time").clamp(0.0, MAX_DELAY_MS));

        for s in 0..frames {
            let delay_ms = self.smoothed_time.next();
            let delay_samples = (delay_ms as f64 * info.sample_rate / 1000.0) as f32;

            let mut read_pos = self.write_pos as f32 - delay_samples;
            if read_pos < 0.0 {
                read_pos += self.line_len as f32;
            }

            let read0 = read_pos as usize % self.line_len;
            let read1 = (read0 + 1) % self.line_len;
            let frac = read_pos - read_pos.floor();

            for ch in 0..channels {
                let line = &mut self.lines[ch];
                let dry = input.sample(ch, s);

                let delayed = line[read0] * (1.0 - frac) + line[read1] * frac;

                line[self.write_pos] = dry + delayed * feedback;

                output.set_sample(ch, s, dry * (1.0 - mix) + delayed * mix);
            }

            self.write_pos = (self.write_pos + 1) % self.line_len;
        }
    }
}
