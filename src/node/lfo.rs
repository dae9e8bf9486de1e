use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

// Seed source for the sample-and-hold generator. Each LFO instance takes
// one step of this monotonic counter, so two random LFOs produce different
// sequences without ever touching the platform RNG on the audio thread.
static SEED_COUNTER: AtomicU32 = AtomicU32::new(0x1234_5678);

/// Low-frequency oscillator for modulation.
///
/// `shape`: 0 sine, 1 triangle, 2 saw, 3 square, 4 random (sample & hold).
/// Output is a unipolar control signal centred at 0.5; `depth` scales the
/// excursion around that centre.
pub struct LfoNode {
    phase: f64,
    random_value: f32,
    prev_phase_wrap: f32,
    prng_state: u32,
}

impl LfoNode {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            random_value: 0.5,
            prev_phase_wrap: 0.0,
            prng_state: SEED_COUNTER.fetch_add(0x9E37_79B9, Ordering::Relaxed),
        }
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[
            ("shape", 0.0),
            ("rate", 1.0),
            ("depth", 1.0),
            ("phase", 0.0),
        ])
    }

    /// Inlined xorshift32. Deterministic and allocation-free, safe on the
    /// audio thread.
    #[inline]
    fn next_random(&mut self) -> f32 {
        let mut x = self.prng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.prng_state = x;
        x as f32 / u32::MAX as f32
    }
}

impl AudioGraphNode for LfoNode {
    fn type_tag(&self) -> &'static str {
        "lfo"
    }

    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.phase = 0.0;
        self.random_value = 0.5;
        self.prev_phase_wrap = 0.0;
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

        let shape = params.get("shape") as i32;
        let rate = params.get("rate").max(0.001);
        let depth = params.get("depth").clamp(0.0, 1.0);
        let phase_offset = params.get("phase") / 360.0;

        for s in 0..frames {
            let mut p = ((self.phase + phase_offset as f64) % 1.0) as f32;
            if p < 0.0 {
                p += 1.0;
            }

            let value = match shape {
                1 => {
                    if p < 0.5 {
                        p * 2.0
                    } else {
                        2.0 - p * 2.0
                    }
                }
                2 => p,
                3 => {
                    if p < 0.5 {
                        1.0
                    } else {
                        0.0
                    }
                }
                4 => {
                    // New held value each time the (offset) phase wraps.
                    if p < self.prev_phase_wrap {
                        self.random_value = self.next_random();
                    }
                    self.random_value
                }
                _ => 0.5 + 0.5 * (p * TAU).sin(),
            };

            self.prev_phase_wrap = p;

            let out = 0.5 + (value - 0.5) * depth;
            for ch in 0..channels {
                output.set_sample(ch, s, out);
            }

            self.phase += rate as f64 * info.sample_rate_recip;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_get_distinct_random_sequences() {
        let mut a = LfoNode::new();
        let mut b = LfoNode::new();
        let seq_a: Vec<f32> = (0..8).map(|_| a.next_random()).collect();
        let seq_b: Vec<f32> = (0..8).map(|_| b.next_random()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn xorshift_stays_in_unit_range() {
        let mut lfo = LfoNode::new();
        for _ in 0..1000 {
            let v = lfo.next_random();
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
