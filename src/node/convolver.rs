use std::sync::Arc;

use basedrop::{Handle, Shared, SharedCell};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::smooth::LinearSmoothed;
use super::{AudioGraphNode, NodeInputs, ProcInfo, PARAM_SMOOTH_SECS};

/// Uniform partition length in samples. Each partition convolves in the
/// frequency domain at twice this length (zero-padded overlap-add).
const PARTITION: usize = 512;
const FFT_LEN: usize = PARTITION * 2;

/// Upper bound on IR length (in partitions) so the frequency-domain delay
/// line can be pre-allocated: 96 × 512 ≈ one second at 48 kHz.
const MAX_IR_PARTITIONS: usize = 96;

const MAX_CHANNELS: usize = 2;

/// A partitioned impulse response: per channel, the FFT of each
/// zero-padded partition. Built on the message thread and swapped into the
/// node through a `SharedCell`, so the audio thread picks it up at block
/// granularity without locking.
pub(crate) struct IrState {
    generation: u64,
    /// `[channel][partition][bin]`; empty when no IR is loaded.
    spectra: Vec<Vec<Vec<Complex<f32>>>>,
}

impl IrState {
    fn unloaded() -> Self {
        Self {
            generation: 0,
            spectra: Vec::new(),
        }
    }
}

/// Message-thread loader for a convolver node's impulse response.
pub struct ConvolverHandle {
    slot: Shared<SharedCell<IrState>>,
    coll_handle: Handle,
    next_generation: u64,
}

impl ConvolverHandle {
    /// Load an impulse response from planar channel data (1 or 2
    /// channels). The IR is energy-normalized, partitioned, and
    /// transformed here on the message thread; the audio thread swaps to
    /// it at the start of a later block. IRs longer than the supported
    /// maximum are truncated.
    pub fn load_ir(&mut self, channels: &[&[f32]]) {
        if channels.is_empty() || channels[0].is_empty() {
            return;
        }

        let max_samples = MAX_IR_PARTITIONS * PARTITION;
        let ir_len = channels.iter().map(|c| c.len()).max().unwrap_or(0);
        if ir_len > max_samples {
            log::warn!(
                "impulse response of {} samples truncated to {}",
                ir_len,
                max_samples
            );
        }
        let ir_len = ir_len.min(max_samples);

        let energy: f32 = channels
            .iter()
            .flat_map(|c| c.iter().take(ir_len))
            .map(|&x| x * x)
            .sum();
        let norm = if energy > 1e-12 {
            1.0 / energy.sqrt()
        } else {
            1.0
        };

        let fft = FftPlanner::new().plan_fft_forward(FFT_LEN);
        let mut scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];

        let spectra = channels
            .iter()
            .take(MAX_CHANNELS)
            .map(|samples| {
                let samples = &samples[..samples.len().min(ir_len)];
                samples
                    .chunks(PARTITION)
                    .map(|chunk| {
                        let mut buf = vec![Complex::default(); FFT_LEN];
                        for (slot, &x) in buf.iter_mut().zip(chunk.iter()) {
                            *slot = Complex::new(x * norm, 0.0);
                        }
                        fft.process_with_scratch(&mut buf, &mut scratch);
                        buf
                    })
                    .collect()
            })
            .collect();

        self.next_generation += 1;
        self.slot.set(Shared::new(
            &self.coll_handle,
            IrState {
                generation: self.next_generation,
                spectra,
            },
        ));
    }
}

struct ChannelState {
    in_fifo: Vec<f32>,
    /// Ring of input-segment spectra, newest at `fdl_pos`.
    fdl: Vec<Vec<Complex<f32>>>,
    overlap: Vec<f32>,
    out_seg: Vec<f32>,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            in_fifo: vec![0.0; PARTITION],
            fdl: (0..MAX_IR_PARTITIONS)
                .map(|_| vec![Complex::default(); FFT_LEN])
                .collect(),
            overlap: vec![0.0; PARTITION],
            out_seg: vec![0.0; PARTITION],
        }
    }

    fn reset(&mut self, active_partitions: usize) {
        self.in_fifo.fill(0.0);
        self.overlap.fill(0.0);
        self.out_seg.fill(0.0);
        for spectrum in self.fdl.iter_mut().take(active_partitions) {
            spectrum.fill(Complex::default());
        }
    }
}

/// Uniformly-partitioned frequency-domain convolution.
///
/// The wet path runs one partition (512 samples) behind the dry input;
/// with no IR loaded the node passes the dry signal through.
pub struct ConvolverNode {
    channels: Vec<ChannelState>,
    fifo_fill: usize,
    fdl_pos: usize,

    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    work: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,

    ir_slot: Shared<SharedCell<IrState>>,
    active_generation: u64,

    smoothed_mix: LinearSmoothed,
}

impl ConvolverNode {
    pub fn new(coll_handle: &Handle) -> (Self, ConvolverHandle) {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_LEN);
        let ifft = planner.plan_fft_inverse(FFT_LEN);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());

        let ir_slot = Shared::new(
            coll_handle,
            SharedCell::new(Shared::new(coll_handle, IrState::unloaded())),
        );

        (
            Self {
                channels: (0..MAX_CHANNELS).map(|_| ChannelState::new()).collect(),
                fifo_fill: 0,
                fdl_pos: 0,
                fft,
                ifft,
                work: vec![Complex::default(); FFT_LEN],
                acc: vec![Complex::default(); FFT_LEN],
                scratch: vec![Complex::default(); scratch_len],
                ir_slot: Shared::clone(&ir_slot),
                active_generation: 0,
                smoothed_mix: LinearSmoothed::new(0.5),
            },
            ConvolverHandle {
                slot: ir_slot,
                coll_handle: coll_handle.clone(),
                next_generation: 0,
            },
        )
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[("mix", 0.5), ("gain", 1.0)])
    }

    /// FFT the just-filled input segment of channel `ch`, multiply-
    /// accumulate against the IR partitions, and inverse-transform into
    /// the next output segment.
    fn convolve_segment(&mut self, ch: usize, ir: &[Vec<Complex<f32>>]) {
        let state = &mut self.channels[ch];
        let parts = ir.len();

        for (slot, &x) in self.work.iter_mut().zip(state.in_fifo.iter()) {
            *slot = Complex::new(x, 0.0);
        }
        for slot in self.work[PARTITION..].iter_mut() {
            *slot = Complex::default();
        }
        self.fft
            .process_with_scratch(&mut self.work, &mut self.scratch);
        state.fdl[self.fdl_pos].copy_from_slice(&self.work);

        self.acc.fill(Complex::default());
        for (k, ir_part) in ir.iter().enumerate() {
            let seg = &state.fdl[(self.fdl_pos + parts - k) % parts];
            for ((acc, &a), &b) in self.acc.iter_mut().zip(seg.iter()).zip(ir_part.iter()) {
                *acc += a * b;
            }
        }

        self.ifft
            .process_with_scratch(&mut self.acc, &mut self.scratch);

        let scale = 1.0 / FFT_LEN as f32;
        for i in 0..PARTITION {
            state.out_seg[i] = self.acc[i].re * scale + state.overlap[i];
            state.overlap[i] = self.acc[PARTITION + i].re * scale;
        }
    }
}

impl AudioGraphNode for ConvolverNode {
    fn type_tag(&self) -> &'static str {
        "convolver"
    }

    fn prepare(&mut self, sample_rate: f64, _max_block_size: usize, params: &ParamSet) {
        for state in &mut self.channels {
            state.reset(MAX_IR_PARTITIONS);
        }
        self.fifo_fill = 0;
        self.fdl_pos = 0;

        self.smoothed_mix.reset(sample_rate, PARAM_SMOOTH_SECS);
        self.smoothed_mix.set_current_and_target(params.get("mix"));
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
        let channels = input.channels().min(output.channels()).min(MAX_CHANNELS);

        let ir = self.ir_slot.get();
        if ir.spectra.is_empty() {
            // No impulse loaded: dry pass.
            for ch in 0..channels {
                output.copy_channel_from(ch, input, ch, frames);
            }
            return;
        }

        if ir.generation != self.active_generation {
            let parts = ir.spectra[0].len();
            for state in &mut self.channels {
                state.reset(parts.max(1));
            }
            self.fifo_fill = 0;
            self.fdl_pos = 0;
            self.active_generation = ir.generation;
        }

        let gain = params.get("gain");
        self.smoothed_mix.set_target(params.get("mix"));

        for s in 0..frames {
            let m = self.smoothed_mix.next();
            let fill = self.fifo_fill;

            for ch in 0..channels {
                let dry = input.sample(ch, s);
                let wet = self.channels[ch].out_seg[fill];
                self.channels[ch].in_fifo[fill] = dry;
                output.set_sample(ch, s, (dry * (1.0 - m) + wet * m) * gain);
            }

            self.fifo_fill += 1;
            if self.fifo_fill == PARTITION {
                self.fifo_fill = 0;
                let parts = ir.spectra[0].len();
                for ch in 0..channels {
                    let ir_ch = &ir.spectra[ch.min(ir.spectra.len() - 1)];
                    self.convolve_segment(ch, ir_ch);
                }
                self.fdl_pos = (self.fdl_pos + 1) % parts.max(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;

    /// Convolving with a unit impulse reproduces the input one partition
    /// late (the engine's fixed latency).
    #[test]
    fn unit_impulse_ir_is_delayed_identity() {
        let collector = Collector::new();
        let (mut node, mut handle) = ConvolverNode::new(&collector.handle());
        node.prepare(48_000.0, PARTITION, &ConvolverNode::params());

        let impulse = {
            let mut ir = vec![0.0f32; 64];
            ir[0] = 1.0;
            ir
        };
        handle.load_ir(&[impulse.as_slice()]);

        let params = ConvolverNode::params();
        params.set("mix", 1.0);
        node.smoothed_mix.set_current_and_target(1.0);

        let mut input = BlockBuffer::new(1, PARTITION);
        let mut output = BlockBuffer::new(1, PARTITION);
        let ramp: Vec<f32> = (0..PARTITION).map(|i| (i as f32 / 100.0).sin()).collect();
        input.channel_mut(0).copy_from_slice(&ramp);

        // First block: wet path is still priming, expect silence.
        let midi = [];
        let transport = crate::midi::Transport::default();
        let info = ProcInfo::new(48_000.0, PARTITION, &midi, transport);

        let guard = atomic_refcell::AtomicRefCell::new(input);
        let borrowed = [Some(guard.borrow())];
        let inputs = NodeInputs::new(&borrowed);
        node.process(&info, &params, &inputs, &mut output);
        let first: Vec<f32> = output.channel(0)[..PARTITION].to_vec();
        assert!(first.iter().all(|&x| x.abs() < 1e-4));

        // Second block of silence: the ramp comes out, scaled by the
        // energy normalization (unit impulse → unity).
        drop(borrowed);
        let silent = BlockBuffer::new(1, PARTITION);
        let guard = atomic_refcell::AtomicRefCell::new(silent);
        let borrowed = [Some(guard.borrow())];
        let inputs = NodeInputs::new(&borrowed);
        node.process(&info, &params, &inputs, &mut output);

        for (got, want) in output.channel(0)[..PARTITION].iter().zip(ramp.iter()) {
            assert!((got - want).abs() < 1e-3, "got {} want {}", got, want);
        }
    }
}
