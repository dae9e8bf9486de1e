use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::Mutex;

use basedrop::{Handle, Shared};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::buffer::BlockBuffer;
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

/// 2048-point analysis, 1024 magnitude bins.
pub const FFT_SIZE: usize = 2048;
pub const NUM_BINS: usize = FFT_SIZE / 2;

const MAG_FLOOR: f32 = 1e-10;

/// Message-thread view of a spectrum node's latest magnitudes.
///
/// The mutex here is the one synchronous cross-thread hand-off in the
/// engine: the audio thread holds it only for the duration of a bounded
/// copy, and the reader is a low-rate UI poll, so contention is rare and
/// inaudible when it happens.
pub struct SpectrumHandle {
    magnitudes: Shared<Mutex<Vec<f32>>>,
}

impl SpectrumHandle {
    /// Copy out the latest magnitude spectrum (linear, normalized 0–1).
    pub fn magnitudes(&self) -> Vec<f32> {
        self.magnitudes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// FFT spectrum analyzer. Passes audio through unchanged while channel 0
/// streams into a 2048-sample ring; each time the ring fills, a Hann
/// window and forward FFT produce a new magnitude vector, normalized by
/// its maximum bin and published for the message thread.
pub struct SpectrumNode {
    fifo: Vec<f32>,
    fifo_index: usize,

    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    work: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    new_mags: Vec<f32>,

    magnitudes: Shared<Mutex<Vec<f32>>>,
}

impl SpectrumNode {
    pub fn new(coll_handle: &Handle) -> (Self, SpectrumHandle) {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        let scratch_len = fft.get_inplace_scratch_len();

        let window = (0..FFT_SIZE)
            .map(|i| 0.5 * (1.0 - (TAU * i as f32 / FFT_SIZE as f32).cos()))
            .collect();

        let magnitudes = Shared::new(coll_handle, Mutex::new(vec![0.0; NUM_BINS]));

        (
            Self {
                fifo: vec![0.0; FFT_SIZE],
                fifo_index: 0,
                window,
                fft,
                work: vec![Complex::default(); FFT_SIZE],
                scratch: vec![Complex::default(); scratch_len],
                new_mags: vec![0.0; NUM_BINS],
                magnitudes: Shared::clone(&magnitudes),
            },
            SpectrumHandle { magnitudes },
        )
    }

    pub fn params() -> ParamSet {
        ParamSet::new(&[])
    }

    fn compute_fft(&mut self) {
        for (i, (&sample, &w)) in self.fifo.iter().zip(self.window.iter()).enumerate() {
            self.work[i] = Complex::new(sample * w, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.work, &mut self.scratch);

        let mut max_mag = MAG_FLOOR;
        for (bin, mag) in self.work[..NUM_BINS].iter().zip(self.new_mags.iter_mut()) {
            *mag = bin.norm();
            max_mag = max_mag.max(*mag);
        }
        for mag in &mut self.new_mags {
            *mag /= max_mag;
        }

        // Bounded copy under the reader-facing lock; see SpectrumHandle.
        if let Ok(mut shared) = self.magnitudes.lock() {
            shared.copy_from_slice(&self.new_mags);
        }
    }
}

impl AudioGraphNode for SpectrumNode {
    fn type_tag(&self) -> &'static str {
        "spectrum"
    }

    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.fifo.fill(0.0);
        self.fifo_index = 0;
        if let Ok(mut shared) = self.magnitudes.lock() {
            shared.fill(0.0);
        }
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
        let channels = input.channels().min(output.channels());

        for ch in 0..channels {
            output.copy_channel_from(ch, input, ch, frames);
        }

        let src = input.channel(0);
        for &sample in &src[..frames] {
            self.fifo[self.fifo_index] = sample;
            self.fifo_index += 1;

            if self.fifo_index >= FFT_SIZE {
                self.fifo_index = 0;
                self.compute_fft();
            }
        }
    }
}
