/// A multi-channel block of 32-bit float audio.
///
/// Channel data is stored contiguously per channel (planar layout). The
/// channel count and per-channel capacity are fixed at construction; the
/// buffer never reallocates afterwards, which is what lets the pool lend
/// these out on the real-time thread.
pub struct BlockBuffer {
    data: Vec<f32>,
    channels: usize,
    capacity: usize,
}

impl BlockBuffer {
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; channels * capacity],
            channels,
            capacity,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The maximum number of frames this buffer can hold per channel.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.capacity;
        &self.data[start..start + self.capacity]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.capacity;
        &mut self.data[start..start + self.capacity]
    }

    /// Mutable access to two distinct channels at once (e.g. stereo L/R).
    ///
    /// Panics if `a == b`.
    #[inline]
    pub fn channel_pair_mut(&mut self, a: usize, b: usize) -> (&mut [f32], &mut [f32]) {
        assert_ne!(a, b);
        let cap = self.capacity;
        if a < b {
            let (lo, hi) = self.data.split_at_mut(b * cap);
            (&mut lo[a * cap..a * cap + cap], &mut hi[..cap])
        } else {
            let (lo, hi) = self.data.split_at_mut(a * cap);
            (&mut hi[..cap], &mut lo[b * cap..b * cap + cap])
        }
    }

    #[inline]
    pub fn sample(&self, ch: usize, frame: usize) -> f32 {
        self.data[ch * self.capacity + frame]
    }

    #[inline]
    pub fn set_sample(&mut self, ch: usize, frame: usize, value: f32) {
        self.data[ch * self.capacity + frame] = value;
    }

    /// Zero the first `frames` frames of every channel.
    pub fn clear_frames(&mut self, frames: usize) {
        let frames = frames.min(self.capacity);
        for ch in 0..self.channels {
            self.channel_mut(ch)[..frames].fill(0.0);
        }
    }

    /// Zero the first `frames` frames of one channel.
    pub fn clear_channel(&mut self, ch: usize, frames: usize) {
        let frames = frames.min(self.capacity);
        self.channel_mut(ch)[..frames].fill(0.0);
    }

    /// Copy the first `frames` frames of every channel present in both
    /// buffers from `src`; channels `src` does not have are cleared.
    pub fn copy_from(&mut self, src: &BlockBuffer, frames: usize) {
        let frames = frames.min(self.capacity).min(src.capacity);
        for ch in 0..self.channels {
            if ch < src.channels {
                let s = src.channel(ch);
                self.channel_mut(ch)[..frames].copy_from_slice(&s[..frames]);
            } else {
                self.clear_channel(ch, frames);
            }
        }
    }

    /// Copy one channel from `src` into channel `dst_ch`.
    pub fn copy_channel_from(
        &mut self,
        dst_ch: usize,
        src: &BlockBuffer,
        src_ch: usize,
        frames: usize,
    ) {
        let frames = frames.min(self.capacity).min(src.capacity);
        let s = src.channel(src_ch);
        self.channel_mut(dst_ch)[..frames].copy_from_slice(&s[..frames]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_layout_round_trip() {
        let mut buf = BlockBuffer::new(2, 8);
        buf.set_sample(0, 3, 0.25);
        buf.set_sample(1, 3, -0.5);
        assert_eq!(buf.sample(0, 3), 0.25);
        assert_eq!(buf.sample(1, 3), -0.5);
        assert_eq!(buf.channel(0)[3], 0.25);
        assert_eq!(buf.channel(1)[3], -0.5);
    }

    #[test]
    fn copy_from_clears_missing_channels() {
        let mut src = BlockBuffer::new(1, 4);
        src.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        let mut dst = BlockBuffer::new(2, 4);
        dst.channel_mut(1).fill(9.0);
        dst.copy_from(&src, 4);

        assert_eq!(dst.channel(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(dst.channel(1), &[0.0; 4]);
    }

    #[test]
    fn channel_pair_mut_is_disjoint() {
        let mut buf = BlockBuffer::new(2, 4);
        let (l, r) = buf.channel_pair_mut(0, 1);
        l.fill(1.0);
        r.fill(2.0);
        assert_eq!(buf.channel(0), &[1.0; 4]);
        assert_eq!(buf.channel(1), &[2.0; 4]);
    }
}
