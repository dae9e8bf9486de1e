use std::sync::atomic::{AtomicU32, Ordering};

use fnv::FnvHashMap;

/// A 32-bit float stored in an atomic cell.
///
/// Loads and stores are relaxed: the audio thread only needs to see either
/// the old or the new value at block granularity, never a torn one. Values
/// the DSP treats as one unit (e.g. the four biquad inputs) are re-derived
/// inside the block by the node itself.
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// The atomic parameter set of one node.
///
/// The name → cell map is built once at node construction on the message
/// thread and never changes afterwards, so both threads may read cells
/// through it freely. A `bypass` entry always exists.
pub struct ParamSet {
    cells: FnvHashMap<&'static str, AtomicF32>,
}

impl ParamSet {
    pub fn new(defaults: &[(&'static str, f32)]) -> Self {
        let mut cells = FnvHashMap::default();
        for &(name, value) in defaults {
            cells.insert(name, AtomicF32::new(value));
        }
        cells.entry("bypass").or_insert_with(|| AtomicF32::new(0.0));
        Self { cells }
    }

    /// Write a parameter. Unknown names are silently ignored.
    #[inline]
    pub fn set(&self, name: &str, value: f32) {
        if let Some(cell) = self.cells.get(name) {
            cell.store(value);
        }
    }

    /// Read a parameter. Unknown names read as 0.0.
    #[inline]
    pub fn get(&self, name: &str) -> f32 {
        self.cells.get(name).map(AtomicF32::load).unwrap_or(0.0)
    }

    #[inline]
    pub fn bypassed(&self) -> bool {
        self.get("bypass") > 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unknown_names_are_ignored() {
        let params = ParamSet::new(&[("gain", 1.0)]);
        params.set("nope", 3.0);
        assert_eq!(params.get("nope"), 0.0);
        assert_eq!(params.get("gain"), 1.0);
    }

    #[test]
    fn bypass_always_exists() {
        let params = ParamSet::new(&[]);
        assert!(!params.bypassed());
        params.set("bypass", 1.0);
        assert!(params.bypassed());
    }

    #[test]
    fn concurrent_writes_never_tear() {
        let params = Arc::new(ParamSet::new(&[("gain", 1.0)]));

        let writer = {
            let params = Arc::clone(&params);
            std::thread::spawn(move || {
                for i in 0..50_000 {
                    params.set("gain", if i % 2 == 0 { 1.0 } else { 2.0 });
                }
            })
        };

        for _ in 0..50_000 {
            let v = params.get("gain");
            assert!(v == 1.0 || v == 2.0, "torn read: {}", v);
        }

        writer.join().unwrap();
        let v = params.get("gain");
        assert!(v == 1.0 || v == 2.0);
    }
}
