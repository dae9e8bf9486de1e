use std::sync::atomic::{AtomicUsize, Ordering};

use atomic_refcell::AtomicRefCell;
use basedrop::Shared;

use crate::buffer::BlockBuffer;

/// Number of scratch buffers pre-allocated per graph. Sized so that the
/// active node count of a typical graph never exceeds it; see
/// [`BufferPool::acquire`] for what happens when it does.
pub const BUFFER_POOL_SLOTS: usize = 32;

/// Pre-allocated scratch buffers lent to nodes for the duration of one
/// block. Owned and driven by the real-time thread; each slot sits in an
/// `AtomicRefCell` so one node's output can be borrowed mutably while other
/// slots are read as inputs.
pub(crate) struct BufferPool {
    slots: Vec<AtomicRefCell<BlockBuffer>>,
    in_use: Vec<bool>,
    channels: usize,
    capacity: usize,

    // Incremented whenever `acquire` has to grow the pool. Polled and
    // logged by the message thread: an allocation on the audio thread is a
    // configuration bug, not an acceptable steady state.
    grow_events: Shared<AtomicUsize>,
}

impl BufferPool {
    pub fn new(channels: usize, capacity: usize, grow_events: Shared<AtomicUsize>) -> Self {
        let mut pool = Self {
            slots: Vec::new(),
            in_use: Vec::new(),
            channels: 0,
            capacity: 0,
            grow_events,
        };
        pool.prepare(channels, capacity);
        pool
    }

    /// Re-allocate every slot for a new channel count / block capacity.
    /// Not real-time safe; only call while processing is stopped.
    pub fn prepare(&mut self, channels: usize, capacity: usize) {
        self.channels = channels;
        self.capacity = capacity;
        self.slots.clear();
        self.in_use.clear();
        for _ in 0..BUFFER_POOL_SLOTS {
            self.slots
                .push(AtomicRefCell::new(BlockBuffer::new(channels, capacity)));
            self.in_use.push(false);
        }
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &AtomicRefCell<BlockBuffer> {
        &self.slots[index]
    }

    /// Mark a free slot in-use, clear it, and return its index.
    ///
    /// When every slot is taken the pool grows by one slot. That path
    /// allocates on the real-time thread and is recorded as a diagnostic;
    /// it exists so an oversized graph degrades instead of crashing.
    pub fn acquire(&mut self) -> usize {
        for (index, used) in self.in_use.iter_mut().enumerate() {
            if !*used {
                *used = true;
                self.slots[index].borrow_mut().clear_frames(self.capacity);
                return index;
            }
        }

        self.grow_events.fetch_add(1, Ordering::Relaxed);
        let index = self.slots.len();
        self.slots
            .push(AtomicRefCell::new(BlockBuffer::new(self.channels, self.capacity)));
        self.in_use.push(true);
        index
    }

    pub fn release(&mut self, index: usize) {
        if let Some(used) = self.in_use.get_mut(index) {
            *used = false;
        }
    }

    /// Free every slot. Called at the top of each block.
    pub fn reset_all(&mut self) {
        self.in_use.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;

    fn test_pool(channels: usize, capacity: usize) -> (BufferPool, Shared<AtomicUsize>) {
        let collector = Collector::new();
        let counter = Shared::new(&collector.handle(), AtomicUsize::new(0));
        let pool = BufferPool::new(channels, capacity, Shared::clone(&counter));
        (pool, counter)
    }

    #[test]
    fn acquire_returns_distinct_indices() {
        let (mut pool, _) = test_pool(2, 64);
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_ne!(a, b);
        assert_ne!(b, c);

        pool.release(b);
        assert_eq!(pool.acquire(), b);
    }

    #[test]
    fn reset_all_frees_every_slot() {
        let (mut pool, _) = test_pool(2, 64);
        for _ in 0..BUFFER_POOL_SLOTS {
            pool.acquire();
        }
        pool.reset_all();
        assert_eq!(pool.acquire(), 0);
    }

    #[test]
    fn exhaustion_grows_and_records_diagnostic() {
        let (mut pool, counter) = test_pool(1, 16);
        for _ in 0..BUFFER_POOL_SLOTS {
            pool.acquire();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);

        let overflow = pool.acquire();
        assert_eq!(overflow, BUFFER_POOL_SLOTS);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn acquired_slots_come_back_cleared() {
        let (mut pool, _) = test_pool(1, 8);
        let index = pool.acquire();
        pool.slot(index).borrow_mut().channel_mut(0).fill(1.0);
        pool.release(index);

        let again = pool.acquire();
        assert_eq!(again, index);
        assert_eq!(pool.slot(again).borrow().channel(0), &[0.0; 8]);
    }
}
