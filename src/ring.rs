use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// One queued parameter write: a node id and the (name, value) pairs to
/// apply to its atomic parameter cells. Crosses the ring as a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamUpdate {
    pub node_id: String,
    pub params: Vec<(String, f32)>,
}

struct RingInner<T> {
    // Producer and consumer indices live on their own cache lines so the
    // two threads never contend on the same line.
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
}

// The producer writes a slot strictly before publishing it with a release
// store of `tail`; the consumer takes ownership of a slot strictly after an
// acquire load of `tail`. Each slot is therefore accessed by exactly one
// thread at a time.
unsafe impl<T: Send> Send for RingInner<T> {}
unsafe impl<T: Send> Sync for RingInner<T> {}

impl<T> Drop for RingInner<T> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe {
                (*self.slots[head].get()).assume_init_drop();
            }
            head = (head + 1) & self.mask;
        }
    }
}

/// Bounded single-producer single-consumer lock-free FIFO.
///
/// `push` is wait-free on the message thread, `pop` is wait-free on the
/// real-time thread; neither side ever blocks, spins, or allocates.
pub struct SpscRing;

impl SpscRing {
    /// Create a ring holding up to `capacity - 1` elements.
    /// `capacity` must be a power of two.
    pub fn with_capacity<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let inner = Arc::new(RingInner {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots,
            mask: capacity - 1,
        });

        (
            Producer {
                inner: Arc::clone(&inner),
            },
            Consumer { inner },
        )
    }
}

pub struct Producer<T> {
    inner: Arc<RingInner<T>>,
}

impl<T> Producer<T> {
    /// Push one record, handing it back when the ring is full; the caller
    /// decides whether to retry or coalesce. Never blocks.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & inner.mask;

        if next == inner.head.load(Ordering::Acquire) {
            return Err(item);
        }

        unsafe {
            (*inner.slots[tail].get()).write(item);
        }
        inner.tail.store(next, Ordering::Release);
        Ok(())
    }
}

pub struct Consumer<T> {
    inner: Arc<RingInner<T>>,
}

impl<T> Consumer<T> {
    /// Pop one record, or `None` when the ring is empty.
    pub fn pop(&mut self) -> Option<T> {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Relaxed);

        if head == inner.tail.load(Ordering::Acquire) {
            return None;
        }

        let item = unsafe { (*inner.slots[head].get()).assume_init_read() };
        inner.head.store((head + 1) & inner.mask, Ordering::Release);
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let (mut tx, mut rx) = SpscRing::with_capacity::<u32>(8);
        for i in 0..5 {
            tx.push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.pop(), Some(i));
        }
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn push_fails_when_full() {
        let (mut tx, mut rx) = SpscRing::with_capacity::<u32>(4);
        // Capacity 4 holds 3 elements (one slot is the full/empty sentinel).
        tx.push(0).unwrap();
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        assert_eq!(tx.push(3), Err(3));

        assert_eq!(rx.pop(), Some(0));
        tx.push(3).unwrap();
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
        assert_eq!(rx.pop(), Some(3));
    }

    #[test]
    fn drops_unconsumed_records() {
        let (mut tx, rx) = SpscRing::with_capacity::<String>(8);
        tx.push("a".to_string()).unwrap();
        tx.push("b".to_string()).unwrap();
        drop(tx);
        drop(rx);
    }
}
