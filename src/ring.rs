//! Producer/consumer index pair for a descriptor ring.
//!
//! Each ring tracks `next_to_use` (producer) and `next_to_clean`
//! (consumer). One slot is always left empty so a full ring and an
//! empty ring are distinguishable. Index advancement goes through a
//! compare-and-swap loop so a poller and an interrupt context can
//! advance concurrently without locking.

use core::sync::atomic::{AtomicU32, Ordering};

/// Descriptor ring index state.
#[derive(Debug)]
pub struct Ring {
    count: u32,
    next_to_use: AtomicU32,
    next_to_clean: AtomicU32,
}

impl Ring {
    /// Create a ring of `count` slots, both indices at zero.
    #[must_use]
    pub const fn new(count: u32) -> Self {
        Self {
            count,
            next_to_use: AtomicU32::new(0),
            next_to_clean: AtomicU32::new(0),
        }
    }

    /// Number of slots in the ring.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Current producer index.
    pub fn next_to_use(&self) -> u32 {
        self.next_to_use.load(Ordering::Acquire)
    }

    /// Current consumer index.
    pub fn next_to_clean(&self) -> u32 {
        self.next_to_clean.load(Ordering::Acquire)
    }

    /// Slots available to the producer. At most `count - 1`; one slot
    /// stays empty to disambiguate full from empty.
    pub fn unused(&self) -> u32 {
        let clean = self.next_to_clean.load(Ordering::Acquire);
        let used = self.next_to_use.load(Ordering::Relaxed);
        if clean > used {
            clean - used - 1
        } else {
            self.count - (used - clean + 1)
        }
    }

    /// Advance the producer index by one, wrapping at `count`.
    /// Returns the index that was claimed.
    pub fn advance_use(&self) -> u32 {
        Self::advance(&self.next_to_use, self.count)
    }

    /// Advance the consumer index by one, wrapping at `count`.
    /// Returns the index that was released.
    pub fn advance_clean(&self) -> u32 {
        Self::advance(&self.next_to_clean, self.count)
    }

    fn advance(idx: &AtomicU32, count: u32) -> u32 {
        let mut cur = idx.load(Ordering::Acquire);
        loop {
            let next = if cur + 1 >= count { 0 } else { cur + 1 };
            match idx.compare_exchange(cur, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(claimed) => return claimed,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Store the producer index with full ordering, making prior
    /// descriptor writes visible before the index moves.
    pub fn set_use(&self, val: u32) {
        self.next_to_use.store(val % self.count, Ordering::SeqCst);
    }

    /// Store the consumer index with full ordering.
    pub fn set_clean(&self, val: u32) {
        self.next_to_clean.store(val % self.count, Ordering::SeqCst);
    }

    /// Reset both indices to zero. Only valid while the ring is
    /// quiesced.
    pub fn reset(&self) {
        self.next_to_use.store(0, Ordering::SeqCst);
        self.next_to_clean.store(0, Ordering::SeqCst);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_has_count_minus_one_unused() {
        let ring = Ring::new(8);
        assert_eq!(ring.unused(), 7);
    }

    #[test]
    fn advance_use_wraps_at_count() {
        let ring = Ring::new(4);
        assert_eq!(ring.advance_use(), 0);
        assert_eq!(ring.advance_use(), 1);
        assert_eq!(ring.advance_use(), 2);
        assert_eq!(ring.advance_use(), 3);
        assert_eq!(ring.advance_use(), 0);
    }

    #[test]
    fn capacity_is_count_minus_one() {
        let ring = Ring::new(8);
        for expected in (0..7).rev() {
            ring.advance_use();
            assert_eq!(ring.unused(), expected);
        }
        // Eighth submission would need a slot the ring no longer has.
        assert_eq!(ring.unused(), 0);
    }

    #[test]
    fn clean_catches_up_with_use() {
        let ring = Ring::new(8);
        for _ in 0..7 {
            ring.advance_use();
        }
        assert_eq!(ring.unused(), 0);
        for expected in 1..=7 {
            ring.advance_clean();
            assert_eq!(ring.unused(), expected);
        }
    }

    #[test]
    fn unused_across_wraparound() {
        let ring = Ring::new(8);
        // Park both indices near the end, then cross the boundary.
        ring.set_use(6);
        ring.set_clean(6);
        assert_eq!(ring.unused(), 7);
        ring.advance_use();
        ring.advance_use();
        assert_eq!(ring.next_to_use(), 0);
        assert_eq!(ring.unused(), 5);
    }

    #[test]
    fn set_use_reduces_modulo_count() {
        let ring = Ring::new(8);
        ring.set_use(9);
        assert_eq!(ring.next_to_use(), 1);
    }

    #[test]
    fn reset_clears_both_indices() {
        let ring = Ring::new(8);
        ring.advance_use();
        ring.advance_use();
        ring.advance_clean();
        ring.reset();
        assert_eq!(ring.next_to_use(), 0);
        assert_eq!(ring.next_to_clean(), 0);
        assert_eq!(ring.unused(), 7);
    }
}
