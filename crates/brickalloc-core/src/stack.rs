//! Stack allocator: bump pointer with enforced LIFO release.
//!
//! Each allocation is laid out as
//!
//! ```text
//!  [ pad ][ adj ][ payload ]
//!  ^ old top     ^ returned address       ^ new top
//! ```
//!
//! where `adj` is a one-byte header holding the distance from the old top
//! to the payload (padding plus header). Releasing the most recent block
//! rewinds `top` to `payload - adj`. Alignment never exceeds
//! [`MAX_ALIGN`](crate::MAX_ALIGN), so the distance always fits a byte.

use crate::arena::Arena;
use crate::block::{Block, align_up};
use crate::contract::{Allocator, DeallocateAll};
use crate::error::{AllocError, Violation, admit, ensure};
use crate::leaf::HeapAllocator;

/// Per-allocation header size in bytes.
pub const HEADER_SIZE: usize = 1;

/// LIFO allocator over an arena drawn from `A`.
pub struct StackAllocator<A: Allocator = HeapAllocator> {
    arena: Arena<A>,
    top: usize,
}

impl StackAllocator<HeapAllocator> {
    /// Heap-backed arena of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Self::new_in(capacity, HeapAllocator)
    }
}

impl<A: Allocator> StackAllocator<A> {
    /// Arena of `capacity` bytes drawn from `backing`.
    pub fn new_in(capacity: usize, backing: A) -> Result<Self, AllocError> {
        Ok(Self {
            arena: Arena::acquire(backing, capacity)?,
            top: 0,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Bytes between the arena start and the top marker.
    #[must_use]
    pub fn used(&self) -> usize {
        self.top
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.top
    }

    /// The arena region.
    #[must_use]
    pub fn region(&self) -> Block {
        self.arena.region()
    }
}

impl<A: Allocator> Allocator for StackAllocator<A> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if !admit(size, align) {
            return Block::NULL;
        }
        let Some(payload) = align_up(self.top + HEADER_SIZE, align) else {
            return Block::NULL;
        };
        let Some(end) = payload.checked_add(size) else {
            return Block::NULL;
        };
        if end > self.arena.capacity() {
            return Block::NULL;
        }

        let adjustment = payload - self.top;
        debug_assert!(adjustment <= usize::from(u8::MAX));
        // SAFETY: payload - 1 lies in [top, payload), inside the arena and outside any live block.
        unsafe { self.arena.write::<u8>(payload - HEADER_SIZE, adjustment as u8) };
        self.top = end;
        Block::new(self.arena.ptr_at(payload), size)
    }

    unsafe fn deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            return;
        }
        ensure(self.owns(blk), || Violation::ForeignBlock {
            addr: blk.addr(),
            size: blk.size(),
        });
        let top = self.arena.base() + self.top;
        ensure(blk.end() == top, || Violation::OutOfOrderRelease {
            block_end: blk.end(),
            top,
        });

        let payload = self.arena.offset_of(blk.addr());
        // SAFETY: the header byte was written just before this payload by `allocate`.
        let adjustment = unsafe { self.arena.read::<u8>(payload - HEADER_SIZE) };
        self.top = payload - usize::from(adjustment);
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        self.arena.contains(blk.addr())
    }
}

impl<A: Allocator> DeallocateAll for StackAllocator<A> {
    fn deallocate_all(&mut self) {
        self.top = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MAX_ALIGN;

    #[test]
    fn unit_alignment_costs_one_header_byte() {
        let mut stack = StackAllocator::with_capacity(100).expect("arena");
        let a = stack.allocate(4, 1);
        let b = stack.allocate(4, 1);
        assert_eq!(a.addr() - stack.region().addr(), 1);
        assert_eq!(b.addr() - a.addr(), 5);
        assert_eq!(stack.used(), 10);
    }

    #[test]
    fn alignment_pads_before_the_header() {
        let mut stack = StackAllocator::with_capacity(100).expect("arena");
        let a = stack.allocate(4, 4);
        let b = stack.allocate(4, 4);
        assert_eq!(a.addr() % 4, 0);
        assert_eq!(b.addr() % 4, 0);
        assert_eq!(a.addr() - stack.region().addr(), 4);
        assert_eq!(stack.used(), 16);
        // SAFETY: b then a, in LIFO order.
        unsafe {
            stack.deallocate(b);
            assert_eq!(stack.used(), 8);
            stack.deallocate(a);
        }
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn max_alignment_is_honoured() {
        let mut stack = StackAllocator::with_capacity(64).expect("arena");
        let _ = stack.allocate(3, 1);
        let blk = stack.allocate(8, MAX_ALIGN);
        assert_eq!(blk.addr() % MAX_ALIGN, 0);
    }

    #[test]
    fn failure_leaves_top_unchanged() {
        let mut stack = StackAllocator::with_capacity(16).expect("arena");
        let _ = stack.allocate(10, 1);
        let before = stack.used();
        assert!(stack.allocate(10, 1).is_null());
        assert_eq!(stack.used(), before);
        assert_eq!(stack.remaining(), 16 - before);
    }

    #[test]
    fn owns_is_an_address_range_test() {
        let mut stack = StackAllocator::with_capacity(32).expect("arena");
        let blk = stack.allocate(4, 1);
        assert!(stack.owns(blk));
        assert!(!stack.owns(Block::NULL));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "out-of-order")]
    fn out_of_order_release_halts_in_debug() {
        let mut stack = StackAllocator::with_capacity(64).expect("arena");
        let a = stack.allocate(4, 1);
        let _b = stack.allocate(4, 1);
        // SAFETY: releasing `a` before `_b` is the misuse under test; the check halts first.
        unsafe { stack.deallocate(a) };
    }
}
