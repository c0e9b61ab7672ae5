//! Fallback composite: try `Primary`, delegate to `Secondary` on failure.

use crate::block::Block;
use crate::contract::{Allocator, DeallocateAll};

/// Tries `P` first; on the sentinel, delegates the whole request to `S`.
///
/// Typical use backs a fast, capacity-bounded allocator with one that
/// always succeeds:
///
/// ```
/// use brickalloc_core::{Allocator, FallbackAllocator, HeapAllocator, StackAllocator};
///
/// let stack = StackAllocator::with_capacity(64).unwrap();
/// let mut alloc = FallbackAllocator::new(stack, HeapAllocator);
/// let blk = alloc.allocate(32, 8);
/// assert!(alloc.primary().owns(blk));
/// unsafe { alloc.deallocate(blk) };
/// ```
#[derive(Debug, Default, Clone)]
pub struct FallbackAllocator<P, S> {
    primary: P,
    secondary: S,
}

impl<P: Allocator, S: Allocator> FallbackAllocator<P, S> {
    pub const fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    pub fn primary_mut(&mut self) -> &mut P {
        &mut self.primary
    }

    pub fn secondary_mut(&mut self) -> &mut S {
        &mut self.secondary
    }
}

impl<P: Allocator, S: Allocator> Allocator for FallbackAllocator<P, S> {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        let blk = self.primary.allocate(size, align);
        if blk.is_null() {
            self.secondary.allocate(size, align)
        } else {
            blk
        }
    }

    #[inline]
    unsafe fn deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            return;
        }
        // SAFETY: blk came from one of the children; ownership picks which.
        unsafe {
            if self.primary.owns(blk) {
                self.primary.deallocate(blk);
            } else {
                self.secondary.deallocate(blk);
            }
        }
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        self.primary.owns(blk) || self.secondary.owns(blk)
    }
}

impl<P: DeallocateAll, S: DeallocateAll> DeallocateAll for FallbackAllocator<P, S> {
    fn deallocate_all(&mut self) {
        self.primary.deallocate_all();
        self.secondary.deallocate_all();
    }
}
