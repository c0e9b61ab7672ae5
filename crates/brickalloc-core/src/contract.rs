//! The allocator contract.
//!
//! Every component, leaf or composite, implements [`Allocator`]. Composites
//! are generic over their children, so a whole tree is monomorphized and
//! each call is routed without dynamic dispatch. Where a tree genuinely has
//! to be assembled at run time, `Box<dyn Allocator>` implements the trait as
//! well, at the cost of one indirect call per level.

use crate::block::Block;
use crate::error::{AllocError, validate_request};

/// Uniform operation set of every allocator.
pub trait Allocator {
    /// Allocate `size > 0` bytes aligned to `align` (a power of two, at
    /// most [`MAX_ALIGN`](crate::MAX_ALIGN)).
    ///
    /// Returns [`Block::NULL`] when the request cannot be satisfied. A
    /// failed call leaves the allocator unchanged. A successful call never
    /// returns fewer than `size` bytes or a misaligned address.
    fn allocate(&mut self, size: usize, align: usize) -> Block;

    /// Release `blk`. A no-op on the sentinel.
    ///
    /// # Safety
    ///
    /// `blk` must be the sentinel or a block returned by this allocator (for
    /// composites: by one of its descendants) that has not been released
    /// since and has not been invalidated by a bulk reset.
    unsafe fn deallocate(&mut self, blk: Block);

    /// Pure membership test. Never mutates state.
    fn owns(&self, blk: Block) -> bool;

    /// Result-bearing variant of [`allocate`](Self::allocate).
    ///
    /// Malformed requests come back as their [`AllocError`] instead of
    /// halting, and the sentinel becomes [`AllocError::Exhausted`].
    fn try_allocate(&mut self, size: usize, align: usize) -> Result<Block, AllocError> {
        validate_request(size, align)?;
        self.allocate(size, align)
            .into_option()
            .ok_or(AllocError::Exhausted { size, align })
    }
}

/// Bulk reset, available where every descendant supports it.
pub trait DeallocateAll: Allocator {
    /// Return to the just-constructed state. Every outstanding block becomes
    /// invalid.
    fn deallocate_all(&mut self);
}

impl<A: Allocator + ?Sized> Allocator for &mut A {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        (**self).allocate(size, align)
    }

    #[inline]
    unsafe fn deallocate(&mut self, blk: Block) {
        // SAFETY: forwarded contract.
        unsafe { (**self).deallocate(blk) }
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        (**self).owns(blk)
    }
}

impl<A: DeallocateAll + ?Sized> DeallocateAll for &mut A {
    #[inline]
    fn deallocate_all(&mut self) {
        (**self).deallocate_all();
    }
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        (**self).allocate(size, align)
    }

    #[inline]
    unsafe fn deallocate(&mut self, blk: Block) {
        // SAFETY: forwarded contract.
        unsafe { (**self).deallocate(blk) }
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        (**self).owns(blk)
    }
}

impl<A: DeallocateAll + ?Sized> DeallocateAll for Box<A> {
    #[inline]
    fn deallocate_all(&mut self) {
        (**self).deallocate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{HeapAllocator, NullAllocator};

    #[test]
    fn try_allocate_maps_sentinel_to_exhausted() {
        let mut null = NullAllocator;
        assert_eq!(
            null.try_allocate(8, 8),
            Err(AllocError::Exhausted { size: 8, align: 8 })
        );
    }

    #[test]
    fn try_allocate_reports_bad_requests_without_halting() {
        let mut heap = HeapAllocator;
        assert_eq!(heap.try_allocate(0, 8), Err(AllocError::ZeroSize));
        assert_eq!(
            heap.try_allocate(8, 6),
            Err(AllocError::InvalidAlignment(6))
        );
    }

    #[test]
    fn boxed_trait_object_routes_calls() {
        let mut dynamic: Box<dyn Allocator> = Box::new(HeapAllocator);
        let blk = dynamic.try_allocate(32, 8).expect("heap allocation");
        assert!(dynamic.owns(blk));
        // SAFETY: blk came from this allocator and is released once.
        unsafe { dynamic.deallocate(blk) };
    }

    fn grab<A: Allocator>(mut alloc: A) -> Block {
        alloc.allocate(16, 16)
    }

    #[test]
    fn mutable_reference_forwards() {
        let mut heap = HeapAllocator;
        let blk = grab(&mut heap);
        assert!(!blk.is_null());
        assert_eq!(blk.addr() % 16, 0);
        // SAFETY: blk came from `heap` and is released once.
        unsafe { heap.deallocate(blk) };
    }
}
