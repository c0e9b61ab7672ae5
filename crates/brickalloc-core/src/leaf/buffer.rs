//! Single-buffer leaf.
//!
//! One fixed region of `N` bytes, acquired once at construction, handed out
//! whole to at most one outstanding allocation at a time. No per-call
//! system allocation.

use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::block::Block;
use crate::contract::{Allocator, DeallocateAll};
use crate::error::{Violation, admit, ensure};

// Alignment must stay equal to MAX_ALIGN.
#[repr(C, align(16))]
struct Region<const N: usize>([MaybeUninit<u8>; N]);

const _: () = assert!(std::mem::align_of::<Region<1>>() == crate::block::MAX_ALIGN);

/// Allocator over one fixed `N`-byte region.
///
/// The region lives at a stable address for the allocator's whole lifetime,
/// so the allocator itself may be moved freely (including into an arena
/// owner that uses it as backing).
pub struct BufferAllocator<const N: usize> {
    region: NonNull<Region<N>>,
    outstanding: bool,
}

impl<const N: usize> BufferAllocator<N> {
    /// Reserve the region.
    #[must_use]
    pub fn new() -> Self {
        let boxed: Box<MaybeUninit<Region<N>>> = Box::new_uninit();
        Self {
            region: NonNull::from(Box::leak(boxed)).cast(),
            outstanding: false,
        }
    }

    /// Region size in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// True while the region is handed out.
    #[inline]
    #[must_use]
    pub const fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    #[inline]
    fn start(&self) -> *mut u8 {
        self.region.as_ptr().cast()
    }
}

impl<const N: usize> Default for BufferAllocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Allocator for BufferAllocator<N> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if !admit(size, align) || self.outstanding || size > N {
            return Block::NULL;
        }
        self.outstanding = true;
        Block::new(self.start(), size)
    }

    unsafe fn deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            return;
        }
        ensure(self.owns(blk), || Violation::ForeignBlock {
            addr: blk.addr(),
            size: blk.size(),
        });
        ensure(self.outstanding, || Violation::DoubleFree { addr: blk.addr() });
        self.outstanding = false;
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        blk.as_ptr() == self.start()
    }
}

impl<const N: usize> DeallocateAll for BufferAllocator<N> {
    fn deallocate_all(&mut self) {
        self.outstanding = false;
    }
}

impl<const N: usize> Drop for BufferAllocator<N> {
    fn drop(&mut self) {
        // SAFETY: region was leaked from this exact box type in `new` and is reclaimed once.
        drop(unsafe { Box::from_raw(self.region.as_ptr().cast::<MaybeUninit<Region<N>>>()) });
    }
}

// SAFETY: the region is owned exclusively by this value.
unsafe impl<const N: usize> Send for BufferAllocator<N> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MAX_ALIGN;

    #[test]
    fn one_outstanding_allocation_at_a_time() {
        let mut buf = BufferAllocator::<64>::new();
        let first = buf.allocate(64, 8);
        assert!(!first.is_null());
        assert_eq!(first.addr() % MAX_ALIGN, 0);
        assert!(buf.allocate(1, 1).is_null(), "region is busy");

        // SAFETY: first came from `buf` and is released once.
        unsafe { buf.deallocate(first) };
        let second = buf.allocate(16, 16);
        assert_eq!(second.as_ptr(), first.as_ptr(), "region is reused");
    }

    #[test]
    fn oversized_request_fails() {
        let mut buf = BufferAllocator::<32>::new();
        assert!(buf.allocate(33, 1).is_null());
        assert!(!buf.is_outstanding(), "failure commits nothing");
    }

    #[test]
    fn owns_only_the_region_start() {
        let mut buf = BufferAllocator::<32>::new();
        let blk = buf.allocate(8, 1);
        assert!(buf.owns(blk));
        assert!(!buf.owns(Block::new(blk.as_ptr().wrapping_add(1), 4)));
        assert!(!buf.owns(Block::NULL));
    }

    #[test]
    fn deallocate_all_releases_the_region() {
        let mut buf = BufferAllocator::<32>::new();
        let _ = buf.allocate(8, 1);
        buf.deallocate_all();
        assert!(!buf.allocate(32, 1).is_null());
    }

    #[test]
    fn region_survives_moves() {
        let mut buf = BufferAllocator::<16>::new();
        let blk = buf.allocate(16, 1);
        let moved = Box::new(buf);
        assert!(moved.owns(blk));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "already free")]
    fn double_release_halts_in_debug() {
        let mut buf = BufferAllocator::<16>::new();
        let blk = buf.allocate(4, 1);
        // SAFETY: the second release is the misuse under test; the check halts before any effect.
        unsafe {
            buf.deallocate(blk);
            buf.deallocate(blk);
        }
    }
}
