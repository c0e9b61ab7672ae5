//! Fixed-capacity arena with offset-based byte views.
//!
//! An arena is acquired in full from a backing allocator at construction and
//! released in full on drop. Owners address it by offset: bookkeeping
//! structures (free-list nodes, allocation headers) are read and written as
//! plain words at explicit offsets instead of overlapping typed structs, so
//! the on-arena layout stays exact while no Rust reference ever aliases the
//! caller's memory.
//!
//! Not thread-safe. One owner, one thread at a time.

use std::mem::{align_of, size_of};

use crate::block::{Block, MAX_ALIGN};
use crate::contract::Allocator;
use crate::error::AllocError;

/// Contiguous region owned exclusively by one allocator instance.
pub struct Arena<A: Allocator> {
    region: Block,
    backing: A,
}

impl<A: Allocator> Arena<A> {
    /// Acquire `capacity` bytes at [`MAX_ALIGN`] from `backing`.
    pub fn acquire(mut backing: A, capacity: usize) -> Result<Self, AllocError> {
        if capacity == 0 {
            return Err(AllocError::CapacityTooSmall {
                capacity,
                minimum: 0,
            });
        }
        let region = backing.allocate(capacity, MAX_ALIGN);
        if region.is_null() {
            return Err(AllocError::ArenaUnavailable { capacity });
        }
        if region.addr() % MAX_ALIGN != 0 || region.size() < capacity {
            // SAFETY: region was just returned by backing and is released once.
            unsafe { backing.deallocate(region) };
            return Err(AllocError::ArenaUnavailable { capacity });
        }
        Ok(Self { region, backing })
    }

    /// The whole region.
    #[inline]
    #[must_use]
    pub fn region(&self) -> Block {
        self.region
    }

    /// Total bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Address of the first byte.
    #[inline]
    #[must_use]
    pub fn base(&self) -> usize {
        self.region.addr()
    }

    /// True if `addr` lies inside the region.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        self.region.contains(addr)
    }

    /// Byte offset of `addr` from the region start. `addr` must be in range.
    #[inline]
    pub(crate) fn offset_of(&self, addr: usize) -> usize {
        debug_assert!(addr >= self.base() && addr <= self.region.end());
        addr - self.base()
    }

    /// Pointer to the byte at `offset` (one-past-the-end allowed).
    #[inline]
    pub(crate) fn ptr_at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.capacity());
        self.region.as_ptr().wrapping_add(offset)
    }

    /// Read a `T` stored at `offset`.
    ///
    /// # Safety
    ///
    /// `[offset, offset + size_of::<T>())` must lie inside the region, be
    /// aligned for `T` relative to the `MAX_ALIGN`-aligned base, and hold a
    /// value previously written with [`write`](Self::write).
    #[inline]
    pub(crate) unsafe fn read<T: Copy>(&self, offset: usize) -> T {
        debug_assert!(offset + size_of::<T>() <= self.capacity());
        debug_assert!(offset % align_of::<T>() == 0);
        // SAFETY: bounds, alignment and initialization are the caller's contract.
        unsafe { self.ptr_at(offset).cast::<T>().read() }
    }

    /// Store a `T` at `offset`.
    ///
    /// # Safety
    ///
    /// `[offset, offset + size_of::<T>())` must lie inside the region, be
    /// aligned for `T`, and not overlap memory currently granted to a caller.
    #[inline]
    pub(crate) unsafe fn write<T: Copy>(&mut self, offset: usize, value: T) {
        debug_assert!(offset + size_of::<T>() <= self.capacity());
        debug_assert!(offset % align_of::<T>() == 0);
        // SAFETY: bounds, alignment and exclusivity are the caller's contract.
        unsafe { self.ptr_at(offset).cast::<T>().write(value) }
    }

    /// The allocator the region came from.
    #[must_use]
    pub fn backing(&self) -> &A {
        &self.backing
    }
}

impl<A: Allocator> Drop for Arena<A> {
    fn drop(&mut self) {
        // SAFETY: region came from backing in `acquire` and is released exactly once here.
        unsafe { self.backing.deallocate(self.region) };
    }
}

// SAFETY: the region is owned exclusively by this value; moving the owner to
// another thread moves sole access with it.
unsafe impl<A: Allocator + Send> Send for Arena<A> {}
