//! Memory block handle.
//!
//! A [`Block`] is a non-owning `(address, size)` view threaded through every
//! allocator call. It is both the allocation result and the descriptor used
//! internally for free regions. A zero-size block is the universal failure
//! sentinel.

use std::ptr;

/// Largest alignment any allocator in this crate hands out.
///
/// Arenas are acquired at this alignment and every free-list payload starts
/// on a multiple of it, so any request up to `MAX_ALIGN` is satisfied.
pub const MAX_ALIGN: usize = 16;

/// Round `value` up to the next multiple of `align` (a power of two).
///
/// Returns `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(bumped) => Some(bumped & !(align - 1)),
        None => None,
    }
}

/// Non-owning `(address, size)` view of raw memory.
///
/// Equality is by `(address, size)`. The block does not keep the memory
/// alive: it is valid exactly as long as the allocator that produced it has
/// neither released it nor been reset or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    ptr: *mut u8,
    size: usize,
}

impl Block {
    /// The failure sentinel.
    pub const NULL: Self = Self {
        ptr: ptr::null_mut(),
        size: 0,
    };

    /// Wrap a raw address and byte count.
    #[inline]
    #[must_use]
    pub const fn new(ptr: *mut u8, size: usize) -> Self {
        Self { ptr, size }
    }

    /// Start of the region.
    #[inline]
    #[must_use]
    pub const fn as_ptr(self) -> *mut u8 {
        self.ptr
    }

    /// Start of the region as an integer address.
    #[inline]
    #[must_use]
    pub fn addr(self) -> usize {
        self.ptr as usize
    }

    /// Usable byte count.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }

    /// One past the last byte of the region.
    #[inline]
    #[must_use]
    pub fn end(self) -> usize {
        self.addr() + self.size
    }

    /// True for the failure sentinel (any zero-size block).
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.size == 0
    }

    /// True if `addr` falls inside `[start, end)`.
    #[inline]
    #[must_use]
    pub fn contains(self, addr: usize) -> bool {
        addr >= self.addr() && addr < self.end()
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    #[inline]
    #[must_use]
    pub const fn into_option(self) -> Option<Self> {
        if self.is_null() { None } else { Some(self) }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::NULL
    }
}
