//! Pure bump-pointer leaf.
//!
//! No per-allocation bookkeeping and no individual release: memory comes
//! back only through [`DeallocateAll`].

use crate::arena::Arena;
use crate::block::{Block, align_up};
use crate::contract::{Allocator, DeallocateAll};
use crate::error::{AllocError, Violation, admit, ensure};
use crate::leaf::HeapAllocator;

/// Bump allocator over an arena drawn from `A`.
pub struct LinearAllocator<A: Allocator = HeapAllocator> {
    arena: Arena<A>,
    top: usize,
}

impl LinearAllocator<HeapAllocator> {
    /// Heap-backed arena of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Self::new_in(capacity, HeapAllocator)
    }
}

impl<A: Allocator> LinearAllocator<A> {
    /// Arena of `capacity` bytes drawn from `backing`.
    pub fn new_in(capacity: usize, backing: A) -> Result<Self, AllocError> {
        Ok(Self {
            arena: Arena::acquire(backing, capacity)?,
            top: 0,
        })
    }

    /// Arena size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Bytes consumed since construction or the last reset.
    #[must_use]
    pub fn used(&self) -> usize {
        self.top
    }

    /// The arena region.
    #[must_use]
    pub fn region(&self) -> Block {
        self.arena.region()
    }
}

impl<A: Allocator> Allocator for LinearAllocator<A> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if !admit(size, align) {
            return Block::NULL;
        }
        let Some(start) = align_up(self.top, align) else {
            return Block::NULL;
        };
        let Some(end) = start.checked_add(size) else {
            return Block::NULL;
        };
        if end > self.arena.capacity() {
            return Block::NULL;
        }
        self.top = end;
        Block::new(self.arena.ptr_at(start), size)
    }

    unsafe fn deallocate(&mut self, blk: Block) {
        ensure(blk.is_null() || self.owns(blk), || Violation::ForeignBlock {
            addr: blk.addr(),
            size: blk.size(),
        });
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        self.arena.contains(blk.addr())
    }
}

impl<A: Allocator> DeallocateAll for LinearAllocator<A> {
    fn deallocate_all(&mut self) {
        self.top = 0;
    }
}
