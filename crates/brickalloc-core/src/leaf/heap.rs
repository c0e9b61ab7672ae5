//! Heap-backed leaf.
//!
//! Every request goes to the system allocator. Unbounded, and `owns` is
//! always true, which makes it the usual terminal link of a fallback chain.
//! It calls [`System`] directly, never the registered global allocator, so
//! a tree ending in it can itself be installed as `#[global_allocator]`.

use std::alloc::{GlobalAlloc, Layout, System};

use crate::block::{Block, MAX_ALIGN};
use crate::contract::Allocator;
use crate::error::admit;

/// Allocator backed by the system heap.
///
/// Every block is allocated at [`MAX_ALIGN`], so deallocation can rebuild
/// the layout from the block alone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if !admit(size, align) {
            return Block::NULL;
        }
        let Ok(layout) = Layout::from_size_align(size, MAX_ALIGN) else {
            return Block::NULL;
        };
        // SAFETY: layout has non-zero size (checked by `admit`).
        let ptr = unsafe { System.alloc(layout) };
        if ptr.is_null() {
            return Block::NULL;
        }
        Block::new(ptr, size)
    }

    unsafe fn deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            return;
        }
        // SAFETY: blk came from `allocate`, which used exactly this layout.
        unsafe {
            let layout = Layout::from_size_align_unchecked(blk.size(), MAX_ALIGN);
            System.dealloc(blk.as_ptr(), layout);
        }
    }

    #[inline]
    fn owns(&self, _blk: Block) -> bool {
        true
    }
}
