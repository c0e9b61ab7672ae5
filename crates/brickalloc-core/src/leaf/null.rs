//! Always-fail leaf.

use crate::block::Block;
use crate::contract::{Allocator, DeallocateAll};
use crate::error::{Violation, admit, ensure};

/// Allocator that never succeeds and owns nothing.
///
/// Terminates a composition statically or forbids a routing path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullAllocator;

impl Allocator for NullAllocator {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        let _ = admit(size, align);
        Block::NULL
    }

    #[inline]
    unsafe fn deallocate(&mut self, blk: Block) {
        ensure(blk.is_null(), || Violation::ForeignBlock {
            addr: blk.addr(),
            size: blk.size(),
        });
    }

    #[inline]
    fn owns(&self, _blk: Block) -> bool {
        false
    }
}

impl DeallocateAll for NullAllocator {
    #[inline]
    fn deallocate_all(&mut self) {}
}
