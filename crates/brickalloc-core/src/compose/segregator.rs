//! Segregator composite: route by a fixed size threshold.

use crate::block::Block;
use crate::contract::{Allocator, DeallocateAll};
use crate::error::{Violation, ensure};

/// Sends requests of at most `THRESHOLD` bytes to `S`, larger ones to `B`.
///
/// The choice depends on the size alone, never on either child's state: a
/// failure in the chosen child is returned as is, the other child is not
/// tried. Keeps incompatible size classes out of each other's arena.
///
/// Releases go to `S` whenever `S::owns` claims the block, so `S` must never
/// claim a block that `B` handed out. A leaf that owns everything, such as
/// [`HeapAllocator`](crate::leaf::HeapAllocator), belongs at the end of the
/// big side, never anywhere on the small side:
///
/// ```
/// use brickalloc_core::{
///     Allocator, FallbackAllocator, FreeListAllocator, HeapAllocator, Segregator,
///     StackAllocator,
/// };
///
/// type Tree = Segregator<
///     64,
///     StackAllocator,
///     FallbackAllocator<FreeListAllocator, HeapAllocator>,
/// >;
///
/// let mut tree: Tree = Segregator::new(
///     StackAllocator::with_capacity(256)?,
///     FallbackAllocator::new(FreeListAllocator::with_capacity(1024)?, HeapAllocator),
/// );
/// let big = tree.allocate(512, 16);
/// assert!(!tree.small().owns(big));
/// unsafe { tree.deallocate(big) };
/// assert_eq!(tree.big().primary().free_bytes(), 1024);
/// # Ok::<(), brickalloc_core::AllocError>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct Segregator<const THRESHOLD: usize, S, B> {
    small: S,
    big: B,
}

impl<const THRESHOLD: usize, S: Allocator, B: Allocator> Segregator<THRESHOLD, S, B> {
    pub const fn new(small: S, big: B) -> Self {
        Self { small, big }
    }

    /// The size boundary (inclusive for the small side).
    pub const fn threshold(&self) -> usize {
        THRESHOLD
    }

    pub fn small(&self) -> &S {
        &self.small
    }

    pub fn big(&self) -> &B {
        &self.big
    }

    pub fn small_mut(&mut self) -> &mut S {
        &mut self.small
    }

    pub fn big_mut(&mut self) -> &mut B {
        &mut self.big
    }
}

impl<const THRESHOLD: usize, S: Allocator, B: Allocator> Allocator
    for Segregator<THRESHOLD, S, B>
{
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if size > THRESHOLD {
            self.big.allocate(size, align)
        } else {
            self.small.allocate(size, align)
        }
    }

    unsafe fn deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            return;
        }
        // SAFETY: blk came from one of the children; ownership picks which.
        unsafe {
            if self.small.owns(blk) {
                self.small.deallocate(blk);
            } else if self.big.owns(blk) {
                self.big.deallocate(blk);
            } else {
                ensure(false, || Violation::ForeignBlock {
                    addr: blk.addr(),
                    size: blk.size(),
                });
            }
        }
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        self.small.owns(blk) || self.big.owns(blk)
    }
}

impl<const THRESHOLD: usize, S: DeallocateAll, B: DeallocateAll> DeallocateAll
    for Segregator<THRESHOLD, S, B>
{
    fn deallocate_all(&mut self) {
        self.small.deallocate_all();
        self.big.deallocate_all();
    }
}
