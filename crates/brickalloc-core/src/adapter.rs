//! Container adapter: any allocator tree as a [`GlobalAlloc`].
//!
//! [`LockedAllocator`] serializes calls through a `parking_lot` mutex, so a
//! tree can back `#[global_allocator]` or be shared between threads. It adds
//! no policy: the sentinel becomes null and nothing else changes.
//!
//! Collections only reach an allocator through `#[global_allocator]`, and
//! that static needs a tree built in a `const` context. The heap and null
//! leaves and composites of them qualify. Arena-owning leaves (free list,
//! stack, linear, buffer) acquire their region at run time, so they cannot
//! back collections through this adapter; wrap them in a local
//! `LockedAllocator` and call the [`GlobalAlloc`] methods directly.

use std::alloc::{GlobalAlloc, Layout};
use std::ptr;

use parking_lot::{Mutex, MutexGuard};

use crate::block::{Block, MAX_ALIGN};
use crate::config::check_level;
use crate::contract::Allocator;

/// Mutex-guarded allocator usable as a [`GlobalAlloc`].
///
/// ```
/// use std::alloc::{GlobalAlloc, Layout};
/// use brickalloc_core::{HeapAllocator, LockedAllocator};
///
/// static ALLOC: LockedAllocator<HeapAllocator> = LockedAllocator::new(HeapAllocator);
///
/// let layout = Layout::from_size_align(64, 8).unwrap();
/// let ptr = unsafe { ALLOC.alloc(layout) };
/// assert!(!ptr.is_null());
/// unsafe { ALLOC.dealloc(ptr, layout) };
/// ```
pub struct LockedAllocator<A> {
    inner: Mutex<A>,
}

impl<A> LockedAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self {
            inner: parking_lot::const_mutex(inner),
        }
    }

    /// Exclusive access to the wrapped tree, e.g. for introspection.
    pub fn lock(&self) -> MutexGuard<'_, A> {
        self.inner.lock()
    }

    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }
}

unsafe impl<A: Allocator + Send> GlobalAlloc for LockedAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.size() == 0 || layout.align() > MAX_ALIGN {
            return ptr::null_mut();
        }
        // Resolve the check level outside the lock: the first resolution
        // reads the environment, which allocates.
        let _ = check_level();
        let blk = self.inner.lock().allocate(layout.size(), layout.align());
        if blk.is_null() {
            ptr::null_mut()
        } else {
            blk.as_ptr()
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ptr.is_null() {
            return;
        }
        let _ = check_level();
        // SAFETY: GlobalAlloc guarantees ptr came from `alloc` with this layout.
        unsafe {
            self.inner
                .lock()
                .deallocate(Block::new(ptr, layout.size()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::FallbackAllocator;
    use crate::free_list::{FirstFit, FreeListAllocator};
    use crate::leaf::{HeapAllocator, NullAllocator};
    use crate::stack::StackAllocator;

    fn layout(size: usize, align: usize) -> Layout {
        Layout::from_size_align(size, align).expect("layout")
    }

    #[test]
    fn round_trip_through_the_lock() {
        let locked =
            LockedAllocator::new(FreeListAllocator::<FirstFit>::with_capacity(256).expect("arena"));
        // SAFETY: pointers are released with the layout they were allocated with.
        unsafe {
            let p = locked.alloc(layout(24, 8));
            assert!(!p.is_null());
            assert_eq!(p as usize % 8, 0);
            assert!(locked.lock().free_bytes() < 256);
            locked.dealloc(p, layout(24, 8));
        }
        assert_eq!(locked.lock().free_bytes(), 256);
    }

    static CONST_TREE: LockedAllocator<FallbackAllocator<NullAllocator, HeapAllocator>> =
        LockedAllocator::new(FallbackAllocator::new(NullAllocator, HeapAllocator));

    #[test]
    fn const_tree_serves_from_a_static() {
        // SAFETY: the pointer is released with the layout it was allocated with.
        unsafe {
            let p = CONST_TREE.alloc(layout(48, 16));
            assert!(!p.is_null());
            assert_eq!(p as usize % 16, 0);
            p.write_bytes(0x5A, 48);
            CONST_TREE.dealloc(p, layout(48, 16));
        }
    }

    #[test]
    fn oversized_alignment_yields_null() {
        let locked = LockedAllocator::new(StackAllocator::with_capacity(256).expect("arena"));
        // SAFETY: a null result is never released.
        let p = unsafe { locked.alloc(layout(8, 2 * MAX_ALIGN)) };
        assert!(p.is_null());
        assert_eq!(locked.lock().used(), 0);
    }

    #[test]
    fn sentinel_maps_to_null() {
        let locked = LockedAllocator::new(NullAllocator);
        // SAFETY: a null result is never released.
        let p = unsafe { locked.alloc(layout(8, 8)) };
        assert!(p.is_null());
    }

    #[test]
    fn into_inner_returns_the_tree() {
        let locked = LockedAllocator::new(StackAllocator::with_capacity(64).expect("arena"));
        // SAFETY: the block is left outstanding and reclaimed with the arena.
        let _ = unsafe { locked.alloc(layout(4, 1)) };
        let stack = locked.into_inner();
        assert_eq!(stack.used(), 5);
    }
}
