//! General-purpose free-list allocator.
//!
//! The arena is carved into regions that are either free or granted:
//!
//! ```text
//!  free region:     [ region size | next offset | ...unused...        ]
//!  granted region:  [ region size | pad ][ payload (caller's bytes)    ]
//!                   ^ header (HEADER_SIZE)  ^ returned address
//! ```
//!
//! Free regions form one singly linked list in strictly ascending address
//! order. Allocation splits the chosen region when the remainder could
//! still host a block; deallocation reinserts the region in address order
//! and merges it with both neighbours, so no two free regions are ever
//! physically adjacent.
//!
//! Every region starts on a [`MAX_ALIGN`] boundary and every payload size
//! is rounded to it, so any alignment up to `MAX_ALIGN` holds without
//! per-request padding.
//!
//! Conservation: at every quiescent point the free region sizes plus the
//! live region sizes (header included) sum to the capacity.

use std::marker::PhantomData;
use std::mem::size_of;

use serde::Serialize;

use crate::arena::Arena;
use crate::block::{Block, MAX_ALIGN, align_up};
use crate::contract::{Allocator, DeallocateAll};
use crate::error::{AllocError, Violation, admit, ensure};
use crate::leaf::HeapAllocator;

const WORD: usize = size_of::<usize>();

/// Bytes reserved in front of each payload; holds the region size.
pub const HEADER_SIZE: usize = MAX_ALIGN;

/// Bytes of a free-list node: region size and next offset.
pub const NODE_SIZE: usize = MAX_ALIGN;

/// Smallest region that could ever host another block. A split that would
/// leave this much or less consumes the whole region instead.
pub const MIN_BLOCK_SIZE: usize = if HEADER_SIZE > NODE_SIZE {
    HEADER_SIZE
} else {
    NODE_SIZE
};

const _: () = assert!(2 * WORD <= NODE_SIZE && WORD <= HEADER_SIZE);

/// End-of-list marker for `next` offsets.
const NIL: usize = usize::MAX;

/// Region-selection rule.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitStrategy {
    /// First region large enough, in address order.
    #[default]
    FirstFit,
    /// Smallest region large enough; ties go to the lower address.
    BestFit,
}

impl FitStrategy {
    /// Parse from string (case-insensitive). Unknown values map to `FirstFit`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "bestfit" | "best" => Self::BestFit,
            _ => Self::FirstFit,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstFit => "first-fit",
            Self::BestFit => "best-fit",
        }
    }
}

/// Static fit policy selector.
pub trait FitPolicy {
    const STRATEGY: FitStrategy;
}

/// Marker for [`FitStrategy::FirstFit`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FirstFit;

/// Marker for [`FitStrategy::BestFit`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BestFit;

impl FitPolicy for FirstFit {
    const STRATEGY: FitStrategy = FitStrategy::FirstFit;
}

impl FitPolicy for BestFit {
    const STRATEGY: FitStrategy = FitStrategy::BestFit;
}

#[derive(Debug, Clone, Copy)]
struct FreeNode {
    size: usize,
    next: usize,
}

/// A free region chosen for an allocation, with its list neighbourhood.
#[derive(Debug, Clone, Copy)]
struct Fit {
    prev: usize,
    offset: usize,
    node: FreeNode,
}

/// Point-in-time arena occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArenaStats {
    pub capacity: usize,
    pub free_bytes: usize,
    pub free_regions: usize,
    pub largest_free_region: usize,
}

/// Free-list allocator over a fixed arena drawn from `A`.
pub struct FreeListAllocator<F: FitPolicy = FirstFit, A: Allocator = HeapAllocator> {
    arena: Arena<A>,
    head: usize,
    _policy: PhantomData<F>,
}

/// Best-fit free list over the heap.
pub type BestFitAllocator = FreeListAllocator<BestFit>;

impl<F: FitPolicy> FreeListAllocator<F, HeapAllocator> {
    /// Heap-backed arena of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Self::new_in(capacity, HeapAllocator)
    }
}

impl<F: FitPolicy, A: Allocator> FreeListAllocator<F, A> {
    /// Arena of `capacity` bytes drawn from `backing`.
    ///
    /// The capacity must exceed [`MIN_BLOCK_SIZE`] so the arena can host at
    /// least one block.
    pub fn new_in(capacity: usize, backing: A) -> Result<Self, AllocError> {
        if capacity <= MIN_BLOCK_SIZE {
            return Err(AllocError::CapacityTooSmall {
                capacity,
                minimum: MIN_BLOCK_SIZE,
            });
        }
        let mut this = Self {
            arena: Arena::acquire(backing, capacity)?,
            head: NIL,
            _policy: PhantomData,
        };
        this.reset();
        Ok(this)
    }

    /// Arena size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// The selection rule this instance was built with.
    #[must_use]
    pub const fn strategy(&self) -> FitStrategy {
        F::STRATEGY
    }

    /// The arena region.
    #[must_use]
    pub fn region(&self) -> Block {
        self.arena.region()
    }

    /// Free regions in ascending address order. Each block spans the whole
    /// region, node included.
    pub fn free_regions(&self) -> impl Iterator<Item = Block> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let node = self.node(cursor);
            let region = Block::new(self.arena.ptr_at(cursor), node.size);
            cursor = node.next;
            Some(region)
        })
    }

    /// Total free bytes, node overhead included.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.free_regions().map(Block::size).sum()
    }

    /// Size of the largest free region (0 when the arena is full).
    #[must_use]
    pub fn largest_free_region(&self) -> usize {
        self.free_regions().map(Block::size).max().unwrap_or(0)
    }

    /// Occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let mut stats = ArenaStats {
            capacity: self.capacity(),
            free_bytes: 0,
            free_regions: 0,
            largest_free_region: 0,
        };
        for region in self.free_regions() {
            stats.free_bytes += region.size();
            stats.free_regions += 1;
            stats.largest_free_region = stats.largest_free_region.max(region.size());
        }
        stats
    }

    /// Whole-region size (header plus rounded payload) behind a live block.
    ///
    /// # Safety
    ///
    /// `blk` must be a live, non-sentinel block returned by this allocator.
    #[must_use]
    pub unsafe fn region_size(&self, blk: Block) -> usize {
        let start = self.arena.offset_of(blk.addr()) - HEADER_SIZE;
        // SAFETY: a live block's header sits HEADER_SIZE bytes before it.
        unsafe { self.arena.read::<usize>(start) }
    }

    /// Structural check of the free list: ascending, in bounds, no
    /// overlap, fully coalesced.
    pub fn verify(&self) -> Result<(), Violation> {
        let capacity = self.capacity();
        let mut cursor = self.head;
        let mut last: Option<(usize, usize)> = None;
        while cursor != NIL {
            if cursor >= capacity || cursor % MAX_ALIGN != 0 {
                return Err(Violation::OutOfBounds {
                    offset: cursor,
                    size: 0,
                });
            }
            let node = self.node(cursor);
            if node.size < NODE_SIZE || node.size > capacity - cursor {
                return Err(Violation::OutOfBounds {
                    offset: cursor,
                    size: node.size,
                });
            }
            if let Some((prev, prev_size)) = last {
                if cursor <= prev {
                    return Err(Violation::Unordered { offset: cursor });
                }
                let prev_end = prev + prev_size;
                if prev_end > cursor {
                    return Err(Violation::Overlap { offset: prev });
                }
                if prev_end == cursor {
                    return Err(Violation::Unmerged {
                        left: prev,
                        right: cursor,
                    });
                }
            }
            last = Some((cursor, node.size));
            cursor = node.next;
        }
        Ok(())
    }

    /// Check conservation against the caller's tally of live region sizes
    /// (see [`region_size`](Self::region_size)).
    pub fn verify_conservation(&self, live_region_bytes: usize) -> Result<(), Violation> {
        let free = self.free_bytes();
        if free + live_region_bytes == self.capacity() {
            Ok(())
        } else {
            Err(Violation::Conservation {
                free,
                live: live_region_bytes,
                capacity: self.capacity(),
            })
        }
    }

    fn reset(&mut self) {
        let capacity = self.capacity();
        self.write_node(
            0,
            FreeNode {
                size: capacity,
                next: NIL,
            },
        );
        self.head = 0;
    }

    #[inline]
    fn node(&self, offset: usize) -> FreeNode {
        // SAFETY: list offsets always name a node written by `write_node`.
        unsafe {
            FreeNode {
                size: self.arena.read(offset),
                next: self.arena.read(offset + WORD),
            }
        }
    }

    #[inline]
    fn write_node(&mut self, offset: usize, node: FreeNode) {
        // SAFETY: offset starts a free region of at least NODE_SIZE bytes on a MAX_ALIGN boundary.
        unsafe {
            self.arena.write(offset, node.size);
            self.arena.write(offset + WORD, node.next);
        }
    }

    #[inline]
    fn set_size(&mut self, offset: usize, size: usize) {
        // SAFETY: offset starts a free region.
        unsafe { self.arena.write(offset, size) }
    }

    #[inline]
    fn set_next(&mut self, offset: usize, next: usize) {
        // SAFETY: offset starts a free region.
        unsafe { self.arena.write(offset + WORD, next) }
    }

    /// Point `prev` (or the head, for `NIL`) at `next`.
    #[inline]
    fn link(&mut self, prev: usize, next: usize) {
        if prev == NIL {
            self.head = next;
        } else {
            self.set_next(prev, next);
        }
    }

    fn find_fit(&self, needed: usize) -> Option<Fit> {
        let mut best: Option<Fit> = None;
        let mut prev = NIL;
        let mut cursor = self.head;
        while cursor != NIL {
            let node = self.node(cursor);
            if node.size >= needed {
                let candidate = Fit {
                    prev,
                    offset: cursor,
                    node,
                };
                match F::STRATEGY {
                    FitStrategy::FirstFit => return Some(candidate),
                    FitStrategy::BestFit => {
                        // An exact fit cannot be beaten, and earlier wins ties.
                        if node.size == needed {
                            return Some(candidate);
                        }
                        if best.is_none_or(|b| node.size < b.node.size) {
                            best = Some(candidate);
                        }
                    }
                }
            }
            prev = cursor;
            cursor = node.next;
        }
        best
    }
}

impl<F: FitPolicy, A: Allocator> Allocator for FreeListAllocator<F, A> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if !admit(size, align) {
            return Block::NULL;
        }
        let Some(mut needed) =
            align_up(size, MAX_ALIGN).and_then(|rounded| rounded.checked_add(HEADER_SIZE))
        else {
            return Block::NULL;
        };
        let Some(fit) = self.find_fit(needed) else {
            return Block::NULL;
        };

        let remainder = fit.node.size - needed;
        let successor = if remainder <= MIN_BLOCK_SIZE {
            needed = fit.node.size;
            fit.node.next
        } else {
            let split = fit.offset + needed;
            self.write_node(
                split,
                FreeNode {
                    size: remainder,
                    next: fit.node.next,
                },
            );
            split
        };
        self.link(fit.prev, successor);

        // SAFETY: fit.offset starts the region just unlinked from the free list.
        unsafe { self.arena.write(fit.offset, needed) };
        Block::new(self.arena.ptr_at(fit.offset + HEADER_SIZE), size)
    }

    unsafe fn deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            return;
        }
        ensure(
            self.owns(blk) && self.arena.offset_of(blk.addr()) >= HEADER_SIZE,
            || Violation::ForeignBlock {
                addr: blk.addr(),
                size: blk.size(),
            },
        );

        let start = self.arena.offset_of(blk.addr()) - HEADER_SIZE;
        // SAFETY: a live block's header sits HEADER_SIZE bytes before it.
        let region = unsafe { self.arena.read::<usize>(start) };
        let end = start + region;

        let mut prev = NIL;
        let mut cursor = self.head;
        while cursor != NIL && cursor < end {
            prev = cursor;
            cursor = self.node(cursor).next;
        }

        let merged = if prev == NIL {
            self.write_node(
                start,
                FreeNode {
                    size: region,
                    next: self.head,
                },
            );
            self.head = start;
            start
        } else {
            let before = self.node(prev);
            ensure(prev + before.size <= start, || Violation::DoubleFree {
                addr: blk.addr(),
            });
            if prev + before.size == start {
                self.set_size(prev, before.size + region);
                prev
            } else {
                self.write_node(
                    start,
                    FreeNode {
                        size: region,
                        next: before.next,
                    },
                );
                self.set_next(prev, start);
                start
            }
        };

        if cursor != NIL && cursor == end {
            let absorbed = self.node(cursor);
            let grown = self.node(merged).size + absorbed.size;
            self.write_node(
                merged,
                FreeNode {
                    size: grown,
                    next: absorbed.next,
                },
            );
        }
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        self.arena.contains(blk.addr())
    }
}

impl<F: FitPolicy, A: Allocator> DeallocateAll for FreeListAllocator<F, A> {
    fn deallocate_all(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{BufferAllocator, NullAllocator};

    fn first_fit(capacity: usize) -> FreeListAllocator<FirstFit> {
        FreeListAllocator::with_capacity(capacity).expect("arena")
    }

    fn offsets<F: FitPolicy, A: Allocator>(alloc: &FreeListAllocator<F, A>) -> Vec<(usize, usize)> {
        let base = alloc.region().addr();
        alloc
            .free_regions()
            .map(|r| (r.addr() - base, r.size()))
            .collect()
    }

    #[test]
    fn fresh_arena_is_one_free_region() {
        let alloc = first_fit(256);
        assert_eq!(offsets(&alloc), vec![(0, 256)]);
        assert_eq!(
            alloc.stats(),
            ArenaStats {
                capacity: 256,
                free_bytes: 256,
                free_regions: 1,
                largest_free_region: 256,
            }
        );
        alloc.verify().expect("fresh list is valid");
    }

    #[test]
    fn capacity_must_exceed_min_block() {
        let err = FreeListAllocator::<FirstFit>::with_capacity(MIN_BLOCK_SIZE).err();
        assert_eq!(
            err,
            Some(AllocError::CapacityTooSmall {
                capacity: MIN_BLOCK_SIZE,
                minimum: MIN_BLOCK_SIZE
            })
        );
    }

    #[test]
    fn backing_failure_surfaces_as_error() {
        let err = FreeListAllocator::<FirstFit, _>::new_in(128, NullAllocator).err();
        assert_eq!(err, Some(AllocError::ArenaUnavailable { capacity: 128 }));
    }

    #[test]
    fn allocation_splits_and_writes_header() {
        let mut alloc = first_fit(256);
        let blk = alloc.allocate(20, 4);
        assert_eq!(blk.size(), 20);
        assert_eq!(blk.addr() - alloc.region().addr(), HEADER_SIZE);
        assert_eq!(blk.addr() % MAX_ALIGN, 0);
        // 20 rounds to 32, plus a 16-byte header.
        // SAFETY: blk is live.
        assert_eq!(unsafe { alloc.region_size(blk) }, 48);
        assert_eq!(offsets(&alloc), vec![(48, 208)]);
    }

    #[test]
    fn small_remainder_is_consumed_whole() {
        // 64-byte arena, request needs 32 + 16 = 48, remainder 16 == MIN_BLOCK_SIZE.
        let mut alloc = first_fit(64);
        let blk = alloc.allocate(32, 8);
        assert!(!blk.is_null());
        // SAFETY: blk is live.
        assert_eq!(unsafe { alloc.region_size(blk) }, 64);
        assert_eq!(alloc.free_regions().count(), 0);
        assert!(alloc.allocate(1, 1).is_null());
    }

    #[test]
    fn exhaustion_returns_sentinel_without_side_effects() {
        let mut alloc = first_fit(128);
        let before = offsets(&alloc);
        assert!(alloc.allocate(200, 8).is_null());
        assert_eq!(offsets(&alloc), before);
    }

    #[test]
    fn fragmentation_is_indistinguishable_from_exhaustion() {
        let mut alloc = first_fit(160);
        let a = alloc.allocate(16, 8);
        let b = alloc.allocate(16, 8);
        let c = alloc.allocate(16, 8);
        let d = alloc.allocate(16, 8);
        assert!(!d.is_null());
        // SAFETY: a and c are live and released once.
        unsafe {
            alloc.deallocate(a);
            alloc.deallocate(c);
        }
        // 64 bytes free across two 32-byte regions plus a 32-byte tail, none fits 48.
        assert_eq!(alloc.free_bytes(), 96);
        assert!(alloc.allocate(32, 8).is_null());
        let _ = b;
    }

    #[test]
    fn release_merges_backward_and_forward() {
        let mut alloc = first_fit(256);
        let a = alloc.allocate(16, 8);
        let b = alloc.allocate(16, 8);
        let c = alloc.allocate(16, 8);
        // SAFETY: each block is live and released once.
        unsafe {
            alloc.deallocate(a);
            assert_eq!(offsets(&alloc), vec![(0, 32), (96, 160)]);
            alloc.deallocate(c);
            // c merges forward into the tail.
            assert_eq!(offsets(&alloc), vec![(0, 32), (64, 192)]);
            alloc.deallocate(b);
        }
        // b merges with both neighbours.
        assert_eq!(offsets(&alloc), vec![(0, 256)]);
        alloc.verify().expect("coalesced");
    }

    #[test]
    fn release_before_head_becomes_new_head() {
        let mut alloc = first_fit(256);
        let a = alloc.allocate(16, 8);
        let b = alloc.allocate(16, 8);
        let _c = alloc.allocate(16, 8);
        // SAFETY: b then a are live and released once.
        unsafe {
            alloc.deallocate(b);
            alloc.deallocate(a);
        }
        assert_eq!(offsets(&alloc), vec![(0, 64), (96, 160)]);
    }

    #[test]
    fn deallocate_all_restores_single_region() {
        let mut alloc = first_fit(256);
        for _ in 0..4 {
            assert!(!alloc.allocate(8, 8).is_null());
        }
        alloc.deallocate_all();
        assert_eq!(offsets(&alloc), vec![(0, 256)]);
    }

    #[test]
    fn owns_is_an_address_range_test() {
        let mut alloc = first_fit(128);
        let blk = alloc.allocate(8, 8);
        assert!(alloc.owns(blk));
        assert!(!alloc.owns(Block::NULL));
        let mut local = 0u8;
        assert!(!alloc.owns(Block::new(&raw mut local, 1)));
    }

    #[test]
    fn runs_over_a_buffer_backing() {
        let mut alloc =
            FreeListAllocator::<BestFit, _>::new_in(256, BufferAllocator::<256>::new())
                .expect("buffer arena");
        let blk = alloc.allocate(100, 16);
        assert!(!blk.is_null());
        assert_eq!(alloc.strategy(), FitStrategy::BestFit);
        // SAFETY: blk is live and released once.
        unsafe { alloc.deallocate(blk) };
        assert_eq!(alloc.free_bytes(), 256);
    }

    #[test]
    fn fit_strategy_parses_loosely() {
        assert_eq!(FitStrategy::from_str_loose("best-fit"), FitStrategy::BestFit);
        assert_eq!(FitStrategy::from_str_loose("BEST_FIT"), FitStrategy::BestFit);
        assert_eq!(FitStrategy::from_str_loose("best"), FitStrategy::BestFit);
        assert_eq!(FitStrategy::from_str_loose("first"), FitStrategy::FirstFit);
        assert_eq!(FitStrategy::from_str_loose("bogus"), FitStrategy::FirstFit);
        assert_eq!(FitStrategy::BestFit.as_str(), "best-fit");
    }

    #[test]
    fn verify_detects_unmerged_neighbours() {
        let mut alloc = first_fit(256);
        // Forge two adjacent free nodes.
        alloc.write_node(0, FreeNode { size: 64, next: 64 });
        alloc.write_node(64, FreeNode { size: 192, next: NIL });
        assert_eq!(
            alloc.verify(),
            Err(Violation::Unmerged { left: 0, right: 64 })
        );
        alloc.deallocate_all();
        alloc.verify().expect("reset list is valid");
    }

    #[test]
    fn conservation_mismatch_is_reported() {
        let mut alloc = first_fit(256);
        let blk = alloc.allocate(40, 8);
        // SAFETY: blk is live.
        let live = unsafe { alloc.region_size(blk) };
        alloc.verify_conservation(live).expect("balanced");
        assert!(matches!(
            alloc.verify_conservation(live + 16),
            Err(Violation::Conservation { .. })
        ));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "already free")]
    fn double_free_halts_in_debug() {
        let mut alloc = first_fit(256);
        let a = alloc.allocate(16, 8);
        let _b = alloc.allocate(16, 8);
        let c = alloc.allocate(16, 8);
        // SAFETY: the second release of c is the misuse under test; the check halts first.
        unsafe {
            alloc.deallocate(a);
            alloc.deallocate(c);
            alloc.deallocate(c);
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "brickalloc misuse")]
    fn zero_size_halts_in_debug() {
        let mut alloc = first_fit(128);
        let _ = alloc.allocate(0, 8);
    }
}
