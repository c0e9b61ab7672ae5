//! Allocator trees a storm can be pointed at.

use brickalloc_core::{
    Allocator, ArenaStats, Block, FallbackAllocator, FitPolicy, FitStrategy, FreeListAllocator,
    HeapAllocator, Segregator, StackAllocator, Violation,
};
use clap::ValueEnum;
use serde::Serialize;

/// Which tree to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocatorKind {
    /// One free-list arena.
    FreeList,
    /// One stack arena; releases are forced into LIFO order.
    Stack,
    /// Small requests to a stack, large ones to a heap-backed free list.
    Segregated,
}

impl AllocatorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeList => "free-list",
            Self::Stack => "stack",
            Self::Segregated => "segregated",
        }
    }
}

/// Command-line spelling of [`FitStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FitChoice {
    FirstFit,
    BestFit,
}

impl From<FitChoice> for FitStrategy {
    fn from(choice: FitChoice) -> Self {
        match choice {
            FitChoice::FirstFit => Self::FirstFit,
            FitChoice::BestFit => Self::BestFit,
        }
    }
}

/// Requests up to this size go to the small side of the segregated tree.
pub const SEGREGATED_THRESHOLD: usize = 64;

/// Large side of the segregated tree. The heap only sees what the arena
/// cannot hold.
pub type BigSide<F> = FallbackAllocator<FreeListAllocator<F>, HeapAllocator>;

/// The segregated tree, generic over the large side's fit policy.
pub type SegregatedTree<F> = Segregator<SEGREGATED_THRESHOLD, StackAllocator, BigSide<F>>;

/// An allocator plus the hooks the storm driver needs.
pub trait StormSubject: Allocator {
    /// Releases must come back most-recent first.
    fn lifo_only(&self) -> bool {
        false
    }

    /// Check internal invariants against the driver's live set.
    ///
    /// # Safety
    ///
    /// Every block in `live` must be live in this allocator.
    unsafe fn audit(&self, _live: &[Block]) -> Result<(), Violation> {
        Ok(())
    }

    /// Free-list occupancy, where the tree has one.
    fn arena_stats(&self) -> Option<ArenaStats> {
        None
    }
}

impl<F: FitPolicy> StormSubject for FreeListAllocator<F> {
    unsafe fn audit(&self, live: &[Block]) -> Result<(), Violation> {
        self.verify()?;
        // SAFETY: forwarded contract; every block is live here.
        let charged = live.iter().map(|&b| unsafe { self.region_size(b) }).sum();
        self.verify_conservation(charged)
    }

    fn arena_stats(&self) -> Option<ArenaStats> {
        Some(self.stats())
    }
}

impl StormSubject for StackAllocator {
    fn lifo_only(&self) -> bool {
        true
    }

    unsafe fn audit(&self, live: &[Block]) -> Result<(), Violation> {
        let top = self.region().addr() + self.used();
        match live.last() {
            Some(last) if last.end() != top => Err(Violation::OutOfOrderRelease {
                block_end: last.end(),
                top,
            }),
            None if self.used() != 0 => Err(Violation::Conservation {
                free: self.remaining(),
                live: 0,
                capacity: self.capacity(),
            }),
            _ => Ok(()),
        }
    }
}

impl<F: FitPolicy> StormSubject for SegregatedTree<F> {
    // The small side is a stack; any release order may reach it.
    fn lifo_only(&self) -> bool {
        true
    }

    unsafe fn audit(&self, live: &[Block]) -> Result<(), Violation> {
        let (small, rest): (Vec<Block>, Vec<Block>) =
            live.iter().copied().partition(|&b| self.small().owns(b));
        let arena = self.big().primary();
        let pooled: Vec<Block> = rest.into_iter().filter(|&b| arena.owns(b)).collect();
        // SAFETY: each partition is live in the leaf that owns it.
        unsafe {
            self.small().audit(&small)?;
            arena.audit(&pooled)
        }
    }

    fn arena_stats(&self) -> Option<ArenaStats> {
        self.big().primary().arena_stats()
    }
}
