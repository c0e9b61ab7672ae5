//! # brickalloc-core
//!
//! Composable building-block memory allocators.
//!
//! Every component implements one small contract, [`Allocator`]:
//! `allocate(size, align) -> Block`, `deallocate(Block)` and `owns(Block)`.
//! Trees are wired at compile time from leaves and composites:
//!
//! - Leaves own memory: [`FreeListAllocator`] (first/best fit with
//!   coalescing), [`StackAllocator`] (LIFO), [`LinearAllocator`] (bump,
//!   bulk reset only), [`BufferAllocator`], [`HeapAllocator`],
//!   [`NullAllocator`].
//! - Composites only route: [`FallbackAllocator`] tries its primary, then
//!   its secondary; [`Segregator`] picks a child by request size.
//! - Adapters: [`LogAllocator`] records traffic, [`LockedAllocator`] exposes
//!   a tree as a [`GlobalAlloc`](std::alloc::GlobalAlloc).
//!
//! Exhaustion is reported as [`Block::NULL`] (size 0). Misuse, such as a
//! zero-size request or releasing a block to the wrong allocator, halts when
//! checks are enabled; see [`config`].
//!
//! ```
//! use brickalloc_core::{
//!     Allocator, FallbackAllocator, FreeListAllocator, HeapAllocator, Segregator,
//!     StackAllocator,
//! };
//!
//! type Tree = Segregator<
//!     64,
//!     StackAllocator,
//!     FallbackAllocator<FreeListAllocator, HeapAllocator>,
//! >;
//!
//! let mut tree: Tree = Segregator::new(
//!     StackAllocator::with_capacity(1024)?,
//!     FallbackAllocator::new(FreeListAllocator::with_capacity(64 * 1024)?, HeapAllocator),
//! );
//! let small = tree.allocate(24, 8);
//! let big = tree.allocate(4096, 16);
//! assert!(tree.small().owns(small));
//! assert!(tree.big().primary().owns(big));
//! unsafe {
//!     tree.deallocate(big);
//!     tree.deallocate(small);
//! }
//! assert_eq!(tree.big().primary().free_bytes(), 64 * 1024);
//! # Ok::<(), brickalloc_core::AllocError>(())
//! ```

pub mod adapter;
pub mod arena;
pub mod block;
pub mod compose;
pub mod config;
pub mod contract;
pub mod error;
pub mod free_list;
pub mod leaf;
pub mod log;
pub mod stack;

pub use adapter::LockedAllocator;
pub use arena::Arena;
pub use block::{Block, MAX_ALIGN, align_up};
pub use compose::{FallbackAllocator, Segregator};
pub use config::{CheckLevel, check_level, misuse_checks_enabled};
pub use contract::{Allocator, DeallocateAll};
pub use error::{AllocError, Violation, misuse, validate_request};
pub use free_list::{
    ArenaStats, BestFit, BestFitAllocator, FirstFit, FitPolicy, FitStrategy, FreeListAllocator,
};
pub use leaf::{BufferAllocator, HeapAllocator, LinearAllocator, NullAllocator};
pub use log::{
    AllocatorLogLevel, AllocatorLogRecord, LogAllocator, LogStrategy, NoLog, RecordLog, StderrLog,
};
pub use stack::StackAllocator;
