//! Leaf allocators.
//!
//! Leaves own real memory directly and never delegate:
//! - Heap-backed (`heap`): the process allocator, unbounded, owns everything
//! - Single buffer (`buffer`): one fixed region, one allocation at a time
//! - Pure bump (`linear`): bump pointer, bulk reset only
//! - Always-fail (`null`): static terminator
//!
//! The free-list and stack allocators are leaves too but live in their own
//! top-level modules.

pub mod buffer;
pub mod heap;
pub mod linear;
pub mod null;

pub use buffer::BufferAllocator;
pub use heap::HeapAllocator;
pub use linear::LinearAllocator;
pub use null::NullAllocator;
