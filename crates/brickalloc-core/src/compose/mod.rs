//! Composite allocators.
//!
//! Composites own no memory. They hold two children and route each call to
//! exactly one of them; ownership queries decide where a block goes back.

pub mod fallback;
pub mod segregator;

pub use fallback::FallbackAllocator;
pub use segregator::Segregator;
