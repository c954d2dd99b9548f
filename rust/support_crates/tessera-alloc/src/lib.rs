//! Storage providers for tessera buffers.
//!
//! The [`Allocator`](allocator::Allocator) trait is the capability seam between
//! buffers and the memory they live in: any provider (plain heap, pooled memory,
//! device memory mapped into the host on lock) can back a buffer as long as it
//! honors the lock protocol.
//!
//! # Modules
//!
//! - [`allocator`]: the capability trait, storage handles and lock modes
//! - [`guard`]: scoped lock acquisition
//! - [`heap`]: reference in-process allocator
//! - [`tracking`]: call-counting wrapper for diagnostics and tests

use std::sync::{Arc, OnceLock};

pub mod allocator;
pub mod guard;
pub mod heap;
pub mod tracking;

pub use allocator::{Allocator, LockMode, LockedRegion, StorageHandle};
pub use guard::LockGuard;
pub use heap::{HeapAllocator, HeapAllocatorConfig};
pub use tracking::{AllocatorStats, TrackingAllocator};

/// Returns the process-wide heap allocator used by buffers constructed
/// without an explicit allocator.
pub fn default_allocator() -> Arc<dyn Allocator> {
    static DEFAULT: OnceLock<Arc<HeapAllocator>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(HeapAllocator::new()))
        .clone()
}
