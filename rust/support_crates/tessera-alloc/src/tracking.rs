//! An allocator wrapper that counts calls made through the capability.

use std::sync::atomic::{AtomicUsize, Ordering};

use tessera_common::Result;

use crate::allocator::{Allocator, LockMode, LockedRegion, StorageHandle};

/// Snapshot of the calls observed by a [`TrackingAllocator`].
///
/// Only successful calls are counted in `allocations`, `frees`, `read_locks`,
/// `write_locks` and `unlocks`; rejected calls of any kind land in `failures`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub allocations: usize,
    pub frees: usize,
    pub read_locks: usize,
    pub write_locks: usize,
    pub unlocks: usize,
    pub failures: usize,
}

impl AllocatorStats {
    /// Number of locks not yet matched by an unlock.
    pub fn outstanding_locks(&self) -> usize {
        (self.read_locks + self.write_locks).saturating_sub(self.unlocks)
    }

    /// Number of allocations not yet freed.
    pub fn live_allocations(&self) -> usize {
        self.allocations.saturating_sub(self.frees)
    }
}

/// Wraps another allocator and records every call forwarded to it.
pub struct TrackingAllocator<A> {
    inner: A,
    allocations: AtomicUsize,
    frees: AtomicUsize,
    read_locks: AtomicUsize,
    write_locks: AtomicUsize,
    unlocks: AtomicUsize,
    failures: AtomicUsize,
}

impl<A: Allocator> TrackingAllocator<A> {
    pub fn new(inner: A) -> TrackingAllocator<A> {
        TrackingAllocator {
            inner,
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            read_locks: AtomicUsize::new(0),
            write_locks: AtomicUsize::new(0),
            unlocks: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            read_locks: self.read_locks.load(Ordering::Relaxed),
            write_locks: self.write_locks.load(Ordering::Relaxed),
            unlocks: self.unlocks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn record<T>(&self, counter: &AtomicUsize, result: Result<T>) -> Result<T> {
        let counter = if result.is_ok() {
            counter
        } else {
            &self.failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }
}

// Forwards to `inner` without touching the returned regions, so the inner
// allocator's guarantees carry over unchanged.
unsafe impl<A: Allocator> Allocator for TrackingAllocator<A> {
    fn allocate(&self, size: usize) -> Result<StorageHandle> {
        self.record(&self.allocations, self.inner.allocate(size))
    }

    unsafe fn free(&self, handle: StorageHandle) -> Result<()> {
        // SAFETY: forwarded under the caller's guarantees.
        self.record(&self.frees, unsafe { self.inner.free(handle) })
    }

    fn lock(&self, handle: StorageHandle, mode: LockMode) -> Result<LockedRegion> {
        let counter = match mode {
            LockMode::ReadOnly => &self.read_locks,
            LockMode::ReadWrite => &self.write_locks,
        };
        self.record(counter, self.inner.lock(handle, mode))
    }

    unsafe fn unlock(&self, handle: StorageHandle) -> Result<()> {
        // SAFETY: forwarded under the caller's guarantees.
        self.record(&self.unlocks, unsafe { self.inner.unlock(handle) })
    }
}
