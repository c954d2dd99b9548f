//! `Allocator`: the capability a memory provider implements to back buffers.

use std::fmt;
use std::ptr::NonNull;

use tessera_common::Result;

/// Access mode requested when locking a storage handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    ReadOnly,
    ReadWrite,
}

impl LockMode {
    #[inline]
    pub fn is_writable(self) -> bool {
        self == LockMode::ReadWrite
    }
}

/// Opaque identifier of a storage block, issued by an [`Allocator`].
///
/// A handle is only meaningful to the allocator that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageHandle(u64);

impl StorageHandle {
    /// Wraps an allocator-specific raw value.
    pub fn from_raw(raw: u64) -> StorageHandle {
        StorageHandle(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageHandle({:#x})", self.0)
    }
}

/// A locked block of memory, returned by [`Allocator::lock`].
#[derive(Debug, Clone, Copy)]
pub struct LockedRegion {
    /// Start of the locked block.
    pub ptr: NonNull<u8>,
    /// Number of bytes accessible from `ptr`.
    pub len: usize,
}

/// A storage provider for buffers.
///
/// Every successful [`lock`](Allocator::lock) must be paired with exactly one
/// [`unlock`](Allocator::unlock) on the same handle, regardless of the access
/// mode. Callers should go through [`LockGuard`](crate::LockGuard), which
/// performs the pairing on every exit path.
///
/// Taking a lock is safe: at worst a lock that is never released keeps other
/// writers out. Releasing one is not, since a view built on the region may
/// still be alive, so `unlock` and `free` are `unsafe fn`:
///
/// ```compile_fail,E0133
/// use tessera_alloc::{Allocator, HeapAllocator, LockMode};
///
/// let allocator = HeapAllocator::new();
/// let handle = allocator.allocate(8).unwrap();
/// let _region = allocator.lock(handle, LockMode::ReadWrite).unwrap();
/// allocator.unlock(handle).unwrap();
/// ```
///
/// ```compile_fail,E0133
/// use tessera_alloc::{Allocator, HeapAllocator};
///
/// let allocator = HeapAllocator::new();
/// let handle = allocator.allocate(8).unwrap();
/// allocator.free(handle).unwrap();
/// ```
///
/// # Safety
///
/// Implementors must guarantee that:
/// - The region returned by `lock()` is valid for reads of `len` bytes (and for
///   writes, when locked with [`LockMode::ReadWrite`]) until the matching
///   `unlock()`.
/// - A `ReadWrite` lock is exclusive: while it is held, any other `lock()` on
///   the same handle fails. Any number of `ReadOnly` locks may be held at once.
/// - `len` is at least the size passed to `allocate()` for that handle.
/// - A handle's memory is never released while it is locked.
pub unsafe trait Allocator: Send + Sync {
    /// Reserves at least `size` bytes and returns a handle to them.
    fn allocate(&self, size: usize) -> Result<StorageHandle>;

    /// Releases storage previously returned by `allocate()`.
    ///
    /// Fails with a protocol violation if the handle is unknown to this
    /// allocator or is currently locked.
    ///
    /// # Safety
    ///
    /// The caller must own `handle`: no other party may still use it, and no
    /// pointer obtained from `lock()` on it may be dereferenced afterwards.
    unsafe fn free(&self, handle: StorageHandle) -> Result<()>;

    /// Locks the storage for the requested access and returns its address.
    fn lock(&self, handle: StorageHandle, mode: LockMode) -> Result<LockedRegion>;

    /// Releases the most recent unmatched lock on `handle`.
    ///
    /// # Safety
    ///
    /// The caller must hold a lock on `handle` that it acquired itself, and
    /// must not use the region that lock returned after this call.
    unsafe fn unlock(&self, handle: StorageHandle) -> Result<()>;
}
