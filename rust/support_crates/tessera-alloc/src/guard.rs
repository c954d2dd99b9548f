//! Scoped lock acquisition over an [`Allocator`].

use std::ptr::NonNull;

use tessera_common::Result;

use crate::allocator::{Allocator, LockMode, StorageHandle};

/// Holds a lock on a storage handle and releases it when dropped.
///
/// The guard is the only way the buffer layer touches `lock`/`unlock`, so each
/// successful acquisition is matched by exactly one unlock, including on early
/// returns and unwinding.
pub struct LockGuard<'a> {
    allocator: &'a dyn Allocator,
    handle: StorageHandle,
    mode: LockMode,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a> LockGuard<'a> {
    /// Locks `handle` on `allocator`.
    ///
    /// Nothing is left locked when this returns an error.
    pub fn acquire(
        allocator: &'a dyn Allocator,
        handle: StorageHandle,
        mode: LockMode,
    ) -> Result<LockGuard<'a>> {
        let region = allocator.lock(handle, mode)?;
        log::trace!("locked {handle:?} for {mode:?} ({} bytes)", region.len);
        Ok(LockGuard {
            allocator,
            handle,
            mode,
            ptr: region.ptr,
            len: region.len,
        })
    }

    #[inline]
    pub fn handle(&self) -> StorageHandle {
        self.handle
    }

    #[inline]
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Start of the locked region. Valid only while the guard is alive.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Number of bytes accessible from [`as_ptr`](Self::as_ptr).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: the guard owns the lock it took in `acquire`, and the region
        // cannot outlive the guard's borrow.
        match unsafe { self.allocator.unlock(self.handle) } {
            Ok(()) => log::trace!("unlocked {:?}", self.handle),
            Err(e) => log::warn!("failed to unlock {:?}: {e}", self.handle),
        }
    }
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("handle", &self.handle)
            .field("mode", &self.mode)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
