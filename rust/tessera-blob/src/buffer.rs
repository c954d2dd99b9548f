//! `Buffer`: a typed, shaped block of allocator-backed memory.

use std::sync::Arc;

use tessera_alloc::{Allocator, LockGuard, LockMode, StorageHandle, default_allocator};
use tessera_common::{Result, error::Error};

use crate::blob::Blob;
use crate::element::{Element, ElementKind};
use crate::shape::ShapeDescriptor;
use crate::window::LockedWindow;

/// A typed, shaped memory holder backed by an [`Allocator`].
///
/// A buffer starts unallocated. [`allocate`](Buffer::allocate) obtains
/// `byte_size()` bytes of zeroed storage; the storage handle is owned
/// exclusively by this buffer and released by
/// [`deallocate`](Blob::deallocate) or on drop. The allocator itself may be
/// shared by any number of buffers.
///
/// The shape may change only while the buffer is unallocated.
pub struct Buffer {
    kind: ElementKind,
    shape: ShapeDescriptor,
    allocator: Arc<dyn Allocator>,
    storage: Option<StorageHandle>,
}

impl Buffer {
    /// Creates an unallocated buffer using the process-wide heap allocator.
    pub fn new(kind: ElementKind, shape: impl Into<ShapeDescriptor>) -> Buffer {
        Self::with_allocator(kind, shape, default_allocator())
    }

    /// Creates an unallocated buffer served by `allocator`.
    pub fn with_allocator(
        kind: ElementKind,
        shape: impl Into<ShapeDescriptor>,
        allocator: Arc<dyn Allocator>,
    ) -> Buffer {
        Buffer {
            kind,
            shape: shape.into(),
            allocator,
            storage: None,
        }
    }

    /// Creates and allocates a buffer holding a copy of `data`.
    ///
    /// The shape's element count must equal `data.len()`.
    pub fn from_slice<T: Element>(shape: impl Into<ShapeDescriptor>, data: &[T]) -> Result<Buffer> {
        let mut buffer = Buffer::new(T::KIND, shape);
        if buffer.size() != data.len() {
            return Err(Error::invalid_arg(
                "data",
                format!(
                    "{} elements do not match shape of {} elements",
                    data.len(),
                    buffer.size()
                ),
            ));
        }
        buffer.allocate()?;
        buffer.mutable_access::<T>()?.copy_from_slice(data);
        Ok(buffer)
    }

    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    /// The storage handle, if allocated.
    ///
    /// The handle can be locked through [`allocator`](Buffer::allocator), but
    /// releasing it requires `unsafe`, so a live view cannot be undercut from
    /// safe code:
    ///
    /// ```compile_fail,E0133
    /// use tessera_alloc::Allocator;
    /// use tessera_blob::{Blob, Buffer};
    ///
    /// let buffer = Buffer::from_slice([4], &[1u8, 2, 3, 4]).unwrap();
    /// let view = buffer.mutable_access::<u8>().unwrap();
    /// buffer.allocator().unlock(buffer.storage().unwrap()).unwrap();
    /// drop(view);
    /// ```
    pub fn storage(&self) -> Option<StorageHandle> {
        self.storage
    }

    /// Replaces the dimensions of an unallocated buffer.
    pub fn set_dims(&mut self, dims: impl Into<Vec<usize>>) -> Result<()> {
        if self.storage.is_some() {
            return Err(Error::already_allocated());
        }
        self.shape.set_dims(dims);
        Ok(())
    }

    /// Requests `byte_size()` bytes of storage from the allocator.
    ///
    /// Fails with `AlreadyAllocated` if storage is already held, with
    /// `UndeterminedShape` if the element count is zero, and with
    /// `AllocationFailure` if the size overflows or the allocator refuses.
    pub fn allocate(&mut self) -> Result<()> {
        if self.storage.is_some() {
            return Err(Error::already_allocated());
        }
        let count = self.shape.checked_element_count();
        if count == Some(0) {
            return Err(Error::undetermined_shape());
        }
        let byte_size = count
            .and_then(|count| count.checked_mul(self.kind.width()))
            .ok_or_else(|| Error::allocation_failure(usize::MAX, "byte size overflows usize"))?;

        let handle = self.allocator.allocate(byte_size)?;
        log::debug!(
            "allocated {} buffer of {byte_size} bytes as {handle:?}",
            self.kind
        );
        self.storage = Some(handle);
        Ok(())
    }
}

impl Blob for Buffer {
    fn element_kind(&self) -> ElementKind {
        self.kind
    }

    fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    fn is_allocated(&self) -> bool {
        self.storage.is_some()
    }

    fn deallocate(&mut self) -> bool {
        let Some(handle) = self.storage.take() else {
            return false;
        };
        // SAFETY: `&mut self` rules out any live view or proxy of this buffer,
        // and the handle is owned by this buffer alone. A lock taken directly
        // on the handle through a cloned allocator makes `free` fail instead.
        match unsafe { self.allocator.free(handle) } {
            Ok(()) => {
                log::debug!("deallocated {} buffer {handle:?}", self.kind);
                true
            }
            Err(e) => {
                log::warn!("failed to free {handle:?}: {e}");
                self.storage = Some(handle);
                false
            }
        }
    }

    fn lock_window(&self, mode: LockMode) -> Result<LockedWindow<'_>> {
        let handle = self
            .storage
            .ok_or_else(|| Error::protocol_violation("access to an unallocated buffer"))?;
        let guard = LockGuard::acquire(self.allocator.as_ref(), handle, mode)?;
        LockedWindow::new(guard, 0..self.byte_size())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.deallocate();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("kind", &self.kind)
            .field("shape", &self.shape)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
