//! `Blob`: the contract shared by buffers and proxies.

use tessera_alloc::LockMode;
use tessera_common::{Result, error::Error};

use crate::element::{Element, ElementKind};
use crate::shape::ShapeDescriptor;
use crate::view::{ReadView, WriteView};
use crate::window::LockedWindow;

/// Sized, typed memory that can be locked for reading or writing.
///
/// [`Buffer`](crate::Buffer) and [`ProxyBuffer`](crate::ProxyBuffer) behave the
/// same through this trait, except that a proxy never deallocates.
pub trait Blob {
    fn element_kind(&self) -> ElementKind;

    fn shape(&self) -> &ShapeDescriptor;

    /// Whether the memory behind this blob is currently allocated.
    fn is_allocated(&self) -> bool;

    /// Releases the storage this blob owns.
    ///
    /// Returns `true` only if something was actually freed. Calling it on an
    /// unallocated blob, or on a blob that does not own its storage, is a no-op
    /// returning `false`.
    fn deallocate(&mut self) -> bool;

    /// Locks the blob's bytes for the requested access.
    ///
    /// The window spans exactly [`byte_size`](Blob::byte_size) bytes and stays
    /// locked until dropped.
    fn lock_window(&self, mode: LockMode) -> Result<LockedWindow<'_>>;

    /// Number of elements.
    fn size(&self) -> usize {
        self.shape().element_count()
    }

    /// Number of bytes; `size() * element_kind().width()`.
    fn byte_size(&self) -> usize {
        self.size().saturating_mul(self.element_kind().width())
    }

    /// Locks the blob read-only and returns a typed view of its elements.
    ///
    /// `T` must match the blob's element kind.
    fn read_only_access<T: Element>(&self) -> Result<ReadView<'_, T>>
    where
        Self: Sized,
    {
        check_kind::<T>(self.element_kind())?;
        Ok(ReadView::new(self.lock_window(LockMode::ReadOnly)?))
    }

    /// Locks the blob for writing and returns a typed view of its elements.
    ///
    /// `T` must match the blob's element kind.
    fn mutable_access<T: Element>(&self) -> Result<WriteView<'_, T>>
    where
        Self: Sized,
    {
        check_kind::<T>(self.element_kind())?;
        Ok(WriteView::new(self.lock_window(LockMode::ReadWrite)?))
    }
}

fn check_kind<T: Element>(kind: ElementKind) -> Result<()> {
    if T::KIND == kind {
        Ok(())
    } else {
        Err(Error::element_kind_mismatch(kind.name(), T::KIND.name()))
    }
}
