//! `ProxyBuffer`: a non-owning, reinterpreting view over part of a buffer.
//!
//! A proxy is described by its own element kind and shape, plus an element
//! offset measured in units of the backing buffer's element width. The window
//!
//! ```text
//! offset_bytes = element_offset * backing.element_kind().width()
//! proxy_bytes  = shape.element_count() * kind.width()
//! ```
//!
//! must satisfy `offset_bytes + proxy_bytes <= backing.byte_size()`; this is
//! checked once, at construction. Reads and writes lock the backing buffer's
//! storage and reinterpret the bytes at `offset_bytes` under the proxy's kind,
//! in native byte order.
//!
//! Proxies may alias each other freely. The allocator's lock protocol keeps a
//! writer exclusive against every other view of the same storage.

use tessera_alloc::{LockGuard, LockMode};
use tessera_common::{Result, error::Error};

use crate::blob::Blob;
use crate::buffer::Buffer;
use crate::element::ElementKind;
use crate::shape::ShapeDescriptor;
use crate::window::{LockedWindow, view_window};

/// A view of a byte window of a [`Buffer`] under a (possibly different)
/// element kind.
///
/// The backing buffer must outlive the proxy, which the `'a` borrow enforces.
/// A proxy never frees the memory it observes: [`deallocate`](Blob::deallocate)
/// always returns `false`.
#[derive(Clone)]
pub struct ProxyBuffer<'a> {
    kind: ElementKind,
    shape: ShapeDescriptor,
    backing: &'a Buffer,
    element_offset: usize,
    offset_bytes: usize,
}

impl<'a> ProxyBuffer<'a> {
    /// Creates a proxy of `shape` elements of `kind`, starting
    /// `element_offset` backing elements into `backing`.
    ///
    /// Fails with `OutOfRange` if the window does not fit in the backing
    /// buffer's byte size. The backing buffer does not have to be allocated
    /// yet; access does.
    pub fn new(
        kind: ElementKind,
        backing: &'a Buffer,
        element_offset: usize,
        shape: impl Into<ShapeDescriptor>,
    ) -> Result<ProxyBuffer<'a>> {
        let shape = shape.into();
        let window = view_window(
            backing.element_kind().width(),
            element_offset,
            kind.width(),
            shape.element_count(),
            backing.byte_size(),
        )?;
        log::trace!(
            "proxy {kind} x {} over {} buffer at bytes {window:?}",
            shape.element_count(),
            backing.element_kind()
        );
        Ok(ProxyBuffer {
            kind,
            shape,
            backing,
            element_offset,
            offset_bytes: window.start,
        })
    }

    /// Creates a proxy over a window of this proxy.
    ///
    /// `element_offset` is measured in this proxy's element width and the
    /// window is checked against this proxy's byte size. The result observes
    /// the same backing buffer directly.
    pub fn sub_proxy(
        &self,
        kind: ElementKind,
        element_offset: usize,
        shape: impl Into<ShapeDescriptor>,
    ) -> Result<ProxyBuffer<'a>> {
        let shape = shape.into();
        let window = view_window(
            self.kind.width(),
            element_offset,
            kind.width(),
            shape.element_count(),
            self.byte_size(),
        )?;
        Ok(ProxyBuffer {
            kind,
            shape,
            backing: self.backing,
            element_offset,
            offset_bytes: self.offset_bytes + window.start,
        })
    }

    /// The buffer this proxy observes.
    pub fn backing(&self) -> &'a Buffer {
        self.backing
    }

    /// Offset the proxy was created with, in units of its parent's element
    /// width.
    pub fn element_offset(&self) -> usize {
        self.element_offset
    }

    /// Offset of the window within the backing buffer, in bytes.
    pub fn offset_bytes(&self) -> usize {
        self.offset_bytes
    }
}

impl Blob for ProxyBuffer<'_> {
    fn element_kind(&self) -> ElementKind {
        self.kind
    }

    fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    fn is_allocated(&self) -> bool {
        self.backing.is_allocated()
    }

    fn deallocate(&mut self) -> bool {
        false
    }

    fn lock_window(&self, mode: LockMode) -> Result<LockedWindow<'_>> {
        let handle = self.backing.storage().ok_or_else(|| {
            Error::protocol_violation("access through a proxy of an unallocated buffer")
        })?;
        let guard = LockGuard::acquire(self.backing.allocator().as_ref(), handle, mode)?;
        LockedWindow::new(guard, self.offset_bytes..self.offset_bytes + self.byte_size())
    }
}

impl std::fmt::Debug for ProxyBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyBuffer")
            .field("kind", &self.kind)
            .field("shape", &self.shape)
            .field("element_offset", &self.element_offset)
            .field("offset_bytes", &self.offset_bytes)
            .field("backing", &self.backing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_alloc::{HeapAllocator, TrackingAllocator};

    #[test]
    fn test_proxy_reports_own_sizes() {
        let backing = Buffer::new(ElementKind::F32, [1, 2, 3]);
        let proxy = ProxyBuffer::new(ElementKind::F32, &backing, 2, [2]).unwrap();
        assert_eq!(proxy.size(), 2);
        assert_eq!(proxy.byte_size(), 8);
        assert_eq!(proxy.offset_bytes(), 8);
        assert_eq!(proxy.element_offset(), 2);
        assert_eq!(backing.size(), 6);
    }

    #[test]
    fn test_proxy_never_deallocates() {
        let allocator = Arc::new(TrackingAllocator::new(HeapAllocator::new()));
        let mut backing = Buffer::with_allocator(ElementKind::F32, [1, 2, 3], allocator.clone());
        {
            let mut proxy = ProxyBuffer::new(ElementKind::F32, &backing, 2, [2]).unwrap();
            assert!(!proxy.deallocate());
            assert!(!proxy.is_allocated());
        }

        backing.allocate().unwrap();
        {
            let mut proxy = ProxyBuffer::new(ElementKind::F32, &backing, 2, [2]).unwrap();
            assert!(proxy.is_allocated());
            assert!(!proxy.deallocate());
            assert!(!proxy.deallocate());
        }
        assert!(backing.is_allocated());
        assert_eq!(allocator.stats().frees, 0);

        assert!(backing.deallocate());
        assert!(!backing.deallocate());
        assert_eq!(allocator.stats().frees, 1);
    }

    #[test]
    fn test_proxy_of_unallocated_buffer_cannot_be_accessed() {
        let backing = Buffer::new(ElementKind::U8, [6]);
        let proxy = ProxyBuffer::new(ElementKind::I16, &backing, 0, [3]).unwrap();
        assert!(proxy.read_only_access::<i16>().unwrap_err().is_protocol_violation());
    }

    #[test]
    fn test_sub_proxy_composes_offsets() {
        let backing = Buffer::from_slice([8], &[0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        let outer = ProxyBuffer::new(ElementKind::U16, &backing, 2, [3]).unwrap();
        let inner = outer.sub_proxy(ElementKind::U8, 1, [3]).unwrap();
        assert_eq!(inner.offset_bytes(), 4);
        assert_eq!(inner.read_only_access::<u8>().unwrap().to_vec(), vec![4, 5, 6]);

        assert!(outer.sub_proxy(ElementKind::U8, 4, [3]).unwrap_err().is_out_of_range());
        assert!(outer.sub_proxy(ElementKind::U32, 1, [1]).is_ok());
        assert!(outer.sub_proxy(ElementKind::U32, 2, [1]).unwrap_err().is_out_of_range());
    }

    #[test]
    fn test_proxy_access_locks_backing_once() {
        let allocator = Arc::new(TrackingAllocator::new(HeapAllocator::new()));
        let mut backing = Buffer::with_allocator(ElementKind::F32, [1, 2, 3], allocator.clone());
        backing.allocate().unwrap();
        backing
            .mutable_access::<f32>()
            .unwrap()
            .copy_from_slice(&[5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);

        let proxy = ProxyBuffer::new(ElementKind::F32, &backing, 2, [2]).unwrap();
        {
            let view = proxy.mutable_access::<f32>().unwrap();
            assert_eq!(view.get(0), Some(7.0));
            assert_eq!(view.get(1), Some(8.0));
        }
        {
            let view = proxy.read_only_access::<f32>().unwrap();
            assert_eq!(view.as_slice().unwrap(), &[7.0, 8.0]);
        }

        let stats = allocator.stats();
        assert_eq!(stats.write_locks, 2);
        assert_eq!(stats.read_locks, 1);
        assert_eq!(stats.unlocks, 3);
        assert_eq!(stats.frees, 0);
    }
}
