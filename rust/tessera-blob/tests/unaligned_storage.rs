//! Buffers and proxies over storage that is not aligned for their elements.

use std::sync::Arc;

use tessera_alloc::{
    Allocator, HeapAllocator, HeapAllocatorConfig, LockMode, LockedRegion, StorageHandle,
};
use tessera_blob::{Blob, Buffer, ElementKind, ProxyBuffer};
use tessera_common::{Result, error::ErrorKind};

/// Hands out every block one byte past an aligned heap block, so no block is
/// aligned for any element wider than a byte.
struct OddAllocator {
    inner: HeapAllocator,
}

impl OddAllocator {
    fn new() -> OddAllocator {
        OddAllocator {
            inner: HeapAllocator::new(),
        }
    }
}

unsafe impl Allocator for OddAllocator {
    fn allocate(&self, size: usize) -> Result<StorageHandle> {
        self.inner.allocate(size + 1)
    }

    unsafe fn free(&self, handle: StorageHandle) -> Result<()> {
        // SAFETY: forwarded under the caller's guarantees.
        unsafe { self.inner.free(handle) }
    }

    fn lock(&self, handle: StorageHandle, mode: LockMode) -> Result<LockedRegion> {
        let region = self.inner.lock(handle, mode)?;
        Ok(LockedRegion {
            // SAFETY: the inner block is one byte longer than requested.
            ptr: unsafe { region.ptr.add(1) },
            len: region.len - 1,
        })
    }

    unsafe fn unlock(&self, handle: StorageHandle) -> Result<()> {
        // SAFETY: forwarded under the caller's guarantees.
        unsafe { self.inner.unlock(handle) }
    }
}

fn odd() -> Arc<dyn Allocator> {
    Arc::new(OddAllocator::new())
}

#[test]
fn test_buffer_on_odd_storage() {
    let mut buffer = Buffer::with_allocator(ElementKind::F32, [4], odd());
    buffer.allocate().unwrap();
    {
        let mut view = buffer.mutable_access::<f32>().unwrap();
        assert!(matches!(
            view.as_mut_slice().unwrap_err().kind(),
            ErrorKind::Misaligned { alignment: 4, .. }
        ));
        view.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        view.set(3, 8.0);
        for mut element in view.iter_mut() {
            element.set(element.get() * 2.0);
        }
    }

    let view = buffer.read_only_access::<f32>().unwrap();
    assert!(view.as_slice().is_err());
    assert_eq!(view.to_vec(), vec![2.0, 4.0, 6.0, 16.0]);
    assert_eq!(view.iter().rev().collect::<Vec<_>>(), vec![16.0, 6.0, 4.0, 2.0]);
    assert_eq!(view.get(1), Some(4.0));
}

#[test]
fn test_proxies_on_odd_storage() {
    let mut backing = Buffer::with_allocator(ElementKind::U16, [6], odd());
    backing.allocate().unwrap();
    backing
        .mutable_access::<u16>()
        .unwrap()
        .update(|index, value| *value = index as u16 + 1);

    let words = ProxyBuffer::new(ElementKind::U32, &backing, 2, [2]).unwrap();
    {
        let mut view = words.mutable_access::<u32>().unwrap();
        let expected = u32::from_ne_bytes(bytemuck::cast([3u16, 4]));
        assert_eq!(view.get(0), Some(expected));
        view.update(|_, value| *value = !*value);
    }

    let values = backing.read_only_access::<u16>().unwrap().to_vec();
    assert_eq!(values, vec![1, 2, !3, !4, !5, !6]);

    let bytes = ProxyBuffer::new(ElementKind::U8, &backing, 0, [backing.byte_size()]).unwrap();
    let view = bytes.read_only_access::<u8>().unwrap();
    assert_eq!(view.as_bytes(), bytemuck::cast_slice::<u16, u8>(&values));
    assert_eq!(view.as_slice().unwrap().len(), 12);
}

#[test]
fn test_byte_aligned_heap_configuration() {
    let config = HeapAllocatorConfig::default().alignment(1);
    let allocator: Arc<dyn Allocator> = Arc::new(HeapAllocator::with_config(config).unwrap());

    let mut backing = Buffer::with_allocator(ElementKind::U8, [9], allocator);
    backing.allocate().unwrap();
    backing
        .mutable_access::<u8>()
        .unwrap()
        .copy_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7, 8]);

    let proxy = ProxyBuffer::new(ElementKind::I64, &backing, 1, [1]).unwrap();
    let expected = i64::from_ne_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(proxy.read_only_access::<i64>().unwrap().to_vec(), vec![expected]);
    {
        let mut view = proxy.mutable_access::<i64>().unwrap();
        for mut element in &mut view {
            element.set(-1);
        }
    }
    let view = backing.read_only_access::<u8>().unwrap();
    assert_eq!(view.to_vec(), vec![0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
}
