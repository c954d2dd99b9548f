//! Scoped typed views over a locked window.
//!
//! A view keeps its window locked until it is dropped. Element reads and writes
//! tolerate any byte alignment, since a proxy window may start at an offset
//! that is not a multiple of its element width; slice access is available when
//! the window happens to be aligned.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::slice::{ChunksExact, ChunksExactMut};

use tessera_alloc::LockMode;
use tessera_common::{Result, error::Error};

use crate::element::Element;
use crate::window::LockedWindow;

/// Read-only access to the elements of a buffer or proxy.
pub struct ReadView<'a, T> {
    window: LockedWindow<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> ReadView<'a, T> {
    pub(crate) fn new(window: LockedWindow<'a>) -> ReadView<'a, T> {
        debug_assert_eq!(window.len() % size_of::<T>(), 0);
        ReadView {
            window,
            _marker: PhantomData,
        }
    }

    /// Number of elements in the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.window.len() / size_of::<T>()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        read_at(self.window.bytes(), index)
    }

    /// Returns a fresh iterator over the elements, in index order.
    ///
    /// No additional lock is taken; the iterator borrows the view's lock.
    pub fn iter(&self) -> Elements<'_, T> {
        Elements::new(self.window.bytes())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.window.bytes()
    }

    /// Returns the elements as a slice.
    ///
    /// Fails with `Misaligned` if the window does not start on an address
    /// aligned for `T`.
    pub fn as_slice(&self) -> Result<&[T]> {
        bytemuck::try_cast_slice(self.window.bytes())
            .map_err(|_| Error::misaligned(self.window.offset(), align_of::<T>()))
    }

    /// Byte offset of the view within its storage block.
    pub fn byte_offset(&self) -> usize {
        self.window.offset()
    }
}

impl<'v, T: Element> IntoIterator for &'v ReadView<'_, T> {
    type Item = T;
    type IntoIter = Elements<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Element> std::fmt::Debug for ReadView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadView")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .field("byte_offset", &self.window.offset())
            .finish()
    }
}

/// Read-write access to the elements of a buffer or proxy.
pub struct WriteView<'a, T> {
    window: LockedWindow<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> WriteView<'a, T> {
    pub(crate) fn new(window: LockedWindow<'a>) -> WriteView<'a, T> {
        debug_assert_eq!(window.mode(), LockMode::ReadWrite);
        debug_assert_eq!(window.len() % size_of::<T>(), 0);
        WriteView {
            window,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.window.len() / size_of::<T>()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        read_at(self.window.bytes(), index)
    }

    /// Stores `value` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) {
        let len = self.len();
        assert!(index < len, "index {index} out of bounds for view of {len}");
        let start = index * size_of::<T>();
        self.window.bytes_mut()[start..start + size_of::<T>()]
            .copy_from_slice(bytemuck::bytes_of(&value));
    }

    /// Stores `value` in every element.
    pub fn fill(&mut self, value: T) {
        for chunk in self.window.bytes_mut().chunks_exact_mut(size_of::<T>()) {
            chunk.copy_from_slice(bytemuck::bytes_of(&value));
        }
    }

    /// Copies all elements from `src`.
    ///
    /// # Panics
    ///
    /// Panics if `src` has a different length than the view.
    pub fn copy_from_slice(&mut self, src: &[T]) {
        assert_eq!(
            src.len(),
            self.len(),
            "source length does not match view length"
        );
        self.window
            .bytes_mut()
            .copy_from_slice(bytemuck::cast_slice(src));
    }

    /// Returns a fresh iterator over the elements, in index order.
    pub fn iter(&self) -> Elements<'_, T> {
        Elements::new(self.window.bytes())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.window.bytes()
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.window.bytes_mut()
    }

    /// Returns the elements as a slice; see [`ReadView::as_slice`].
    pub fn as_slice(&self) -> Result<&[T]> {
        bytemuck::try_cast_slice(self.window.bytes())
            .map_err(|_| Error::misaligned(self.window.offset(), align_of::<T>()))
    }

    /// Returns the elements as a mutable slice.
    ///
    /// Fails with `Misaligned` if the window does not start on an address
    /// aligned for `T`.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        let offset = self.window.offset();
        bytemuck::try_cast_slice_mut(self.window.bytes_mut())
            .map_err(|_| Error::misaligned(offset, align_of::<T>()))
    }

    /// Returns a fresh iterator of writable element handles, in index order.
    ///
    /// Works at any byte alignment; use [`as_mut_slice`](Self::as_mut_slice)
    /// for plain `&mut T` access to an aligned window.
    pub fn iter_mut(&mut self) -> ElementsMut<'_, T> {
        ElementsMut::new(self.window.bytes_mut())
    }

    /// Rewrites every element in place with `f(index, &mut value)`.
    pub fn update(&mut self, mut f: impl FnMut(usize, &mut T)) {
        for (index, mut element) in self.iter_mut().enumerate() {
            let mut value = element.get();
            f(index, &mut value);
            element.set(value);
        }
    }

    pub fn byte_offset(&self) -> usize {
        self.window.offset()
    }
}

impl<'v, T: Element> IntoIterator for &'v WriteView<'_, T> {
    type Item = T;
    type IntoIter = Elements<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'v, T: Element> IntoIterator for &'v mut WriteView<'_, T> {
    type Item = ElementMut<'v, T>;
    type IntoIter = ElementsMut<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T: Element> std::fmt::Debug for WriteView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteView")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .field("byte_offset", &self.window.offset())
            .finish()
    }
}

/// Iterator over the elements of a view, decoded one at a time.
#[derive(Clone)]
pub struct Elements<'s, T> {
    chunks: ChunksExact<'s, u8>,
    _marker: PhantomData<T>,
}

impl<'s, T: Element> Elements<'s, T> {
    fn new(bytes: &'s [u8]) -> Elements<'s, T> {
        Elements {
            chunks: bytes.chunks_exact(size_of::<T>()),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> Iterator for Elements<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.chunks.next().map(bytemuck::pod_read_unaligned)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<T> {
        self.chunks.nth(n).map(bytemuck::pod_read_unaligned)
    }
}

impl<T: Element> DoubleEndedIterator for Elements<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        self.chunks.next_back().map(bytemuck::pod_read_unaligned)
    }
}

impl<T: Element> ExactSizeIterator for Elements<'_, T> {}

impl<T: Element> FusedIterator for Elements<'_, T> {}

/// A writable handle to one element of a [`WriteView`].
///
/// The element's bytes need not be aligned for `T`; reads and writes copy.
pub struct ElementMut<'s, T> {
    bytes: &'s mut [u8],
    _marker: PhantomData<T>,
}

impl<T: Element> ElementMut<'_, T> {
    #[inline]
    pub fn get(&self) -> T {
        bytemuck::pod_read_unaligned(&*self.bytes)
    }

    #[inline]
    pub fn set(&mut self, value: T) {
        self.bytes.copy_from_slice(bytemuck::bytes_of(&value));
    }
}

impl<T: Element> std::fmt::Debug for ElementMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ElementMut").field(&self.get()).finish()
    }
}

/// Mutable iterator over the elements of a [`WriteView`].
pub struct ElementsMut<'s, T> {
    chunks: ChunksExactMut<'s, u8>,
    _marker: PhantomData<T>,
}

impl<'s, T: Element> ElementsMut<'s, T> {
    fn new(bytes: &'s mut [u8]) -> ElementsMut<'s, T> {
        ElementsMut {
            chunks: bytes.chunks_exact_mut(size_of::<T>()),
            _marker: PhantomData,
        }
    }
}

impl<'s, T: Element> Iterator for ElementsMut<'s, T> {
    type Item = ElementMut<'s, T>;

    #[inline]
    fn next(&mut self) -> Option<ElementMut<'s, T>> {
        self.chunks.next().map(element_mut)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<ElementMut<'s, T>> {
        self.chunks.nth(n).map(element_mut)
    }
}

impl<T: Element> DoubleEndedIterator for ElementsMut<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.chunks.next_back().map(element_mut)
    }
}

impl<T: Element> ExactSizeIterator for ElementsMut<'_, T> {}

impl<T: Element> FusedIterator for ElementsMut<'_, T> {}

#[inline]
fn element_mut<T>(bytes: &mut [u8]) -> ElementMut<'_, T> {
    ElementMut {
        bytes,
        _marker: PhantomData,
    }
}

#[inline]
fn read_at<T: Element>(bytes: &[u8], index: usize) -> Option<T> {
    let start = index.checked_mul(size_of::<T>())?;
    let end = start.checked_add(size_of::<T>())?;
    bytes.get(start..end).map(bytemuck::pod_read_unaligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_alloc::{Allocator, HeapAllocator, LockGuard};

    fn window(
        allocator: &HeapAllocator,
        len: usize,
        range: std::ops::Range<usize>,
        mode: LockMode,
    ) -> LockedWindow<'_> {
        let handle = allocator.allocate(len).unwrap();
        let guard = LockGuard::acquire(allocator, handle, mode).unwrap();
        LockedWindow::new(guard, range).unwrap()
    }

    #[test]
    fn test_write_then_read_elements() {
        let allocator = HeapAllocator::new();
        let mut view = WriteView::<u16>::new(window(&allocator, 8, 0..8, LockMode::ReadWrite));
        assert_eq!(view.len(), 4);
        view.set(0, 0x0201);
        view.set(3, 0xffee);
        assert_eq!(view.get(0), Some(0x0201));
        assert_eq!(view.get(4), None);
        assert_eq!(view.to_vec(), vec![0x0201, 0, 0, 0xffee]);
        assert_eq!(&view.as_bytes()[..2], &[0x01, 0x02]);
    }

    #[test]
    fn test_unaligned_window() {
        let allocator = HeapAllocator::new();
        let mut view = WriteView::<u32>::new(window(&allocator, 16, 1..9, LockMode::ReadWrite));
        assert_eq!(view.len(), 2);
        view.fill(0xdead_beef);
        assert_eq!(view.to_vec(), vec![0xdead_beef, 0xdead_beef]);
        assert!(matches!(
            view.as_slice().unwrap_err().kind(),
            tessera_common::error::ErrorKind::Misaligned { offset: 1, alignment: 4 }
        ));
        assert!(view.as_mut_slice().is_err());

        for mut element in view.iter_mut() {
            let value = element.get();
            element.set(value.rotate_left(8));
        }
        assert_eq!(view.to_vec(), vec![0xadbe_efde, 0xadbe_efde]);
        assert_eq!(&view.as_bytes()[..4], &0xadbe_efdeu32.to_ne_bytes());
    }

    #[test]
    fn test_update_in_place() {
        let allocator = HeapAllocator::new();
        let mut view = WriteView::<i16>::new(window(&allocator, 9, 1..9, LockMode::ReadWrite));
        view.update(|index, value| *value = index as i16 * 10 - 5);
        assert_eq!(view.to_vec(), vec![-5, 5, 15, 25]);
        view.update(|_, value| *value = -*value);
        assert_eq!(view.to_vec(), vec![5, -5, -15, -25]);

        let mut last = view.iter_mut().next_back().unwrap();
        last.set(7);
        assert_eq!(view.get(3), Some(7));
        assert_eq!(view.iter_mut().len(), 4);
    }

    #[test]
    fn test_aligned_slices() {
        let allocator = HeapAllocator::new();
        let mut view = WriteView::<f32>::new(window(&allocator, 16, 4..16, LockMode::ReadWrite));
        view.copy_from_slice(&[1.0, 2.0, 3.0]);
        for v in view.as_mut_slice().unwrap() {
            *v *= 2.0;
        }
        assert_eq!(view.as_slice().unwrap(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let allocator = HeapAllocator::new();
        let view = ReadView::<u8>::new(window(&allocator, 5, 1..5, LockMode::ReadOnly));
        let first: Vec<u8> = view.iter().collect();
        let second: Vec<u8> = (&view).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(view.iter().len(), 4);
        assert_eq!(view.iter().rev().count(), 4);
        assert_eq!(view.iter().nth(3), Some(0));
        assert_eq!(view.iter().nth(4), None);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_set_out_of_bounds() {
        let allocator = HeapAllocator::new();
        let mut view = WriteView::<i32>::new(window(&allocator, 8, 0..8, LockMode::ReadWrite));
        view.set(2, 1);
    }
}
