//! Byte-window arithmetic and the locked window it produces.
//!
//! This is the only place in the crate where locked allocator memory becomes a
//! Rust slice. Every window is bounds-checked against the locked region before
//! it is constructed; typed access on top of it goes through `bytemuck`.

use std::ops::Range;

use tessera_alloc::{LockGuard, LockMode};
use tessera_common::{Result, error::Error};

/// Computes the byte range occupied by `count` elements of width `width`
/// placed `element_offset` elements of width `base_width` into a region of
/// `available` bytes.
///
/// Fails with `OutOfRange` if the window does not fit, whether the excess
/// comes from the offset, the length, their sum, or an arithmetic overflow in
/// any of them.
pub fn view_window(
    base_width: usize,
    element_offset: usize,
    width: usize,
    count: usize,
    available: usize,
) -> Result<Range<usize>> {
    let offset = element_offset.checked_mul(base_width);
    let len = count.checked_mul(width);
    match (offset, len) {
        (Some(offset), Some(len)) => match offset.checked_add(len) {
            Some(end) if end <= available => Ok(offset..end),
            _ => Err(Error::out_of_range(offset, len, available)),
        },
        (offset, len) => Err(Error::out_of_range(
            offset.unwrap_or(usize::MAX),
            len.unwrap_or(usize::MAX),
            available,
        )),
    }
}

/// A bounds-checked byte range inside a locked storage region.
///
/// Holds the lock for as long as it lives.
pub struct LockedWindow<'a> {
    guard: LockGuard<'a>,
    range: Range<usize>,
}

impl<'a> LockedWindow<'a> {
    /// Wraps `range` of the region locked by `guard`.
    ///
    /// Fails with `OutOfRange` if the locked region is shorter than the range;
    /// the lock is released in that case.
    pub fn new(guard: LockGuard<'a>, range: Range<usize>) -> Result<LockedWindow<'a>> {
        if range.start > range.end || range.end > guard.len() {
            return Err(Error::out_of_range(
                range.start,
                range.end.saturating_sub(range.start),
                guard.len(),
            ));
        }
        Ok(LockedWindow { guard, range })
    }

    #[inline]
    pub fn mode(&self) -> LockMode {
        self.guard.mode()
    }

    /// Byte offset of the window within its storage block.
    #[inline]
    pub fn offset(&self) -> usize {
        self.range.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.range.end - self.range.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the first byte of the window is aligned to `alignment`.
    pub fn is_aligned_to(&self, alignment: usize) -> bool {
        (self.start_ptr() as usize).is_multiple_of(alignment)
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: `range` lies within the locked region (checked in `new`), and
        // the allocator keeps that region valid until `guard` unlocks it.
        unsafe { std::slice::from_raw_parts(self.start_ptr(), self.len()) }
    }

    /// # Panics
    ///
    /// Panics if the window was locked read-only.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        assert!(
            self.mode().is_writable(),
            "mutable bytes requested from a read-only window"
        );
        // SAFETY: as in `bytes`; in addition, a ReadWrite lock is exclusive per
        // the allocator contract, and `&mut self` makes this borrow unique.
        unsafe { std::slice::from_raw_parts_mut(self.start_ptr() as *mut u8, self.len()) }
    }

    #[inline]
    fn start_ptr(&self) -> *const u8 {
        // SAFETY: `range.start <= guard.len()`, so the result stays in bounds
        // (or one past the end for an empty window).
        unsafe { self.guard.as_ptr().as_ptr().add(self.range.start) }
    }
}

impl std::fmt::Debug for LockedWindow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedWindow")
            .field("guard", &self.guard)
            .field("range", &self.range)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_alloc::{Allocator, HeapAllocator};

    #[test]
    fn test_view_window_fits() {
        assert_eq!(view_window(4, 0, 4, 3, 12).unwrap(), 0..12);
        assert_eq!(view_window(2, 2, 4, 3, 16).unwrap(), 4..16);
        assert_eq!(view_window(1, 2, 2, 2, 6).unwrap(), 2..6);
        assert_eq!(view_window(4, 3, 1, 0, 12).unwrap(), 12..12);
    }

    #[test]
    fn test_view_window_rejects_excess() {
        // Offset alone.
        assert!(view_window(4, 4, 4, 0, 12).unwrap_err().is_out_of_range());
        // Length alone.
        assert!(view_window(4, 0, 4, 4, 12).unwrap_err().is_out_of_range());
        // Their sum.
        assert!(view_window(4, 2, 4, 2, 12).unwrap_err().is_out_of_range());
        assert!(view_window(4, 3, 4, 1, 12).unwrap_err().is_out_of_range());
    }

    #[test]
    fn test_view_window_rejects_overflow() {
        assert!(view_window(8, usize::MAX / 2, 1, 1, 64).is_err());
        assert!(view_window(1, 0, 8, usize::MAX / 4, 64).is_err());
        assert!(view_window(1, usize::MAX, 1, 1, usize::MAX).is_err());
    }

    #[test]
    fn test_locked_window_bounds() {
        let allocator = HeapAllocator::new();
        let handle = allocator.allocate(8).unwrap();

        let guard = LockGuard::acquire(&allocator, handle, LockMode::ReadWrite).unwrap();
        let mut window = LockedWindow::new(guard, 2..6).unwrap();
        window.bytes_mut().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(window.offset(), 2);
        assert_eq!(window.len(), 4);
        drop(window);

        let guard = LockGuard::acquire(&allocator, handle, LockMode::ReadOnly).unwrap();
        let window = LockedWindow::new(guard, 0..8).unwrap();
        assert_eq!(window.bytes(), &[0, 0, 1, 2, 3, 4, 0, 0]);
        drop(window);

        let guard = LockGuard::acquire(&allocator, handle, LockMode::ReadOnly).unwrap();
        assert!(LockedWindow::new(guard, 4..9).unwrap_err().is_out_of_range());
        // The rejected window released its lock.
        unsafe { allocator.free(handle) }.unwrap();
    }

    #[test]
    #[should_panic(expected = "read-only window")]
    fn test_read_only_window_is_not_writable() {
        let allocator = HeapAllocator::new();
        let handle = allocator.allocate(4).unwrap();
        let guard = LockGuard::acquire(&allocator, handle, LockMode::ReadOnly).unwrap();
        let mut window = LockedWindow::new(guard, 0..4).unwrap();
        window.bytes_mut();
    }
}
