use std::{
    alloc::{self, Layout},
    marker::PhantomData,
    mem,
    ptr::NonNull,
    slice,
};

use crate::{
    error::{Result, SortError},
    record::Record,
};

/// Zeroed block of memory whose address and length are multiples of `align`,
/// viewable either as raw bytes or as `capacity` records.
pub struct AlignedBuf<R> {
    ptr: NonNull<u8>,
    layout: Layout,
    capacity: usize,
    _marker: PhantomData<R>,
}

impl<R: Record> AlignedBuf<R> {
    pub fn new(capacity: usize, align: usize) -> Result<Self> {
        let logical = capacity
            .checked_mul(R::SIZE)
            .ok_or(SortError::Alignment { size: usize::MAX, align })?;
        if !align.is_power_of_two() || align < mem::align_of::<R>() {
            return Err(SortError::Alignment {
                size: logical,
                align,
            });
        }
        // round up so a padded final transfer still fits, never ask for 0 bytes
        let size = logical.max(1).div_ceil(align) * align;
        let layout = Layout::from_size_align(size, align)
            .map_err(|_| SortError::Alignment { size, align })?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(SortError::OutOfMemory { size })?;

        Ok(Self {
            ptr,
            layout,
            capacity,
            _marker: PhantomData,
        })
    }

    /// Number of record slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn records(&self) -> &[R] {
        // SAFETY: the allocation holds at least `capacity` records, is aligned
        // for `R` and zero-initialized, and `Record` accepts any bit pattern.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().cast::<R>(), self.capacity) }
    }

    #[inline]
    pub fn records_mut(&mut self) -> &mut [R] {
        // SAFETY: see `records`; `&mut self` gives exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().cast::<R>(), self.capacity) }
    }

    /// The whole physical region, padding included.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: `layout.size()` bytes were allocated and zeroed.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `bytes`.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl<R> Drop for AlignedBuf<R> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `alloc_zeroed` with exactly this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// SAFETY: the buffer exclusively owns its allocation.
unsafe impl<R: Send> Send for AlignedBuf<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iodirect::ALIGN;

    #[test]
    fn test_address_and_size_are_aligned() {
        for cap in [1, 3, 64, 65, 1000] {
            let buf = AlignedBuf::<u64>::new(cap, ALIGN).unwrap();
            assert_eq!(buf.bytes().as_ptr() as usize % ALIGN, 0);
            assert_eq!(buf.bytes().len() % ALIGN, 0);
            assert!(buf.bytes().len() >= cap * 8);
            assert_eq!(buf.records().len(), cap);
        }
    }

    #[test]
    fn test_records_alias_bytes() {
        let mut buf = AlignedBuf::<u64>::new(4, ALIGN).unwrap();
        assert!(buf.records().iter().all(|&v| v == 0));
        buf.records_mut()[1] = 0xdead_beef;
        assert_eq!(&buf.bytes()[8..16], &0xdead_beef_u64.to_ne_bytes());
    }

    #[test]
    fn test_zero_capacity() {
        let buf = AlignedBuf::<u64>::new(0, ALIGN).unwrap();
        assert!(buf.records().is_empty());
        assert_eq!(buf.bytes().len(), ALIGN);
    }

    #[test]
    fn test_record_alignment_is_not_padded() {
        let buf = AlignedBuf::<u64>::new(3, 8).unwrap();
        assert_eq!(buf.bytes().len(), 24);
        assert_eq!(buf.bytes().as_ptr() as usize % 8, 0);
    }

    #[test]
    fn test_failed_allocation_is_an_error() {
        // a valid layout no allocator can satisfy
        let cap = (1_usize << 60) / 8;
        assert!(matches!(
            AlignedBuf::<u64>::new(cap, ALIGN),
            Err(SortError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_bad_alignment() {
        assert!(matches!(
            AlignedBuf::<u64>::new(8, 100),
            Err(SortError::Alignment { align: 100, .. })
        ));
        assert!(matches!(
            AlignedBuf::<u64>::new(8, 4),
            Err(SortError::Alignment { align: 4, .. })
        ));
    }
}
