use std::{fmt::Debug, mem};

/// A fixed-width, totally ordered value stored back to back in native byte
/// order.
///
/// # Safety
///
/// Implementors must have no padding bytes and every bit pattern of
/// `size_of::<Self>()` bytes must be a valid value, so that an aligned block of
/// bytes read from disk can be viewed as `&[Self]`.
pub unsafe trait Record: Copy + Ord + Default + Debug + Send + 'static {
    const SIZE: usize = mem::size_of::<Self>();
}

unsafe impl Record for u64 {}
unsafe impl Record for u32 {}
unsafe impl Record for i64 {}

/// Encode records the way they are laid out on disk.
pub fn to_bytes<R: Record>(records: &[R]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * R::SIZE);
    // SAFETY: `Record` guarantees no padding, so every byte is initialized.
    let bytes = unsafe {
        std::slice::from_raw_parts(records.as_ptr().cast::<u8>(), mem::size_of_val(records))
    };
    out.extend_from_slice(bytes);
    out
}

/// Decode a headerless byte stream; trailing bytes short of a record are ignored.
pub fn from_bytes<R: Record>(bytes: &[u8]) -> Vec<R> {
    bytes
        .chunks_exact(R::SIZE)
        .map(|chunk| {
            let mut v = R::default();
            // SAFETY: `chunk` is exactly `R::SIZE` bytes and any bit pattern is valid.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    chunk.as_ptr(),
                    (&mut v as *mut R).cast::<u8>(),
                    R::SIZE,
                );
            }
            v
        })
        .collect()
}
