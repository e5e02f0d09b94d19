//! Post-sort check that an output file is ordered and complete.

use std::{fs, path::Path};

use crate::{
    error::{IoContext, Result, SortError},
    iodirect::{IoBackend, SortedRun},
    record::Record,
};

/// Stream `path` and confirm its records never decrease.
///
/// When `expected_len` is given the record count must match it too. Returns
/// the number of records checked.
pub fn verify_sorted<R: Record>(
    path: &Path,
    expected_len: Option<u64>,
    block_records: usize,
    backend: IoBackend,
) -> Result<u64> {
    let bytes = fs::metadata(path)
        .io_context(|| format!("failed to stat {}", path.display()))?
        .len();
    if bytes % R::SIZE as u64 != 0 {
        return Err(SortError::Verify(format!(
            "{} is {bytes} bytes, not a whole number of records",
            path.display()
        )));
    }
    let len = bytes / R::SIZE as u64;
    if let Some(expected) = expected_len {
        if len != expected {
            return Err(SortError::Verify(format!(
                "{} holds {len} records, expected {expected}",
                path.display()
            )));
        }
    }

    let mut run = SortedRun::<R>::open(path, len, block_records, backend)?;
    let mut prev = match run.peek() {
        Some(v) => v,
        None => return Ok(0),
    };
    let mut idx = 0_u64;
    while !run.at_end() {
        let v = run.advance()?;
        if v < prev {
            return Err(SortError::Verify(format!(
                "record #{idx} ({v:?}) is smaller than the one before it ({prev:?})"
            )));
        }
        prev = v;
        idx += 1;
    }
    Ok(idx)
}
