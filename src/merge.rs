//! K-way merge of sorted runs.

use std::{cmp::Reverse, collections::BinaryHeap};

use crate::{
    error::Result,
    iodirect::{OutputRun, SortedRun},
    record::Record,
};

/// Heap entry: head value of one source run.
///
/// Ordered by value first and source index second, so equal values leave the
/// heap in ascending source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor<R> {
    pub value: R,
    pub source: usize,
}

/// Merge `sources` into `out` and finish it.
///
/// Returns the number of records written, which is the sum of the source
/// lengths.
pub fn merge_runs<R: Record>(
    mut sources: Vec<SortedRun<R>>,
    mut out: OutputRun<R>,
) -> Result<u64> {
    // std heap is a max heap, `Reverse` turns it into a min heap
    let mut heap = BinaryHeap::with_capacity(sources.len());
    for (source, run) in sources.iter_mut().enumerate() {
        if !run.at_end() {
            heap.push(Reverse(Cursor {
                value: run.advance()?,
                source,
            }));
        }
    }

    while let Some(Reverse(Cursor { value, source })) = heap.pop() {
        out.push(value)?;
        let run = &mut sources[source];
        if !run.at_end() {
            heap.push(Reverse(Cursor {
                value: run.advance()?,
                source,
            }));
        }
    }

    out.finish()
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::*;
    use crate::{iodirect::IoBackend, record};

    fn open_runs(dir: &Path, runs: &[&[u64]], block: usize) -> Vec<SortedRun<u64>> {
        runs.iter()
            .enumerate()
            .map(|(i, values)| {
                let path = dir.join(format!("in-{i}"));
                fs::write(&path, record::to_bytes(values)).unwrap();
                SortedRun::open(&path, values.len() as u64, block, IoBackend::Buffered).unwrap()
            })
            .collect()
    }

    fn merge(runs: &[&[u64]], block: usize) -> Vec<u64> {
        let dir = tempfile::tempdir().unwrap();
        let sources = open_runs(dir.path(), runs, block);
        let out_path = dir.path().join("out");
        let out = OutputRun::create(&out_path, block, IoBackend::Buffered, None).unwrap();
        let n = merge_runs(sources, out).unwrap();
        let got = record::from_bytes::<u64>(&fs::read(&out_path).unwrap());
        assert_eq!(n, got.len() as u64);
        got
    }

    #[test]
    fn test_merge_interleaves() {
        assert_eq!(
            merge(&[&[1, 4, 7], &[2, 5, 8], &[3, 6, 9]], 2),
            (1..=9).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_merge_keeps_duplicates() {
        assert_eq!(
            merge(&[&[2, 2, 5], &[1, 2], &[2]], 1),
            vec![1, 2, 2, 2, 2, 5]
        );
    }

    #[test]
    fn test_merge_with_empty_sources() {
        assert_eq!(merge(&[&[], &[3, 4], &[]], 4), vec![3, 4]);
        assert_eq!(merge(&[&[], &[]], 4), Vec::<u64>::new());
    }

    #[test]
    fn test_single_source_is_copied() {
        assert_eq!(merge(&[&[1, 2, 3, 4, 5]], 2), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cursor_tie_break_by_source() {
        let mut heap = BinaryHeap::new();
        heap.push(Reverse(Cursor { value: 5_u64, source: 2 }));
        heap.push(Reverse(Cursor { value: 5_u64, source: 0 }));
        heap.push(Reverse(Cursor { value: 3_u64, source: 1 }));
        heap.push(Reverse(Cursor { value: 5_u64, source: 1 }));

        let order: Vec<(u64, usize)> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(c)| (c.value, c.source))
            .collect();
        assert_eq!(order, vec![(3, 1), (5, 0), (5, 1), (5, 2)]);
    }
}
