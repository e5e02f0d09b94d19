use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    fs,
    path::PathBuf,
};

use crate::error::{IoContext, Result};

pub type RunId = u64;

/// A sorted extent of records living in its own temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    pub path: PathBuf,
    /// Logical number of records, independent of the file's physical size.
    pub len: u64,
}

impl Run {
    /// Logical byte length of the run for records of `record_size` bytes.
    #[inline]
    pub fn extent(&self, record_size: usize) -> u64 {
        self.len * record_size as u64
    }

    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path)
            .io_context(|| format!("failed to delete run {}", self.path.display()))
    }
}

/// Hands out run ids and file names inside the sort's working directory.
#[derive(Debug)]
pub struct RunNamer {
    dir: PathBuf,
    next: RunId,
}

impl RunNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next: 0,
        }
    }

    pub fn next_run(&mut self) -> (RunId, PathBuf) {
        let id = self.next;
        self.next += 1;
        (id, self.dir.join(format!("run-{id:06}.bin")))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PoolKey {
    len: u64,
    id: RunId,
}

/// Surviving runs, handed out smallest first (ties by id).
#[derive(Debug, Default)]
pub struct RunPool {
    heap: BinaryHeap<Reverse<(PoolKey, PathBuf)>>,
    total: u64,
}

impl RunPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, run: Run) {
        self.total += run.len;
        self.heap.push(Reverse((
            PoolKey {
                len: run.len,
                id: run.id,
            },
            run.path,
        )));
    }

    pub fn pop_smallest(&mut self) -> Option<Run> {
        let Reverse((key, path)) = self.heap.pop()?;
        self.total -= key.len;
        Some(Run {
            id: key.id,
            path,
            len: key.len,
        })
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Sum of the lengths of all runs in the pool.
    pub fn total_records(&self) -> u64 {
        self.total
    }

    /// Drain every run, smallest first.
    pub fn drain_ascending(&mut self) -> Vec<Run> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(run) = self.pop_smallest() {
            out.push(run);
        }
        out
    }
}

impl Extend<Run> for RunPool {
    fn extend<T: IntoIterator<Item = Run>>(&mut self, iter: T) {
        for run in iter {
            self.push(run);
        }
    }
}
