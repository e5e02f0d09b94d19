use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, SortError},
    iodirect::{self, AlignedBuf, IoBackend},
    record::Record,
};

/// Pull-based reader over one sorted run on disk.
///
/// Holds one block of the run in memory and refills it from the next offset
/// once every record in it was handed out by [`SortedRun::advance`].
pub struct SortedRun<R: Record> {
    path: PathBuf,
    len: u64,
    backend: IoBackend,

    reader: fs::File,
    block: AlignedBuf<R>,
    // records of the current block that belong to the run
    filled: usize,
    pos: usize,

    delivered: u64,
    refills: u64,
}

impl<R: Record> SortedRun<R> {
    /// Open a run of `len` records, reading `block_records` at a time.
    pub fn open(
        path: impl AsRef<Path>,
        len: u64,
        block_records: usize,
        backend: IoBackend,
    ) -> Result<Self> {
        let path = path.as_ref();
        backend.check_block_bytes(block_records * R::SIZE)?;
        let reader = iodirect::open_read(path, backend)?;
        let block = AlignedBuf::new(block_records, backend.buffer_align::<R>())?;

        let mut ret = Self {
            path: path.to_path_buf(),
            len,
            backend,
            reader,
            block,
            filled: 0,
            pos: 0,
            delivered: 0,
            refills: 0,
        };
        if len > 0 {
            ret.refill()?;
        }
        Ok(ret)
    }

    /// Current head of the run, `None` once exhausted.
    #[inline]
    pub fn peek(&self) -> Option<R> {
        if self.at_end() {
            return None;
        }
        Some(self.block.records()[self.pos])
    }

    /// Hand out the head record and move past it.
    #[inline]
    pub fn advance(&mut self) -> Result<R> {
        if self.at_end() {
            return Err(SortError::Exhausted);
        }
        let ret = self.block.records()[self.pos];
        self.pos += 1;
        self.delivered += 1;
        if self.pos == self.filled && !self.at_end() {
            self.refill()?;
        }
        Ok(ret)
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.delivered == self.len
    }

    /// Number of blocks loaded so far.
    #[inline]
    pub fn refills(&self) -> u64 {
        self.refills
    }

    fn refill(&mut self) -> Result<()> {
        debug_assert_eq!(self.pos, self.filled);
        let remaining = self.len - self.delivered;
        // the last physical block may hold fewer logical records
        let want = remaining.min(self.block.capacity() as u64) as usize;
        let offset = self.delivered * R::SIZE as u64;

        iodirect::read_block(
            &self.reader,
            &self.path,
            self.block.bytes_mut(),
            offset,
            want * R::SIZE,
            self.backend,
        )?;

        self.filled = want;
        self.pos = 0;
        self.refills += 1;
        Ok(())
    }
}
