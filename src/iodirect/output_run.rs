use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::{
    error::Result,
    iodirect::{self, AlignedBuf, IoBackend},
    record::Record,
};

/// Buffered writer producing one run file, one block per write call.
pub struct OutputRun<R: Record> {
    path: PathBuf,
    backend: IoBackend,

    inner: fs::File,
    block: AlignedBuf<R>,
    pos: usize,

    // logical bytes already on disk
    off: u64,
    written: u64,
    finished: bool,
}

impl<R: Record> OutputRun<R> {
    /// Create (or truncate) `path`.
    ///
    /// `expected_len` is the number of records that will be pushed, if known;
    /// the space is reserved up front.
    pub fn create(
        path: impl AsRef<Path>,
        block_records: usize,
        backend: IoBackend,
        expected_len: Option<u64>,
    ) -> Result<Self> {
        let path = path.as_ref();
        backend.check_block_bytes(block_records * R::SIZE)?;
        let inner = iodirect::create_write(path, backend)?;
        if let Some(len) = expected_len {
            iodirect::preallocate(&inner, path, len * R::SIZE as u64)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            backend,
            inner,
            block: AlignedBuf::new(block_records, backend.buffer_align::<R>())?,
            pos: 0,
            off: 0,
            written: 0,
            finished: false,
        })
    }

    #[inline]
    pub fn push(&mut self, v: R) -> Result<()> {
        debug_assert!(!self.finished, "push after finish");
        self.block.records_mut()[self.pos] = v;
        self.pos += 1;
        self.written += 1;
        if self.pos == self.block.capacity() {
            self.flush()?;
        }
        Ok(())
    }

    /// Write out the last partial block and trim any padding.
    ///
    /// Returns the number of records in the run.
    pub fn finish(&mut self) -> Result<u64> {
        if self.finished {
            return Ok(self.written);
        }
        let padded = self.flush()?;
        if padded {
            // padding zero bytes were written for O_DIRECT alignment
            iodirect::truncate(&self.inner, &self.path, self.off)?;
        }
        self.finished = true;
        Ok(self.written)
    }

    /// Returns whether the transfer was padded past the logical end.
    fn flush(&mut self) -> Result<bool> {
        if self.pos == 0 {
            return Ok(false);
        }
        let buf_len = self.pos * R::SIZE;
        let transfer = self.backend.transfer_len(buf_len);
        let padded = transfer != buf_len;
        if padded {
            // this only happens on the very last write
            self.block.bytes_mut()[buf_len..transfer].fill(0_u8);
        }

        iodirect::write_block(
            &self.inner,
            &self.path,
            &self.block.bytes()[..transfer],
            self.off,
        )?;
        self.off += buf_len as u64;
        self.pos = 0;
        Ok(padded)
    }
}

impl<R: Record> Drop for OutputRun<R> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                path = %self.path.display(),
                records = self.written,
                "run writer dropped before finish, run is incomplete"
            );
        }
    }
}
