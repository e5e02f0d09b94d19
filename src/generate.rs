//! Phase 1: cut the input into memory-sized chunks and write each one sorted.

use std::path::Path;

use tracing::{debug, info};

use crate::{
    error::{IoContext, Result, SortError},
    iodirect::{self, AlignedBuf, IoBackend},
    record::Record,
    run::{Run, RunNamer},
};

#[derive(Debug, Clone, Copy)]
pub struct RunGenerator {
    pub chunk_records: usize,
    pub block_records: usize,
    pub backend: IoBackend,
}

impl RunGenerator {
    pub fn new(chunk_records: usize, block_records: usize, backend: IoBackend) -> Self {
        Self {
            chunk_records,
            block_records,
            backend,
        }
    }

    /// Write the initial runs of `input` into the namer's directory.
    ///
    /// Every run holds `chunk_records` records except possibly the last one.
    /// An empty input yields no runs.
    pub fn generate<R: Record>(&self, input: &Path, namer: &mut RunNamer) -> Result<Vec<Run>> {
        if self.chunk_records == 0 {
            return Err(SortError::Config("chunk must hold at least one record".into()));
        }
        // chunk reads start at multiples of the chunk size
        self.backend
            .check_block_bytes(self.chunk_records * R::SIZE)?;

        let reader = iodirect::open_read(input, self.backend)?;
        let file_len = reader
            .metadata()
            .io_context(|| format!("failed to stat {}", input.display()))?
            .len();
        if file_len % R::SIZE as u64 != 0 {
            return Err(SortError::MalformedInput {
                path: input.to_path_buf(),
                len: file_len,
                record_size: R::SIZE,
            });
        }
        let total = file_len / R::SIZE as u64;
        info!(input = %input.display(), records = total, chunk = self.chunk_records, "generating runs");

        if total == 0 {
            return Ok(Vec::new());
        }

        let mut chunk =
            AlignedBuf::<R>::new(self.buffer_records(total), self.backend.buffer_align::<R>())?;
        let mut runs = Vec::with_capacity(total.div_ceil(self.chunk_records as u64) as usize);
        let mut consumed = 0_u64;

        while consumed < total {
            let n = (total - consumed).min(chunk.capacity() as u64) as usize;
            iodirect::read_block(
                &reader,
                input,
                chunk.bytes_mut(),
                consumed * R::SIZE as u64,
                n * R::SIZE,
                self.backend,
            )?;
            consumed += n as u64;

            chunk.records_mut()[..n].sort_unstable();

            let (id, path) = namer.next_run();
            self.spill(&mut chunk, n, &path)?;
            debug!(run = id, records = n, "wrote initial run");
            runs.push(Run {
                id,
                path,
                len: n as u64,
            });
        }

        Ok(runs)
    }

    /// Records the chunk buffer needs for an input of `total` records: the
    /// whole chunk, or the input rounded up to whole blocks if that is less.
    fn buffer_records(&self, total: u64) -> usize {
        let block = self.block_records.max(1) as u64;
        let needed = total.div_ceil(block) * block;
        needed.min(self.chunk_records as u64) as usize
    }

    /// Write the first `n` records of `chunk` to `path` one block at a time,
    /// straight from the chunk buffer.
    fn spill<R: Record>(&self, chunk: &mut AlignedBuf<R>, n: usize, path: &Path) -> Result<()> {
        let out = iodirect::create_write(path, self.backend)?;
        let len = n * R::SIZE;
        iodirect::preallocate(&out, path, len as u64)?;

        let padded = self.backend.transfer_len(len);
        // zero whatever the last read left past the logical end
        chunk.bytes_mut()[len..padded].fill(0_u8);

        let block_bytes = self.block_records * R::SIZE;
        let mut off = 0;
        while off < len {
            let end = (off + block_bytes).min(len);
            let transfer = self.backend.transfer_len(end - off);
            iodirect::write_block(&out, path, &chunk.bytes()[off..off + transfer], off as u64)?;
            off = end;
        }
        if padded != len {
            // padding zero bytes were written for O_DIRECT alignment
            iodirect::truncate(&out, path, len as u64)?;
        }
        Ok(())
    }
}
