//! Sort configuration and the block geometry derived from it.

use std::{fs, path::PathBuf};

use crate::{
    error::{Result, SortError},
    iodirect::IoBackend,
    record::Record,
};

/// User-facing knobs of a sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    /// Bytes available for in-memory buffers, in both phases.
    pub memory_limit: usize,
    /// Bytes per I/O transfer.
    pub block_size: usize,
    pub backend: IoBackend,
    /// Directory the per-sort working directory is created in.
    pub tmp_dir: PathBuf,
}

/// Record counts derived from a validated [`SortConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Records per block.
    pub block_records: usize,
    /// Max runs merged at once; one more block is kept for the output.
    pub fanout: usize,
    /// Records sorted in memory per initial run.
    pub chunk_records: usize,
}

impl SortConfig {
    pub fn new(memory_limit: usize, block_size: usize, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            memory_limit,
            block_size,
            backend: IoBackend::default(),
            tmp_dir: tmp_dir.into(),
        }
    }

    pub fn with_backend(mut self, backend: IoBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = tmp_dir.into();
        self
    }

    /// Check the numbers only, without touching the filesystem.
    pub fn geometry<R: Record>(&self) -> Result<Geometry> {
        if self.block_size == 0 {
            return Err(SortError::Config("block size must be non-zero".into()));
        }
        if self.block_size % R::SIZE != 0 {
            return Err(SortError::Config(format!(
                "block size {} is not a multiple of the {}-byte record size",
                self.block_size,
                R::SIZE
            )));
        }
        self.backend.check_block_bytes(self.block_size)?;

        let blocks = self.memory_limit / self.block_size;
        let fanout = blocks.saturating_sub(1);
        if fanout < 2 {
            return Err(SortError::Config(format!(
                "memory limit {} holds {blocks} blocks of {} bytes, need at least 3 for a 2-way merge",
                self.memory_limit, self.block_size
            )));
        }

        let block_records = self.block_size / R::SIZE;
        Ok(Geometry {
            block_records,
            fanout,
            chunk_records: blocks * block_records,
        })
    }

    /// Full validation, including the temp directory.
    pub fn validate<R: Record>(&self) -> Result<Geometry> {
        let geometry = self.geometry::<R>()?;

        let meta = fs::metadata(&self.tmp_dir).map_err(|e| {
            SortError::Config(format!(
                "temp directory {}: {e}",
                self.tmp_dir.display()
            ))
        })?;
        if !meta.is_dir() {
            return Err(SortError::Config(format!(
                "temp directory {} is not a directory",
                self.tmp_dir.display()
            )));
        }
        if meta.permissions().readonly() {
            return Err(SortError::Config(format!(
                "temp directory {} is not writable",
                self.tmp_dir.display()
            )));
        }

        Ok(geometry)
    }
}
