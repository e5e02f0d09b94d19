//! Error types for the external sort

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while sorting
#[derive(Debug, Error)]
pub enum SortError {
    /// Memory limit, block size or temp directory cannot support a sort
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An open/read/write/rename/delete/truncate call failed
    #[error("{context}: {source}")]
    Io {
        /// Operation and path that failed
        context: String,
        #[source]
        source: io::Error,
    },

    /// A read returned fewer bytes than the run's logical length requires
    #[error("short read from {path:?} at offset {offset}: expected {expected} bytes, got {got}")]
    ShortRead {
        path: PathBuf,
        offset: u64,
        expected: usize,
        got: usize,
    },

    /// Buffer layout that cannot satisfy the requested alignment
    #[error("cannot allocate {size} bytes aligned to {align}")]
    Alignment { size: usize, align: usize },

    /// The allocator could not provide a buffer
    #[error("out of memory allocating a {size}-byte buffer")]
    OutOfMemory { size: usize },

    /// Input length is not a whole number of records
    #[error("input {path:?} is {len} bytes, not a multiple of the {record_size}-byte record size")]
    MalformedInput {
        path: PathBuf,
        len: u64,
        record_size: usize,
    },

    /// `advance` was called on a run that already delivered all of its records
    #[error("run is exhausted")]
    Exhausted,

    /// Record count changed between passes
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Output check after the sort failed
    #[error("verification failed: {0}")]
    Verify(String),
}

impl SortError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Attach a context message to a failed `std::io` call
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| SortError::io(f(), source))
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
