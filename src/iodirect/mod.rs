//! Block I/O against run files, either through the page cache or with
//! `O_DIRECT`.
//!
//! Direct transfers must start at an `ALIGN`-aligned offset, from an
//! `ALIGN`-aligned address, and move a multiple of `ALIGN` bytes. The buffers
//! come from [`AlignedBuf`]; offsets and sizes are rounded here.

pub(crate) mod aligned_buf;
pub(crate) mod output_run;
pub(crate) mod sorted_run;

use std::{
    fs,
    io::ErrorKind,
    mem,
    os::unix::fs::{FileExt, OpenOptionsExt},
    path::Path,
};

use tracing::debug;

use crate::{
    error::{IoContext, Result, SortError},
    record::Record,
};

pub use aligned_buf::AlignedBuf;
pub use output_run::OutputRun;
pub use sorted_run::SortedRun;

/// Minimum transfer unit assumed for direct I/O.
pub const ALIGN: usize = 512;

/// How run files are accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoBackend {
    /// Regular reads and writes through the page cache.
    #[default]
    Buffered,
    /// `O_DIRECT`: aligned transfers, final block padded then trimmed.
    Direct,
}

impl IoBackend {
    #[inline]
    pub fn is_direct(self) -> bool {
        self == Self::Direct
    }

    /// Physical transfer size for `len` logical bytes.
    #[inline]
    pub fn transfer_len(self, len: usize) -> usize {
        match self {
            Self::Buffered => len,
            Self::Direct => align_up(len),
        }
    }

    /// Reject block geometries this backend cannot transfer.
    pub fn check_block_bytes(self, block_bytes: usize) -> Result<()> {
        if block_bytes == 0 {
            return Err(SortError::Config("block size must be non-zero".into()));
        }
        if self.is_direct() && block_bytes % ALIGN != 0 {
            return Err(SortError::Config(format!(
                "block size {block_bytes} is not a multiple of {ALIGN} required by direct I/O"
            )));
        }
        Ok(())
    }

    /// Buffer alignment this backend needs for records of type `R`.
    #[inline]
    pub fn buffer_align<R: Record>(self) -> usize {
        match self {
            Self::Buffered => mem::align_of::<R>(),
            Self::Direct => ALIGN,
        }
    }

    fn custom_flags(self) -> i32 {
        match self {
            Self::Buffered => 0,
            Self::Direct => libc::O_DIRECT,
        }
    }
}

#[inline]
pub fn align_up(len: usize) -> usize {
    len.div_ceil(ALIGN) * ALIGN
}

pub(crate) fn open_read(path: &Path, backend: IoBackend) -> Result<fs::File> {
    fs::OpenOptions::new()
        .read(true)
        .custom_flags(backend.custom_flags())
        .open(path)
        .io_context(|| format!("failed to open {}", path.display()))
}

pub(crate) fn create_write(path: &Path, backend: IoBackend) -> Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .custom_flags(backend.custom_flags())
        .open(path)
        .io_context(|| format!("failed to create {}", path.display()))
}

/// Reserve `len` bytes on disk without changing the visible file size.
pub(crate) fn preallocate(file: &fs::File, path: &Path, len: u64) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    match rustix::fs::fallocate(file, rustix::fs::FallocateFlags::KEEP_SIZE, 0, len) {
        Ok(()) => Ok(()),
        Err(e) if e == rustix::io::Errno::OPNOTSUPP => {
            debug!(path = %path.display(), "fallocate not supported, skipping");
            Ok(())
        }
        Err(e) => Err(SortError::io(
            format!("fallocate {} bytes for {}", len, path.display()),
            e.into(),
        )),
    }
}

/// Cut a file back to its logical length after padded direct writes.
pub(crate) fn truncate(file: &fs::File, path: &Path, len: u64) -> Result<()> {
    rustix::fs::ftruncate(file, len)
        .map_err(|e| SortError::io(format!("ftruncate {} to {len}", path.display()), e.into()))
}

/// Fill `buf` from `offset` until at least `expected` bytes are in.
///
/// With the direct backend the request is rounded up to `ALIGN`, so more than
/// `expected` bytes may land in `buf`; the return value is what was read.
pub(crate) fn read_block(
    file: &fs::File,
    path: &Path,
    buf: &mut [u8],
    offset: u64,
    expected: usize,
    backend: IoBackend,
) -> Result<usize> {
    let request = backend.transfer_len(expected);
    debug_assert!(request <= buf.len());
    let mut filled = 0;
    while filled < expected {
        match file.read_at(&mut buf[filled..request], offset + filled as u64) {
            Ok(0) => break, // eof
            Ok(n) => {
                filled += n;
                // an unaligned short read only happens at eof
                if backend.is_direct() && filled % ALIGN != 0 {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(SortError::io(
                    format!("read {} bytes from {} at {offset}", request, path.display()),
                    e,
                ))
            }
        }
    }
    if filled < expected {
        return Err(SortError::ShortRead {
            path: path.to_path_buf(),
            offset,
            expected,
            got: filled,
        });
    }
    Ok(filled)
}

pub(crate) fn write_block(file: &fs::File, path: &Path, buf: &[u8], offset: u64) -> Result<()> {
    file.write_all_at(buf, offset).io_context(|| {
        format!(
            "write {} bytes to {} at {offset}",
            buf.len(),
            path.display()
        )
    })
}

/// Whether the filesystem holding `dir` accepts `O_DIRECT` opens.
pub fn direct_io_supported(dir: &Path) -> bool {
    let probe = dir.join(".direct-io-probe");
    let ok = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .custom_flags(libc::O_DIRECT)
        .open(&probe)
        .is_ok();
    let _ = fs::remove_file(&probe);
    ok
}
