//! Bounded-memory external merge sort for files of fixed-width records.
//!
//! Sorting happens in two phases. [`generate::RunGenerator`] reads the input in
//! chunks that fit the memory budget, sorts each chunk and writes it out as a
//! run. [`passes::PassController`] then merges up to `fanout` runs at a time,
//! smallest first, until a single run remains and is moved to the output
//! path. All I/O is done in blocks through [`iodirect`], either buffered or
//! with `O_DIRECT`.
//!
//! ```no_run
//! use std::path::Path;
//! use extmsort::{ExternalSorter, SortConfig};
//!
//! let config = SortConfig::new(64 << 20, 1 << 20, "/var/tmp");
//! let stats = ExternalSorter::new(config)
//!     .sort::<u64>(Path::new("data.bin"), Path::new("sorted.bin"))?;
//! println!("{} records in {} passes", stats.records, stats.passes.len());
//! # Ok::<(), extmsort::SortError>(())
//! ```

pub mod config;
pub mod error;
pub mod generate;
pub mod iodirect;
pub mod merge;
pub mod passes;
pub mod record;
pub mod run;
pub mod sorter;
pub mod verify;

pub use config::{Geometry, SortConfig};
pub use error::{Result, SortError};
pub use iodirect::IoBackend;
pub use record::Record;
pub use sorter::{ExternalSorter, SortStats};
pub use verify::verify_sorted;
