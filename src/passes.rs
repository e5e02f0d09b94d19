//! Phase 2: merge passes over the run pool until one run is left.

use std::{fs, io, mem, path::Path};

use tracing::{debug, info};

use crate::{
    error::{IoContext, Result, SortError},
    iodirect::{self, IoBackend, OutputRun, SortedRun},
    merge,
    record::Record,
    run::{Run, RunNamer, RunPool},
};

/// What one merge pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// 1-based pass number.
    pub pass: usize,
    pub runs_in: usize,
    pub runs_out: usize,
    /// Records across all surviving runs after the pass.
    pub records: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct PassController {
    fanout: usize,
    block_records: usize,
    backend: IoBackend,
}

impl PassController {
    pub fn new(fanout: usize, block_records: usize, backend: IoBackend) -> Result<Self> {
        if fanout < 2 {
            return Err(SortError::Config(format!(
                "fanout {fanout} is too small, a merge needs at least 2 inputs"
            )));
        }
        Ok(Self {
            fanout,
            block_records,
            backend,
        })
    }

    /// Merge the pool down to a single run.
    ///
    /// Each pass takes the runs present at its start, smallest first, in groups
    /// of `fanout`. A trailing group of one run moves to the next pass as is.
    /// Returns `None` for an empty pool.
    pub fn merge_all<R: Record>(
        &self,
        mut pool: RunPool,
        namer: &mut RunNamer,
    ) -> Result<(Option<Run>, Vec<PassSummary>)> {
        let total = pool.total_records();
        let mut passes = Vec::new();

        while pool.len() > 1 {
            let mut runs = pool.drain_ascending();
            let runs_in = runs.len();
            let mut next = RunPool::new();

            while !runs.is_empty() {
                let rest = runs.split_off(runs.len().min(self.fanout));
                let mut group = mem::replace(&mut runs, rest);
                if group.len() == 1 {
                    next.extend(group.pop());
                } else {
                    next.push(self.merge_group::<R>(group, namer)?);
                }
            }

            let summary = PassSummary {
                pass: passes.len() + 1,
                runs_in,
                runs_out: next.len(),
                records: next.total_records(),
            };
            if summary.records != total {
                return Err(SortError::Invariant(format!(
                    "pass {} left {} records, expected {total}",
                    summary.pass, summary.records
                )));
            }
            info!(
                pass = summary.pass,
                runs_in = summary.runs_in,
                runs_out = summary.runs_out,
                "merge pass done"
            );
            passes.push(summary);
            pool = next;
        }

        Ok((pool.pop_smallest(), passes))
    }

    /// Merge `group` into a fresh run and delete the inputs.
    fn merge_group<R: Record>(&self, group: Vec<Run>, namer: &mut RunNamer) -> Result<Run> {
        let expected: u64 = group.iter().map(|r| r.len).sum();
        let sources = group
            .iter()
            .map(|r| SortedRun::<R>::open(&r.path, r.len, self.block_records, self.backend))
            .collect::<Result<Vec<_>>>()?;

        let (id, path) = namer.next_run();
        let out = OutputRun::<R>::create(&path, self.block_records, self.backend, Some(expected))?;
        // readers and writer are closed when this returns
        let len = merge::merge_runs(sources, out)?;
        if len != expected {
            return Err(SortError::Invariant(format!(
                "merged run {id} has {len} records, inputs had {expected}"
            )));
        }

        for run in &group {
            run.remove()?;
        }
        debug!(run = id, inputs = group.len(), records = len, "merged group");
        Ok(Run { id, path, len })
    }
}

/// Move the surviving run to `output` and make its size exactly its logical
/// length. No run means an empty input, which becomes an empty output file.
pub fn commit_output<R: Record>(run: Option<Run>, output: &Path) -> Result<()> {
    let Some(run) = run else {
        fs::File::create(output)
            .io_context(|| format!("failed to create {}", output.display()))?;
        return Ok(());
    };

    if let Err(e) = fs::rename(&run.path, output) {
        if e.raw_os_error() != Some(libc::EXDEV) {
            return Err(SortError::io(
                format!(
                    "failed to rename {} to {}",
                    run.path.display(),
                    output.display()
                ),
                e,
            ));
        }
        debug!("temp dir is on another filesystem, copying result");
        fs::copy(&run.path, output).io_context(|| {
            format!("failed to copy {} to {}", run.path.display(), output.display())
        })?;
        run.remove()?;
    }

    let extent = run.extent(R::SIZE);
    let file = fs::OpenOptions::new()
        .write(true)
        .open(output)
        .io_context(|| format!("failed to open {}", output.display()))?;
    let physical = file
        .metadata()
        .io_context(|| format!("failed to stat {}", output.display()))?
        .len();
    match physical.cmp(&extent) {
        std::cmp::Ordering::Equal => Ok(()),
        std::cmp::Ordering::Greater => iodirect::truncate(&file, output, extent),
        std::cmp::Ordering::Less => Err(SortError::io(
            format!("output {} is shorter than {extent} bytes", output.display()),
            io::Error::from(io::ErrorKind::UnexpectedEof),
        )),
    }
}
