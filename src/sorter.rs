use std::path::Path;

use tracing::info;

use crate::{
    config::SortConfig,
    error::{IoContext, Result},
    generate::RunGenerator,
    passes::{self, PassController, PassSummary},
    record::Record,
    run::{RunNamer, RunPool},
};

/// Statistics from a finished sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortStats {
    pub records: u64,
    pub initial_runs: usize,
    pub fanout: usize,
    pub passes: Vec<PassSummary>,
}

/// Sorts a file of fixed-width records within a memory budget.
#[derive(Debug, Clone)]
pub struct ExternalSorter {
    config: SortConfig,
}

impl ExternalSorter {
    pub fn new(config: SortConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    /// Sort `input` into `output`.
    ///
    /// Intermediate runs live in a private directory under the configured
    /// temp dir, removed when the sort returns. On error no output file is
    /// guaranteed to exist.
    pub fn sort<R: Record>(&self, input: &Path, output: &Path) -> Result<SortStats> {
        let geometry = self.config.validate::<R>()?;
        info!(
            memory_limit = self.config.memory_limit,
            block_size = self.config.block_size,
            backend = ?self.config.backend,
            fanout = geometry.fanout,
            "starting sort"
        );

        let work_dir = tempfile::Builder::new()
            .prefix("extmsort-")
            .tempdir_in(&self.config.tmp_dir)
            .io_context(|| {
                format!(
                    "failed to create working directory in {}",
                    self.config.tmp_dir.display()
                )
            })?;
        let mut namer = RunNamer::new(work_dir.path());

        info!("phase 1: generating runs");
        let runs = RunGenerator::new(
            geometry.chunk_records,
            geometry.block_records,
            self.config.backend,
        )
        .generate::<R>(input, &mut namer)?;

        let mut pool = RunPool::new();
        let initial_runs = runs.len();
        pool.extend(runs);
        let records = pool.total_records();

        info!(runs = initial_runs, records, "phase 2: merging runs");
        let controller =
            PassController::new(geometry.fanout, geometry.block_records, self.config.backend)?;
        let (last, passes) = controller.merge_all::<R>(pool, &mut namer)?;
        passes::commit_output::<R>(last, output)?;

        let dir = work_dir.path().to_path_buf();
        work_dir
            .close()
            .io_context(|| format!("failed to remove {}", dir.display()))?;

        info!(records, passes = passes.len(), output = %output.display(), "sort done");
        Ok(SortStats {
            records,
            initial_runs,
            fanout: geometry.fanout,
            passes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{error::SortError, record};

    #[test]
    fn test_sort_leaves_tmp_dir_clean() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        fs::create_dir(&tmp).unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::write(&input, record::to_bytes(&[3_u64, 1, 2, 2, 0, 9, 4])).unwrap();

        let sorter = ExternalSorter::new(SortConfig::new(24, 8, &tmp));
        let stats = sorter.sort::<u64>(&input, &output).unwrap();

        assert_eq!(stats.records, 7);
        assert_eq!(stats.initial_runs, 3);
        assert_eq!(stats.fanout, 2);
        assert_eq!(
            record::from_bytes::<u64>(&fs::read(&output).unwrap()),
            vec![0, 1, 2, 2, 3, 4, 9]
        );
        assert_eq!(fs::read_dir(&tmp).unwrap().count(), 0);
    }

    #[test]
    fn test_config_error_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let sorter = ExternalSorter::new(SortConfig::new(16, 8, dir.path()));
        let err = sorter
            .sort::<u64>(&dir.path().join("missing"), &output)
            .unwrap_err();
        assert!(matches!(err, SortError::Config(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_u32_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::write(&input, record::to_bytes(&[7_u32, 5, 6, 1, 3])).unwrap();

        ExternalSorter::new(SortConfig::new(24, 8, dir.path()))
            .sort::<u32>(&input, &output)
            .unwrap();
        assert_eq!(
            record::from_bytes::<u32>(&fs::read(&output).unwrap()),
            vec![1, 3, 5, 6, 7]
        );
    }
}
