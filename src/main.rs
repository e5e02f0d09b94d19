use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use extmsort::{verify_sorted, ExternalSorter, IoBackend, SortConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Read and write through the page cache.
    Buffered,
    /// Bypass the page cache with O_DIRECT.
    Direct,
}

impl From<Backend> for IoBackend {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Buffered => IoBackend::Buffered,
            Backend::Direct => IoBackend::Direct,
        }
    }
}

/// Sort a file of native-endian u64 records with bounded memory.
#[derive(Debug, Parser)]
#[command(name = "extmsort", version)]
struct Cli {
    /// File to sort.
    input: PathBuf,

    /// Where the sorted file is written.
    output: PathBuf,

    /// Existing directory for intermediate runs.
    tmp_dir: PathBuf,

    /// Bytes of memory for in-memory buffers.
    memory_limit: usize,

    /// Bytes per I/O transfer.
    block_size: usize,

    #[arg(long, value_enum, default_value = "buffered")]
    backend: Backend,

    /// Re-read the output and check it is sorted and complete.
    #[arg(long)]
    verify: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> extmsort::Result<()> {
    let config = SortConfig::new(cli.memory_limit, cli.block_size, &cli.tmp_dir)
        .with_backend(cli.backend.into());
    let sorter = ExternalSorter::new(config);
    let stats = sorter.sort::<u64>(&cli.input, &cli.output)?;

    if cli.verify {
        let geometry = sorter.config().geometry::<u64>()?;
        // the output was trimmed to its logical size, read it through the page cache
        verify_sorted::<u64>(
            &cli.output,
            Some(stats.records),
            geometry.block_records,
            IoBackend::Buffered,
        )?;
        println!("OK");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("extmsort: {e}");
            if matches!(e, extmsort::SortError::Verify(_)) {
                println!("WRONG");
            }
            ExitCode::from(1)
        }
    }
}
