use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use sieve::{DatasetConfig, HarnessConfig, Result, Runner, index::IndexConfig};
use tracing_subscriber::EnvFilter;

/// Measure footprint, pruning effectiveness and lookup speed of
/// stripe-pruning index structures
#[derive(Parser, Debug)]
#[command(name = "sieve")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows of the synthetic column
    #[arg(long)]
    generate_num_values: Option<usize>,

    /// Distinct values of the synthetic column
    #[arg(long)]
    num_unique_values: Option<usize>,

    /// CSV file to load instead of generating data
    #[arg(long, requires = "columns")]
    input_csv: Option<PathBuf>,

    /// Columns to load from the CSV file
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// NONE, BY_CARDINALITY or RANDOM
    #[arg(long)]
    sorting: Option<String>,

    /// Rows per stripe, comma separated
    #[arg(long, value_delimiter = ',')]
    stripe_sizes: Vec<usize>,

    /// Index configuration, e.g. `zone_map` or `per_stripe_bloom:0.01`; repeatable
    #[arg(long = "index")]
    indexes: Vec<IndexConfig>,

    /// positive_uniform, positive_distinct, positive_zipf, negative or mixed;
    /// comma separated
    #[arg(long, value_delimiter = ',')]
    test_cases: Vec<String>,

    /// Lookups per evaluator test case
    #[arg(long)]
    num_lookups: Option<usize>,

    /// Query trace to replay against every index
    #[arg(long)]
    workload: Option<PathBuf>,

    /// Run the timed positive/negative lookup series
    #[arg(long)]
    lookup_benchmarks: bool,

    #[arg(long)]
    lookup_batch_size: Option<usize>,

    #[arg(long)]
    min_bench_time_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_path(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(rows) = self.generate_num_values {
            config.generate_num_values = rows;
        }
        if let Some(unique) = self.num_unique_values {
            config.num_unique_values = unique;
        }
        if let Some(path) = self.input_csv {
            config.datasets = vec![DatasetConfig {
                path,
                columns: self.columns,
            }];
        }
        if let Some(sorting) = self.sorting {
            config.sorting = sorting;
        }
        if !self.stripe_sizes.is_empty() {
            config.stripe_sizes = self.stripe_sizes;
        }
        if !self.indexes.is_empty() {
            config.indexes = self.indexes;
        }
        if !self.test_cases.is_empty() {
            config.test_cases = self.test_cases;
        }
        if let Some(num_lookups) = self.num_lookups {
            config.num_lookups = num_lookups;
        }
        if self.workload.is_some() {
            config.workload = self.workload;
        }
        config.lookup_benchmarks |= self.lookup_benchmarks;
        if let Some(size) = self.lookup_batch_size {
            config.lookup_batch_size = size;
        }
        if let Some(ms) = self.min_bench_time_ms {
            config.min_bench_time_ms = ms;
        }
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    Runner::new(config).run(&mut io::stdout().lock())?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sieve=info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
