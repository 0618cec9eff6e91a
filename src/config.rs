//! Harness configuration.
//!
//! Read from a JSON file; every field is optional. Example:
//!
//! ```json
//! {
//!   "datasets": [{ "path": "orders.csv", "columns": ["customer_id"] }],
//!   "sorting": "BY_CARDINALITY",
//!   "stripe_sizes": [8192],
//!   "indexes": [{ "family": "zone_map" }, { "family": "per_stripe_bloom", "fpp": 0.05 }],
//!   "test_cases": ["negative", "mixed"]
//! }
//! ```

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    Result, SieveError, Sorting,
    bench::{DEFAULT_LOOKUP_BATCH_SIZE, TestCase},
    index::IndexConfig,
};

/// A CSV file and the columns to benchmark from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Rows of the synthetic column, used when `datasets` is empty.
    pub generate_num_values: usize,
    /// Distinct values of the synthetic column.
    pub num_unique_values: usize,
    pub datasets: Vec<DatasetConfig>,
    /// `NONE`, `BY_CARDINALITY` or `RANDOM`.
    pub sorting: String,
    pub stripe_sizes: Vec<usize>,
    pub indexes: Vec<IndexConfig>,
    /// Evaluator test cases, see [`TestCase::parse`].
    pub test_cases: Vec<String>,
    pub num_lookups: usize,
    pub lookup_benchmarks: bool,
    pub lookup_batch_size: usize,
    pub min_bench_time_ms: u64,
    /// Query trace replayed against every built index.
    pub workload: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            generate_num_values: 100_000,
            num_unique_values: 1_000,
            datasets: Vec::new(),
            sorting: Sorting::None.as_str().to_string(),
            stripe_sizes: vec![8192, 65536],
            indexes: IndexConfig::defaults(),
            test_cases: Vec::new(),
            num_lookups: 1_000,
            lookup_benchmarks: false,
            lookup_batch_size: DEFAULT_LOOKUP_BATCH_SIZE,
            min_bench_time_ms: 500,
            workload: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Check everything that can be checked without touching data.
    ///
    /// Returns the parsed sorting mode.
    pub fn validate(&self) -> Result<Sorting> {
        let sorting = Sorting::parse(&self.sorting)?;

        if self.stripe_sizes.is_empty() {
            return Err(SieveError::InvalidConfig(
                "at least one stripe size is required".to_string(),
            ));
        }
        if self.stripe_sizes.contains(&0) {
            return Err(SieveError::InvalidConfig(
                "stripe sizes must be positive".to_string(),
            ));
        }
        if self.indexes.is_empty() {
            return Err(SieveError::InvalidConfig(
                "at least one index configuration is required".to_string(),
            ));
        }
        if let Some(dataset) = self.datasets.iter().find(|d| d.columns.is_empty()) {
            return Err(SieveError::InvalidConfig(format!(
                "dataset {} names no columns",
                dataset.path.display()
            )));
        }
        for dataset in &self.datasets {
            check_readable("dataset", &dataset.path)?;
        }
        if let Some(workload) = &self.workload {
            check_readable("workload", workload)?;
        }
        if self.lookup_benchmarks && self.lookup_batch_size == 0 {
            return Err(SieveError::InvalidConfig(
                "lookup batch size must be positive".to_string(),
            ));
        }
        self.parsed_test_cases()?;

        Ok(sorting)
    }

    /// Test cases with `mixed` expanded.
    pub fn parsed_test_cases(&self) -> Result<Vec<TestCase>> {
        let mut test_cases = Vec::new();
        for name in &self.test_cases {
            test_cases.extend(TestCase::parse(name)?);
        }
        Ok(test_cases)
    }

    pub fn min_bench_time(&self) -> Duration {
        Duration::from_millis(self.min_bench_time_ms)
    }
}

fn check_readable(kind: &str, path: &Path) -> Result<()> {
    File::open(path).map(drop).map_err(|err| {
        SieveError::InvalidConfig(format!("cannot open {kind} {}: {err}", path.display()))
    })
}
