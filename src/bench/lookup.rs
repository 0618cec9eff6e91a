//! Synthetic lookup batches and the timed lookup loop.
//!
//! Batches are drawn up front from a seeded generator, so the timed loop
//! measures nothing but `qualifying_stripes`.

use std::{
    fmt,
    hint::black_box,
    time::{Duration, Instant},
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Zipf};

use crate::{Column, index::IndexStructure};

/// Values per pre-generated lookup batch.
pub const DEFAULT_LOOKUP_BATCH_SIZE: usize = 1_000_000;

/// Seed of every lookup batch generator.
pub const LOOKUP_SEED: u64 = 42;

/// Exponent of the rank distribution behind [`positive_zipf_batch`].
pub const ZIPF_EXPONENT: f64 = 2.0;

fn non_null_distinct(column: &Column) -> Vec<i64> {
    let mut values = column.distinct_values();
    values.retain(|&value| value != Column::NULL_SENTINEL);
    values
}

fn draw_absent(rng: &mut StdRng, column: &Column) -> i64 {
    loop {
        let value = rng.gen_range(i64::MIN..=i64::MAX);
        if !column.contains(value) {
            return value;
        }
    }
}

/// `size` values drawn uniformly from the column's distinct non-NULL values.
///
/// Empty if the column holds no such value.
pub fn positive_distinct_batch(column: &Column, size: usize, seed: u64) -> Vec<i64> {
    let distinct = non_null_distinct(column);
    if distinct.is_empty() {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| distinct[rng.gen_range(0..distinct.len())])
        .collect()
}

/// `size` values read at uniformly drawn row offsets, NULL rows excluded.
///
/// Frequent values are drawn proportionally more often than in
/// [`positive_distinct_batch`].
pub fn positive_uniform_batch(column: &Column, size: usize, seed: u64) -> Vec<i64> {
    let rows: Vec<i64> = column
        .values()
        .iter()
        .copied()
        .filter(|&value| value != Column::NULL_SENTINEL)
        .collect();
    if rows.is_empty() {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| rows[rng.gen_range(0..rows.len())])
        .collect()
}

/// `size` values drawn from the distinct non-NULL values with Zipf-skewed
/// popularity.
///
/// The `k`-th smallest value is drawn with probability proportional to
/// `k^-ZIPF_EXPONENT`, so the smallest values dominate the batch.
pub fn positive_zipf_batch(column: &Column, size: usize, seed: u64) -> Vec<i64> {
    let distinct = non_null_distinct(column);
    let Ok(zipf) = Zipf::new(distinct.len() as u64, ZIPF_EXPONENT) else {
        return Vec::new();
    };
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            let rank = zipf.sample(&mut rng) as usize;
            distinct[rank.clamp(1, distinct.len()) - 1]
        })
        .collect()
}

/// `size` values, none of which occurs in the column.
pub fn negative_batch(column: &Column, size: usize, seed: u64) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size).map(|_| draw_absent(&mut rng, column)).collect()
}

/// `size` values, each a positive distinct draw with probability `hit_rate`
/// and a negative draw otherwise.
///
/// `hit_rate` is clamped to `[0, 1]`. A column without non-NULL values
/// yields only negative draws.
pub fn mixed_batch(column: &Column, size: usize, hit_rate: f64, seed: u64) -> Vec<i64> {
    let distinct = non_null_distinct(column);
    let hit_rate = if distinct.is_empty() || hit_rate.is_nan() {
        0.0
    } else {
        hit_rate.clamp(0.0, 1.0)
    };
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            if rng.gen_bool(hit_rate) {
                distinct[rng.gen_range(0..distinct.len())]
            } else {
                draw_absent(&mut rng, column)
            }
        })
        .collect()
}

/// The timed lookup series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupKind {
    PositiveDistinct,
    Negative,
}

impl LookupKind {
    pub const ALL: [LookupKind; 2] = [LookupKind::PositiveDistinct, LookupKind::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKind::PositiveDistinct => "PositiveDistinctLookup",
            LookupKind::Negative => "NegativeLookup",
        }
    }

    pub fn batch(&self, column: &Column, size: usize, seed: u64) -> Vec<i64> {
        match self {
            LookupKind::PositiveDistinct => positive_distinct_batch(column, size, seed),
            LookupKind::Negative => negative_batch(column, size, seed),
        }
    }

    /// `<kind>/<column>/<stripe_size>/<index>`
    pub fn series_name(&self, column: &str, stripe_size: usize, index: &str) -> String {
        format!("{}/{column}/{stripe_size}/{index}", self.as_str())
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one timed lookup series.
#[derive(Clone, Debug)]
pub struct LookupMeasurement {
    pub name: String,
    pub lookups: u64,
    pub elapsed: Duration,
}

impl LookupMeasurement {
    pub fn ns_per_lookup(&self) -> f64 {
        if self.lookups == 0 {
            return 0.0;
        }
        self.elapsed.as_nanos() as f64 / self.lookups as f64
    }

    pub fn lookups_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.lookups as f64 / secs
    }
}

impl fmt::Display for LookupMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.1} ns/lookup, {:.0} lookups/s ({} lookups)",
            self.name,
            self.ns_per_lookup(),
            self.lookups_per_sec(),
            self.lookups
        )
    }
}

/// Repeats a pre-generated batch until a minimum wall time has passed.
#[derive(Clone, Copy, Debug)]
pub struct LookupBenchmark {
    min_time: Duration,
}

impl Default for LookupBenchmark {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl LookupBenchmark {
    pub fn new(min_time: Duration) -> Self {
        Self { min_time }
    }

    /// Run `values` through `index` at least once, and again until
    /// `min_time` has elapsed.
    pub fn measure(
        &self,
        name: impl Into<String>,
        index: &dyn IndexStructure,
        values: &[i64],
        num_stripes: usize,
    ) -> LookupMeasurement {
        let mut lookups = 0u64;
        let start = Instant::now();
        loop {
            for &value in values {
                black_box(index.qualifying_stripes(black_box(value), num_stripes));
            }
            lookups += values.len() as u64;
            if values.is_empty() || start.elapsed() >= self.min_time {
                break;
            }
        }
        LookupMeasurement {
            name: name.into(),
            lookups,
            elapsed: start.elapsed(),
        }
    }
}
