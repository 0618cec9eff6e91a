//! The configured sweep: data sources × columns × stripe sizes × indexes.

use std::{
    fs::File,
    io::{BufReader, Write},
    time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
    BitmapStats, Column, Result, Table,
    bench::{
        Effectiveness, Evaluator, LOOKUP_SEED, LookupBenchmark, LookupKind, LookupMeasurement,
        ReplayEvent, SegmentStats, TestCase, WorkloadReplay,
    },
    config::{DatasetConfig, HarnessConfig},
    data::{generate_uniform, load_csv},
    index::{IndexConfig, IndexStructure, IndexStructureFactory},
};

/// Everything measured for one built index.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub column: String,
    pub stripe_size: usize,
    pub num_stripes: usize,
    /// zstd-compressed size of the column, stripe by stripe.
    pub column_compressed_byte_size: usize,
    pub index: String,
    pub byte_size: usize,
    pub compressed_byte_size: usize,
    /// Density and clustering of the bitmaps the index keeps, if any.
    pub bitmap_stats: Option<BitmapStats>,
    pub build_time: Duration,
    pub effectiveness: Vec<Effectiveness>,
    pub lookups: Vec<LookupMeasurement>,
    pub segments: Vec<SegmentStats>,
}

enum DataSource<'a> {
    Synthetic { num_rows: usize, num_unique: usize },
    Csv(&'a DatasetConfig),
}

impl DataSource<'_> {
    fn load(&self) -> Result<Table> {
        match self {
            DataSource::Synthetic {
                num_rows,
                num_unique,
            } => {
                info!("Generating {num_rows} values with {num_unique} unique values...");
                generate_uniform(*num_rows, *num_unique)
            }
            DataSource::Csv(dataset) => load_csv(&dataset.path, &dataset.columns),
        }
    }
}

/// One (column, stripe size) combination shared by every index built on it.
struct IndexRun<'a> {
    column: &'a Column,
    stripe_size: usize,
    column_compressed_byte_size: usize,
    evaluator: Option<&'a Evaluator<'a>>,
    test_cases: &'a [TestCase],
    batches: &'a [(LookupKind, Vec<i64>)],
}

pub struct Runner {
    config: HarnessConfig,
}

impl Runner {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    fn sources(&self) -> Vec<DataSource<'_>> {
        if self.config.datasets.is_empty() {
            return vec![DataSource::Synthetic {
                num_rows: self.config.generate_num_values,
                num_unique: self.config.num_unique_values,
            }];
        }
        self.config.datasets.iter().map(DataSource::Csv).collect()
    }

    /// Run the sweep, writing the report to `out`.
    ///
    /// Index configurations that fail to build are logged and skipped. Any
    /// other error aborts the run.
    pub fn run(&self, out: &mut impl Write) -> Result<Vec<RunReport>> {
        let sorting = self.config.validate()?;
        let test_cases = self.config.parsed_test_cases()?;
        let factories: Vec<Box<dyn IndexStructureFactory>> =
            self.config.indexes.iter().map(IndexConfig::factory).collect();

        let mut reports = Vec::new();
        for source in self.sources() {
            let mut table = source.load()?;
            table.apply_sorting(sorting)?;

            for column in table.columns() {
                let batches = self.lookup_batches(column);
                for &stripe_size in &self.config.stripe_sizes {
                    let column_compressed_byte_size =
                        write_column_size(out, column, stripe_size)?;
                    let evaluator = if test_cases.is_empty() {
                        None
                    } else {
                        Some(Evaluator::new(column, stripe_size, self.config.num_lookups)?)
                    };

                    for factory in &factories {
                        let run = IndexRun {
                            column,
                            stripe_size,
                            column_compressed_byte_size,
                            evaluator: evaluator.as_ref(),
                            test_cases: &test_cases,
                            batches: &batches,
                        };
                        if let Some(report) = self.run_index(factory.as_ref(), run, out)? {
                            reports.push(report);
                        }
                    }
                }
            }
        }
        Ok(reports)
    }

    /// Build one index and measure it. `None` if the configuration cannot
    /// be built.
    fn run_index(
        &self,
        factory: &dyn IndexStructureFactory,
        run: IndexRun<'_>,
        out: &mut impl Write,
    ) -> Result<Option<RunReport>> {
        let IndexRun {
            column,
            stripe_size,
            column_compressed_byte_size,
            evaluator,
            test_cases,
            batches,
        } = run;

        let start = Instant::now();
        let index = match factory.create(column, stripe_size) {
            Ok(index) => index,
            Err(err) if err.is_construction() => {
                warn!(
                    column = column.name(),
                    stripe_size,
                    index = %factory.index_name(),
                    "skipping index configuration: {err}"
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let build_time = start.elapsed();
        info!(
            "Built {} for column {} with stripe size {stripe_size} in {build_time:?}",
            index.name(),
            column.name(),
        );

        let num_stripes = column.num_stripes(stripe_size);
        let mut report = RunReport {
            column: column.name().to_string(),
            stripe_size,
            num_stripes,
            column_compressed_byte_size,
            index: index.name(),
            byte_size: index.byte_size(),
            compressed_byte_size: index.compressed_byte_size()?,
            bitmap_stats: index.bitmap_stats(),
            build_time,
            effectiveness: Vec::new(),
            lookups: Vec::new(),
            segments: Vec::new(),
        };
        writeln!(
            out,
            "{}/{}/{}: {} bytes, {} stripes, built in {:?}, {} bytes compressed",
            report.column,
            report.stripe_size,
            report.index,
            report.byte_size,
            report.num_stripes,
            report.build_time,
            report.compressed_byte_size
        )?;
        if let Some(stats) = &report.bitmap_stats {
            writeln!(out, "  bitmaps: {stats}")?;
        }

        if let Some(evaluator) = evaluator {
            for &test_case in test_cases {
                let effectiveness = evaluator.evaluate(index.as_ref(), test_case)?;
                writeln!(out, "  {effectiveness}")?;
                report.effectiveness.push(effectiveness);
            }
        }

        let benchmark = LookupBenchmark::new(self.config.min_bench_time());
        for (kind, values) in batches {
            let name = kind.series_name(column.name(), stripe_size, &report.index);
            let measurement = benchmark.measure(name, index.as_ref(), values, num_stripes);
            writeln!(out, "  {measurement}")?;
            report.lookups.push(measurement);
        }

        report.segments = self.replay_workload(index.as_ref(), num_stripes, out)?;
        Ok(Some(report))
    }

    fn lookup_batches(&self, column: &Column) -> Vec<(LookupKind, Vec<i64>)> {
        if !self.config.lookup_benchmarks {
            return Vec::new();
        }
        LookupKind::ALL
            .iter()
            .map(|kind| {
                (
                    *kind,
                    kind.batch(column, self.config.lookup_batch_size, LOOKUP_SEED),
                )
            })
            .collect()
    }

    fn replay_workload(
        &self,
        index: &dyn IndexStructure,
        num_stripes: usize,
        out: &mut impl Write,
    ) -> Result<Vec<SegmentStats>> {
        let Some(path) = &self.config.workload else {
            return Ok(Vec::new());
        };
        let reader = BufReader::new(File::open(path)?);

        let mut written = Ok(());
        let segments = WorkloadReplay::new(index, num_stripes).replay_with(reader, |event| {
            if written.is_ok() {
                written = write_event(out, event);
            }
        })?;
        written?;
        Ok(segments)
    }
}

fn write_column_size(
    out: &mut impl Write,
    column: &Column,
    stripe_size: usize,
) -> Result<usize> {
    let compressed = column.compressed_size_bytes(stripe_size)?;
    writeln!(
        out,
        "{}/{}: {} rows, cardinality {}, {} bytes compressed",
        column.name(),
        stripe_size,
        column.num_rows(),
        column.cardinality(),
        compressed
    )?;
    Ok(compressed)
}

/// Labels are echoed verbatim, segments as their mean block count and
/// search time.
fn write_event(out: &mut impl Write, event: ReplayEvent<'_>) -> std::io::Result<()> {
    match event {
        ReplayEvent::Label(label) => writeln!(out, "{label}"),
        ReplayEvent::Segment(segment) => {
            writeln!(out, "avg blk num is:{}", segment.mean_block_count())?;
            writeln!(out, "avg search time is:{}", segment.mean_search_secs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SieveError, index::DEFAULT_BLOOM_FPP};

    fn small_config() -> HarnessConfig {
        HarnessConfig {
            generate_num_values: 2_000,
            num_unique_values: 50,
            stripe_sizes: vec![100, 1_000],
            num_lookups: 20,
            ..Default::default()
        }
    }

    #[test]
    fn sweeps_every_index_and_stripe_size() {
        let config = HarnessConfig {
            test_cases: vec!["positive_distinct".to_string(), "negative".to_string()],
            ..small_config()
        };
        let mut out = Vec::new();
        let reports = Runner::new(config).run(&mut out).unwrap();

        assert_eq!(reports.len(), 6);
        assert_eq!(reports[0].num_stripes, 20);
        assert_eq!(reports[0].index, "ZoneMap");
        assert_eq!(reports[3].stripe_size, 1_000);
        for report in &reports {
            assert_eq!(report.effectiveness.len(), 2);
            assert!(report.lookups.is_empty());
        }
        let exact = &reports[2];
        assert_eq!(exact.index, "PerValueBitmap");
        assert!(exact.effectiveness.iter().all(|e| e.false_positive_stripes == 0));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("uni_2K_val_50_uniq/100/ZoneMap: 320 bytes, 20 stripes"));
        assert!(text.contains(&format!("PerStripeBloom/{DEFAULT_BLOOM_FPP}")));
    }

    #[test]
    fn skips_unbuildable_indexes() {
        let config = HarnessConfig {
            indexes: vec![
                IndexConfig::PerStripeBloom { fpp: 1.5 },
                IndexConfig::ZoneMap,
            ],
            stripe_sizes: vec![100],
            ..small_config()
        };
        let reports = Runner::new(config).run(&mut Vec::new()).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].index, "ZoneMap");
    }

    #[test]
    fn rejects_invalid_sorting_before_work() {
        let config = HarnessConfig {
            sorting: "SIDEWAYS".to_string(),
            ..small_config()
        };
        let mut out = Vec::new();
        let err = Runner::new(config).run(&mut out).unwrap_err();
        assert!(matches!(err, SieveError::InvalidSorting(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn echoes_every_label() {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("trace.txt");
        std::fs::write(&trace, "selectivity=a\nselectivity=b\npoint: 1\n").unwrap();
        let config = HarnessConfig {
            indexes: vec![IndexConfig::PerValueBitmap],
            stripe_sizes: vec![100],
            workload: Some(trace),
            ..small_config()
        };
        let mut out = Vec::new();
        let reports = Runner::new(config).run(&mut out).unwrap();
        assert_eq!(reports[0].segments.len(), 1);

        let text = String::from_utf8(out).unwrap();
        assert!(
            text.contains("selectivity=a\nselectivity=b\navg blk num is:"),
            "{text}"
        );
    }

    #[test]
    fn missing_workload_fails_before_work() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            workload: Some(dir.path().join("missing.txt")),
            ..small_config()
        };
        let mut out = Vec::new();
        let err = Runner::new(config).run(&mut out).unwrap_err();
        assert!(matches!(err, SieveError::InvalidConfig(_)), "{err}");
        assert!(out.is_empty());
    }

    #[test]
    fn reports_sizes_and_bitmap_stats() {
        let config = HarnessConfig {
            stripe_sizes: vec![100],
            ..small_config()
        };
        let mut out = Vec::new();
        let reports = Runner::new(config).run(&mut out).unwrap();
        assert_eq!(reports.len(), 3);
        for report in &reports {
            assert!(report.compressed_byte_size > 0, "{}", report.index);
            assert_eq!(
                report.column_compressed_byte_size,
                reports[0].column_compressed_byte_size
            );
        }
        assert!(reports[0].bitmap_stats.is_none());
        let stats = reports[2].bitmap_stats.unwrap();
        assert_eq!(stats.num_bitmaps, 50);
        assert!(stats.density > 0.0 && stats.density <= 1.0);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("uni_2K_val_50_uniq/100: 2000 rows, cardinality 50, "));
        assert!(text.contains("  bitmaps: density "));
    }

    #[test]
    fn runs_lookup_benchmarks() {
        let config = HarnessConfig {
            indexes: vec![IndexConfig::ZoneMap],
            stripe_sizes: vec![100],
            lookup_benchmarks: true,
            lookup_batch_size: 100,
            min_bench_time_ms: 0,
            ..small_config()
        };
        let reports = Runner::new(config).run(&mut Vec::new()).unwrap();
        let names: Vec<&str> = reports[0].lookups.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "PositiveDistinctLookup/uni_2K_val_50_uniq/100/ZoneMap",
                "NegativeLookup/uni_2K_val_50_uniq/100/ZoneMap",
            ]
        );
    }
}
