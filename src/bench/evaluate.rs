//! Pruning effectiveness against exact ground truth.

use std::fmt;

use tracing::debug;

use super::lookup::{
    LOOKUP_SEED, mixed_batch, negative_batch, positive_distinct_batch, positive_uniform_batch,
    positive_zipf_batch,
};
use crate::{
    BitmapStats, Column, Result, SieveError,
    index::{IndexStructure, PerValueBitmap},
};

/// A family of lookup values to query an index with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TestCase {
    /// Values at uniformly drawn row offsets.
    PositiveUniform,
    /// Values drawn uniformly from the distinct values.
    PositiveDistinct,
    /// Distinct values with Zipf-skewed popularity.
    PositiveZipf,
    /// Values absent from the column.
    Negative,
    /// Positive distinct with the given probability, negative otherwise.
    Mixed(f64),
}

impl TestCase {
    /// Parse a test case name; `mixed` expands to hit rates `0.0, 0.1, .., 1.0`.
    pub fn parse(name: &str) -> Result<Vec<TestCase>> {
        match name {
            "positive_uniform" => Ok(vec![TestCase::PositiveUniform]),
            "positive_distinct" => Ok(vec![TestCase::PositiveDistinct]),
            "positive_zipf" => Ok(vec![TestCase::PositiveZipf]),
            "negative" => Ok(vec![TestCase::Negative]),
            "mixed" => Ok((0..=10)
                .map(|tenths| TestCase::Mixed(f64::from(tenths) / 10.0))
                .collect()),
            _ => Err(SieveError::UnknownTestCase(name.to_string())),
        }
    }

    pub fn lookup_values(&self, column: &Column, num_lookups: usize) -> Vec<i64> {
        match *self {
            TestCase::PositiveUniform => positive_uniform_batch(column, num_lookups, LOOKUP_SEED),
            TestCase::PositiveDistinct => {
                positive_distinct_batch(column, num_lookups, LOOKUP_SEED)
            }
            TestCase::PositiveZipf => positive_zipf_batch(column, num_lookups, LOOKUP_SEED),
            TestCase::Negative => negative_batch(column, num_lookups, LOOKUP_SEED),
            TestCase::Mixed(hit_rate) => mixed_batch(column, num_lookups, hit_rate, LOOKUP_SEED),
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestCase::PositiveUniform => f.write_str("positive_uniform"),
            TestCase::PositiveDistinct => f.write_str("positive_distinct"),
            TestCase::PositiveZipf => f.write_str("positive_zipf"),
            TestCase::Negative => f.write_str("negative"),
            TestCase::Mixed(hit_rate) => write!(f, "mixed/{hit_rate:.1}"),
        }
    }
}

/// Stripe counts accumulated over every lookup of one test case.
#[derive(Clone, Debug, PartialEq)]
pub struct Effectiveness {
    pub test_case: TestCase,
    pub num_lookups: usize,
    pub num_stripes: usize,
    /// Stripes the index kept although they do not hold the value.
    pub false_positive_stripes: usize,
    /// Stripes that do not hold the value.
    pub true_negative_stripes: usize,
    /// Density and clustering of the bitmaps the index answered with.
    pub result_stats: BitmapStats,
}

impl Effectiveness {
    /// Share of true negative stripes the index failed to prune.
    pub fn false_positive_rate(&self) -> f64 {
        if self.true_negative_stripes == 0 {
            return 0.0;
        }
        self.false_positive_stripes as f64 / self.true_negative_stripes as f64
    }

    /// Mean number of stripes a lookup has to scan.
    pub fn scanned_stripes_per_lookup(&self) -> f64 {
        if self.num_lookups == 0 {
            return 0.0;
        }
        let checked = self.num_lookups * self.num_stripes;
        let true_positives = checked - self.true_negative_stripes;
        (true_positives + self.false_positive_stripes) as f64 / self.num_lookups as f64
    }
}

impl fmt::Display for Effectiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: false positive rate {:.4} ({} / {} stripes), {:.2} stripes scanned per lookup, \
             result {}",
            self.test_case,
            self.false_positive_rate(),
            self.false_positive_stripes,
            self.true_negative_stripes,
            self.scanned_stripes_per_lookup(),
            self.result_stats
        )
    }
}

/// Probes every stripe of a column for each lookup value and compares the
/// index answer with the exact one.
pub struct Evaluator<'a> {
    column: &'a Column,
    num_lookups: usize,
    num_stripes: usize,
    truth: PerValueBitmap,
}

impl<'a> Evaluator<'a> {
    pub fn new(column: &'a Column, stripe_size: usize, num_lookups: usize) -> Result<Self> {
        Ok(Self {
            column,
            num_lookups,
            num_stripes: column.num_stripes(stripe_size),
            truth: PerValueBitmap::new(column, stripe_size)?,
        })
    }

    pub fn num_stripes(&self) -> usize {
        self.num_stripes
    }

    /// Fails with [`SieveError::FalseNegative`] on the first stripe the
    /// index pruned although it holds the value.
    pub fn evaluate(&self, index: &dyn IndexStructure, test_case: TestCase) -> Result<Effectiveness> {
        let values = test_case.lookup_values(self.column, self.num_lookups);
        let mut effectiveness = Effectiveness {
            test_case,
            num_lookups: values.len(),
            num_stripes: self.num_stripes,
            false_positive_stripes: 0,
            true_negative_stripes: 0,
            result_stats: BitmapStats::default(),
        };

        for value in values {
            let expected = self.truth.qualifying_stripes(value, self.num_stripes);
            let actual = index.qualifying_stripes(value, self.num_stripes);
            if let Some(stripe) = expected.difference(&actual)?.true_bit_indices().next() {
                return Err(SieveError::FalseNegative {
                    index: index.name(),
                    value,
                    stripe,
                });
            }
            effectiveness.true_negative_stripes += self.num_stripes - expected.count_ones();
            effectiveness.false_positive_stripes += actual.difference(&expected)?.count_ones();
            effectiveness.result_stats.add(&actual);
        }

        debug!(
            index = %index.name(),
            test_case = %test_case,
            false_positives = effectiveness.false_positive_stripes,
            "evaluated"
        );
        Ok(effectiveness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ZoneMap;

    /// Claims every value lives in stripe 0 only.
    struct FirstStripeOnly;

    impl IndexStructure for FirstStripeOnly {
        fn name(&self) -> String {
            "FirstStripeOnly".to_string()
        }

        fn byte_size(&self) -> usize {
            0
        }

        fn compressed_byte_size(&self) -> Result<usize> {
            Ok(0)
        }

        fn stripe_contains(&self, stripe_id: usize, _value: i64) -> bool {
            stripe_id == 0
        }
    }

    #[test]
    fn parses_test_cases() {
        assert_eq!(
            TestCase::parse("negative").unwrap(),
            vec![TestCase::Negative]
        );
        let mixed = TestCase::parse("mixed").unwrap();
        assert_eq!(mixed.len(), 11);
        assert_eq!(mixed[0].to_string(), "mixed/0.0");
        assert_eq!(mixed[3].to_string(), "mixed/0.3");
        assert_eq!(mixed[10].to_string(), "mixed/1.0");
        assert_eq!(
            TestCase::parse("positive_zipf").unwrap()[0].to_string(),
            "positive_zipf"
        );
        let err = TestCase::parse("positive_pareto").unwrap_err();
        assert_eq!(err.to_string(), "Test case positive_pareto does not exist");
    }

    #[test]
    fn exact_index_has_no_false_positives() {
        let column = Column::new("c", (0..100).map(|v| v % 7).collect());
        let evaluator = Evaluator::new(&column, 10, 200).unwrap();
        let truth = PerValueBitmap::new(&column, 10).unwrap();
        for test_case in [
            TestCase::PositiveUniform,
            TestCase::PositiveDistinct,
            TestCase::PositiveZipf,
            TestCase::Negative,
        ] {
            let result = evaluator.evaluate(&truth, test_case).unwrap();
            assert_eq!(result.num_lookups, 200);
            assert_eq!(result.false_positive_stripes, 0);
            assert_eq!(result.result_stats.num_bitmaps, 200);
        }
    }

    #[test]
    fn counts_zone_map_false_positives() {
        // stripes [0, 10], [0, 10]: every absent value inside the zone is a false positive
        let column = Column::new("c", vec![0, 10, 0, 10]);
        let evaluator = Evaluator::new(&column, 2, 50).unwrap();
        let zone_map = ZoneMap::new(&column, 2).unwrap();

        let negative = evaluator.evaluate(&zone_map, TestCase::Negative).unwrap();
        assert_eq!(negative.true_negative_stripes, 100);
        assert!(negative.false_positive_stripes <= 100);

        let positive = evaluator
            .evaluate(&zone_map, TestCase::PositiveDistinct)
            .unwrap();
        assert_eq!(positive.false_positive_stripes, 0);
        assert_eq!(positive.scanned_stripes_per_lookup(), 2.0);
        assert_eq!(positive.result_stats.density, 1.0);
        assert_eq!(positive.result_stats.clustering, 2.0);
    }

    #[test]
    fn reports_false_negatives() {
        let column = Column::new("c", vec![1, 2, 3, 4]);
        let evaluator = Evaluator::new(&column, 1, 10).unwrap();
        let err = evaluator
            .evaluate(&FirstStripeOnly, TestCase::PositiveDistinct)
            .unwrap_err();
        match err {
            SieveError::FalseNegative { index, value, stripe } => {
                assert_eq!(index, "FirstStripeOnly");
                assert_eq!(stripe as i64, value - 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn false_positive_rate() {
        let effectiveness = Effectiveness {
            test_case: TestCase::Negative,
            num_lookups: 4,
            num_stripes: 5,
            false_positive_stripes: 5,
            true_negative_stripes: 20,
            result_stats: BitmapStats::default(),
        };
        assert_eq!(effectiveness.false_positive_rate(), 0.25);
        assert_eq!(effectiveness.scanned_stripes_per_lookup(), 1.25);
    }
}
