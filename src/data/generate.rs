use std::collections::HashSet;

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Column, Table};
use crate::{Result, SieveError};

/// Seed of the synthetic data generator.
pub const GENERATOR_SEED: u64 = 42;

/// Generate a single-column table of `num_rows` values drawn uniformly from
/// `num_unique` distinct codes.
///
/// Every code appears at least once so the cardinality is exact; the
/// remaining rows are uniform draws and the result is shuffled to avoid
/// skew. Codes never collide with [`Column::NULL_SENTINEL`].
pub fn generate_uniform(num_rows: usize, num_unique: usize) -> Result<Table> {
    if num_unique > num_rows {
        return Err(SieveError::InvalidConfig(format!(
            "cannot draw {num_unique} unique values into {num_rows} rows"
        )));
    }
    if num_unique == 0 && num_rows > 0 {
        return Err(SieveError::InvalidConfig(
            "at least one unique value is required".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(GENERATOR_SEED);

    let mut seen = HashSet::with_capacity(num_unique);
    let mut unique_values = Vec::with_capacity(num_unique);
    while unique_values.len() < num_unique {
        let value = rng.gen_range(i64::MIN..=i64::MAX);
        if value != Column::NULL_SENTINEL && seen.insert(value) {
            unique_values.push(value);
        }
    }

    let mut values = Vec::with_capacity(num_rows);
    values.extend_from_slice(&unique_values);
    while values.len() < num_rows {
        values.push(unique_values[rng.gen_range(0..unique_values.len())]);
    }
    values.shuffle(&mut rng);

    let name = format!("uni_{}K_val_{}_uniq", num_rows / 1000, num_unique);
    Table::try_new("", vec![Column::new(name, values)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_requested_cardinality() {
        let table = generate_uniform(10_000, 100).unwrap();
        let column = &table.columns()[0];
        assert_eq!(column.name(), "uni_10K_val_100_uniq");
        assert_eq!(column.num_rows(), 10_000);
        assert_eq!(column.cardinality(), 100);
        assert!(!column.contains(Column::NULL_SENTINEL));
    }

    #[test]
    fn is_reproducible() {
        let first = generate_uniform(1_000, 10).unwrap();
        let second = generate_uniform(1_000, 10).unwrap();
        assert_eq!(first.columns()[0].values(), second.columns()[0].values());
    }

    #[test]
    fn all_unique() {
        let table = generate_uniform(500, 500).unwrap();
        assert_eq!(table.columns()[0].cardinality(), 500);
    }

    #[test]
    fn rejects_impossible_cardinality() {
        assert!(matches!(
            generate_uniform(10, 11),
            Err(SieveError::InvalidConfig(_))
        ));
        assert!(matches!(
            generate_uniform(10, 0),
            Err(SieveError::InvalidConfig(_))
        ));
        assert_eq!(generate_uniform(0, 0).unwrap().num_rows(), 0);
    }
}
