use std::sync::Arc;

use arrow::{
    array::{ArrayRef, UInt64Array},
    compute::{SortColumn, lexsort_to_indices},
};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::info;

use super::{Column, Sorting};
use crate::{Result, SieveError};

/// Seed shared by every randomized reordering.
pub const SHUFFLE_SEED: u64 = 42;

/// Columns sharing one row count and one row order.
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    /// Create a table, rejecting columns whose row counts differ.
    pub fn try_new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.num_rows();
            for column in &columns {
                if column.num_rows() != expected {
                    return Err(SieveError::RaggedTable {
                        column_name: column.name().to_string(),
                        expected,
                        actual: column.num_rows(),
                    });
                }
            }
        }
        Ok(Self {
            name: name.into(),
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|column| column.name() == name)
            .ok_or_else(|| SieveError::ColumnNotFound {
                column_name: name.to_string(),
                source_name: format!("table '{}'", self.name),
            })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::num_rows)
    }

    /// Apply one row permutation to every column.
    pub fn reorder(&mut self, indices: &UInt64Array) -> Result<()> {
        for column in &mut self.columns {
            column.reorder(indices)?;
        }
        Ok(())
    }

    /// Sort rows lexicographically, lowest-cardinality column first.
    ///
    /// Every column takes part in the key, so rows comparing equal are
    /// identical tuples and the order among them is unobservable.
    pub fn sort_by_cardinality(&mut self) -> Result<()> {
        if self.columns.is_empty() {
            return Ok(());
        }
        let mut key_order: Vec<usize> = (0..self.columns.len()).collect();
        key_order.sort_by_key(|&idx| self.columns[idx].cardinality());

        let sort_columns: Vec<SortColumn> = key_order
            .iter()
            .map(|&idx| SortColumn {
                values: Arc::new(self.columns[idx].array().clone()) as ArrayRef,
                options: None,
            })
            .collect();
        let indices = lexsort_to_indices(&sort_columns, None)?;
        let indices: Vec<u64> = indices.values().iter().map(|&i| i as u64).collect();
        self.reorder(&UInt64Array::from(indices))
    }

    /// Uniformly permute the rows with a fixed seed.
    pub fn shuffle(&mut self) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
        let mut permutation: Vec<u64> = (0..self.num_rows() as u64).collect();
        permutation.shuffle(&mut rng);
        self.reorder(&UInt64Array::from(permutation))
    }

    pub fn apply_sorting(&mut self, sorting: Sorting) -> Result<()> {
        match sorting {
            Sorting::None => Ok(()),
            Sorting::ByCardinality => {
                info!("Sorting the table according to column cardinality...");
                self.sort_by_cardinality()
            }
            Sorting::Random => {
                info!("Randomly shuffling the table...");
                self.shuffle()
            }
        }
    }

    /// Rows as comma-separated lines, one per row.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        for row in 0..self.num_rows() {
            let line: Vec<String> = self
                .columns
                .iter()
                .map(|column| column.values()[row].to_string())
                .collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }
}
