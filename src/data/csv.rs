//! Loading integer columns from CSV files.
//!
//! Integer columns are read as is, other numeric columns are cast to `i64`
//! and string columns are dictionary coded by the rank of each string among
//! the column's sorted distinct strings, so codes keep the string order.
//! Empty cells become [`Column::NULL_SENTINEL`].

use std::{collections::BTreeMap, fs::File, path::Path, sync::Arc};

use arrow::{
    array::{Array, AsArray},
    csv::{ReaderBuilder, reader::Format},
};
use arrow_schema::{DataType, Schema};
use tracing::{debug, info};

use super::{Column, Table, column::sentinel_values};
use crate::{Result, SieveError};

/// Rows sampled for schema inference.
const INFER_SCHEMA_RECORDS: usize = 1000;

enum Accumulator {
    Ints(Vec<i64>),
    Strings(Vec<Option<String>>),
}

impl Accumulator {
    fn for_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Utf8 => Accumulator::Strings(Vec::new()),
            _ => Accumulator::Ints(Vec::new()),
        }
    }

    fn push(&mut self, array: &dyn Array) -> Result<()> {
        match self {
            Accumulator::Ints(values) => values.extend(sentinel_values(array)?),
            Accumulator::Strings(values) => {
                let strings = array.as_string::<i32>();
                values.extend(strings.iter().map(|value| value.map(str::to_string)));
            }
        }
        Ok(())
    }

    fn finish(self, name: &str) -> Column {
        match self {
            Accumulator::Ints(values) => Column::new(name, values),
            Accumulator::Strings(values) => Column::new(name, dictionary_encode(&values)),
        }
    }
}

fn dictionary_encode(values: &[Option<String>]) -> Vec<i64> {
    let mut codes: BTreeMap<&str, i64> = values
        .iter()
        .flatten()
        .map(|value| (value.as_str(), 0))
        .collect();
    for (rank, code) in codes.values_mut().enumerate() {
        *code = rank as i64;
    }
    values
        .iter()
        .map(|value| match value {
            Some(value) => codes[value.as_str()],
            None => Column::NULL_SENTINEL,
        })
        .collect()
}

/// Load `columns` (by header name) from the CSV file at `path`.
pub fn load_csv(path: impl AsRef<Path>, columns: &[String]) -> Result<Table> {
    let path = path.as_ref();
    info!("Loading data from file {}...", path.display());

    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(File::open(path)?, Some(INFER_SCHEMA_RECORDS))?;

    let mut projection = Vec::with_capacity(columns.len());
    let mut accumulators = Vec::with_capacity(columns.len());
    for name in columns {
        let idx = inferred
            .index_of(name)
            .map_err(|_| SieveError::ColumnNotFound {
                column_name: name.clone(),
                source_name: path.display().to_string(),
            })?;
        let field = inferred.field(idx);
        debug!(column = %name, data_type = %field.data_type(), "csv column");
        projection.push(idx);
        accumulators.push(Accumulator::for_type(field.data_type()));
    }

    let schema: Arc<Schema> = Arc::new(inferred);
    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_projection(projection)
        .build(File::open(path)?)?;

    for batch in reader {
        let batch = batch?;
        for (accumulator, array) in accumulators.iter_mut().zip(batch.columns()) {
            accumulator.push(array.as_ref())?;
        }
    }

    let columns = columns
        .iter()
        .zip(accumulators)
        .map(|(name, accumulator)| accumulator.finish(name))
        .collect();
    let table_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Table::try_new(table_name, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_codes_follow_string_order() {
        let values = vec![
            Some("US".to_string()),
            Some("CH".to_string()),
            None,
            Some("US".to_string()),
            Some("DE".to_string()),
        ];
        assert_eq!(
            dictionary_encode(&values),
            vec![2, 0, Column::NULL_SENTINEL, 2, 1]
        );
    }
}
