use std::collections::HashSet;

use arrow::{
    array::{Array, AsArray, Int64Array, UInt64Array},
    compute::{cast, take},
    datatypes::Int64Type,
};
use arrow_schema::DataType;

use crate::{
    Result,
    compress::{compressed_len, encode_i64s},
};

/// A named column of `i64` values.
///
/// Row `r` belongs to stripe `r / stripe_size`; stripes are never
/// materialized, they are derived from the stripe size on every call.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    values: Int64Array,
    distinct: HashSet<i64>,
}

impl Column {
    /// Sentinel standing in for NULL.
    pub const NULL_SENTINEL: i64 = i64::MIN;

    pub fn new(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self::from_int64(name.into(), Int64Array::from(values))
    }

    fn from_int64(name: String, values: Int64Array) -> Self {
        let distinct = values.values().iter().copied().collect();
        Self {
            name,
            values,
            distinct,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_rows(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[i64] {
        self.values.values()
    }

    pub fn array(&self) -> &Int64Array {
        &self.values
    }

    pub fn value_at(&self, row: usize) -> Option<i64> {
        self.values().get(row).copied()
    }

    /// Whether any row holds `value`, the NULL sentinel included.
    pub fn contains(&self, value: i64) -> bool {
        self.distinct.contains(&value)
    }

    /// Distinct values in ascending order, the NULL sentinel included.
    pub fn distinct_values(&self) -> Vec<i64> {
        let mut values: Vec<i64> = self.distinct.iter().copied().collect();
        values.sort_unstable();
        values
    }

    pub fn cardinality(&self) -> usize {
        self.distinct.len()
    }

    /// Number of stripes covering every row, the last one possibly partial.
    pub fn num_stripes(&self, stripe_size: usize) -> usize {
        if stripe_size == 0 {
            return 0;
        }
        self.num_rows().div_ceil(stripe_size)
    }

    /// Rows of stripe `stripe_id`; empty past the last stripe.
    pub fn stripe(&self, stripe_size: usize, stripe_id: usize) -> &[i64] {
        let values = self.values();
        let begin = stripe_size.saturating_mul(stripe_id).min(values.len());
        let end = begin.saturating_add(stripe_size).min(values.len());
        &values[begin..end]
    }

    /// Ground truth: does stripe `stripe_id` hold `value`?
    pub fn stripe_contains(&self, stripe_size: usize, stripe_id: usize, value: i64) -> bool {
        self.stripe(stripe_size, stripe_id).contains(&value)
    }

    /// Sum of the zstd-compressed sizes of every stripe, each compressed on
    /// its own.
    pub fn compressed_size_bytes(&self, stripe_size: usize) -> Result<usize> {
        if stripe_size == 0 {
            return Ok(0);
        }
        let mut data = Vec::with_capacity(stripe_size.min(self.num_rows()) * size_of::<i64>());
        let mut total = 0;
        for stripe in self.values().chunks(stripe_size) {
            data.clear();
            encode_i64s(stripe, &mut data);
            total += compressed_len(&data)?;
        }
        Ok(total)
    }

    /// Rearrange rows so that row `i` becomes the former row `indices[i]`.
    pub fn reorder(&mut self, indices: &UInt64Array) -> Result<()> {
        let taken = take(&self.values, indices, None)?;
        self.values = taken.as_primitive::<Int64Type>().clone();
        Ok(())
    }
}

/// Cast `array` to `i64`, replacing nulls with [`Column::NULL_SENTINEL`].
///
/// Values the cast cannot represent become nulls first.
pub(crate) fn sentinel_values(array: &dyn Array) -> Result<Vec<i64>> {
    let casted = cast(array, &DataType::Int64)?;
    Ok(casted
        .as_primitive::<Int64Type>()
        .iter()
        .map(|value| value.unwrap_or(Column::NULL_SENTINEL))
        .collect())
}
