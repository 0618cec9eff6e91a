use std::collections::HashMap;

use super::{IndexStructure, IndexStructureFactory, check_stripe_size};
use crate::{Bitmap, BitmapStats, Column, Result, compress::compressed_len};

/// Exact value-to-stripes mapping.
///
/// Never reports a false positive, which makes it the ground truth the
/// evaluator checks other structures against. NULL is indexed like any
/// other value.
#[derive(Clone, Debug)]
pub struct PerValueBitmap {
    num_stripes: usize,
    bitmaps: HashMap<i64, Bitmap>,
}

impl PerValueBitmap {
    pub fn new(column: &Column, stripe_size: usize) -> Result<Self> {
        check_stripe_size("PerValueBitmap", stripe_size)?;
        let num_stripes = column.num_stripes(stripe_size);
        let mut bitmaps: HashMap<i64, Bitmap> = HashMap::with_capacity(column.cardinality());
        for (stripe_id, stripe) in column.values().chunks(stripe_size).enumerate() {
            for &value in stripe {
                bitmaps
                    .entry(value)
                    .or_insert_with(|| Bitmap::new(num_stripes))
                    .set(stripe_id, true)?;
            }
        }
        Ok(Self {
            num_stripes,
            bitmaps,
        })
    }

    pub fn num_stripes(&self) -> usize {
        self.num_stripes
    }
}

impl IndexStructure for PerValueBitmap {
    fn name(&self) -> String {
        "PerValueBitmap".to_string()
    }

    fn byte_size(&self) -> usize {
        self.bitmaps
            .values()
            .map(|bitmap| size_of::<i64>() + bitmap.byte_size())
            .sum()
    }

    /// Values in ascending order, each followed by its roaring-encoded
    /// bitmap.
    fn compressed_byte_size(&self) -> Result<usize> {
        let mut entries: Vec<(&i64, &Bitmap)> = self.bitmaps.iter().collect();
        entries.sort_unstable_by_key(|(value, _)| **value);
        let mut data = Vec::new();
        for (value, bitmap) in entries {
            data.extend_from_slice(&value.to_le_bytes());
            bitmap.serialize_into(&mut data)?;
        }
        compressed_len(&data)
    }

    fn bitmap_stats(&self) -> Option<BitmapStats> {
        Some(self.bitmaps.values().collect())
    }

    fn stripe_contains(&self, stripe_id: usize, value: i64) -> bool {
        self.bitmaps
            .get(&value)
            .is_some_and(|bitmap| bitmap.get(stripe_id))
    }

    fn qualifying_stripes(&self, value: i64, num_stripes: usize) -> Bitmap {
        match self.bitmaps.get(&value) {
            Some(bitmap) if bitmap.len() == num_stripes => bitmap.clone(),
            Some(bitmap) => Bitmap::from_fn(num_stripes, |stripe_id| bitmap.get(stripe_id)),
            None => Bitmap::new(num_stripes),
        }
    }
}

pub struct PerValueBitmapFactory;

impl IndexStructureFactory for PerValueBitmapFactory {
    fn create(&self, column: &Column, stripe_size: usize) -> Result<Box<dyn IndexStructure>> {
        Ok(Box::new(PerValueBitmap::new(column, stripe_size)?))
    }

    fn index_name(&self) -> String {
        "PerValueBitmap".to_string()
    }
}
