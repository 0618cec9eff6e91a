use super::{IndexStructure, IndexStructureFactory, check_stripe_size};
use crate::{
    Column, Result,
    compress::{compressed_len, encode_i64s},
};

/// Per-stripe minimum and maximum.
///
/// NULL rows are excluded from the zones, so the NULL sentinel never
/// qualifies a stripe. A stripe holding only NULLs gets an empty zone.
#[derive(Clone, Debug)]
pub struct ZoneMap {
    minimums: Vec<i64>,
    maximums: Vec<i64>,
}

impl ZoneMap {
    pub fn new(column: &Column, stripe_size: usize) -> Result<Self> {
        check_stripe_size("ZoneMap", stripe_size)?;
        let (minimums, maximums): (Vec<i64>, Vec<i64>) = column
            .values()
            .chunks(stripe_size)
            .map(|stripe| {
                stripe
                    .iter()
                    .filter(|&&value| value != Column::NULL_SENTINEL)
                    .fold((i64::MAX, i64::MIN), |(min, max), &value| {
                        (min.min(value), max.max(value))
                    })
            })
            .unzip();
        Ok(Self { minimums, maximums })
    }

    pub fn num_stripes(&self) -> usize {
        self.minimums.len()
    }

    /// `(min, max)` of stripe `stripe_id`.
    fn zone(&self, stripe_id: usize) -> Option<(i64, i64)> {
        Some((
            *self.minimums.get(stripe_id)?,
            *self.maximums.get(stripe_id)?,
        ))
    }
}

impl IndexStructure for ZoneMap {
    fn name(&self) -> String {
        "ZoneMap".to_string()
    }

    fn byte_size(&self) -> usize {
        size_of::<i64>() * (self.minimums.len() + self.maximums.len())
    }

    fn compressed_byte_size(&self) -> Result<usize> {
        let mut data = Vec::with_capacity(self.byte_size());
        encode_i64s(&self.minimums, &mut data);
        encode_i64s(&self.maximums, &mut data);
        compressed_len(&data)
    }

    fn stripe_contains(&self, stripe_id: usize, value: i64) -> bool {
        self.zone(stripe_id)
            .is_some_and(|(min, max)| min <= value && value <= max)
    }
}

pub struct ZoneMapFactory;

impl IndexStructureFactory for ZoneMapFactory {
    fn create(&self, column: &Column, stripe_size: usize) -> Result<Box<dyn IndexStructure>> {
        Ok(Box::new(ZoneMap::new(column, stripe_size)?))
    }

    fn index_name(&self) -> String {
        "ZoneMap".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_contains() {
        let column = Column::new("c", vec![1, 2, 3, 4]);
        let zone_map = ZoneMap::new(&column, 2).unwrap();

        assert!(zone_map.stripe_contains(0, 1));
        assert!(zone_map.stripe_contains(0, 2));
        assert!(zone_map.stripe_contains(1, 3));
        assert!(zone_map.stripe_contains(1, 4));
        assert!(!zone_map.stripe_contains(0, 3));
        assert!(!zone_map.stripe_contains(2, 1));
        assert_eq!(zone_map.byte_size(), 32);
    }

    #[test]
    fn skips_nulls() {
        let null = Column::NULL_SENTINEL;
        let column = Column::new("c", vec![null, 5, null, null]);
        let zone_map = ZoneMap::new(&column, 2).unwrap();
        assert_eq!(zone_map.zone(0), Some((5, 5)));
        assert!(!zone_map.stripe_contains(1, 0));
        assert!(!zone_map.stripe_contains(0, null));
    }

    #[test]
    fn covers_partial_last_stripe() {
        let column = Column::new("c", vec![1, 2, 3, 4, 5]);
        let zone_map = ZoneMap::new(&column, 2).unwrap();
        assert_eq!(zone_map.num_stripes(), 3);
        assert_eq!(zone_map.qualifying_stripes(5, 3).to_string(), "001");
    }

    #[test]
    fn sorted_zones_compress() {
        let column = Column::new("c", (0..10_000).map(|v| v / 100).collect());
        let zone_map = ZoneMap::new(&column, 100).unwrap();
        assert_eq!(zone_map.byte_size(), 1_600);
        let compressed = zone_map.compressed_byte_size().unwrap();
        assert!(compressed > 0 && compressed < zone_map.byte_size(), "{compressed}");
        assert!(zone_map.bitmap_stats().is_none());
    }
}
