//! Dense stripe-membership bitmaps.

use std::fmt;

use roaring::RoaringBitmap;

use crate::{Result, SieveError};

const WORD_BITS: usize = 64;

/// Fixed-length bit vector, one bit per stripe.
///
/// All bits start out false. Bits beyond `len` in the last word are always
/// kept clear so word-wise counting stays exact.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    /// Create an all-false bitmap of `len` bits.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Create a bitmap of `len` bits where bit `i` is `f(i)`.
    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> Self {
        let mut bitmap = Self::new(len);
        for position in 0..len {
            if f(position) {
                bitmap.words[position / WORD_BITS] |= 1u64 << (position % WORD_BITS);
            }
        }
        bitmap
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes held by the backing words.
    pub fn byte_size(&self) -> usize {
        self.words.len() * size_of::<u64>()
    }

    /// Read the bit at `position`; positions past the end read as false.
    pub fn get(&self, position: usize) -> bool {
        if position >= self.len {
            return false;
        }
        self.words[position / WORD_BITS] & (1u64 << (position % WORD_BITS)) != 0
    }

    /// Set the bit at `position` to `value`.
    pub fn set(&mut self, position: usize, value: bool) -> Result<()> {
        if position >= self.len {
            return Err(SieveError::OutOfRange {
                position,
                len: self.len,
            });
        }
        let mask = 1u64 << (position % WORD_BITS);
        let word = &mut self.words[position / WORD_BITS];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
        Ok(())
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Ascending positions of all set bits.
    ///
    /// The iterator borrows the bitmap. Calling `true_bit_indices()` again
    /// restarts from the first set bit; a clone resumes where the original
    /// stands.
    pub fn true_bit_indices(&self) -> TrueBitIndices<'_> {
        TrueBitIndices {
            words: &self.words,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Union `other` into `self`.
    ///
    /// A stripe qualifies for a range as soon as it qualifies for any single
    /// value of that range, so range results accumulate with this operation.
    pub fn or_into(&mut self, other: &Bitmap) -> Result<()> {
        self.check_len(other)?;
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word |= *other;
        }
        Ok(())
    }

    /// Bits set in `self` but not in `other`.
    pub fn difference(&self, other: &Bitmap) -> Result<Bitmap> {
        self.check_len(other)?;
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(word, other)| word & !other)
            .collect();
        Ok(Bitmap {
            words,
            len: self.len,
        })
    }

    /// Share of set bits, `0.0` for an empty bitmap.
    pub fn density(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.count_ones() as f64 / self.len as f64
    }

    /// Mean length of the runs of consecutive set bits, `0.0` without any.
    pub fn clustering(&self) -> f64 {
        let mut runs = 0usize;
        let mut previous: Option<usize> = None;
        for position in self.true_bit_indices() {
            if previous.is_none_or(|p| p + 1 != position) {
                runs += 1;
            }
            previous = Some(position);
        }
        if runs == 0 {
            return 0.0;
        }
        self.count_ones() as f64 / runs as f64
    }

    /// Convert to a roaring bitmap
    ///
    /// Returns None when the bitmap is longer than `u32::MAX` bits, which
    /// roaring cannot address.
    pub fn to_roaring(&self) -> Option<RoaringBitmap> {
        if self.len > u32::MAX as usize {
            return None;
        }
        let mut roaring = RoaringBitmap::new();
        for position in self.true_bit_indices() {
            roaring.insert(position as u32);
        }
        Some(roaring)
    }

    /// Append a portable encoding of the set bits to `out`.
    ///
    /// Uses the roaring serialization format, or the raw little-endian words
    /// for bitmaps roaring cannot address.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self.to_roaring() {
            Some(roaring) => roaring.serialize_into(&mut *out)?,
            None => {
                for word in &self.words {
                    out.extend_from_slice(&word.to_le_bytes());
                }
            }
        }
        Ok(())
    }

    fn check_len(&self, other: &Bitmap) -> Result<()> {
        if self.len != other.len {
            return Err(SieveError::LengthMismatch {
                left: self.len,
                right: other.len,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Bitmap {
    /// Bits as `0`/`1`, position 0 first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for position in 0..self.len {
            f.write_str(if self.get(position) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Mean density and clustering over a set of bitmaps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BitmapStats {
    pub num_bitmaps: usize,
    pub density: f64,
    pub clustering: f64,
}

impl BitmapStats {
    /// Fold one more bitmap into the running means.
    pub fn add(&mut self, bitmap: &Bitmap) {
        self.num_bitmaps += 1;
        let n = self.num_bitmaps as f64;
        self.density += (bitmap.density() - self.density) / n;
        self.clustering += (bitmap.clustering() - self.clustering) / n;
    }
}

impl<'a> FromIterator<&'a Bitmap> for BitmapStats {
    fn from_iter<I: IntoIterator<Item = &'a Bitmap>>(iter: I) -> Self {
        let mut stats = BitmapStats::default();
        for bitmap in iter {
            stats.add(bitmap);
        }
        stats
    }
}

impl fmt::Display for BitmapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "density {:.4}, clustering {:.2} over {} bitmaps",
            self.density, self.clustering, self.num_bitmaps
        )
    }
}

/// Iterator over the set positions of a [`Bitmap`].
#[derive(Clone, Debug)]
pub struct TrueBitIndices<'a> {
    words: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl Iterator for TrueBitIndices<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * WORD_BITS + bit);
            }
            self.word_idx += 1;
            self.current = *self.words.get(self.word_idx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(bits: &[u8]) -> Bitmap {
        Bitmap::from_fn(bits.len(), |i| bits[i] == 1)
    }

    #[test]
    fn starts_all_false() {
        let bitmap = Bitmap::new(130);
        assert_eq!(bitmap.len(), 130);
        assert_eq!(bitmap.count_ones(), 0);
        assert_eq!(bitmap.true_bit_indices().count(), 0);
    }

    #[test]
    fn set_and_clear_bits() {
        let mut bitmap = Bitmap::new(100);
        bitmap.set(0, true).unwrap();
        bitmap.set(63, true).unwrap();
        bitmap.set(64, true).unwrap();
        bitmap.set(99, true).unwrap();
        assert_eq!(bitmap.count_ones(), 4);
        assert!(bitmap.get(64));

        bitmap.set(64, false).unwrap();
        assert!(!bitmap.get(64));
        assert_eq!(bitmap.count_ones(), 3);
    }

    #[test]
    fn set_out_of_range_fails() {
        let mut bitmap = Bitmap::new(10);
        let err = bitmap.set(10, true).unwrap_err();
        assert!(matches!(
            err,
            SieveError::OutOfRange {
                position: 10,
                len: 10
            }
        ));
        assert!(!bitmap.get(10));
    }

    #[test]
    fn true_bit_indices_are_ascending_and_restartable() {
        let mut bitmap = Bitmap::new(200);
        for position in [199, 3, 64, 128, 65] {
            bitmap.set(position, true).unwrap();
        }
        let mut iter = bitmap.true_bit_indices();
        assert_eq!(iter.next(), Some(3));
        assert_eq!(iter.clone().collect::<Vec<_>>(), vec![64, 65, 128, 199]);

        let first: Vec<usize> = bitmap.true_bit_indices().collect();
        let second: Vec<usize> = bitmap.true_bit_indices().collect();
        assert_eq!(first, vec![3, 64, 65, 128, 199]);
        assert_eq!(first, second);
    }

    #[test]
    fn or_into_unions_bits() {
        let mut left = bitmap(&[1, 0, 0, 1]);
        let right = bitmap(&[0, 1, 0, 1]);
        left.or_into(&right).unwrap();
        assert_eq!(left.to_string(), "1101");
    }

    #[test]
    fn or_into_rejects_length_mismatch() {
        let mut left = Bitmap::new(4);
        let err = left.or_into(&Bitmap::new(5)).unwrap_err();
        assert!(matches!(err, SieveError::LengthMismatch { left: 4, right: 5 }));
    }

    #[test]
    fn difference_keeps_bits_only_in_self() {
        let diff = bitmap(&[1, 1, 0, 1])
            .difference(&bitmap(&[0, 1, 1, 0]))
            .unwrap();
        assert_eq!(diff.to_string(), "1001");
    }

    #[test]
    fn density() {
        assert_eq!(bitmap(&[0, 0, 0, 0]).density(), 0.0);
        assert_eq!(bitmap(&[0, 0, 0, 1]).density(), 0.25);
        assert_eq!(bitmap(&[0, 0, 1, 1]).density(), 0.5);
        assert_eq!(bitmap(&[1, 1, 1, 1]).density(), 1.0);
        assert_eq!(Bitmap::new(0).density(), 0.0);
    }

    #[test]
    fn clustering() {
        assert_eq!(bitmap(&[0, 0, 0, 0]).clustering(), 0.0);
        assert_eq!(bitmap(&[1, 1, 1, 1]).clustering(), 4.0);
        assert_eq!(bitmap(&[0, 0, 0, 1]).clustering(), 1.0);
        assert_eq!(bitmap(&[0, 0, 1, 1]).clustering(), 2.0);
        assert_eq!(bitmap(&[1, 0, 1, 0]).clustering(), 1.0);
        assert_eq!(bitmap(&[1, 0, 1, 1]).clustering(), 1.5);
    }

    #[test]
    fn stats_average_density_and_clustering() {
        let bitmaps = [bitmap(&[1, 1, 1, 1]), bitmap(&[1, 0, 1, 1])];
        let stats: BitmapStats = bitmaps.iter().collect();
        assert_eq!(stats.num_bitmaps, 2);
        assert_eq!(stats.density, 0.875);
        assert_eq!(stats.clustering, 2.75);
        assert_eq!(
            BitmapStats::default().to_string(),
            "density 0.0000, clustering 0.00 over 0 bitmaps"
        );
    }

    #[test]
    fn serializes_as_roaring() {
        let bitmap = bitmap(&[0, 1, 0, 1]);
        let mut bytes = Vec::new();
        bitmap.serialize_into(&mut bytes).unwrap();
        let roaring = RoaringBitmap::deserialize_from(&bytes[..]).unwrap();
        assert_eq!(roaring.iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn roaring_matches_dense_bits() {
        let bitmap = bitmap(&[0, 1, 0, 1]);
        let roaring = bitmap.to_roaring().expect("fits in u32");
        assert_eq!(roaring.len(), bitmap.count_ones() as u64);
        for position in 0..bitmap.len() {
            assert_eq!(bitmap.get(position), roaring.contains(position as u32));
        }
    }
}
