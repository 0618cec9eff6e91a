//! The index-structure contract and the reference variants.
//!
//! The harness only ever holds `dyn IndexStructure` values produced by an
//! [`IndexStructureFactory`]; it never looks at the concrete variant.

mod bloom;
mod exact;
mod zone_map;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use bloom::{PerStripeBloom, PerStripeBloomFactory};
pub use exact::{PerValueBitmap, PerValueBitmapFactory};
pub use zone_map::{ZoneMap, ZoneMapFactory};

use crate::{Bitmap, BitmapStats, Column, Result, SieveError};

/// A pruning structure mapping values to the stripes that may hold them.
///
/// Implementations must be sound: for every value present in stripe `s` at
/// build time, `stripe_contains(s, value)` is true. False positives are
/// allowed. A built structure is immutable.
pub trait IndexStructure {
    /// Stable label encoding the structure family and its parameters.
    fn name(&self) -> String;

    /// Resident memory cost of the built structure.
    fn byte_size(&self) -> usize;

    /// Size of the structure's encoding once compressed with zstd.
    fn compressed_byte_size(&self) -> Result<usize>;

    /// Density and clustering of the bitmaps the structure keeps, if any.
    fn bitmap_stats(&self) -> Option<BitmapStats> {
        None
    }

    /// Whether stripe `stripe_id` may contain `value`.
    ///
    /// Stripes the structure was not built for never qualify.
    fn stripe_contains(&self, stripe_id: usize, value: i64) -> bool;

    /// Bitmap of `num_stripes` bits, bit `i` set when stripe `i` may contain
    /// `value`.
    fn qualifying_stripes(&self, value: i64, num_stripes: usize) -> Bitmap {
        Bitmap::from_fn(num_stripes, |stripe_id| {
            self.stripe_contains(stripe_id, value)
        })
    }
}

impl fmt::Debug for dyn IndexStructure + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexStructure")
            .field("name", &self.name())
            .field("byte_size", &self.byte_size())
            .finish()
    }
}

/// Builds one index structure per (column, stripe size).
pub trait IndexStructureFactory {
    /// Build the structure; fails with [`SieveError::Construction`] when the
    /// configured parameters cannot be honored.
    fn create(&self, column: &Column, stripe_size: usize) -> Result<Box<dyn IndexStructure>>;

    /// Name of the structures this factory builds.
    fn index_name(&self) -> String;
}

pub(crate) fn check_stripe_size(index: &str, stripe_size: usize) -> Result<()> {
    if stripe_size == 0 {
        return Err(SieveError::Construction {
            index: index.to_string(),
            reason: "stripe size must be positive".to_string(),
        });
    }
    Ok(())
}

/// Default target false-positive probability of [`PerStripeBloom`].
pub const DEFAULT_BLOOM_FPP: f64 = 0.01;

/// Selects an index family and its parameters.
///
/// Deserializes from `{"family": "per_stripe_bloom", "fpp": 0.01}` and
/// parses from strings such as `zone_map` or `per_stripe_bloom:0.01`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum IndexConfig {
    ZoneMap,
    PerStripeBloom {
        #[serde(default = "default_fpp")]
        fpp: f64,
    },
    PerValueBitmap,
}

fn default_fpp() -> f64 {
    DEFAULT_BLOOM_FPP
}

impl IndexConfig {
    /// The factory building structures of this configuration.
    pub fn factory(&self) -> Box<dyn IndexStructureFactory> {
        match self {
            IndexConfig::ZoneMap => Box::new(ZoneMapFactory),
            IndexConfig::PerStripeBloom { fpp } => Box::new(PerStripeBloomFactory::new(*fpp)),
            IndexConfig::PerValueBitmap => Box::new(PerValueBitmapFactory),
        }
    }

    /// The configurations benchmarked when none are given.
    pub fn defaults() -> Vec<IndexConfig> {
        vec![
            IndexConfig::ZoneMap,
            IndexConfig::PerStripeBloom {
                fpp: DEFAULT_BLOOM_FPP,
            },
            IndexConfig::PerValueBitmap,
        ]
    }
}

impl FromStr for IndexConfig {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self> {
        let (family, param) = match s.split_once(':') {
            Some((family, param)) => (family, Some(param)),
            None => (s, None),
        };
        match (family, param) {
            ("zone_map", None) => Ok(IndexConfig::ZoneMap),
            ("per_value_bitmap", None) => Ok(IndexConfig::PerValueBitmap),
            ("per_stripe_bloom", None) => Ok(IndexConfig::PerStripeBloom {
                fpp: DEFAULT_BLOOM_FPP,
            }),
            ("per_stripe_bloom", Some(param)) => {
                let fpp = param
                    .trim()
                    .parse()
                    .map_err(|_| SieveError::UnknownIndex(s.to_string()))?;
                Ok(IndexConfig::PerStripeBloom { fpp })
            }
            _ => Err(SieveError::UnknownIndex(s.to_string())),
        }
    }
}
