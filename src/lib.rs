//! Evaluation harness for stripe-pruning index structures.
//!
//! A [`Column`] of `i64` values is cut into fixed-size stripes. An index
//! structure answers, for a value, which stripes may hold it: never a false
//! negative, false positives allowed. The harness measures how much memory
//! a structure takes, how many stripes it fails to prune and how fast it
//! answers, on synthetic or CSV data and on synthetic or traced queries.
//!
//! ```
//! use sieve::{
//!     Column,
//!     index::{IndexConfig, IndexStructure},
//! };
//!
//! let column = Column::new("c", (0..100).map(|v| v % 3 + 1).collect());
//! let index = IndexConfig::ZoneMap.factory().create(&column, 10).unwrap();
//! let stripes = index.qualifying_stripes(2, column.num_stripes(10));
//! assert_eq!(stripes.count_ones(), 10);
//! ```

pub mod bench;
pub mod bitmap;
mod compress;
pub mod config;
pub mod data;
mod error;
pub mod index;
pub mod runner;

pub use bitmap::{Bitmap, BitmapStats};
pub use config::{DatasetConfig, HarnessConfig};
pub use data::{Column, Sorting, Table};
pub use error::SieveError;
pub use runner::{RunReport, Runner};

pub type Result<T, E = SieveError> = std::result::Result<T, E>;
