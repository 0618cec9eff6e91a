//! Tables, columns and the machinery controlling their cardinality and
//! locality.

mod column;
mod csv;
mod generate;
mod sorting;
mod table;

pub use column::Column;
pub use csv::load_csv;
pub use generate::{GENERATOR_SEED, generate_uniform};
pub use sorting::Sorting;
pub use table::{SHUFFLE_SEED, Table};
