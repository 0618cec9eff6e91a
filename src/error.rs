use arrow_schema::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised by the harness, the data layer and the index structures.
///
/// Configuration variants are detected before any data is loaded or any
/// index is built, so a run either fails fast or produces complete results.
#[derive(Debug, Error)]
pub enum SieveError {
    /// A bit position beyond the bitmap length was addressed
    #[error("Bit position {position} is out of range for a bitmap of {len} bits")]
    OutOfRange {
        /// Requested position
        position: usize,
        /// Number of bits in the bitmap
        len: usize,
    },

    /// Two bitmaps of different lengths were combined
    #[error("Cannot combine bitmaps of {left} and {right} bits")]
    LengthMismatch {
        /// Length of the receiving bitmap
        left: usize,
        /// Length of the other bitmap
        right: usize,
    },

    /// Sorting mode is not one of `NONE`, `BY_CARDINALITY`, `RANDOM`
    #[error("Invalid sorting method: {0}")]
    InvalidSorting(String),

    /// Index family name could not be resolved to a factory
    #[error("Unknown index structure: {0}")]
    UnknownIndex(String),

    /// Evaluation test case name is not recognized
    #[error("Test case {0} does not exist")]
    UnknownTestCase(String),

    /// Harness configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Requested column is missing from the data source
    #[error("Column '{column_name}' not found in {source_name}")]
    ColumnNotFound {
        /// Name of the missing column
        column_name: String,
        /// Table or file the column was looked up in
        source_name: String,
    },

    /// Columns of one table disagree on their row count
    #[error("Column '{column_name}' has {actual} rows, expected {expected}")]
    RaggedTable {
        /// Offending column
        column_name: String,
        /// Row count of the first column
        expected: usize,
        /// Row count of the offending column
        actual: usize,
    },

    /// An index structure rejected its build parameters
    #[error("Failed to build {index}: {reason}")]
    Construction {
        /// Name of the index configuration
        index: String,
        /// Violated build-time constraint
        reason: String,
    },

    /// An index pruned a stripe that holds the queried value
    #[error("{index} returned a false negative for value {value} in stripe {stripe}")]
    FalseNegative {
        /// Name of the unsound index
        index: String,
        /// Queried value
        value: i64,
        /// Stripe that was wrongly pruned
        stripe: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SieveError {
    /// Whether the error only invalidates a single index configuration.
    pub fn is_construction(&self) -> bool {
        matches!(self, SieveError::Construction { .. })
    }
}
