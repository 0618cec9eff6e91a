//! Measurement engines run against a built index.
//!
//! - [`lookup`]: batched synthetic point lookups, timed.
//! - [`workload`]: replay of a point/range query trace, grouped into
//!   selectivity segments.
//! - [`evaluate`]: false positive accounting against exact ground truth.

pub mod evaluate;
pub mod lookup;
pub mod workload;

pub use evaluate::{Effectiveness, Evaluator, TestCase};
pub use lookup::{
    DEFAULT_LOOKUP_BATCH_SIZE, LOOKUP_SEED, LookupBenchmark, LookupKind, LookupMeasurement,
    ZIPF_EXPONENT, mixed_batch, negative_batch, positive_distinct_batch, positive_uniform_batch,
    positive_zipf_batch,
};
pub use workload::{
    ReplayEvent, SegmentStats, WorkloadEntry, WorkloadLine, WorkloadReplay,
    range_qualifying_stripes,
};
