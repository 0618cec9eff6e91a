use std::{fmt, str::FromStr};

use crate::SieveError;

/// Row reordering applied to a whole table before indexing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sorting {
    /// Keep source or generation order
    #[default]
    None,
    /// Lexicographic sort, lowest-cardinality column as the primary key
    ByCardinality,
    /// Seeded uniform permutation
    Random,
}

impl Sorting {
    /// Resolve a sorting name.
    ///
    /// # Example
    /// ```
    /// use sieve::Sorting;
    ///
    /// assert_eq!(Sorting::parse("RANDOM").unwrap(), Sorting::Random);
    /// assert!(Sorting::parse("random").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Self, SieveError> {
        match name {
            "NONE" => Ok(Sorting::None),
            "BY_CARDINALITY" => Ok(Sorting::ByCardinality),
            "RANDOM" => Ok(Sorting::Random),
            other => Err(SieveError::InvalidSorting(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sorting::None => "NONE",
            Sorting::ByCardinality => "BY_CARDINALITY",
            Sorting::Random => "RANDOM",
        }
    }
}

impl FromStr for Sorting {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sorting::parse(s)
    }
}

impl fmt::Display for Sorting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
