//! Errors reported by caches and predictors.
//!
//! Lookup misses are not errors: they show up as [`None`] from
//! [`crate::cache::HistoryCache::get_entry`] and as a table miss in a
//! [`crate::predictor::DFCMPrediction`].

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// A set must have at least one way.
    #[error("number of ways must be positive")]
    ZeroWays,

    /// Every entry must be able to hold at least one history element.
    #[error("number of sequence accesses must be positive")]
    ZeroSequenceAccesses,

    /// A tag of zero bits cannot disambiguate anything.
    #[error("number of tag bits must be positive")]
    ZeroTagBits,

    /// Index and tag together need more bits than the key provides.
    #[error("{index_bits} index bits + {tag_bits} tag bits exceed a {word_bits}-bit key")]
    KeyWidth {
        index_bits: u32,
        tag_bits: u32,
        word_bits: u32,
    },

    /// The second table cannot index the keys produced by the first table.
    #[error("second table indexes {second_bits}-bit keys but the first table produces {first_bits}-bit keys")]
    IncompatibleTables { first_bits: u32, second_bits: u32 },

    /// The query path was used before the predictor/model was initialized.
    #[error("{0} used before initialization")]
    Uninitialized(&'static str),

    /// Datasets that are supposed to be paired (or rows that are supposed to
    /// share a width) disagree.
    #[error("dataset shape mismatch: expected {expected}, found {found}")]
    DatasetShape { expected: usize, found: usize },

    /// A model hyper-parameter is out of range.
    #[error("invalid model parameter: {0}")]
    InvalidModelParameter(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
