//! Error type of this crate.

use super::histogram_set::HistogramKind;
use itertools::Itertools;
use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An error that originates in this crate.
    #[error("{0}")]
    General(String),
    /// Returned when a string does not name one of the histogram kinds.
    #[error("unknown histogram kind `{0}`, must be either mc, data or sf")]
    UnknownKind(String),
    /// Returned when an operation needs histogram kinds that were never inputted.
    #[error("{} not inputted", .0.iter().join(", "))]
    MissingKind(Vec<HistogramKind>),
    /// Returned when a working point has no entry in the score lookup table.
    #[error("working point `{0}` has no score")]
    MissingScore(String),
    /// Returned when two histograms that must share their binning do not.
    #[error("incompatible binning: {0}")]
    IncompatibleBinning(String),
    /// Returned when bin limits can not be constructed.
    #[error(transparent)]
    Binning(#[from] super::bin::BinLimitsError),
    /// Returned when a formula can not be parsed.
    #[error("invalid formula: {0}")]
    Formula(String),
    /// Error while reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
