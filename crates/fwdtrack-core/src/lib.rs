//! # fwdtrack-core
//!
//! This is an internal crate used by `fwdtrack`. It holds the data model for forward-track
//! tables, the readers for ROOT and Parquet inputs, histogram containers, best-match selection,
//! efficiency/purity accumulation and the matching-$`\chi^2`$ threshold scan.
#![warn(clippy::perf, clippy::style)]
#![allow(clippy::excessive_precision)]

use thiserror::Error;

/// Top-level batch orchestration of the distribution and efficiency stages.
pub mod analysis;
/// Analysis configuration and its YAML loader.
pub mod config;
/// Methods for loading and holding the track, truth-label and MFT tables.
pub mod data;
/// Per-type distributions of raw track columns.
pub mod distributions;
/// Efficiency and purity histogram accumulation.
pub mod efficiency;
/// Candidate collection and best-match selection.
pub mod matching;
/// The matching-$`\chi^2`$ threshold scan.
pub mod optimize;
/// Serialization of analysis results to disk.
pub mod output;
/// Binomial confidence intervals and derived efficiency curves.
pub mod stats;
/// Utility functions, enums, and histogram containers
pub mod utils;

pub use crate::analysis::{run_analysis, AnalysisReport};
pub use crate::config::AnalysisConfig;
pub use crate::data::{ForwardDataset, McLabelTable, MftTable, TrackRecord, TrackTable};
pub use crate::efficiency::{EffPurityHists, EffPurityHists2D, EfficiencyHistograms, MatchCounts};
pub use crate::matching::{collect_match_candidates, select_best_matches, MatchCandidate};
pub use crate::optimize::{ThresholdScan, ThresholdScanResult};
pub use crate::stats::{clopper_pearson, EfficiencyCurve, EfficiencyMap};
pub use crate::utils::enums::{TrackColumn, TrackType};
pub use crate::utils::variables::{is_in_acceptance, TrackVariable, ETA_MAX, ETA_MIN};
pub use crate::utils::{Binning, Histogram1D, Histogram2D};

pub type FwdTrackResult<T> = Result<T, FwdTrackError>;

/// The error type used by all `fwdtrack` internal methods
#[derive(Error, Debug)]
pub enum FwdTrackError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`parquet::errors::ParquetError`].
    #[error("Parquet Error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),
    /// An alias for [`arrow::error::ArrowError`].
    #[error("Arrow Error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// An alias for [`serde_json::Error`].
    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// An alias for [`serde_yaml::Error`].
    #[error("YAML Error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    /// A column required by the reader is absent from the input table.
    #[error("Missing column \"{name}\"")]
    MissingColumn {
        /// Name of the column which failed lookup
        name: String,
    },
    /// A table (ROOT tree or Parquet file) required by an analysis stage is absent.
    #[error("Missing table \"{name}\"")]
    MissingTable {
        /// Name of the table which failed lookup
        name: String,
    },
    /// Two columns or tables which are joined by row index have different lengths.
    #[error("{context}: expected {expected} rows, found {actual}")]
    LengthMismatch {
        /// Description of what was being compared
        context: String,
        /// Expected number of rows
        expected: usize,
        /// Actual number of rows
        actual: usize,
    },
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// A column holding values that cannot be represented in its table (nulls, or integers out
    /// of range for the column type).
    #[error("Invalid values in column \"{name}\": {reason}")]
    InvalidColumn {
        /// Name of the column
        name: String,
        /// What was wrong with it
        reason: String,
    },
    /// A histogram axis definition which cannot be binned.
    #[error("Invalid binning for \"{name}\": {reason}")]
    InvalidBinning {
        /// Name of the variable or histogram
        name: String,
        /// What was wrong with it
        reason: String,
    },
    /// A variable pair referenced a variable that has no binning configured.
    #[error("No binning configured for variable \"{name}\"")]
    UnknownVariable {
        /// Name of the variable which failed lookup
        name: String,
    },
    /// An error raised while computing a statistical interval.
    #[error("Statistics error: {0}")]
    Statistics(String),
    /// An error raised by a plotting backend.
    #[error("Plot error: {0}")]
    Plot(String),
    /// A custom fallback error for errors too complex or too infrequent to warrant their own error
    /// category.
    #[error("{0}")]
    Custom(String),
}

impl Clone for FwdTrackError {
    // error sources are rarely cloneable, so clones only keep the message
    fn clone(&self) -> Self {
        let err_string = self.to_string();
        FwdTrackError::Custom(err_string)
    }
}
