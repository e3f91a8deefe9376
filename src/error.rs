//! Error taxonomy for column comparisons.

use thiserror::Error;

/// Errors surfaced by classification, assumption checks, and test execution.
///
/// Every variant is a local-call failure: test selection is deterministic
/// given valid input, so there is no retry or recovery path.
#[derive(Debug, Error)]
pub enum CompareError {
    /// One sample classifies as categorical while its counterpart does not.
    #[error(
        "cannot determine if input columns are categorical or numerical \
         (number of modalities {a} and {b})"
    )]
    ClassificationMismatch {
        /// Distinct-value count of the first sample.
        a: usize,
        /// Distinct-value count of the second sample.
        b: usize,
    },

    /// Two categorical samples share no common modality.
    #[error("the two columns contain different modalities")]
    NoSharedModality,

    /// A sample is too small, empty, or has zero variance for the
    /// requested computation.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// A contingency table cannot support the requested computation.
    #[error("malformed contingency table: {0}")]
    MalformedTable(String),

    /// A caller-supplied alpha or threshold is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CompareError>;
