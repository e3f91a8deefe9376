//! tabdrift: automatic hypothesis-test selection for column-wise
//! comparison of tabular datasets.
//!
//! Given two datasets with a shared schema (a "before" and "after"
//! snapshot, or a treatment/control pair), picks and runs the appropriate
//! statistical test per shared column: chi-square or Fisher's exact for
//! categorical columns, Student/Welch t-test for numeric ones.

pub mod assumptions;
pub mod classify;
pub mod compare;
pub mod contingency;
pub mod dataset;
pub mod error;
pub mod stats;
