//! Column classification.
//!
//! A column counts as categorical when it stores labels, or when it stores
//! numbers but takes few distinct values (a 0/1 flag, a 1-4 rating). The
//! heuristic is deliberately size-based rather than type-based.

use std::collections::BTreeSet;

use crate::dataset::{Dataset, Sample};

/// Default number of modalities at or below which a column is treated as
/// categorical.
pub const DEFAULT_CATEGORICAL_THRESHOLD: usize = 5;

/// Returns true if the sample should be treated as categorical.
///
/// True when the storage is non-numeric, or when the number of distinct
/// values is at most `threshold`. An empty sample has 0 distinct values
/// and is categorical by convention.
pub fn is_categorical(sample: &Sample, threshold: usize) -> bool {
    match sample {
        Sample::Categorical(_) => true,
        Sample::Numeric(_) => sample.distinct_count() <= threshold,
    }
}

/// Finds the categorical columns of a dataset, by the same two criteria,
/// returned in sorted order.
pub fn find_categorical(dataset: &Dataset, threshold: usize) -> BTreeSet<String> {
    dataset
        .columns()
        .filter(|(_, sample)| is_categorical(sample, threshold))
        .map(|(name, _)| name.to_string())
        .collect()
}
