//! Contingency tables for categorical comparisons.

use std::collections::BTreeSet;
use std::fmt;

use crate::dataset::{Modality, Sample};
use crate::error::{CompareError, Result};

/// Cross-tabulation of modality counts across two samples.
///
/// Rows are the union of modalities appearing in either sample, sorted by
/// value; the two columns are sample A and sample B. A modality missing
/// from one sample counts 0.0 on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable {
    rows: Vec<(Modality, [f64; 2])>,
}

impl ContingencyTable {
    /// Builds the table from two samples.
    ///
    /// Fails with [`CompareError::NoSharedModality`] when the samples have
    /// no modality in common.
    pub fn from_samples(sample_a: &Sample, sample_b: &Sample) -> Result<Self> {
        let counts_a = sample_a.modality_counts();
        let counts_b = sample_b.modality_counts();

        if !counts_a.keys().any(|m| counts_b.contains_key(m)) {
            return Err(CompareError::NoSharedModality);
        }

        let modalities: BTreeSet<Modality> =
            counts_a.keys().chain(counts_b.keys()).cloned().collect();

        let rows = modalities
            .into_iter()
            .map(|m| {
                let a = counts_a.get(&m).copied().unwrap_or(0.0);
                let b = counts_b.get(&m).copied().unwrap_or(0.0);
                (m, [a, b])
            })
            .collect();

        Ok(Self { rows })
    }

    /// Builds a table from already-tabulated rows.
    ///
    /// For callers holding pre-counted data; rows are sorted by modality.
    pub fn from_counts(rows: Vec<(Modality, [f64; 2])>) -> Result<Self> {
        if rows.is_empty() {
            return Err(CompareError::MalformedTable("no rows".to_string()));
        }
        if rows.iter().any(|(_, c)| c[0] < 0.0 || c[1] < 0.0) {
            return Err(CompareError::MalformedTable(
                "negative cell count".to_string(),
            ));
        }
        let mut rows = rows;
        rows.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(Self { rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// True for a 2x2 table (binary modality).
    pub fn is_2x2(&self) -> bool {
        self.rows.len() == 2
    }

    /// Rows in sorted modality order.
    pub fn rows(&self) -> impl Iterator<Item = (&Modality, &[f64; 2])> {
        self.rows.iter().map(|(m, c)| (m, c))
    }

    /// Per-row totals.
    pub fn row_sums(&self) -> Vec<f64> {
        self.rows.iter().map(|(_, c)| c[0] + c[1]).collect()
    }

    /// Per-sample totals.
    pub fn column_sums(&self) -> [f64; 2] {
        let mut sums = [0.0, 0.0];
        for (_, c) in &self.rows {
            sums[0] += c[0];
            sums[1] += c[1];
        }
        sums
    }

    pub fn grand_total(&self) -> f64 {
        let [a, b] = self.column_sums();
        a + b
    }

    /// Expected cell frequencies under the independence assumption,
    /// `row_total * column_total / grand_total` per cell.
    pub fn expected_frequencies(&self) -> Result<Vec<[f64; 2]>> {
        let total = self.grand_total();
        if total <= 0.0 {
            return Err(CompareError::MalformedTable(
                "grand total is zero".to_string(),
            ));
        }
        let col_sums = self.column_sums();
        Ok(self
            .row_sums()
            .iter()
            .map(|&row_sum| {
                [
                    row_sum * col_sums[0] / total,
                    row_sum * col_sums[1] / total,
                ]
            })
            .collect())
    }

    /// Observed counts as plain rows, for the test kernels.
    pub fn counts(&self) -> Vec<[f64; 2]> {
        self.rows.iter().map(|(_, c)| *c).collect()
    }
}

impl fmt::Display for ContingencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>8} {:>8}", "modality", "a", "b")?;
        for (m, c) in &self.rows {
            writeln!(f, "{:>12} {:>8} {:>8}", m.to_string(), c[0], c[1])?;
        }
        Ok(())
    }
}
