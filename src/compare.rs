//! Test selection and execution.
//!
//! [`compare_columns`] classifies the two samples, consults the assumption
//! checks, and runs exactly one test: chi-square (with or without the
//! continuity correction), Fisher's exact, or a Student/Welch t-test.
//! [`compare_common_columns`] applies the selector across every column
//! name shared by two datasets.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::assumptions::{test_marginal_sums, test_variances_equality, DEFAULT_ALPHA, DEFAULT_MARGINAL_THRESHOLD};
use crate::classify::{is_categorical, DEFAULT_CATEGORICAL_THRESHOLD};
use crate::contingency::ContingencyTable;
use crate::dataset::{Dataset, Sample};
use crate::error::{CompareError, Result};
use crate::stats::{chi2_pvalue, fisher_exact_pvalue, students_t_pvalue};

/// Which hypothesis test was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Chi2,
    FisherExact,
    Student,
}

impl TestKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Chi2 => "chi2",
            Self::FisherExact => "fisher_exact",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of comparing one column: selected test and its p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnTest {
    pub test: TestKind,
    pub p_value: f64,
}

/// Per-column entry of a batch report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ColumnOutcome {
    /// The column was compared.
    Tested(ColumnTest),
    /// The comparison failed (continue-on-error mode only).
    Failed { error: String },
}

impl ColumnOutcome {
    pub const fn is_tested(&self) -> bool {
        matches!(self, Self::Tested(_))
    }

    pub const fn result(&self) -> Option<ColumnTest> {
        match self {
            Self::Tested(t) => Some(*t),
            Self::Failed { .. } => None,
        }
    }
}

/// Batch failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// First failing column aborts the whole batch.
    #[default]
    Abort,
    /// Failing columns are recorded in the report and the batch continues.
    Record,
}

/// Thresholds and policy for a comparison run.
#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    /// Distinct-value count at or below which a column is categorical.
    pub categorical_threshold: usize,
    /// Significance level for the variance-equality check.
    pub alpha: f64,
    /// Expected-frequency threshold for chi-square validity.
    pub marginal_threshold: f64,
    /// Batch failure policy.
    pub on_error: ErrorPolicy,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            alpha: DEFAULT_ALPHA,
            marginal_threshold: DEFAULT_MARGINAL_THRESHOLD,
            on_error: ErrorPolicy::Abort,
        }
    }
}

/// Report over exactly the shared column names, in sorted order.
pub type Report = BTreeMap<String, ColumnOutcome>;

/// Picks and runs one test for a pair of same-named columns, with default
/// thresholds and no tracing.
pub fn compare_columns(
    sample_a: &Sample,
    sample_b: &Sample,
    categorical_threshold: usize,
) -> Result<ColumnTest> {
    let options = CompareOptions {
        categorical_threshold,
        ..Default::default()
    };
    compare_columns_with(sample_a, sample_b, &options, |_| {})
}

/// Picks and runs one test for a pair of same-named columns.
///
/// `trace` is invoked with the constructed contingency table when the
/// categorical branch is taken; it is informational only.
///
/// Both samples must agree on being categorical: if `sample_a` classifies
/// as categorical and `sample_b` does not, the comparison is meaningless
/// and fails with [`CompareError::ClassificationMismatch`].
pub fn compare_columns_with(
    sample_a: &Sample,
    sample_b: &Sample,
    options: &CompareOptions,
    mut trace: impl FnMut(&ContingencyTable),
) -> Result<ColumnTest> {
    if is_categorical(sample_a, options.categorical_threshold) {
        if !is_categorical(sample_b, options.categorical_threshold) {
            return Err(CompareError::ClassificationMismatch {
                a: sample_a.distinct_count(),
                b: sample_b.distinct_count(),
            });
        }

        let table = ContingencyTable::from_samples(sample_a, sample_b)?;
        trace(&table);

        if test_marginal_sums(&table, options.marginal_threshold)? {
            Ok(ColumnTest {
                test: TestKind::Chi2,
                p_value: chi2_pvalue(&table, false)?,
            })
        } else if table.is_2x2() {
            Ok(ColumnTest {
                test: TestKind::FisherExact,
                p_value: fisher_exact_pvalue(&table)?,
            })
        } else {
            Ok(ColumnTest {
                test: TestKind::Chi2,
                p_value: chi2_pvalue(&table, true)?,
            })
        }
    } else {
        let equal_var = test_variances_equality(sample_a, sample_b, options.alpha)?;
        Ok(ColumnTest {
            test: TestKind::Student,
            p_value: students_t_pvalue(
                sample_a.as_numeric()?,
                sample_b.as_numeric()?,
                equal_var,
            )?,
        })
    }
}

/// Compares every column name present in both datasets, with default
/// thresholds and the abort-on-error policy.
pub fn compare_common_columns(
    dataset_a: &Dataset,
    dataset_b: &Dataset,
    categorical_threshold: usize,
) -> Result<Report> {
    let options = CompareOptions {
        categorical_threshold,
        ..Default::default()
    };
    compare_common_columns_with(dataset_a, dataset_b, &options)
}

/// Compares every column name present in both datasets.
///
/// Columns are visited in sorted name order, so the report is
/// deterministic. Under [`ErrorPolicy::Abort`] the first failing column
/// propagates its error; under [`ErrorPolicy::Record`] the failure is
/// stored in place of that column's result and the batch continues.
pub fn compare_common_columns_with(
    dataset_a: &Dataset,
    dataset_b: &Dataset,
    options: &CompareOptions,
) -> Result<Report> {
    let mut report = Report::new();
    for (name, column_a) in dataset_a.columns() {
        let Some(column_b) = dataset_b.get(name) else {
            continue;
        };
        let outcome = match compare_columns_with(column_a, column_b, options, |_| {}) {
            Ok(result) => ColumnOutcome::Tested(result),
            Err(e) => match options.on_error {
                ErrorPolicy::Abort => return Err(e),
                ErrorPolicy::Record => ColumnOutcome::Failed {
                    error: e.to_string(),
                },
            },
        };
        report.insert(name.to_string(), outcome);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(values: &[&str]) -> Sample {
        Sample::Categorical(values.iter().map(ToString::to_string).collect())
    }

    fn repeated(pairs: &[(&str, usize)]) -> Sample {
        let mut v = Vec::new();
        for (label, count) in pairs {
            v.extend(std::iter::repeat_with(|| (*label).to_string()).take(*count));
        }
        Sample::Categorical(v)
    }

    #[test]
    fn valid_marginals_select_uncorrected_chi2() {
        let a = repeated(&[("a", 12), ("b", 12)]);
        let b = repeated(&[("a", 12), ("b", 12)]);
        let result = compare_columns(&a, &b, 5).unwrap();
        assert_eq!(result.test, TestKind::Chi2);
        assert!((result.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn small_binary_table_selects_fisher_exact() {
        let a = labels(&["a", "a", "b", "b", "b"]);
        let b = labels(&["a", "b", "b", "b", "b"]);
        let result = compare_columns(&a, &b, 5).unwrap();
        assert_eq!(result.test, TestKind::FisherExact);
        assert!((result.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn small_wide_table_selects_corrected_chi2() {
        let a = labels(&["a", "a", "b", "c"]);
        let b = labels(&["a", "b", "b", "c"]);
        let result = compare_columns(&a, &b, 5).unwrap();
        assert_eq!(result.test, TestKind::Chi2);
        assert!(result.p_value > 0.0 && result.p_value <= 1.0);
    }

    #[test]
    fn numeric_columns_select_student() {
        let a = Sample::Numeric((0..30).map(f64::from).collect());
        let b = Sample::Numeric((0..30).map(f64::from).collect());
        let result = compare_columns(&a, &b, 5).unwrap();
        assert_eq!(result.test, TestKind::Student);
        assert!((result.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_classification_fails() {
        let a = repeated(&[("x", 10), ("y", 10), ("z", 10)]);
        let b = Sample::Numeric((0..50).map(f64::from).collect());
        let err = compare_columns(&a, &b, 5).unwrap_err();
        let CompareError::ClassificationMismatch { a: ca, b: cb } = err else {
            panic!("expected a classification mismatch, got {err}");
        };
        assert_eq!((ca, cb), (3, 50));
    }

    #[test]
    fn disjoint_categorical_columns_fail() {
        let a = labels(&["x", "y", "x"]);
        let b = labels(&["p", "q", "p"]);
        let err = compare_columns(&a, &b, 5).unwrap_err();
        assert!(matches!(err, CompareError::NoSharedModality));
    }

    #[test]
    fn trace_sees_the_contingency_table() {
        let a = labels(&["a", "a", "b", "b", "b"]);
        let b = labels(&["a", "b", "b", "b", "b"]);
        let mut seen = Vec::new();
        compare_columns_with(&a, &b, &CompareOptions::default(), |t| {
            seen.push(t.counts());
        })
        .unwrap();
        assert_eq!(seen, vec![vec![[2.0, 1.0], [3.0, 4.0]]]);
    }

    #[test]
    fn trace_not_invoked_on_numeric_branch() {
        let a = Sample::Numeric((0..30).map(f64::from).collect());
        let b = Sample::Numeric((0..30).map(f64::from).collect());
        let mut calls = 0;
        compare_columns_with(&a, &b, &CompareOptions::default(), |_| calls += 1).unwrap();
        assert_eq!(calls, 0);
    }

    fn demo_datasets() -> (Dataset, Dataset) {
        let a = Dataset::from_columns(vec![
            ("bin".to_string(), repeated(&[("a", 10), ("b", 10)])),
            ("cat".to_string(), repeated(&[("a", 7), ("b", 7), ("c", 6)])),
            ("num".to_string(), Sample::Numeric((0..20).map(f64::from).collect())),
        ])
        .unwrap();
        let b = Dataset::from_columns(vec![
            ("bin".to_string(), repeated(&[("a", 12), ("b", 8)])),
            ("cat".to_string(), repeated(&[("a", 6), ("b", 8), ("c", 6)])),
            ("num".to_string(), Sample::Numeric((0..20).map(f64::from).collect())),
            ("extra".to_string(), Sample::Numeric((0..20).map(f64::from).collect())),
        ])
        .unwrap();
        (a, b)
    }

    #[test]
    fn batch_covers_exactly_the_shared_columns() {
        let (a, b) = demo_datasets();
        let report = compare_common_columns(&a, &b, 5).unwrap();

        let keys: Vec<&str> = report.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["bin", "cat", "num"]);
        for outcome in report.values() {
            let result = outcome.result().expect("tested");
            assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    #[test]
    fn batch_aborts_on_first_failure_by_default() {
        let a = Dataset::from_columns(vec![(
            "bad".to_string(),
            repeated(&[("x", 10), ("y", 10)]),
        )])
        .unwrap();
        let b = Dataset::from_columns(vec![(
            "bad".to_string(),
            Sample::Numeric((0..20).map(f64::from).collect()),
        )])
        .unwrap();
        let err = compare_common_columns(&a, &b, 5).unwrap_err();
        assert!(matches!(err, CompareError::ClassificationMismatch { .. }));
    }

    #[test]
    fn batch_records_failures_in_continue_mode() {
        let a = Dataset::from_columns(vec![
            ("bad".to_string(), repeated(&[("x", 10), ("y", 10)])),
            ("num".to_string(), Sample::Numeric((0..20).map(f64::from).collect())),
        ])
        .unwrap();
        let b = Dataset::from_columns(vec![
            ("bad".to_string(), Sample::Numeric((0..20).map(f64::from).collect())),
            ("num".to_string(), Sample::Numeric((0..20).map(f64::from).collect())),
        ])
        .unwrap();

        let options = CompareOptions {
            on_error: ErrorPolicy::Record,
            ..Default::default()
        };
        let report = compare_common_columns_with(&a, &b, &options).unwrap();

        assert!(!report["bad"].is_tested());
        assert!(report["num"].is_tested());
    }

    #[test]
    fn report_serializes_with_test_names() {
        let (a, b) = demo_datasets();
        let report = compare_common_columns(&a, &b, 5).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["num"]["status"], "tested");
        assert_eq!(json["num"]["test"], "student");
    }
}
