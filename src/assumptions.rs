//! Assumption checks gating which test variant is legitimate.

use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::contingency::ContingencyTable;
use crate::dataset::Sample;
use crate::error::{CompareError, Result};
use crate::stats::{population_variance, shapiro_wilk};

/// Default significance level for the assumption checks.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Default expected-frequency threshold for chi-square validity.
pub const DEFAULT_MARGINAL_THRESHOLD: f64 = 5.0;

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(CompareError::InvalidParameter(format!(
            "alpha must be in (0, 1), got {alpha}"
        )))
    }
}

/// Returns true when the sample is compatible with a normal distribution
/// (Shapiro-Wilk p-value above `alpha`).
///
/// Not consulted by the test selector; offered as a building block for
/// callers.
pub fn test_normality(sample: &Sample, alpha: f64) -> Result<bool> {
    check_alpha(alpha)?;
    let values = sample.as_numeric()?;
    Ok(shapiro_wilk(values)?.p_value > alpha)
}

/// Returns true when the two samples' variances are considered equal.
///
/// The ratio of population variances (larger over smaller, so always >= 1)
/// is compared against the F quantile at cumulative probability `alpha / 2`
/// with (len_a - 1, len_b - 2) degrees of freedom. Both the lower-tail
/// quantile and the asymmetric degrees of freedom are long-standing
/// behavior and are kept as-is; with the default alpha the check answers
/// "unequal" for essentially any input.
pub fn test_variances_equality(sample_a: &Sample, sample_b: &Sample, alpha: f64) -> Result<bool> {
    check_alpha(alpha)?;
    let a = sample_a.as_numeric()?;
    let b = sample_b.as_numeric()?;

    if a.is_empty() || b.is_empty() {
        return Err(CompareError::DegenerateInput(
            "empty sample has no variance".to_string(),
        ));
    }
    let var_a = population_variance(a);
    let var_b = population_variance(b);
    if var_a <= 0.0 || var_b <= 0.0 {
        return Err(CompareError::DegenerateInput(
            "zero variance sample".to_string(),
        ));
    }

    if a.len() < 2 || b.len() < 3 {
        return Err(CompareError::DegenerateInput(format!(
            "too few observations for the F critical value ({} and {})",
            a.len(),
            b.len()
        )));
    }
    let d1 = (a.len() - 1) as f64;
    let d2 = (b.len() - 2) as f64;

    let ratio = (var_a / var_b).max(var_b / var_a);
    let f = FisherSnedecor::new(d1, d2)
        .map_err(|e| CompareError::DegenerateInput(e.to_string()))?;
    Ok(ratio < f.inverse_cdf(alpha / 2.0))
}

/// Returns true when every expected cell frequency of the table exceeds
/// `threshold`, the usual rule of thumb for chi-square validity.
pub fn test_marginal_sums(table: &ContingencyTable, threshold: f64) -> Result<bool> {
    let expected = table.expected_frequencies()?;
    Ok(expected.iter().flatten().all(|&e| e > threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Modality;

    fn numeric(values: Vec<f64>) -> Sample {
        Sample::Numeric(values)
    }

    // 0/1 alternation: variance close to 0.25 for any length.
    fn alternating(n: usize) -> Sample {
        numeric((0..n).map(|i| f64::from(u8::from(i % 2 == 0))).collect())
    }

    #[test]
    fn marginal_sums_reject_small_expected_frequencies() {
        let a = Sample::Categorical(vec!["a", "a", "b", "b", "b"].iter().map(ToString::to_string).collect());
        let b = Sample::Categorical(vec!["a", "b", "b", "b", "b"].iter().map(ToString::to_string).collect());
        let table = ContingencyTable::from_samples(&a, &b).unwrap();
        assert!(!test_marginal_sums(&table, DEFAULT_MARGINAL_THRESHOLD).unwrap());
    }

    #[test]
    fn marginal_sums_accept_large_balanced_table() {
        let table = ContingencyTable::from_counts(vec![
            (Modality::Label("a".into()), [12.0, 12.0]),
            (Modality::Label("b".into()), [12.0, 12.0]),
        ])
        .unwrap();
        assert!(test_marginal_sums(&table, DEFAULT_MARGINAL_THRESHOLD).unwrap());
    }

    #[test]
    fn variance_equality_says_unequal_at_default_alpha() {
        // The lower-tail quantile at alpha/2 sits below 1 while the ratio
        // is at least 1, so the check answers false.
        let a = alternating(20);
        let b = alternating(20);
        assert!(!test_variances_equality(&a, &b, DEFAULT_ALPHA).unwrap());
    }

    #[test]
    fn variance_equality_is_asymmetric_in_sample_order() {
        // Same variance ratio, swapped degrees of freedom, different
        // answers at a permissive alpha: (30, 2) dof has its quantile
        // above 1, (3, 29) dof below it.
        let big = alternating(31);
        let small = alternating(4);
        assert!(test_variances_equality(&big, &small, 0.99).unwrap());
        assert!(!test_variances_equality(&small, &big, 0.99).unwrap());
    }

    #[test]
    fn variance_equality_rejects_zero_variance() {
        let a = numeric(vec![1.0; 10]);
        let b = alternating(10);
        let err = test_variances_equality(&a, &b, DEFAULT_ALPHA).unwrap_err();
        assert!(matches!(err, CompareError::DegenerateInput(_)));
    }

    #[test]
    fn variance_equality_rejects_empty_sample() {
        let a = numeric(Vec::new());
        let b = alternating(10);
        assert!(test_variances_equality(&a, &b, DEFAULT_ALPHA).is_err());
    }

    #[test]
    fn variance_equality_validates_alpha() {
        let a = alternating(10);
        let err = test_variances_equality(&a, &a, 1.5).unwrap_err();
        assert!(matches!(err, CompareError::InvalidParameter(_)));
    }

    #[test]
    fn normality_accepts_symmetric_sample() {
        let s = numeric(vec![-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5]);
        assert!(test_normality(&s, DEFAULT_ALPHA).unwrap());
    }

    #[test]
    fn normality_rejects_geometric_sample() {
        let s = numeric((0..20).map(|i| f64::from(1 << i)).collect());
        assert!(!test_normality(&s, DEFAULT_ALPHA).unwrap());
    }

    #[test]
    fn normality_fails_on_tiny_sample() {
        let s = numeric(vec![1.0, 2.0]);
        assert!(test_normality(&s, DEFAULT_ALPHA).is_err());
    }
}
