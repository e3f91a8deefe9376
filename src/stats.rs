//! Statistical test kernels.
//!
//! Hand-assembled test statistics with p-values taken from `statrs`
//! distribution CDFs: chi-square independence, Fisher's exact test,
//! Student/Welch t-tests, and the Shapiro-Wilk normality test
//! (Royston AS R94 approximation).

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};
use statrs::function::gamma::ln_gamma;

use crate::contingency::ContingencyTable;
use crate::error::{CompareError, Result};

fn dist_err(e: statrs::StatsError) -> CompareError {
    CompareError::DegenerateInput(e.to_string())
}

/// Arithmetic mean. Zero for an empty sample.
pub fn mean(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    sample.iter().sum::<f64>() / sample.len() as f64
}

/// Population variance (divide by n). Zero for an empty sample.
pub fn population_variance(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let m = mean(sample);
    sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / sample.len() as f64
}

/// Sample variance (divide by n-1). Zero for fewer than two observations.
pub fn sample_variance(sample: &[f64]) -> f64 {
    if sample.len() < 2 {
        return 0.0;
    }
    let m = mean(sample);
    sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (sample.len() - 1) as f64
}

/// Two-sided p-value of the chi-square test of independence.
///
/// With `correction`, the Yates continuity correction is applied only when
/// the table has one degree of freedom (2x2), matching the usual default
/// correction mode.
pub fn chi2_pvalue(table: &ContingencyTable, correction: bool) -> Result<f64> {
    let observed = table.counts();
    let expected = table.expected_frequencies()?;

    let df = table.n_rows().saturating_sub(1);
    if df == 0 {
        return Err(CompareError::DegenerateInput(
            "chi-square test needs at least two modalities".to_string(),
        ));
    }
    if expected.iter().flatten().any(|&e| e <= 0.0) {
        return Err(CompareError::MalformedTable(
            "expected frequency is zero".to_string(),
        ));
    }

    let yates = correction && df == 1;
    let mut statistic = 0.0;
    for (obs, exp) in observed.iter().zip(&expected) {
        for j in 0..2 {
            let mut diff = (obs[j] - exp[j]).abs();
            if yates {
                diff = (diff - 0.5).max(0.0);
            }
            statistic += diff * diff / exp[j];
        }
    }

    let dist = ChiSquared::new(df as f64).map_err(dist_err)?;
    Ok((1.0 - dist.cdf(statistic)).clamp(0.0, 1.0))
}

/// Two-sided p-value of Fisher's exact test on a 2x2 table.
///
/// Sums the hypergeometric pmf over all tables at least as extreme as the
/// observed one (pmf no greater than the observed pmf, within a small
/// relative tolerance).
pub fn fisher_exact_pvalue(table: &ContingencyTable) -> Result<f64> {
    if !table.is_2x2() {
        return Err(CompareError::MalformedTable(
            "Fisher's exact test requires a 2x2 table".to_string(),
        ));
    }

    let counts = table.counts();
    let a = integer_count(counts[0][0])?;
    let b = integer_count(counts[0][1])?;
    let c = integer_count(counts[1][0])?;
    let d = integer_count(counts[1][1])?;

    let n = a + b + c + d;
    if n == 0 {
        return Err(CompareError::MalformedTable(
            "grand total is zero".to_string(),
        ));
    }
    let row1 = a + b;
    let col1 = a + c;

    let ln_pmf =
        |x: u64| ln_binomial(row1, x) + ln_binomial(n - row1, col1 - x) - ln_binomial(n, col1);

    let lo = col1.saturating_sub(n - row1);
    let hi = row1.min(col1);

    let cutoff = ln_pmf(a).exp() * (1.0 + 1e-7);
    let mut p = 0.0;
    for x in lo..=hi {
        let pmf = ln_pmf(x).exp();
        if pmf <= cutoff {
            p += pmf;
        }
    }

    Ok(p.min(1.0))
}

fn integer_count(x: f64) -> Result<u64> {
    if x < 0.0 || (x - x.round()).abs() > 1e-9 {
        return Err(CompareError::MalformedTable(format!(
            "cell count {x} is not a nonnegative integer"
        )));
    }
    Ok(x.round() as u64)
}

fn ln_binomial(n: u64, k: u64) -> f64 {
    ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
}

/// Two-sided p-value of the independent two-sample t-test.
///
/// With `equal_var` the pooled-variance Student form is used
/// (df = n1 + n2 - 2); otherwise the Welch form with the
/// Welch-Satterthwaite degrees of freedom.
pub fn students_t_pvalue(sample_a: &[f64], sample_b: &[f64], equal_var: bool) -> Result<f64> {
    if sample_a.len() < 2 || sample_b.len() < 2 {
        return Err(CompareError::DegenerateInput(
            "t-test requires at least two observations per sample".to_string(),
        ));
    }

    let n1 = sample_a.len() as f64;
    let n2 = sample_b.len() as f64;
    let v1 = sample_variance(sample_a);
    let v2 = sample_variance(sample_b);

    let (se_squared, df) = if equal_var {
        let df = n1 + n2 - 2.0;
        let pooled = ((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / df;
        (pooled * (1.0 / n1 + 1.0 / n2), df)
    } else {
        let se_squared = v1 / n1 + v2 / n2;
        let df = if se_squared > 0.0 {
            se_squared * se_squared
                / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0))
        } else {
            0.0
        };
        (se_squared, df)
    };

    if se_squared <= 0.0 || !df.is_finite() || df <= 0.0 {
        return Err(CompareError::DegenerateInput(
            "zero variance in both samples".to_string(),
        ));
    }

    let t = (mean(sample_a) - mean(sample_b)) / se_squared.sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).map_err(dist_err)?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Result of the Shapiro-Wilk normality test.
#[derive(Debug, Clone, Copy)]
pub struct ShapiroWilk {
    /// The W statistic, in (0, 1]. Values near 1 suggest normality.
    pub w: f64,
    /// p-value; small values reject normality.
    pub p_value: f64,
}

/// Shapiro-Wilk normality test via the Royston AS R94 approximation.
///
/// Supports 3..=5000 observations; fails on smaller, larger, non-finite,
/// or constant samples.
pub fn shapiro_wilk(sample: &[f64]) -> Result<ShapiroWilk> {
    let n = sample.len();
    if !(3..=5000).contains(&n) {
        return Err(CompareError::DegenerateInput(format!(
            "Shapiro-Wilk requires 3..=5000 observations, got {n}"
        )));
    }
    if sample.iter().any(|v| !v.is_finite()) {
        return Err(CompareError::DegenerateInput(
            "non-finite value in sample".to_string(),
        ));
    }

    let mut x = sample.to_vec();
    x.sort_by(f64::total_cmp);
    if x[n - 1] - x[0] < 1e-300 {
        return Err(CompareError::DegenerateInput(
            "all values identical".to_string(),
        ));
    }

    if n == 3 {
        return Ok(shapiro_wilk_n3(&x));
    }

    let normal = Normal::new(0.0, 1.0).map_err(dist_err)?;
    let nn2 = n / 2;
    let a = sw_coefficients(&normal, n, nn2)?;
    let w = sw_statistic(&x, &a, n, nn2).min(1.0);
    let p_value = sw_pvalue(&normal, w, n).clamp(0.0, 1.0);

    Ok(ShapiroWilk { w, p_value })
}

// Exact form for n = 3: a = [1/sqrt(2), 0, -1/sqrt(2)] and
// p = 1 - (6/pi) * arccos(sqrt(W)).
fn shapiro_wilk_n3(x: &[f64]) -> ShapiroWilk {
    let m = (x[0] + x[1] + x[2]) / 3.0;
    let ss: f64 = x.iter().map(|&v| (v - m).powi(2)).sum();

    let numerator = std::f64::consts::FRAC_1_SQRT_2 * (x[2] - x[0]);
    let w = ((numerator * numerator) / ss).clamp(0.75, 1.0);
    let p = (1.0 - (6.0 / std::f64::consts::PI) * w.sqrt().acos()).clamp(0.0, 1.0);

    ShapiroWilk { w, p_value: p }
}

// Royston (1995) polynomial coefficients, AS R94.
const SW_C1: [f64; 6] = [0.0, 0.221_157, -0.147_981, -2.071_19, 4.434_685, -2.706_056];
const SW_C2: [f64; 6] = [0.0, 0.042_981, -0.293_762, -1.752_461, 5.682_633, -3.582_633];
const SW_C3: [f64; 4] = [0.544, -0.399_78, 0.025_054, -6.714e-4];
const SW_C4: [f64; 4] = [1.382_2, -0.778_57, 0.062_767, -0.002_032_2];
const SW_C5: [f64; 4] = [-1.586_1, -0.310_82, -0.083_751, 0.003_891_5];
const SW_C6: [f64; 3] = [-0.480_3, -0.082_676, 0.003_030_2];
const SW_G: [f64; 2] = [-2.273, 0.459];

fn sw_poly(c: &[f64], x: f64) -> f64 {
    let mut result = c[c.len() - 1];
    for &coeff in c[..c.len() - 1].iter().rev() {
        result = result * x + coeff;
    }
    result
}

// Coefficients from Blom-approximated expected normal order statistics,
// with Royston's polynomial corrections for the first one or two terms.
fn sw_coefficients(normal: &Normal, n: usize, nn2: usize) -> Result<Vec<f64>> {
    let mut m = vec![0.0; nn2];
    let mut summ2 = 0.0;
    for (i, mi) in m.iter_mut().enumerate() {
        let p = (i as f64 + 1.0 - 0.375) / (n as f64 + 0.25);
        *mi = normal.inverse_cdf(p);
        summ2 += *mi * *mi;
    }
    summ2 *= 2.0;
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();

    let a1 = sw_poly(&SW_C1, rsn) - m[0] / ssumm2;

    let mut a = vec![0.0; nn2];
    let degenerate =
        || CompareError::DegenerateInput("Shapiro-Wilk coefficients undefined".to_string());

    if n <= 5 {
        let fac_sq = summ2 - 2.0 * m[0] * m[0];
        let one_minus = 1.0 - 2.0 * a1 * a1;
        if fac_sq <= 0.0 || one_minus <= 0.0 {
            return Err(degenerate());
        }
        let fac = (fac_sq / one_minus).sqrt();
        a[0] = a1;
        for i in 1..nn2 {
            a[i] = -m[i] / fac;
        }
    } else {
        let a2 = sw_poly(&SW_C2, rsn) - m[1] / ssumm2;
        let fac_sq = summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1];
        let one_minus = 1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2;
        if fac_sq <= 0.0 || one_minus <= 0.0 {
            return Err(degenerate());
        }
        let fac = (fac_sq / one_minus).sqrt();
        a[0] = a1;
        a[1] = a2;
        for i in 2..nn2 {
            a[i] = -m[i] / fac;
        }
    }

    Ok(a)
}

// W = (sum a_i (x_{n+1-i} - x_i))^2 / sum (x_i - mean)^2 over sorted data.
fn sw_statistic(x: &[f64], a: &[f64], n: usize, nn2: usize) -> f64 {
    let mut sa = 0.0;
    for i in 0..nn2 {
        sa += a[i] * (x[n - 1 - i] - x[i]);
    }

    let m = mean(x);
    let ss: f64 = x.iter().map(|&v| (v - m).powi(2)).sum();
    if ss < 1e-300 {
        return 1.0;
    }

    (sa * sa) / ss
}

// Royston's normalizing transformation of W: gamma/log form for n <= 11,
// log-normal form above.
fn sw_pvalue(normal: &Normal, w: f64, n: usize) -> f64 {
    let nf = n as f64;
    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }
    let y = w1.ln();

    if n <= 11 {
        let gamma = sw_poly(&SW_G, nf);
        if y >= gamma {
            return 0.0;
        }
        let y2 = -(gamma - y).ln();
        let m = sw_poly(&SW_C3, nf);
        let s = sw_poly(&SW_C4, nf).exp();
        if s < 1e-300 {
            return 0.0;
        }
        1.0 - normal.cdf((y2 - m) / s)
    } else {
        let xx = nf.ln();
        let m = sw_poly(&SW_C5, xx);
        let s = sw_poly(&SW_C6, xx).exp();
        if s < 1e-300 {
            return 0.0;
        }
        1.0 - normal.cdf((y - m) / s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Modality;

    fn table(rows: &[[f64; 2]]) -> ContingencyTable {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, c)| (Modality::Label(format!("m{i}")), *c))
            .collect();
        ContingencyTable::from_counts(rows).unwrap()
    }

    #[test]
    fn chi2_balanced_table_is_not_significant() {
        let p = chi2_pvalue(&table(&[[12.0, 12.0], [12.0, 12.0]]), false).unwrap();
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn chi2_pvalue_in_unit_interval() {
        let p = chi2_pvalue(&table(&[[10.0, 20.0], [15.0, 25.0]]), false).unwrap();
        assert!(p > 0.0 && p <= 1.0);
    }

    #[test]
    fn chi2_correction_reduces_statistic() {
        let t = table(&[[8.0, 2.0], [3.0, 9.0]]);
        let uncorrected = chi2_pvalue(&t, false).unwrap();
        let corrected = chi2_pvalue(&t, true).unwrap();
        assert!(corrected > uncorrected);
    }

    #[test]
    fn chi2_single_row_fails() {
        let err = chi2_pvalue(&table(&[[5.0, 5.0]]), false).unwrap_err();
        assert!(matches!(err, CompareError::DegenerateInput(_)));
    }

    #[test]
    fn fisher_exact_flat_table() {
        // Every table with these marginals is at least as likely as the
        // observed one, so the two-sided p-value is exactly 1.
        let p = fisher_exact_pvalue(&table(&[[2.0, 1.0], [3.0, 4.0]])).unwrap();
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fisher_exact_detects_association() {
        let p = fisher_exact_pvalue(&table(&[[10.0, 2.0], [1.0, 10.0]])).unwrap();
        assert!(p < 0.05);
    }

    #[test]
    fn fisher_exact_rejects_non_2x2() {
        let err = fisher_exact_pvalue(&table(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])).unwrap_err();
        assert!(matches!(err, CompareError::MalformedTable(_)));
    }

    #[test]
    fn t_test_identical_samples() {
        let s: Vec<f64> = (0..10).map(f64::from).collect();
        let p = students_t_pvalue(&s, &s, true).unwrap();
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn t_test_shifted_samples_significant() {
        let a: Vec<f64> = (0..10).map(f64::from).collect();
        let b: Vec<f64> = (5..15).map(f64::from).collect();
        assert!(students_t_pvalue(&a, &b, true).unwrap() < 0.05);
        assert!(students_t_pvalue(&a, &b, false).unwrap() < 0.05);
    }

    #[test]
    fn t_test_constant_samples_fail() {
        let a = vec![1.0; 10];
        let b = vec![1.0; 10];
        let err = students_t_pvalue(&a, &b, false).unwrap_err();
        assert!(matches!(err, CompareError::DegenerateInput(_)));
    }

    #[test]
    fn shapiro_accepts_symmetric_sample() {
        let data = [-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5];
        let r = shapiro_wilk(&data).unwrap();
        assert!(r.w > 0.9);
        assert!(r.p_value > 0.05);
    }

    #[test]
    fn shapiro_rejects_geometric_sample() {
        let data: Vec<f64> = (0..20).map(|i| f64::from(1 << i)).collect();
        let r = shapiro_wilk(&data).unwrap();
        assert!(r.p_value < 0.05);
    }

    #[test]
    fn shapiro_too_small_fails() {
        assert!(shapiro_wilk(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn shapiro_constant_fails() {
        assert!(shapiro_wilk(&[3.0; 10]).is_err());
    }
}
