//! Fit-bias correction for goodness-of-fit p-values.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Correct a p-value for `n_parameters` fitted against `n_bins` bins.
///
/// The p-value is read as the upper-tail probability of a chi-square variable
/// with `n_bins - n_parameters` degrees of freedom; the corrected value is the
/// upper-tail probability of the same chi-square with `n_bins` degrees of
/// freedom. This is the identity for `n_parameters == 0` and grows with
/// `n_parameters`. With no degrees of freedom left (`n_parameters >= n_bins`)
/// the result is `1`. `NaN` propagates.
pub fn correct_pvalue(pvalue: f64, n_parameters: usize, n_bins: usize) -> f64 {
    if pvalue.is_nan() || n_parameters == 0 {
        return pvalue;
    }
    if n_parameters >= n_bins {
        return 1.0;
    }
    if pvalue <= 0.0 {
        return 0.0;
    }
    if pvalue >= 1.0 {
        return 1.0;
    }

    let (Ok(reduced), Ok(full)) =
        (ChiSquared::new((n_bins - n_parameters) as f64), ChiSquared::new(n_bins as f64))
    else {
        return f64::NAN;
    };
    let chi2 = reduced.inverse_cdf(1.0 - pvalue);
    full.sf(chi2).clamp(pvalue, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_without_parameters() {
        for &p in &[0.0, 1e-6, 0.05, 0.3, 0.5, 0.99, 1.0] {
            for &bins in &[1usize, 5, 100] {
                assert_eq!(correct_pvalue(p, 0, bins), p);
            }
        }
    }

    #[test]
    fn test_increases_with_parameters() {
        let p = 0.2;
        let c1 = correct_pvalue(p, 1, 10);
        let c3 = correct_pvalue(p, 3, 10);
        let c6 = correct_pvalue(p, 6, 10);
        assert!(c1 > p, "c1={c1}");
        assert!(c3 > c1, "c3={c3} c1={c1}");
        assert!(c6 > c3, "c6={c6} c3={c3}");
        assert!(c6 <= 1.0);
    }

    #[test]
    fn test_edges() {
        assert_eq!(correct_pvalue(0.4, 10, 10), 1.0);
        assert_eq!(correct_pvalue(0.4, 12, 10), 1.0);
        assert_eq!(correct_pvalue(0.0, 2, 10), 0.0);
        assert_eq!(correct_pvalue(1.0, 2, 10), 1.0);
        assert!(correct_pvalue(f64::NAN, 2, 10).is_nan());
    }
}
