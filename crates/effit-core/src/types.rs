//! Common data types for effit

use serde::{Deserialize, Serialize};

/// Efficiency estimate for one bin: central value and interval bounds.
///
/// `Default` is all zeros, the value reported for bins without trials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyEstimate {
    /// Central value.
    pub central: f64,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl EfficiencyEstimate {
    /// Interval width `upper - lower`.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Distance from the central value down to the lower bound.
    pub fn error_low(&self) -> f64 {
        self.central - self.lower
    }

    /// Distance from the central value up to the upper bound.
    pub fn error_high(&self) -> f64 {
        self.upper - self.central
    }
}

/// Goodness-of-fit p-value and its fit-bias corrected counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PValueResult {
    /// Fraction of toy datasets less likely than the observed one.
    pub pvalue: f64,
    /// P-value corrected for the number of fitted parameters.
    pub corrected_pvalue: f64,
}

/// Summary of an efficiency fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyFitResult {
    /// Parameter names.
    pub parameter_names: Vec<String>,
    /// Best-fit (posterior mode) parameter values.
    pub parameters: Vec<f64>,
    /// Marginal posterior means.
    pub posterior_mean: Vec<f64>,
    /// Marginal posterior standard deviations.
    pub posterior_std: Vec<f64>,
    /// Split R-hat per parameter (`NaN` if not computable).
    pub r_hat: Vec<f64>,
    /// Log-likelihood at the best-fit point.
    pub log_likelihood: f64,
    /// Fast MCMC p-value.
    pub pvalue: f64,
    /// P-value corrected for fitted parameters.
    pub corrected_pvalue: f64,
    /// Number of bins.
    pub n_bins: usize,
    /// Number of fitted parameters.
    pub n_parameters: usize,
    /// Whether the mode refinement converged.
    pub converged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_errors() {
        let e = EfficiencyEstimate { central: 0.5, lower: 0.4, upper: 0.7 };
        assert!((e.width() - 0.3).abs() < 1e-12);
        assert!((e.error_low() - 0.1).abs() < 1e-12);
        assert!((e.error_high() - 0.2).abs() < 1e-12);
        assert_eq!(EfficiencyEstimate::default(), EfficiencyEstimate { central: 0.0, lower: 0.0, upper: 0.0 });
    }

    #[test]
    fn test_fit_result_serializes() {
        let r = EfficiencyFitResult {
            parameter_names: vec!["eff".to_string()],
            parameters: vec![0.5],
            posterior_mean: vec![0.5],
            posterior_std: vec![0.01],
            r_hat: vec![1.0],
            log_likelihood: -12.5,
            pvalue: 0.6,
            corrected_pvalue: 0.7,
            n_bins: 10,
            n_parameters: 1,
            converged: true,
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: EfficiencyFitResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parameters, r.parameters);
        assert_eq!(back.n_bins, 10);
        assert_eq!(back.n_parameters, 1);
    }
}
