//! Plot-ready outputs: per-bin data points, best-fit curve, posterior error band.

use effit_core::{EfficiencyEstimate, Error, Result};
use serde::{Deserialize, Serialize};

use crate::chain::SamplerResult;
use crate::fitter::EfficiencyFitter;
use crate::interval::credible_interval;

/// Efficiency estimate of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    /// Bin centre.
    pub x: f64,
    /// Half the bin width.
    pub x_error: f64,
    /// Central value and interval.
    pub estimate: EfficiencyEstimate,
}

/// Model sampled on an even grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitCurve {
    /// Grid points.
    pub x: Vec<f64>,
    /// `f(x)` at each grid point.
    pub y: Vec<f64>,
}

/// Posterior quantiles of the model on an even grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBand {
    /// Grid points.
    pub x: Vec<f64>,
    /// Lower quantile at each grid point.
    pub y_low: Vec<f64>,
    /// Upper quantile at each grid point.
    pub y_high: Vec<f64>,
}

impl EfficiencyFitter {
    /// One point per bin with the configured interval policy; empty bins give zeros.
    pub fn data_points(&self, confidence_level: f64) -> Result<Vec<EfficiencyPoint>> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(Error::Validation(format!(
                "confidence level must be in (0, 1), got {confidence_level}"
            )));
        }
        let data = self.require_data()?;
        let policy = self.config.interval_policy;

        Ok(data
            .bins()
            .iter()
            .map(|bin| EfficiencyPoint {
                x: bin.center(),
                x_error: 0.5 * bin.width(),
                estimate: credible_interval(bin.n, bin.k, confidence_level, policy).unwrap_or_default(),
            })
            .collect())
    }

    /// `f(x; params)` on `n_points` points spanning the histogram range.
    pub fn fit_curve(&self, params: &[f64], n_points: usize) -> Result<FitCurve> {
        let x = self.grid(n_points)?;
        let mut model = self.require_model()?.clone();
        model.set_parameters(params);
        let y = x.iter().map(|&xi| model.eval(xi)).collect();
        Ok(FitCurve { x, y })
    }

    /// Per grid point, the `q_low` and `q_high` quantiles of `f(x; draw)`
    /// over every posterior draw in `samples`.
    pub fn error_band(
        &self,
        samples: &SamplerResult,
        q_low: f64,
        q_high: f64,
        n_points: usize,
    ) -> Result<ErrorBand> {
        if !((0.0..=1.0).contains(&q_low) && (0.0..=1.0).contains(&q_high) && q_low < q_high) {
            return Err(Error::Validation(format!(
                "band quantiles must satisfy 0 <= low < high <= 1, got ({q_low}, {q_high})"
            )));
        }
        if samples.total_draws() == 0 {
            return Err(Error::Validation("no posterior draws for the error band".to_string()));
        }
        let x = self.grid(n_points)?;
        let mut model = self.require_model()?.clone();

        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(samples.total_draws()); x.len()];
        for draw in samples.draws() {
            model.set_parameters(draw);
            for (column, &xi) in values.iter_mut().zip(&x) {
                column.push(model.eval(xi));
            }
        }

        let mut y_low = Vec::with_capacity(x.len());
        let mut y_high = Vec::with_capacity(x.len());
        for mut column in values {
            column.sort_by(f64::total_cmp);
            y_low.push(quantile_linear_sorted(&column, q_low));
            y_high.push(quantile_linear_sorted(&column, q_high));
        }

        Ok(ErrorBand { x, y_low, y_high })
    }

    fn grid(&self, n_points: usize) -> Result<Vec<f64>> {
        if n_points < 2 {
            return Err(Error::Validation(format!("need at least 2 grid points, got {n_points}")));
        }
        let data = self.require_data()?;
        let (lo, hi) = (data.x_min(), data.x_max());
        let step = (hi - lo) / (n_points - 1) as f64;
        Ok((0..n_points).map(|i| if i + 1 == n_points { hi } else { lo + i as f64 * step }).collect())
    }
}

/// Quantile of sorted data with linear interpolation between order statistics.
pub fn quantile_linear_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let j = pos.ceil() as usize;
    let t = pos - i as f64;
    (1.0 - t) * sorted[i] + t * sorted[j]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::config::FitterConfig;
    use crate::interval::IntervalPolicy;
    use crate::model::{ModelFunction, ParameterSpec};
    use approx::assert_relative_eq;
    use effit_core::Histogram;

    fn fitter(policy: IntervalPolicy) -> EfficiencyFitter {
        let total = Histogram::uniform("total", 0.0, 4.0, vec![50.0, 0.0, 40.0, 10.0]).unwrap();
        let passed = Histogram::uniform("passed", 0.0, 4.0, vec![25.0, 0.0, 30.0, 10.0]).unwrap();
        let model = ModelFunction::new(
            "slope",
            vec![ParameterSpec::new("a", 0.0, 1.0), ParameterSpec::new("b", -1.0, 1.0).with_init(0.0)],
            |x, p| p[0] + p[1] * x,
        )
        .unwrap();
        let config = FitterConfig { interval_policy: policy, ..Default::default() };
        EfficiencyFitter::with_data(&total, &passed, model, config).unwrap()
    }

    #[test]
    fn test_quantile_linear_sorted() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_linear_sorted(&v, 0.0), 1.0);
        assert_eq!(quantile_linear_sorted(&v, 0.5), 3.0);
        assert_eq!(quantile_linear_sorted(&v, 1.0), 5.0);
        assert_relative_eq!(quantile_linear_sorted(&v, 0.1), 1.4, epsilon = 1e-12);
        assert!(quantile_linear_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_data_points() {
        let points = fitter(IntervalPolicy::SmallestInterval).data_points(0.68).unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].x, 0.5);
        assert_eq!(points[0].x_error, 0.5);
        assert_eq!(points[0].estimate.central, 0.5);
        assert_eq!(points[1].estimate, EfficiencyEstimate::default());
        assert_eq!(points[3].estimate.central, 1.0);
        assert!(points[2].estimate.lower < 0.75 && 0.75 < points[2].estimate.upper);

        assert!(fitter(IntervalPolicy::MeanRms).data_points(1.0).is_err());
    }

    #[test]
    fn test_fit_curve_grid() {
        let curve = fitter(IntervalPolicy::default()).fit_curve(&[0.2, 0.1], 5).unwrap();
        assert_eq!(curve.x, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        for (x, y) in curve.x.iter().zip(&curve.y) {
            assert_relative_eq!(*y, 0.2 + 0.1 * x, epsilon = 1e-12);
        }
        assert!(fitter(IntervalPolicy::default()).fit_curve(&[0.2, 0.1], 1).is_err());
    }

    #[test]
    fn test_error_band_brackets_draws() {
        let draws: Vec<Vec<f64>> = (0..101).map(|i| vec![0.3 + 0.001 * (i as f64 - 50.0), 0.0]).collect();
        let samples = SamplerResult {
            chains: vec![Chain {
                log_densities: vec![0.0; draws.len()],
                draws,
                acceptance_rate: 0.3,
                proposal_scales: vec![0.01, 0.01],
            }],
            param_names: vec!["a".to_string(), "b".to_string()],
            n_warmup: 0,
            n_samples: 101,
        };
        let f = fitter(IntervalPolicy::default());
        let band = f.error_band(&samples, 0.16, 0.84, 3).unwrap();
        let curve = f.fit_curve(&[0.3, 0.0], 3).unwrap();
        for i in 0..3 {
            assert_relative_eq!(band.y_low[i], 0.266, epsilon = 1e-9);
            assert_relative_eq!(band.y_high[i], 0.334, epsilon = 1e-9);
            assert!(band.y_low[i] <= curve.y[i] && curve.y[i] <= band.y_high[i]);
        }
        assert!(f.error_band(&samples, 0.84, 0.16, 3).is_err());
    }
}
