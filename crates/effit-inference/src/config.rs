//! Fitter configuration.

use crate::interval::IntervalPolicy;
use crate::metropolis::MetropolisConfig;
use crate::optimizer::OptimizerConfig;
use effit_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// How the model is turned into a per-bin efficiency in the likelihood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Mean of `f` at the two bin edges.
    #[default]
    Interpolation,
    /// Gauss-Legendre average of `f` over the bin.
    Integration,
}

/// Configuration of an [`EfficiencyFitter`](crate::EfficiencyFitter).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitterConfig {
    /// Per-bin efficiency used by the log-likelihood.
    pub evaluation: EvaluationMode,
    /// Interval policy for per-bin data points.
    pub interval_policy: IntervalPolicy,
    /// Probability content of per-bin intervals.
    pub confidence_level: f64,
    /// Metropolis steps of the fast p-value.
    pub pvalue_iterations: usize,
    /// Base seed for sampling and the p-value walk.
    pub seed: u64,
    /// Sampler settings; `n_chains` also sets the number of model instances.
    pub sampler: MetropolisConfig,
    /// Mode refinement settings.
    pub optimizer: OptimizerConfig,
    /// Lower and upper posterior quantiles of the error band.
    pub band_quantiles: (f64, f64),
    /// Grid points for the fit curve and error band.
    pub curve_points: usize,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            evaluation: EvaluationMode::default(),
            interval_policy: IntervalPolicy::default(),
            confidence_level: 0.68,
            pvalue_iterations: 100_000,
            seed: 42,
            sampler: MetropolisConfig::default(),
            optimizer: OptimizerConfig::default(),
            band_quantiles: (0.16, 0.84),
            curve_points: 200,
        }
    }
}

impl FitterConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::Validation(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        let (lo, hi) = self.band_quantiles;
        if !((0.0..=1.0).contains(&lo) && (0.0..=1.0).contains(&hi) && lo < hi) {
            return Err(Error::Validation(format!(
                "band_quantiles must satisfy 0 <= low < high <= 1, got ({lo}, {hi})"
            )));
        }
        if self.curve_points < 2 {
            return Err(Error::Validation("curve_points must be at least 2".to_string()));
        }
        if self.optimizer.m == 0 {
            return Err(Error::Validation("optimizer.m must be at least 1".to_string()));
        }
        self.sampler.validate()
    }
}
