//! Efficiency fitter: binomial log-likelihood, posterior sampling, mode
//! refinement and the fast p-value.
//!
//! The fitter owns one [`ModelFunction`] instance per sampling chain, each
//! behind its own `Mutex`. A chain only ever locks its own instance, so
//! chains running in parallel never share a parameter buffer.

use std::sync::{Mutex, MutexGuard, PoisonError};

use effit_core::{ChainLogDensity, EfficiencyFitResult, Error, Histogram, PValueResult, Result};
use effit_prob::log_approx_binomial;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::chain::{SamplerResult, sample_metropolis_multichain};
use crate::config::{EvaluationMode, FitterConfig};
use crate::data::{Bin, BinnedCounts};
use crate::diagnostics::{SamplingDiagnostics, compute_diagnostics};
use crate::model::ModelFunction;
use crate::optimizer::ModeFinder;
use crate::pvalue::{PValueCallback, fast_pvalue};
use crate::report::{ErrorBand, FitCurve};

/// Output of [`EfficiencyFitter::fit`].
#[derive(Debug, Clone)]
pub struct EfficiencyFit {
    /// Serializable summary.
    pub result: EfficiencyFitResult,
    /// Posterior draws, for error bands.
    pub samples: SamplerResult,
    /// Convergence diagnostics of the draws.
    pub diagnostics: SamplingDiagnostics,
    /// Model at the best fit on `config.curve_points` points.
    pub curve: FitCurve,
    /// Posterior band at `config.band_quantiles` on the same grid.
    pub band: ErrorBand,
}

/// Fits a [`ModelFunction`] to the efficiency `passed / total`.
#[derive(Debug)]
pub struct EfficiencyFitter {
    pub(crate) config: FitterConfig,
    pub(crate) data: Option<BinnedCounts>,
    pub(crate) model: Option<ModelFunction>,
    chain_models: Vec<Mutex<ModelFunction>>,
}

impl EfficiencyFitter {
    /// Empty fitter; histograms and model are set later.
    pub fn new(config: FitterConfig) -> Self {
        Self { config, data: None, model: None, chain_models: Vec::new() }
    }

    /// Fitter with histograms and model in place.
    pub fn with_data(
        total: &Histogram,
        passed: &Histogram,
        model: ModelFunction,
        config: FitterConfig,
    ) -> Result<Self> {
        let mut fitter = Self::new(config);
        fitter.set_histograms(total, passed)?;
        fitter.set_model(model);
        Ok(fitter)
    }

    /// Replace the data. On failure the previous data is kept.
    pub fn set_histograms(&mut self, total: &Histogram, passed: &Histogram) -> Result<()> {
        let data = BinnedCounts::from_histograms(total, passed)?;
        self.data = Some(data);
        Ok(())
    }

    /// Replace the model and allocate one instance per chain.
    pub fn set_model(&mut self, model: ModelFunction) {
        let n = self.config.sampler.n_chains.max(1);
        self.chain_models = (0..n).map(|_| Mutex::new(model.clone())).collect();
        self.model = Some(model);
    }

    /// Configuration in use.
    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    /// Binned counts, if histograms are set.
    pub fn data(&self) -> Option<&BinnedCounts> {
        self.data.as_ref()
    }

    /// Model prototype, if set.
    pub fn model(&self) -> Option<&ModelFunction> {
        self.model.as_ref()
    }

    /// Log-likelihood at `params` using chain 0's model instance.
    pub fn log_likelihood(&self, params: &[f64]) -> f64 {
        self.log_likelihood_on_chain(0, params)
    }

    /// Sum over bins of `ln B(k; n, ε_bin(params))`, using `chain`'s model.
    ///
    /// `NaN` if data or model is missing.
    pub fn log_likelihood_on_chain(&self, chain: usize, params: &[f64]) -> f64 {
        let Some(data) = &self.data else {
            return f64::NAN;
        };
        let Some(mut model) = self.lock_chain(chain) else {
            return f64::NAN;
        };

        model.set_parameters(params);
        data.bins()
            .iter()
            .map(|bin| log_approx_binomial(bin.n, bin.k, self.bin_efficiency(&model, bin)))
            .sum()
    }

    /// `f(x; params)` on chain 0's model instance.
    pub fn evaluate_model(&self, x: f64, params: &[f64]) -> f64 {
        self.evaluate_model_on_chain(0, x, params)
    }

    /// `f(x; params)` on `chain`'s model instance; `NaN` if no model is set.
    pub fn evaluate_model_on_chain(&self, chain: usize, x: f64, params: &[f64]) -> f64 {
        let Some(mut model) = self.lock_chain(chain) else {
            return f64::NAN;
        };
        model.set_parameters(params);
        model.eval(x)
    }

    /// Fast goodness-of-fit p-value at `params` with its own seeded stream.
    pub fn calculate_pvalue_fast(
        &self,
        params: &[f64],
        iterations: usize,
        seed: u64,
        callback: Option<PValueCallback<'_>>,
    ) -> Result<PValueResult> {
        let data = self.require_data()?;
        let n_parameters = self.require_model()?.n_parameters();
        if params.len() != n_parameters {
            return Err(Error::Validation(format!(
                "expected {n_parameters} parameters, got {}",
                params.len()
            )));
        }
        let mut model = self
            .lock_chain(0)
            .ok_or_else(|| Error::Validation("no model instance allocated".to_string()))?;

        let mut rng = StdRng::seed_from_u64(seed);
        Ok(fast_pvalue(data, &mut model, params, iterations, &mut rng, callback))
    }

    /// Sample the posterior, refine its mode and compute the p-value there.
    ///
    /// Also evaluates the best-fit curve and the posterior error band on the
    /// configured grid.
    pub fn fit(&self) -> Result<EfficiencyFit> {
        self.config.validate()?;
        let data = self.require_data()?;
        let model = self.require_model()?;
        let n_parameters = model.n_parameters();

        let samples = sample_metropolis_multichain(self, &self.config.sampler, self.config.seed)?;
        let diagnostics = compute_diagnostics(&samples);
        let names = model.parameter_names();
        let poorly_mixed = diagnostics.poorly_mixed(&names);
        if !poorly_mixed.is_empty() {
            log::warn!("chains not mixed for {:?} (max R-hat {:.3})", poorly_mixed, diagnostics.max_r_hat());
        }

        let (mcmc_mode, mcmc_lp) = samples
            .global_mode()
            .map(|(p, lp)| (p.to_vec(), lp))
            .ok_or_else(|| Error::Computation("sampler returned no finite draws".to_string()))?;

        let finder = ModeFinder::new(self.config.optimizer.clone());
        let (best, log_likelihood, converged) = match finder.find_mode(self, &mcmc_mode) {
            Ok(r) if r.log_density >= mcmc_lp => {
                log::debug!("mode refinement: {r}");
                (r.parameters, r.log_density, r.converged)
            }
            Ok(r) => {
                log::warn!(
                    "mode refinement ended below the best draw ({:.6} < {:.6}); keeping the draw",
                    r.log_density,
                    mcmc_lp
                );
                (mcmc_mode, mcmc_lp, false)
            }
            Err(e) => {
                log::warn!("mode refinement failed: {e}; keeping the best draw");
                (mcmc_mode, mcmc_lp, false)
            }
        };

        let pvalue =
            self.calculate_pvalue_fast(&best, self.config.pvalue_iterations, self.config.seed, None)?;

        let result = EfficiencyFitResult {
            parameter_names: names,
            posterior_mean: (0..n_parameters).map(|i| samples.param_mean(i)).collect(),
            posterior_std: (0..n_parameters).map(|i| samples.param_std(i)).collect(),
            r_hat: diagnostics.r_hat.clone(),
            parameters: best,
            log_likelihood,
            pvalue: pvalue.pvalue,
            corrected_pvalue: pvalue.corrected_pvalue,
            n_bins: data.n_bins(),
            n_parameters,
            converged,
        };

        log::info!("Fit summary for model '{}':", model.name());
        for (name, value) in result.parameter_names.iter().zip(&result.parameters) {
            log::info!("  {name} = {value:.6}");
        }
        log::info!(
            "  log-likelihood = {:.6}, p-value = {:.4}, corrected p-value = {:.4}",
            result.log_likelihood,
            result.pvalue,
            result.corrected_pvalue
        );

        let (q_low, q_high) = self.config.band_quantiles;
        let curve = self.fit_curve(&result.parameters, self.config.curve_points)?;
        let band = self.error_band(&samples, q_low, q_high, self.config.curve_points)?;

        Ok(EfficiencyFit { result, samples, diagnostics, curve, band })
    }

    fn bin_efficiency(&self, model: &ModelFunction, bin: &Bin) -> f64 {
        match self.config.evaluation {
            EvaluationMode::Interpolation => 0.5 * (model.eval(bin.xmin) + model.eval(bin.xmax)),
            EvaluationMode::Integration => model.bin_average(bin.xmin, bin.xmax),
        }
    }

    /// Lock `chain`'s model, falling back to chain 0 for unknown ids.
    fn lock_chain(&self, chain: usize) -> Option<MutexGuard<'_, ModelFunction>> {
        let slot = self.chain_models.get(chain).or_else(|| self.chain_models.first())?;
        Some(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn require_data(&self) -> Result<&BinnedCounts> {
        self.data.as_ref().ok_or_else(|| Error::Validation("histograms not defined".to_string()))
    }

    pub(crate) fn require_model(&self) -> Result<&ModelFunction> {
        self.model.as_ref().ok_or_else(|| Error::Validation("fit function not defined".to_string()))
    }
}

impl ChainLogDensity for EfficiencyFitter {
    fn dim(&self) -> usize {
        self.model.as_ref().map_or(0, ModelFunction::n_parameters)
    }

    fn parameter_names(&self) -> Vec<String> {
        self.model.as_ref().map(ModelFunction::parameter_names).unwrap_or_default()
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.model.as_ref().map(ModelFunction::parameter_bounds).unwrap_or_default()
    }

    fn initial_values(&self) -> Vec<f64> {
        self.model.as_ref().map(ModelFunction::initial_values).unwrap_or_default()
    }

    fn log_density(&self, chain: usize, params: &[f64]) -> f64 {
        self.log_likelihood_on_chain(chain, params)
    }
}
